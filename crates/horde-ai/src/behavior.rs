//! Per-agent behavior state machine.
//!
//! A [`ZombieBrain`] is attached to one agent and ticked on a fixed period.
//! Each tick runs four steps in order:
//!
//! 1. Re-validate the held target and refresh line of sight.
//! 2. Acquire the nearest visible player when no target is held.
//! 3. Chase: steer to the target (attacking in range) or to where it was
//!    last seen, giving up after [`GIVE_UP_AFTER`] seconds.
//! 4. Wander: pick a fresh ground point on a ring around the agent when the
//!    wander interval elapsed or navigation went idle.
//!
//! Host failures never escape a tick. A missing capability or a failed host
//! call turns that step into a no-op and the agent idles in place.

use horde_common::{sample_annulus, EntityId, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::damage::DamageType;
use crate::events::{AnimationCue, EventBus, HordeEvent, SoundCue};
use crate::host::{AgentCapabilities, HordeHost, NavGoal};
use crate::perception::{find_nearest_target, has_line_of_sight, is_valid};
use crate::terrain::probe_ground;

/// Distance under which an agent can hit its target.
pub const ATTACK_RANGE: f32 = 2.0;
/// Distance under which an agent counts as having reached a point.
pub const ARRIVAL_RADIUS: f32 = 2.0;
/// Seconds after losing sight before a target is abandoned.
pub const GIVE_UP_AFTER: f32 = 15.0;
/// Inner radius of the wander ring.
pub const WANDER_MIN_RADIUS: f32 = 5.0;
/// Outer radius of the wander ring.
pub const WANDER_MAX_RADIUS: f32 = 15.0;

/// Per-agent tunables, fixed once the agent is spawned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZombieTuning {
    /// Max speed while wandering
    pub wander_speed: f32,
    /// Max speed while chasing
    pub chase_speed: f32,
    /// Damage per attack
    pub attack_damage: f32,
    /// Minimum seconds between attacks
    pub attack_cooldown: f32,
    /// Radius in which players are noticed
    pub detection_range: f32,
    /// Seconds between wander destinations
    pub wander_interval: f32,
}

impl Default for ZombieTuning {
    fn default() -> Self {
        Self {
            wander_speed: 1.8,
            chase_speed: 3.5,
            attack_damage: 15.0,
            attack_cooldown: 1.5,
            detection_range: 35.0,
            wander_interval: 10.0,
        }
    }
}

impl ZombieTuning {
    /// Clamp values to sensible ranges.
    pub fn validate(&mut self) {
        self.wander_speed = self.wander_speed.max(0.0);
        self.chase_speed = self.chase_speed.max(0.0);
        self.attack_damage = self.attack_damage.max(0.0);
        self.attack_cooldown = self.attack_cooldown.max(0.0);
        self.detection_range = self.detection_range.clamp(0.0, 1000.0);
        self.wander_interval = self.wander_interval.max(0.1);
    }
}

/// Top-level behavior mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorMode {
    /// Roaming with no target
    Wandering,
    /// Pursuing a target
    Chasing,
}

/// Observable state, splitting chase by whether the target is in sight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorState {
    /// Roaming with no target
    Wandering,
    /// Pursuing a visible target
    ChasingVisible,
    /// Heading to where the target was last seen
    ChasingLostSight,
}

/// Behavior state machine for one agent.
#[derive(Debug, Clone)]
pub struct ZombieBrain {
    agent: EntityId,
    tuning: ZombieTuning,
    capabilities: AgentCapabilities,
    initial_target: Option<EntityId>,
    active: bool,

    target: Option<EntityId>,
    mode: BehaviorMode,
    has_lost_target: bool,
    last_known_target_position: Vec3,
    last_known_at: f32,
    lost_target_time: f32,
    last_attack_time: Option<f32>,
    last_wander_time: Option<f32>,
    wander_destination: Option<Vec3>,

    rng: fastrand::Rng,
}

impl ZombieBrain {
    /// Creates an inactive brain for `agent`.
    ///
    /// `capabilities` must be resolved from the host by the caller; they are
    /// not re-queried per tick.
    #[must_use]
    pub fn new(
        agent: EntityId,
        tuning: ZombieTuning,
        capabilities: AgentCapabilities,
        seed: u64,
    ) -> Self {
        Self {
            agent,
            tuning,
            capabilities,
            initial_target: None,
            active: false,
            target: None,
            mode: BehaviorMode::Wandering,
            has_lost_target: false,
            last_known_target_position: Vec3::ZERO,
            last_known_at: 0.0,
            lost_target_time: 0.0,
            last_attack_time: None,
            last_wander_time: None,
            wander_destination: None,
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Sets the player the agent starts out chasing.
    #[must_use]
    pub fn with_initial_target(mut self, target: EntityId) -> Self {
        self.initial_target = Some(target);
        self
    }

    /// Resets runtime state and starts the agent.
    ///
    /// With a valid initial target the agent starts chasing at chase speed,
    /// otherwise it starts wandering at wander speed.
    pub fn activate<H: HordeHost + ?Sized>(&mut self, host: &mut H, now: f32) {
        self.active = true;
        self.target = None;
        self.mode = BehaviorMode::Wandering;
        self.has_lost_target = false;
        self.last_attack_time = None;
        self.last_wander_time = None;
        self.wander_destination = None;

        match self.initial_target {
            Some(hint) if is_valid(&*host, Some(hint)) => {
                self.target = Some(hint);
                self.mode = BehaviorMode::Chasing;
                if let Some(pos) = host.position(hint) {
                    self.last_known_target_position = pos;
                    self.last_known_at = now;
                }
                self.set_speed(host, self.tuning.chase_speed);
            },
            _ => self.set_speed(host, self.tuning.wander_speed),
        }

        debug!(agent = %self.agent, state = ?self.state(), "brain activated");
    }

    /// Stops ticking. The agent keeps its last navigation goal.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Runs one behavior tick at world time `now`.
    pub fn tick<H: HordeHost + ?Sized>(
        &mut self,
        now: f32,
        host: &mut H,
        events: &EventBus,
    ) -> BehaviorState {
        if !self.active {
            return self.state();
        }

        // Our own entity vanished between ticks; nothing to drive.
        let Some(position) = host.position(self.agent) else {
            trace!(agent = %self.agent, "agent entity missing, skipping tick");
            return self.state();
        };

        self.refresh_target(now, position, host, events);
        self.acquire_target(now, position, host, events);

        match self.mode {
            BehaviorMode::Chasing => self.chase(now, position, host, events),
            BehaviorMode::Wandering => self.wander(now, position, host),
        }

        self.state()
    }

    fn refresh_target<H: HordeHost + ?Sized>(
        &mut self,
        now: f32,
        position: Vec3,
        host: &mut H,
        events: &EventBus,
    ) {
        let Some(target) = self.target else {
            return;
        };

        let target_pos = match host.position(target) {
            Some(pos) if is_valid(&*host, Some(target)) => pos,
            _ => {
                debug!(agent = %self.agent, %target, "target invalid, back to wandering");
                self.drop_to_wandering(host);
                return;
            },
        };

        if has_line_of_sight(&*host, position, target_pos) {
            if self.has_lost_target {
                debug!(agent = %self.agent, %target, "target back in sight");
            }
            self.has_lost_target = false;
            self.last_known_target_position = target_pos;
            self.last_known_at = now;
        } else if !self.has_lost_target {
            self.has_lost_target = true;
            self.last_known_target_position = target_pos;
            self.last_known_at = now;
            self.lost_target_time = now;
            debug!(agent = %self.agent, %target, "lost sight of target");
            events.publish(HordeEvent::SightLost {
                agent: self.agent,
                target,
                last_known: target_pos,
            });
        }
    }

    fn acquire_target<H: HordeHost + ?Sized>(
        &mut self,
        now: f32,
        position: Vec3,
        host: &mut H,
        events: &EventBus,
    ) {
        if self.target.is_some() {
            return;
        }

        let players = host.live_players();
        match find_nearest_target(&*host, position, &players, self.tuning.detection_range) {
            Some(found) => {
                self.target = Some(found);
                if let Some(pos) = host.position(found) {
                    self.last_known_target_position = pos;
                    self.last_known_at = now;
                }
                if self.mode != BehaviorMode::Chasing {
                    self.mode = BehaviorMode::Chasing;
                    self.has_lost_target = false;
                    self.set_speed(host, self.tuning.chase_speed);
                    debug!(agent = %self.agent, target = %found, "target acquired");
                    events.publish(HordeEvent::TargetAcquired {
                        agent: self.agent,
                        target: found,
                    });
                    events.publish(HordeEvent::Sound {
                        agent: self.agent,
                        cue: SoundCue::Alert,
                    });
                }
            },
            None => {
                if self.mode == BehaviorMode::Chasing {
                    self.drop_to_wandering(host);
                }
            },
        }
    }

    fn chase<H: HordeHost + ?Sized>(
        &mut self,
        now: f32,
        position: Vec3,
        host: &mut H,
        events: &EventBus,
    ) {
        let Some(target) = self.target else {
            self.drop_to_wandering(host);
            return;
        };

        if self.has_lost_target {
            let last_known = self.last_known_target_position;
            self.steer(host, NavGoal::Position(last_known));

            let arrived = position.distance(last_known) < ARRIVAL_RADIUS;
            if arrived && now - self.lost_target_time > GIVE_UP_AFTER {
                debug!(agent = %self.agent, %target, "giving up on lost target");
                events.publish(HordeEvent::TargetAbandoned {
                    agent: self.agent,
                    target,
                });
                self.drop_to_wandering(host);
            }
            return;
        }

        let Some(target_pos) = host.position(target) else {
            return;
        };
        self.steer(host, NavGoal::Entity(target));

        if position.distance(target_pos) < ATTACK_RANGE && self.attack_ready(now) {
            self.attack(now, target, host, events);
        }
    }

    fn attack<H: HordeHost + ?Sized>(
        &mut self,
        now: f32,
        target: EntityId,
        host: &mut H,
        events: &EventBus,
    ) {
        let damage = self.tuning.attack_damage;
        match host.apply_damage(target, damage, DamageType::Melee, self.agent) {
            Ok(()) => events.publish(HordeEvent::AttackLanded {
                agent: self.agent,
                target,
                damage,
            }),
            Err(e) => debug!(agent = %self.agent, %target, "attack did not land: {e}"),
        }
        events.publish(HordeEvent::Animation {
            agent: self.agent,
            cue: AnimationCue::Attack,
        });
        events.publish(HordeEvent::Sound {
            agent: self.agent,
            cue: SoundCue::Attack,
        });
        self.last_attack_time = Some(now);
    }

    fn wander<H: HordeHost + ?Sized>(&mut self, now: f32, position: Vec3, host: &mut H) {
        if !self.capabilities.navigation {
            return;
        }

        let overdue = self
            .last_wander_time
            .map_or(true, |last| now - last > self.tuning.wander_interval);
        if !overdue && !host.is_idle(self.agent) {
            return;
        }

        let destination = self.pick_wander_point(position, &*host);
        self.wander_destination = Some(destination);
        self.steer(host, NavGoal::Position(destination));
        self.last_wander_time = Some(now);
    }

    fn pick_wander_point<H: HordeHost + ?Sized>(&mut self, position: Vec3, host: &H) -> Vec3 {
        let candidate = sample_annulus(
            &mut self.rng,
            position,
            WANDER_MIN_RADIUS,
            WANDER_MAX_RADIUS,
        );
        match probe_ground(host, candidate) {
            Some(ground) => ground.position,
            None => position,
        }
    }

    fn attack_ready(&self, now: f32) -> bool {
        self.last_attack_time
            .map_or(true, |last| now - last > self.tuning.attack_cooldown)
    }

    fn drop_to_wandering<H: HordeHost + ?Sized>(&mut self, host: &mut H) {
        self.target = None;
        self.mode = BehaviorMode::Wandering;
        self.has_lost_target = false;
        self.set_speed(host, self.tuning.wander_speed);
    }

    fn steer<H: HordeHost + ?Sized>(&self, host: &mut H, goal: NavGoal) {
        if !self.capabilities.navigation {
            return;
        }
        if let Err(e) = host.steer_to(self.agent, goal) {
            debug!(agent = %self.agent, "steering failed: {e}");
        }
    }

    fn set_speed<H: HordeHost + ?Sized>(&self, host: &mut H, speed: f32) {
        if !self.capabilities.navigation {
            return;
        }
        if let Err(e) = host.set_max_speed(self.agent, speed) {
            debug!(agent = %self.agent, "set speed failed: {e}");
        }
    }

    /// Agent this brain drives.
    #[must_use]
    pub const fn agent(&self) -> EntityId {
        self.agent
    }

    /// Tunables this brain was created with.
    #[must_use]
    pub const fn tuning(&self) -> &ZombieTuning {
        &self.tuning
    }

    /// Capabilities resolved at attach time.
    #[must_use]
    pub const fn capabilities(&self) -> AgentCapabilities {
        self.capabilities
    }

    /// Returns whether the brain is ticking.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Current top-level mode.
    #[must_use]
    pub const fn mode(&self) -> BehaviorMode {
        self.mode
    }

    /// Current observable state.
    #[must_use]
    pub const fn state(&self) -> BehaviorState {
        match self.mode {
            BehaviorMode::Wandering => BehaviorState::Wandering,
            BehaviorMode::Chasing if self.has_lost_target => BehaviorState::ChasingLostSight,
            BehaviorMode::Chasing => BehaviorState::ChasingVisible,
        }
    }

    /// Currently held target.
    #[must_use]
    pub const fn target(&self) -> Option<EntityId> {
        self.target
    }

    /// Returns whether sight of the target is lost.
    #[must_use]
    pub const fn has_lost_target(&self) -> bool {
        self.has_lost_target
    }

    /// Where the target was last seen.
    #[must_use]
    pub const fn last_known_target_position(&self) -> Vec3 {
        self.last_known_target_position
    }

    /// When the last known position was captured.
    #[must_use]
    pub const fn last_known_at(&self) -> f32 {
        self.last_known_at
    }

    /// When sight was lost.
    #[must_use]
    pub const fn lost_target_time(&self) -> f32 {
        self.lost_target_time
    }

    /// When the last attack happened.
    #[must_use]
    pub const fn last_attack_time(&self) -> Option<f32> {
        self.last_attack_time
    }

    /// When the last wander destination was picked.
    #[must_use]
    pub const fn last_wander_time(&self) -> Option<f32> {
        self.last_wander_time
    }

    /// Last wander destination.
    #[must_use]
    pub const fn wander_destination(&self) -> Option<Vec3> {
        self.wander_destination
    }
}
