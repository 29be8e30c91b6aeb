//! Population management.
//!
//! The [`PopulationManager`] exclusively owns the agent registry. Two
//! periodic operations run against it: the spawn operation tops the horde up
//! around random live players, and the management sweep purges stale entries
//! and despawns agents no player is near. Brains never touch the registry.

use ahash::AHashMap;
use horde_common::{sample_annulus, EntityId, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::behavior::{BehaviorState, ZombieBrain};
use crate::config::HordeConfig;
use crate::events::{DespawnReason, EventBus, HordeEvent, SoundCue};
use crate::factory::{AgentFactory, AgentSlot};
use crate::host::{HordeHost, PrefabRef};
use crate::perception::is_valid;
use crate::scheduler::CallQueue;
use crate::terrain::{validate_spawn_point, SpawnRejection};

/// Population limits and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Agents allowed per live player
    pub max_zombies_per_player: u32,
    /// Outer radius of the spawn ring
    pub spawn_radius: f32,
    /// Inner radius of the spawn ring
    pub min_spawn_distance: f32,
    /// Agents farther than this from every player are removed
    pub despawn_distance: f32,
    /// Seconds between spawn operations
    pub spawn_interval: f32,
    /// Spawn attempts per operation
    pub max_spawn_attempts: u32,
    /// Seconds between management sweeps
    pub management_interval: f32,
    /// Seconds between behavior ticks
    pub think_interval: f32,
    /// Prefab spawned for each agent
    pub prefab: PrefabRef,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            max_zombies_per_player: 20,
            spawn_radius: 150.0,
            min_spawn_distance: 50.0,
            despawn_distance: 200.0,
            spawn_interval: 10.0,
            max_spawn_attempts: 5,
            management_interval: 30.0,
            think_interval: 0.5,
            prefab: PrefabRef::default(),
        }
    }
}

impl PopulationConfig {
    /// Clamp values to sensible ranges.
    pub fn validate(&mut self) {
        self.min_spawn_distance = self.min_spawn_distance.max(0.0);
        if self.spawn_radius < self.min_spawn_distance {
            warn!(
                "spawn radius {} below minimum spawn distance {}, raising",
                self.spawn_radius, self.min_spawn_distance
            );
            self.spawn_radius = self.min_spawn_distance;
        }
        self.despawn_distance = self.despawn_distance.max(0.0);
        self.spawn_interval = self.spawn_interval.max(0.1);
        self.management_interval = self.management_interval.max(0.1);
        self.think_interval = self.think_interval.clamp(0.05, 10.0);
    }
}

/// Outcome of one spawn operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnReport {
    /// Population cap for the current player count
    pub cap: usize,
    /// Spawn attempts made
    pub attempts: u32,
    /// Agents created
    pub spawned: Vec<EntityId>,
    /// Candidates refused by spawn validation
    pub rejected: Vec<SpawnRejection>,
    /// Attempts where the host could not materialize the agent
    pub failed: u32,
}

/// Outcome of one management sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagementReport {
    /// Stale entries dropped from the registry
    pub purged: Vec<EntityId>,
    /// Agents destroyed for being out of range
    pub despawned: Vec<EntityId>,
}

/// Owner of the agent registry.
#[derive(Debug)]
pub struct PopulationManager {
    config: PopulationConfig,
    factory: AgentFactory,
    /// Insertion-ordered registry
    order: Vec<EntityId>,
    slots: AHashMap<EntityId, AgentSlot>,
    target_hints: AHashMap<EntityId, EntityId>,
    rng: fastrand::Rng,
}

impl PopulationManager {
    /// Creates an empty population from validated configuration.
    #[must_use]
    pub fn new(config: &HordeConfig, seed: u64) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed);
        let factory = AgentFactory::new(config, rng.u64(..));
        Self {
            config: config.population.clone(),
            factory,
            order: Vec::new(),
            slots: AHashMap::new(),
            target_hints: AHashMap::new(),
            rng,
        }
    }

    /// Population cap for `players` live players.
    #[must_use]
    pub fn total_cap(&self, players: usize) -> usize {
        players.saturating_mul(self.config.max_zombies_per_player as usize)
    }

    /// Tops the population up around random live players.
    pub fn spawn_tick<H: HordeHost + ?Sized>(
        &mut self,
        now: f32,
        host: &mut H,
        queue: &mut CallQueue,
        events: &EventBus,
    ) -> SpawnReport {
        let players = host.live_players();
        let cap = self.total_cap(players.len());
        let mut report = SpawnReport {
            cap,
            ..SpawnReport::default()
        };

        if players.is_empty() || self.order.len() >= cap {
            return report;
        }

        let budget = (cap - self.order.len()).min(self.config.max_spawn_attempts as usize);
        for _ in 0..budget {
            report.attempts += 1;

            let player = players[self.rng.usize(..players.len())];
            let Some(center) = host.position(player) else {
                report.failed += 1;
                continue;
            };

            let candidate = sample_annulus(
                &mut self.rng,
                center,
                self.config.min_spawn_distance,
                self.config.spawn_radius,
            );
            let position = match validate_spawn_point(&*host, candidate) {
                Ok(position) => position,
                Err(rejection) => {
                    debug!(?candidate, "spawn candidate rejected: {rejection}");
                    report.rejected.push(rejection);
                    continue;
                },
            };

            match self
                .factory
                .materialize(host, queue, position, Some(player), now)
            {
                Ok(slot) => {
                    let agent = slot.brain().agent();
                    self.order.push(agent);
                    self.slots.insert(agent, slot);
                    self.target_hints.insert(agent, player);
                    events.publish(HordeEvent::AgentSpawned {
                        agent,
                        position,
                        target_hint: player,
                    });
                    report.spawned.push(agent);
                },
                Err(e) => {
                    warn!("failed to spawn agent: {e}");
                    report.failed += 1;
                },
            }
        }

        if !report.spawned.is_empty() {
            info!(
                "spawned {} agents ({}/{} live)",
                report.spawned.len(),
                self.order.len(),
                cap
            );
        }
        report
    }

    /// Purges stale entries and despawns agents no player is near.
    ///
    /// Without live players only the purge runs.
    pub fn management_tick<H: HordeHost + ?Sized>(
        &mut self,
        host: &mut H,
        queue: &mut CallQueue,
        events: &EventBus,
    ) -> ManagementReport {
        let mut report = ManagementReport::default();
        let player_positions: Vec<Vec3> = host
            .live_players()
            .into_iter()
            .filter_map(|p| host.position(p))
            .collect();

        // Back to front so removals never shift an unvisited entry.
        for index in (0..self.order.len()).rev() {
            let agent = self.order[index];

            if !is_valid(&*host, Some(agent)) {
                if host.is_destroyed(agent) {
                    events.publish(HordeEvent::Sound {
                        agent,
                        cue: SoundCue::Death,
                    });
                }
                self.remove_at(index, queue);
                events.publish(HordeEvent::AgentDespawned {
                    agent,
                    reason: DespawnReason::Invalid,
                });
                report.purged.push(agent);
                continue;
            }

            if player_positions.is_empty() {
                continue;
            }
            let Some(position) = host.position(agent) else {
                continue;
            };
            let nearest = player_positions
                .iter()
                .map(|p| p.distance(position))
                .fold(f32::INFINITY, f32::min);

            if nearest > self.config.despawn_distance {
                host.destroy_entity(agent);
                self.remove_at(index, queue);
                events.publish(HordeEvent::AgentDespawned {
                    agent,
                    reason: DespawnReason::OutOfRange,
                });
                report.despawned.push(agent);
            }
        }

        if !report.purged.is_empty() || !report.despawned.is_empty() {
            info!(
                "population sweep: {} purged, {} despawned, {} live",
                report.purged.len(),
                report.despawned.len(),
                self.order.len()
            );
        }
        report
    }

    /// Runs one behavior tick for `agent`. `None` if it is not registered.
    pub fn think<H: HordeHost + ?Sized>(
        &mut self,
        agent: EntityId,
        now: f32,
        host: &mut H,
        events: &EventBus,
    ) -> Option<BehaviorState> {
        let slot = self.slots.get_mut(&agent)?;
        Some(slot.brain_mut().tick(now, host, events))
    }

    /// Plays an ambient sound for `agent` and schedules the next one.
    pub fn voice<H: HordeHost + ?Sized>(
        &mut self,
        agent: EntityId,
        host: &H,
        queue: &mut CallQueue,
        events: &EventBus,
    ) {
        if !self.slots.contains_key(&agent) {
            return;
        }
        if is_valid(host, Some(agent)) {
            let cue = self.factory.pick_cue();
            events.publish(HordeEvent::Sound { agent, cue });
        }
        let next = self.factory.schedule_voice(queue, agent, false);
        if let Some(slot) = self.slots.get_mut(&agent) {
            slot.replace_voice(queue, next);
        }
    }

    /// Destroys every agent and empties the registry. Returns how many were removed.
    pub fn clear_all<H: HordeHost + ?Sized>(
        &mut self,
        host: &mut H,
        queue: &mut CallQueue,
        events: &EventBus,
    ) -> usize {
        let count = self.order.len();
        while let Some(agent) = self.order.last().copied() {
            host.destroy_entity(agent);
            self.remove_at(self.order.len() - 1, queue);
            events.publish(HordeEvent::AgentDespawned {
                agent,
                reason: DespawnReason::Teardown,
            });
        }
        if count > 0 {
            info!("cleared {count} agents");
        }
        count
    }

    fn remove_at(&mut self, index: usize, queue: &mut CallQueue) {
        let agent = self.order.remove(index);
        self.target_hints.remove(&agent);
        if let Some(slot) = self.slots.remove(&agent) {
            slot.retire(queue);
        }
    }

    /// Registered agents in spawn order.
    #[must_use]
    pub fn agents(&self) -> &[EntityId] {
        &self.order
    }

    /// Number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns whether no agents are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns whether `agent` is registered.
    #[must_use]
    pub fn contains(&self, agent: EntityId) -> bool {
        self.slots.contains_key(&agent)
    }

    /// Brain of a registered agent.
    #[must_use]
    pub fn brain(&self, agent: EntityId) -> Option<&ZombieBrain> {
        self.slots.get(&agent).map(AgentSlot::brain)
    }

    /// Player whose presence triggered the agent's spawn.
    #[must_use]
    pub fn target_hint(&self, agent: EntityId) -> Option<EntityId> {
        self.target_hints.get(&agent).copied()
    }

    /// Active population settings.
    #[must_use]
    pub const fn config(&self) -> &PopulationConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::EntityQuery;
    use crate::mock::SandboxWorld;
    use crate::scheduler::TimerTask;
    use proptest::prelude::*;

    struct Rig {
        world: SandboxWorld,
        queue: CallQueue,
        events: EventBus,
        population: PopulationManager,
    }

    fn rig() -> Rig {
        Rig {
            world: SandboxWorld::new(),
            queue: CallQueue::new(),
            events: EventBus::new(4096),
            population: PopulationManager::new(&HordeConfig::default(), 17),
        }
    }

    impl Rig {
        fn spawn(&mut self, now: f32) -> SpawnReport {
            self.population
                .spawn_tick(now, &mut self.world, &mut self.queue, &self.events)
        }

        fn manage(&mut self) -> ManagementReport {
            self.population
                .management_tick(&mut self.world, &mut self.queue, &self.events)
        }
    }

    #[test]
    fn test_single_player_spawns_five() {
        let mut r = rig();
        let player = r.world.add_player(Vec3::ZERO);

        let report = r.spawn(0.0);
        assert_eq!(report.cap, 20);
        assert_eq!(report.attempts, 5);
        assert_eq!(report.spawned.len(), 5);
        assert_eq!(r.population.len(), 5);

        for &agent in r.population.agents() {
            assert_eq!(r.population.target_hint(agent), Some(player));
            let pos = r.world.position(agent).expect("agent");
            let dist = horde_common::horizontal_distance(Vec3::ZERO, pos);
            assert!((49.9..=150.1).contains(&dist));
        }
        let spawned = r
            .events
            .drain()
            .into_iter()
            .filter(|e| matches!(e, HordeEvent::AgentSpawned { .. }))
            .count();
        assert_eq!(spawned, 5);
    }

    #[test]
    fn test_spawn_respects_cap() {
        let mut r = rig();
        r.world.add_player(Vec3::ZERO);

        for tick in 0..6 {
            r.spawn(tick as f32 * 10.0);
            assert!(r.population.len() <= 20);
        }
        assert_eq!(r.population.len(), 20);
        let report = r.spawn(100.0);
        assert_eq!(report.attempts, 0);
    }

    #[test]
    fn test_spawn_budget_limited_by_headroom() {
        let mut config = HordeConfig::default();
        config.population.max_zombies_per_player = 3;
        let mut r = rig();
        r.population = PopulationManager::new(&config, 2);
        r.world.add_player(Vec3::ZERO);

        assert_eq!(r.spawn(0.0).spawned.len(), 3);
        assert_eq!(r.spawn(10.0).attempts, 0);
    }

    #[test]
    fn test_cap_scales_with_players() {
        let mut r = rig();
        r.world.add_player(Vec3::ZERO);
        r.world.add_player(Vec3::new(1000.0, 0.0, 0.0));
        for tick in 0..10 {
            r.spawn(tick as f32);
        }
        assert_eq!(r.population.len(), 40);
    }

    #[test]
    fn test_no_players_no_spawn() {
        let mut r = rig();
        let report = r.spawn(0.0);
        assert_eq!(report.cap, 0);
        assert_eq!(report.attempts, 0);
        assert!(r.population.is_empty());
    }

    #[test]
    fn test_rejected_candidates_abort_attempt() {
        let mut r = rig();
        r.world.add_player(Vec3::ZERO);
        r.world.add_water(Vec3::ZERO, 500.0, 2.0);

        let report = r.spawn(0.0);
        assert_eq!(report.attempts, 5);
        assert!(report.spawned.is_empty());
        assert_eq!(report.rejected.len(), 5);
        assert!(matches!(report.rejected[0], SpawnRejection::Water { .. }));
    }

    #[test]
    fn test_host_spawn_failure_counted() {
        let mut r = rig();
        r.world.add_player(Vec3::ZERO);
        r.world.set_fail_spawns(true);
        let report = r.spawn(0.0);
        assert_eq!(report.failed, 5);
        assert!(r.population.is_empty());
        assert!(r.queue.is_empty());
    }

    #[test]
    fn test_despawn_by_distance() {
        let mut r = rig();
        r.world.add_player(Vec3::ZERO);
        r.spawn(0.0);
        let agents = r.population.agents().to_vec();

        r.world.place(agents[0], Vec3::new(250.0, 0.0, 0.0));
        r.world.place(agents[1], Vec3::new(0.0, 0.0, 199.0));
        r.world.place(agents[2], Vec3::new(200.0, 0.0, 0.0));

        let report = r.manage();
        assert_eq!(report.despawned, vec![agents[0]]);
        assert!(!r.world.contains(agents[0]));
        assert!(r.population.contains(agents[1]));
        assert!(r.population.contains(agents[2]));
        assert_eq!(r.population.len(), 4);
    }

    #[test]
    fn test_nearest_player_keeps_agent() {
        let mut r = rig();
        r.world.add_player(Vec3::ZERO);
        r.spawn(0.0);
        let agent = r.population.agents()[0];
        r.world.place(agent, Vec3::new(600.0, 0.0, 0.0));
        r.world.add_player(Vec3::new(650.0, 0.0, 0.0));

        assert!(r.manage().despawned.is_empty());
        assert!(r.population.contains(agent));
    }

    #[test]
    fn test_purges_invalid_entries() {
        let mut r = rig();
        r.world.add_player(Vec3::ZERO);
        r.spawn(0.0);
        let agents = r.population.agents().to_vec();
        r.events.drain();

        r.world.remove(agents[1]);
        r.world.kill(agents[3]);

        let report = r.manage();
        assert_eq!(report.purged, vec![agents[3], agents[1]]);
        assert!(report.despawned.is_empty());
        assert_eq!(r.population.agents(), &[agents[0], agents[2], agents[4]]);

        let deaths = r
            .events
            .drain()
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    HordeEvent::Sound {
                        cue: SoundCue::Death,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(deaths, 1);
    }

    #[test]
    fn test_no_players_purges_but_keeps_distant() {
        let mut r = rig();
        let player = r.world.add_player(Vec3::ZERO);
        r.spawn(0.0);
        let agents = r.population.agents().to_vec();
        r.world.place(agents[0], Vec3::new(5000.0, 0.0, 0.0));
        r.world.remove(agents[1]);
        r.world.kill(player);

        let report = r.manage();
        assert_eq!(report.purged, vec![agents[1]]);
        assert!(report.despawned.is_empty());
        assert!(r.population.contains(agents[0]));
    }

    #[test]
    fn test_removal_cancels_agent_timers() {
        let mut r = rig();
        r.world.add_player(Vec3::ZERO);
        r.spawn(0.0);
        assert_eq!(r.queue.len(), 10);

        for &agent in r.population.agents() {
            r.world.place(agent, Vec3::new(1000.0, 0.0, 0.0));
        }
        r.manage();
        assert!(r.population.is_empty());
        assert!(r.queue.is_empty());
        assert!(r.queue.pop_due(1000.0).is_none());
    }

    #[test]
    fn test_think_and_voice_for_registered_agents() {
        let mut r = rig();
        let player = r.world.add_player(Vec3::ZERO);
        r.spawn(0.0);
        let agent = r.population.agents()[0];

        let state = r
            .population
            .think(agent, 0.5, &mut r.world, &r.events)
            .expect("registered");
        assert_ne!(state, BehaviorState::Wandering);
        assert_eq!(r.population.brain(agent).and_then(|b| b.target()), Some(player));

        r.events.drain();
        r.population.voice(agent, &r.world, &mut r.queue, &r.events);
        let sounds = r.events.drain();
        assert_eq!(sounds.len(), 1);
        assert!(matches!(
            sounds[0],
            HordeEvent::Sound {
                cue: SoundCue::Idle | SoundCue::Alert,
                ..
            }
        ));

        assert!(r
            .population
            .think(EntityId::from_raw(u64::MAX), 0.5, &mut r.world, &r.events)
            .is_none());
    }

    #[test]
    fn test_voice_reschedules() {
        let mut r = rig();
        r.world.add_player(Vec3::ZERO);
        r.spawn(0.0);
        let agent = r.population.agents()[0];

        let mut voices = 0;
        let mut now = 0.0;
        while now < 100.0 {
            now += 0.5;
            while let Some(task) = r.queue.pop_due(now) {
                if task == TimerTask::AgentVoice(agent) {
                    voices += 1;
                    r.population.voice(agent, &r.world, &mut r.queue, &r.events);
                }
            }
        }
        // First within 15s, then one every 8-20s
        assert!((5..=12).contains(&voices));
    }

    #[test]
    fn test_clear_all() {
        let mut r = rig();
        r.world.add_player(Vec3::ZERO);
        r.spawn(0.0);
        let agents = r.population.agents().to_vec();

        assert_eq!(
            r.population
                .clear_all(&mut r.world, &mut r.queue, &r.events),
            5
        );
        assert!(r.population.is_empty());
        assert!(r.queue.is_empty());
        assert!(agents.iter().all(|a| !r.world.contains(*a)));
        assert_eq!(r.world.destroyed_entities().len(), 5);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_sweep_keeps_exactly_agents_in_range(
            seed in any::<u64>(),
            offsets in proptest::collection::vec((-400.0f32..400.0, -400.0f32..400.0), 5),
            player_x in -100.0f32..100.0,
        ) {
            let mut world = SandboxWorld::new();
            let mut queue = CallQueue::new();
            let events = EventBus::new(4096);
            let mut population = PopulationManager::new(&HordeConfig::default(), seed);

            let player = world.add_player(Vec3::ZERO);
            population.spawn_tick(0.0, &mut world, &mut queue, &events);
            let agents = population.agents().to_vec();
            prop_assert_eq!(agents.len(), 5);

            for (agent, (x, z)) in agents.iter().zip(&offsets) {
                world.place(*agent, Vec3::new(*x, 0.0, *z));
            }
            world.place(player, Vec3::new(player_x, 0.0, 0.0));
            population.management_tick(&mut world, &mut queue, &events);

            for agent in &agents {
                let pos = world.position(*agent);
                let in_range = pos.map_or(false, |p| p.distance(Vec3::new(player_x, 0.0, 0.0)) <= 200.0);
                prop_assert_eq!(population.contains(*agent), in_range);
            }
            prop_assert!(population.agents().iter().all(|a| is_valid(&world, Some(*a))));
        }
    }
}
