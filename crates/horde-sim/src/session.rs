//! Fixed-step headless session.

use std::collections::BTreeMap;

use horde_ai::{DespawnReason, EntityQuery, HordeDirector, HordeEvent, SandboxWorld};
use horde_common::EntityId;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{PlayerScript, SimConfig};

/// Aggregated outcome of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    /// Simulated seconds
    pub duration_secs: f32,
    /// Fixed steps run
    pub steps: u64,
    /// Highest live agent count seen
    pub peak_population: usize,
    /// Agents spawned
    pub spawned: u32,
    /// Agents despawned for being out of range
    pub despawned_out_of_range: u32,
    /// Stale agents purged
    pub purged: u32,
    /// Agents cleared at teardown
    pub cleared_at_end: u32,
    /// Wandering to chasing transitions
    pub targets_acquired: u32,
    /// Times an agent lost sight of its target
    pub sight_lost: u32,
    /// Targets given up on
    pub targets_abandoned: u32,
    /// Attacks landed
    pub attacks: u32,
    /// Total damage requested by attacks
    pub damage_dealt: f32,
    /// Sound events by host event name
    pub sounds: BTreeMap<String, u32>,
    /// Animation events by host clip name
    pub animations: BTreeMap<String, u32>,
    /// Players killed during the session
    pub players_killed: usize,
}

impl SessionSummary {
    fn record(&mut self, event: &HordeEvent) {
        match event {
            HordeEvent::AgentSpawned { .. } => self.spawned += 1,
            HordeEvent::AgentDespawned { reason, .. } => match reason {
                DespawnReason::OutOfRange => self.despawned_out_of_range += 1,
                DespawnReason::Invalid => self.purged += 1,
                DespawnReason::Teardown => self.cleared_at_end += 1,
            },
            HordeEvent::TargetAcquired { .. } => self.targets_acquired += 1,
            HordeEvent::SightLost { .. } => self.sight_lost += 1,
            HordeEvent::TargetAbandoned { .. } => self.targets_abandoned += 1,
            HordeEvent::AttackLanded { damage, .. } => {
                self.attacks += 1;
                self.damage_dealt += damage;
            },
            HordeEvent::Sound { cue, .. } => {
                *self.sounds.entry(cue.event_name().to_string()).or_insert(0) += 1;
            },
            HordeEvent::Animation { cue, .. } => {
                *self.animations.entry(cue.clip_name().to_string()).or_insert(0) += 1;
            },
        }
    }
}

/// A sandbox world, its scripted players and the horde director.
#[derive(Debug)]
pub struct Session {
    config: SimConfig,
    world: SandboxWorld,
    director: HordeDirector,
    players: Vec<(EntityId, PlayerScript)>,
}

impl Session {
    /// Builds the sandbox from a validated configuration.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        let mut world = SandboxWorld::new();
        for wall in &config.walls {
            world.add_wall(wall.min, wall.max);
        }
        for water in &config.water {
            world.add_water(water.center, water.radius, water.depth);
        }
        let players = config
            .players
            .iter()
            .map(|script| (world.add_player(script.start), script.clone()))
            .collect();
        let director = HordeDirector::new(config.horde.clone(), config.seed);

        Self {
            config,
            world,
            director,
            players,
        }
    }

    /// Runs the whole session and tears the horde down.
    pub fn run(mut self) -> SessionSummary {
        let dt = self.config.step_secs;
        let total_steps = (self.config.duration_secs / dt).round() as u64;
        let log_every = ((self.config.log_interval_secs / dt).round() as u64).max(1);

        let mut summary = SessionSummary::default();
        self.director.start();
        info!(
            "session started: {} players, {}s at {}s steps",
            self.players.len(),
            self.config.duration_secs,
            dt
        );

        for step in 1..=total_steps {
            let now = step as f32 * dt;
            self.move_players(dt);
            self.world.step(dt);
            let stats = self.director.advance(now, &mut self.world);
            if stats.dispatched > 0 {
                debug!(now, ?stats, "timers dispatched");
            }

            for event in self.director.drain_events() {
                summary.record(&event);
            }
            summary.peak_population = summary
                .peak_population
                .max(self.director.population().len());
            summary.steps = step;

            if step % log_every == 0 {
                info!(
                    "t={now:.0}s population={} spawned={} attacks={}",
                    self.director.population().len(),
                    summary.spawned,
                    summary.attacks
                );
            }
        }

        self.director.end(&mut self.world);
        for event in self.director.drain_events() {
            summary.record(&event);
        }

        summary.duration_secs = summary.steps as f32 * dt;
        summary.players_killed = self
            .players
            .iter()
            .filter(|(id, _)| self.world.is_destroyed(*id))
            .count();

        info!(
            "session finished: {} spawned, peak {}, {} players killed",
            summary.spawned, summary.peak_population, summary.players_killed
        );
        summary
    }

    fn move_players(&mut self, dt: f32) {
        for (id, script) in &self.players {
            if script.velocity == horde_common::Vec3::ZERO || self.world.is_destroyed(*id) {
                continue;
            }
            if let Some(position) = self.world.position(*id) {
                self.world.place(*id, position + script.velocity * dt);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WallConfig;
    use horde_common::Vec3;

    fn short_config(duration: f32) -> SimConfig {
        let mut config = SimConfig {
            duration_secs: duration,
            ..SimConfig::default()
        };
        config.validate();
        config
    }

    #[test]
    fn test_session_spawns_and_tears_down() {
        let summary = Session::new(short_config(60.0)).run();

        assert_eq!(summary.steps, 600);
        assert!(summary.spawned >= 5);
        assert!(summary.peak_population <= 40);
        // Everything spawned is gone by the end
        assert_eq!(
            summary.spawned,
            summary.despawned_out_of_range + summary.purged + summary.cleared_at_end
        );
    }

    #[test]
    fn test_session_is_deterministic_for_seed() {
        let a = Session::new(short_config(40.0)).run();
        let b = Session::new(short_config(40.0)).run();
        assert_eq!(a.spawned, b.spawned);
        assert_eq!(a.peak_population, b.peak_population);
    }

    #[test]
    fn test_no_players_no_horde() {
        let mut config = short_config(60.0);
        config.players.clear();
        let summary = Session::new(config).run();
        assert_eq!(summary.spawned, 0);
        assert_eq!(summary.peak_population, 0);
    }

    #[test]
    fn test_walled_in_player_is_never_spawned_on() {
        let mut config = short_config(30.0);
        config.players = vec![PlayerScript::default()];
        config.water.clear();
        // Buildings cover the entire spawn ring
        config.walls = vec![WallConfig {
            min: Vec3::new(-200.0, 0.0, -200.0),
            max: Vec3::new(200.0, 8.0, 200.0),
        }];
        let summary = Session::new(config).run();
        assert_eq!(summary.spawned, 0);
    }

    #[test]
    fn test_summary_serializes() {
        let mut summary = SessionSummary::default();
        summary.record(&HordeEvent::Sound {
            agent: EntityId::from_raw(1),
            cue: horde_ai::SoundCue::Alert,
        });
        summary.record(&HordeEvent::Animation {
            agent: EntityId::from_raw(1),
            cue: horde_ai::AnimationCue::Attack,
        });
        let json = serde_json::to_string(&summary).expect("serialize");
        assert!(json.contains("SOUND_ZOMBIE_ALERT"));
        assert!(json.contains("ZombieAttack"));
    }
}
