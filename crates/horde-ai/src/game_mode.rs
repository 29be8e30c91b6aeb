//! Game-mode director.
//!
//! Owns the call queue, event bus and population for one session and
//! dispatches due timers against the host world.

use tracing::{info, warn};

use crate::config::HordeConfig;
use crate::events::{EventBus, HordeEvent};
use crate::host::HordeHost;
use crate::population::PopulationManager;
use crate::scheduler::{CallQueue, TimerHandle, TimerTask};

/// Counters for one [`HordeDirector::advance`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvanceStats {
    /// Timers dispatched
    pub dispatched: u32,
    /// Agents spawned
    pub spawned: u32,
    /// Agents removed by management sweeps
    pub removed: u32,
}

/// Drives the horde for one game session.
#[derive(Debug)]
pub struct HordeDirector {
    config: HordeConfig,
    queue: CallQueue,
    events: EventBus,
    population: PopulationManager,
    spawn_timer: Option<TimerHandle>,
    manage_timer: Option<TimerHandle>,
}

impl HordeDirector {
    /// Creates a stopped director. The config is validated first.
    #[must_use]
    pub fn new(mut config: HordeConfig, seed: u64) -> Self {
        config.validate();
        let population = PopulationManager::new(&config, seed);
        Self {
            config,
            queue: CallQueue::new(),
            events: EventBus::default(),
            population,
            spawn_timer: None,
            manage_timer: None,
        }
    }

    /// Registers the spawn and management timers.
    pub fn start(&mut self) {
        if self.is_running() {
            warn!("horde director already running");
            return;
        }
        let population = &self.config.population;
        self.spawn_timer = Some(
            self.queue
                .schedule_repeating(TimerTask::SpawnWave, population.spawn_interval),
        );
        self.manage_timer = Some(
            self.queue
                .schedule_repeating(TimerTask::ManagePopulation, population.management_interval),
        );
        info!(
            "horde director started (spawn every {}s, sweep every {}s)",
            population.spawn_interval, population.management_interval
        );
    }

    /// Dispatches every timer due at or before `now`.
    pub fn advance<H: HordeHost + ?Sized>(&mut self, now: f32, host: &mut H) -> AdvanceStats {
        let mut stats = AdvanceStats::default();

        while let Some(task) = self.queue.pop_due(now) {
            stats.dispatched += 1;
            match task {
                TimerTask::SpawnWave => {
                    let report =
                        self.population
                            .spawn_tick(now, host, &mut self.queue, &self.events);
                    stats.spawned += report.spawned.len() as u32;
                },
                TimerTask::ManagePopulation => {
                    let report =
                        self.population
                            .management_tick(host, &mut self.queue, &self.events);
                    stats.removed += (report.purged.len() + report.despawned.len()) as u32;
                },
                TimerTask::AgentThink(agent) => {
                    self.population.think(agent, now, host, &self.events);
                },
                TimerTask::AgentVoice(agent) => {
                    self.population
                        .voice(agent, &*host, &mut self.queue, &self.events);
                },
            }
        }

        stats
    }

    /// Cancels the manager timers and destroys every agent.
    pub fn end<H: HordeHost + ?Sized>(&mut self, host: &mut H) {
        if !self.is_running() {
            return;
        }
        if let Some(handle) = self.spawn_timer.take() {
            self.queue.cancel(handle);
        }
        if let Some(handle) = self.manage_timer.take() {
            self.queue.cancel(handle);
        }
        let cleared = self
            .population
            .clear_all(host, &mut self.queue, &self.events);
        info!("horde director stopped, {cleared} agents cleared");
    }

    /// Returns whether the director has been started and not ended.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.spawn_timer.is_some()
    }

    /// Drains pending horde events.
    pub fn drain_events(&self) -> Vec<HordeEvent> {
        self.events.drain()
    }

    /// Event bus the horde publishes on.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Agent population.
    #[must_use]
    pub const fn population(&self) -> &PopulationManager {
        &self.population
    }

    /// Timer queue.
    #[must_use]
    pub const fn queue(&self) -> &CallQueue {
        &self.queue
    }

    /// Validated configuration.
    #[must_use]
    pub const fn config(&self) -> &HordeConfig {
        &self.config
    }
}
