//! Agent materialization.
//!
//! Turns a validated spawn point into a live agent: host entity, damage and
//! movement setup, an activated brain and the timers that drive it.

use horde_common::{EntityId, HostResult, Vec3};
use tracing::{debug, warn};

use crate::ambient::AmbientVoice;
use crate::behavior::{ZombieBrain, ZombieTuning};
use crate::config::HordeConfig;
use crate::damage::{DamageProfile, MovementProfile};
use crate::events::SoundCue;
use crate::host::{HordeHost, PrefabRef};
use crate::scheduler::{CallQueue, TimerHandle, TimerTask};

/// Everything the population keeps per live agent.
///
/// Owns the agent's timer handles; dropping a slot without handing them back
/// to [`CallQueue::cancel`] leaves the timers running.
#[derive(Debug)]
pub struct AgentSlot {
    brain: ZombieBrain,
    think: TimerHandle,
    voice: Option<TimerHandle>,
}

impl AgentSlot {
    /// Behavior state machine.
    #[must_use]
    pub const fn brain(&self) -> &ZombieBrain {
        &self.brain
    }

    /// Mutable behavior state machine.
    pub fn brain_mut(&mut self) -> &mut ZombieBrain {
        &mut self.brain
    }

    /// Returns whether an ambient sound is scheduled.
    #[must_use]
    pub const fn has_voice(&self) -> bool {
        self.voice.is_some()
    }

    /// Swaps in the next ambient sound timer.
    pub fn replace_voice(&mut self, queue: &mut CallQueue, next: Option<TimerHandle>) {
        if let Some(old) = std::mem::replace(&mut self.voice, next) {
            queue.cancel(old);
        }
    }

    /// Stops the brain and cancels every timer the slot owns.
    pub fn retire(mut self, queue: &mut CallQueue) -> ZombieBrain {
        self.brain.deactivate();
        queue.cancel(self.think);
        if let Some(voice) = self.voice {
            queue.cancel(voice);
        }
        self.brain
    }
}

/// Builds agents from the horde configuration.
#[derive(Debug)]
pub struct AgentFactory {
    prefab: PrefabRef,
    tuning: ZombieTuning,
    damage: DamageProfile,
    movement: MovementProfile,
    think_interval: f32,
    voice: AmbientVoice,
    rng: fastrand::Rng,
}

impl AgentFactory {
    /// Creates a factory from validated configuration.
    #[must_use]
    pub fn new(config: &HordeConfig, seed: u64) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed);
        let voice = AmbientVoice::new(config.ambient.clone(), rng.u64(..));
        Self {
            prefab: config.population.prefab.clone(),
            tuning: config.zombie.clone(),
            damage: config.damage.clone(),
            movement: config.movement.clone(),
            think_interval: config.population.think_interval,
            voice,
            rng,
        }
    }

    /// Spawns an agent at `position` and wires up its brain and timers.
    ///
    /// Only the spawn itself can fail. Missing capabilities or refused
    /// profile setup leave a degraded but registered agent.
    pub fn materialize<H: HordeHost + ?Sized>(
        &mut self,
        host: &mut H,
        queue: &mut CallQueue,
        position: Vec3,
        target_hint: Option<EntityId>,
        now: f32,
    ) -> HostResult<AgentSlot> {
        let agent = host.spawn_entity(&self.prefab, position, target_hint)?;
        let capabilities = host.capabilities(agent);

        if capabilities.damage {
            if let Err(e) = host.configure_damage(agent, &self.damage) {
                warn!(%agent, "damage profile not applied: {e}");
            }
        } else {
            warn!(%agent, "spawned without damage handling");
        }

        if capabilities.navigation {
            if let Err(e) = host.configure_movement(agent, &self.movement) {
                warn!(%agent, "movement profile not applied: {e}");
            }
        } else {
            warn!(%agent, "spawned without navigation, agent will idle");
        }

        let mut brain = ZombieBrain::new(agent, self.tuning.clone(), capabilities, self.rng.u64(..));
        if let Some(hint) = target_hint {
            brain = brain.with_initial_target(hint);
        }
        brain.activate(host, now);

        let think = queue.schedule_repeating(TimerTask::AgentThink(agent), self.think_interval);
        let voice = self.schedule_voice(queue, agent, true);

        debug!(%agent, ?position, "agent materialized");

        Ok(AgentSlot {
            brain,
            think,
            voice,
        })
    }

    /// Schedules the agent's next ambient sound.
    pub fn schedule_voice(
        &mut self,
        queue: &mut CallQueue,
        agent: EntityId,
        first: bool,
    ) -> Option<TimerHandle> {
        let delay = if first {
            self.voice.first_delay()
        } else {
            self.voice.next_delay()
        }?;
        Some(queue.schedule_once(TimerTask::AgentVoice(agent), delay))
    }

    /// Picks an ambient cue.
    pub fn pick_cue(&mut self) -> SoundCue {
        self.voice.pick_cue()
    }
}
