//! Event bus carrying horde feedback to the host.
//!
//! Audio, animation and UI layers live outside the core. They drain this bus
//! once per frame and turn events into sounds, clips and hints.

use crossbeam_channel::{bounded, Receiver, Sender};
use horde_common::{EntityId, Vec3};
use serde::{Deserialize, Serialize};

/// Sound cues an agent can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundCue {
    /// Ambient groan
    Idle,
    /// Spotted a target
    Alert,
    /// Swing/bite
    Attack,
    /// Killed
    Death,
}

impl SoundCue {
    /// Host sound event name.
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            SoundCue::Idle => "SOUND_ZOMBIE_IDLE",
            SoundCue::Alert => "SOUND_ZOMBIE_ALERT",
            SoundCue::Attack => "SOUND_ZOMBIE_ATTACK",
            SoundCue::Death => "SOUND_ZOMBIE_DEATH",
        }
    }
}

/// Animation clips an agent can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimationCue {
    /// Melee swing
    Attack,
}

impl AnimationCue {
    /// Host animation clip name.
    #[must_use]
    pub const fn clip_name(self) -> &'static str {
        match self {
            AnimationCue::Attack => "ZombieAttack",
        }
    }
}

/// Why an agent left the population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DespawnReason {
    /// No player within despawn distance
    OutOfRange,
    /// Host no longer knows the entity, or it was destroyed
    Invalid,
    /// Game mode teardown
    Teardown,
}

/// Events emitted by the horde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HordeEvent {
    /// Agent materialized and registered
    AgentSpawned {
        /// Agent entity
        agent: EntityId,
        /// Spawn point
        position: Vec3,
        /// Player the spawn was triggered by
        target_hint: EntityId,
    },
    /// Agent removed from the population
    AgentDespawned {
        /// Agent entity
        agent: EntityId,
        /// Removal cause
        reason: DespawnReason,
    },
    /// Agent switched from wandering to chasing
    TargetAcquired {
        /// Agent entity
        agent: EntityId,
        /// Chased player
        target: EntityId,
    },
    /// Agent lost sight of its target and is heading to the last known spot
    SightLost {
        /// Agent entity
        agent: EntityId,
        /// Chased player
        target: EntityId,
        /// Where the target was last seen
        last_known: Vec3,
    },
    /// Agent gave up on its target
    TargetAbandoned {
        /// Agent entity
        agent: EntityId,
        /// Former target
        target: EntityId,
    },
    /// Agent landed an attack
    AttackLanded {
        /// Attacking agent
        agent: EntityId,
        /// Victim
        target: EntityId,
        /// Damage requested from the host
        damage: f32,
    },
    /// Agent plays a sound
    Sound {
        /// Emitting agent
        agent: EntityId,
        /// Cue to play
        cue: SoundCue,
    },
    /// Agent plays an animation
    Animation {
        /// Animated agent
        agent: EntityId,
        /// Clip to play
        cue: AnimationCue,
    },
}

impl HordeEvent {
    /// Agent this event concerns.
    #[must_use]
    pub fn agent(&self) -> EntityId {
        match self {
            HordeEvent::AgentSpawned { agent, .. }
            | HordeEvent::AgentDespawned { agent, .. }
            | HordeEvent::TargetAcquired { agent, .. }
            | HordeEvent::SightLost { agent, .. }
            | HordeEvent::TargetAbandoned { agent, .. }
            | HordeEvent::AttackLanded { agent, .. }
            | HordeEvent::Sound { agent, .. }
            | HordeEvent::Animation { agent, .. } => *agent,
        }
    }
}

/// Event bus for broadcasting horde events to the host.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<HordeEvent>,
    /// Receiver for collecting events
    receiver: Receiver<HordeEvent>,
    /// Channel capacity
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            capacity: capacity.max(1),
        }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: HordeEvent) {
        // Non-blocking send - if full, event is dropped
        if self.sender.try_send(event).is_err() {
            tracing::trace!("event bus full, dropping event");
        }
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<HordeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
