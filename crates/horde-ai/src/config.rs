//! Horde configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ambient::AmbientConfig;
use crate::behavior::ZombieTuning;
use crate::damage::{DamageProfile, MovementProfile};
use crate::population::PopulationConfig;

/// All horde settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HordeConfig {
    /// Spawn and despawn rules
    pub population: PopulationConfig,
    /// Per-agent behavior tunables
    pub zombie: ZombieTuning,
    /// Agent health and damage scaling
    pub damage: DamageProfile,
    /// Agent gait speeds
    pub movement: MovementProfile,
    /// Ambient sounds
    pub ambient: AmbientConfig,
}

impl HordeConfig {
    /// Validate and clamp every section.
    pub fn validate(&mut self) {
        self.population.validate();
        self.zombie.validate();
        self.damage.validate();
        self.movement.validate();
        self.ambient.validate();

        if self.zombie.chase_speed < self.zombie.wander_speed {
            warn!(
                "chase speed {} below wander speed {}, raising",
                self.zombie.chase_speed, self.zombie.wander_speed
            );
            self.zombie.chase_speed = self.zombie.wander_speed;
        }
    }
}
