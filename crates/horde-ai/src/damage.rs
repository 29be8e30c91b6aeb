//! Damage and movement profiles installed on freshly spawned agents.
//!
//! Agents shrug off part of ballistic and blast damage but take double
//! damage to the head. They also move and turn slower than a soldier.

use serde::{Deserialize, Serialize};

/// Types of damage the host applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageType {
    /// Bites and claws
    Melee,
    /// Firearms
    Bullet,
    /// Grenades, charges
    Explosion,
    /// Infection and disease
    Biological,
    /// Falls, fire, anything else
    Generic,
}

/// Body region a hit lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BodyPart {
    /// Skull; takes the headshot multiplier
    Head,
    /// Center mass
    #[default]
    Torso,
    /// Arms and legs
    Limb,
}

/// Health and per-type damage scaling for an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageProfile {
    /// Starting and maximum health
    pub max_health: f32,
    /// Multiplier applied to bullet damage
    pub bullet_multiplier: f32,
    /// Multiplier applied to explosion damage
    pub explosion_multiplier: f32,
    /// Multiplier applied to hits on the head
    pub headshot_multiplier: f32,
}

impl Default for DamageProfile {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            bullet_multiplier: 0.5,
            explosion_multiplier: 0.7,
            headshot_multiplier: 2.0,
        }
    }
}

impl DamageProfile {
    /// Multiplier for a damage type.
    #[must_use]
    pub fn type_multiplier(&self, damage_type: DamageType) -> f32 {
        match damage_type {
            DamageType::Bullet => self.bullet_multiplier,
            DamageType::Explosion => self.explosion_multiplier,
            DamageType::Melee | DamageType::Biological | DamageType::Generic => 1.0,
        }
    }

    /// Damage actually taken from a raw hit.
    #[must_use]
    pub fn scaled(&self, amount: f32, damage_type: DamageType, part: BodyPart) -> f32 {
        let part_multiplier = match part {
            BodyPart::Head => self.headshot_multiplier,
            BodyPart::Torso | BodyPart::Limb => 1.0,
        };
        (amount * self.type_multiplier(damage_type) * part_multiplier).max(0.0)
    }

    /// Clamp values to sensible ranges.
    pub fn validate(&mut self) {
        self.max_health = self.max_health.max(1.0);
        self.bullet_multiplier = self.bullet_multiplier.clamp(0.0, 10.0);
        self.explosion_multiplier = self.explosion_multiplier.clamp(0.0, 10.0);
        self.headshot_multiplier = self.headshot_multiplier.clamp(0.0, 10.0);
    }
}

/// Character controller speeds for a shambling gait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementProfile {
    /// Walk speed (m/s)
    pub walk_speed: f32,
    /// Run speed (m/s)
    pub run_speed: f32,
    /// Sprint speed (m/s)
    pub sprint_speed: f32,
    /// Turn rate (deg/s)
    pub turn_speed: f32,
}

impl Default for MovementProfile {
    fn default() -> Self {
        Self {
            walk_speed: 1.8,
            run_speed: 3.5,
            sprint_speed: 4.5,
            turn_speed: 100.0,
        }
    }
}

impl MovementProfile {
    /// Clamp values to sensible ranges.
    pub fn validate(&mut self) {
        self.walk_speed = self.walk_speed.max(0.0);
        self.run_speed = self.run_speed.max(self.walk_speed);
        self.sprint_speed = self.sprint_speed.max(self.run_speed);
        self.turn_speed = self.turn_speed.clamp(1.0, 1000.0);
    }
}
