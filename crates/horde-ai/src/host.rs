//! Interfaces to the host world.
//!
//! The core never owns players, terrain or entity lifecycles. Everything it
//! needs from the surrounding simulation goes through these traits, which the
//! host implements once for its world.

use horde_common::{EntityId, HostResult, Vec3};
use serde::{Deserialize, Serialize};
use std::ops::BitOr;

use crate::damage::{DamageProfile, DamageType, MovementProfile};

/// Physics layers a trace collides with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerMask(pub u32);

impl LayerMask {
    /// Nothing.
    pub const NONE: Self = LayerMask(0);
    /// Heightfield terrain.
    pub const TERRAIN: Self = LayerMask(1);
    /// Building shells and interiors.
    pub const BUILDINGS: Self = LayerMask(1 << 1);
    /// Other static props (walls, rocks, fences).
    pub const STATIC: Self = LayerMask(1 << 2);

    /// Returns whether any layer of `other` is in this mask.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for LayerMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        LayerMask(self.0 | rhs.0)
    }
}

/// What kinds of colliders a trace considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceFlags(pub u8);

impl TraceFlags {
    /// Static world geometry.
    pub const WORLD: Self = TraceFlags(1);
    /// Placed entities (building instances, props).
    pub const ENTITIES: Self = TraceFlags(1 << 1);

    /// Returns whether all flags of `other` are set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for TraceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        TraceFlags(self.0 | rhs.0)
    }
}

/// A segment query against world geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceRequest {
    /// Segment start
    pub start: Vec3,
    /// Segment end
    pub end: Vec3,
    /// Layers to collide with
    pub layers: LayerMask,
    /// Collider kinds to consider
    pub flags: TraceFlags,
}

impl TraceRequest {
    /// Creates a world-only trace.
    #[must_use]
    pub const fn new(start: Vec3, end: Vec3, layers: LayerMask) -> Self {
        Self {
            start,
            end,
            layers,
            flags: TraceFlags::WORLD,
        }
    }

    /// Sets the collider kinds.
    #[must_use]
    pub const fn with_flags(mut self, flags: TraceFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// First intersection along a trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceHit {
    /// Fraction of the segment travelled before the hit (0.0-1.0)
    pub fraction: f32,
    /// World-space hit point
    pub point: Vec3,
    /// Surface normal at the hit
    pub normal: Vec3,
}

/// Navigation intent for an agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NavGoal {
    /// Walk to a fixed point
    Position(Vec3),
    /// Follow an entity
    Entity(EntityId),
}

/// Capabilities of a host entity, resolved once when a brain is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentCapabilities {
    /// Entity has a navigation driver
    pub navigation: bool,
    /// Entity has a damage manager
    pub damage: bool,
}

impl AgentCapabilities {
    /// Every capability present.
    pub const FULL: Self = Self {
        navigation: true,
        damage: true,
    };
}

/// Reference to the prefab an agent is spawned from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrefabRef(pub String);

impl Default for PrefabRef {
    fn default() -> Self {
        PrefabRef("Prefabs/Characters/Zombie.et".to_string())
    }
}

/// World geometry and terrain queries.
pub trait SpatialQuery {
    /// Casts a segment and returns the first hit, if any.
    fn trace(&self, request: &TraceRequest) -> Option<TraceHit>;
    /// Water depth at a point (0.0 when dry).
    fn water_depth(&self, at: Vec3) -> f32;
}

/// Human-controlled entities currently in the session.
pub trait PlayerDirectory {
    /// Returns the live player entities.
    fn live_players(&self) -> Vec<EntityId>;
}

/// Identity-based entity lookups.
pub trait EntityQuery {
    /// Gets entity position, `None` if the entity no longer exists.
    fn position(&self, entity: EntityId) -> Option<Vec3>;
    /// Returns whether the entity's damage state is destroyed.
    fn is_destroyed(&self, entity: EntityId) -> bool;
    /// Returns which capabilities the entity carries.
    fn capabilities(&self, entity: EntityId) -> AgentCapabilities;
}

/// Damage side effects.
pub trait Damageable {
    /// Applies damage to `target` on behalf of `instigator`.
    fn apply_damage(
        &mut self,
        target: EntityId,
        amount: f32,
        damage_type: DamageType,
        instigator: EntityId,
    ) -> HostResult<()>;
    /// Installs a damage profile on an entity.
    fn configure_damage(&mut self, entity: EntityId, profile: &DamageProfile) -> HostResult<()>;
}

/// Navigation driver.
pub trait Navigation {
    /// Sets the agent's navigation goal.
    fn steer_to(&mut self, agent: EntityId, goal: NavGoal) -> HostResult<()>;
    /// Returns whether the agent has no active navigation goal.
    fn is_idle(&self, agent: EntityId) -> bool;
    /// Caps the agent's movement speed.
    fn set_max_speed(&mut self, agent: EntityId, speed: f32) -> HostResult<()>;
    /// Installs walk/run/sprint speeds and turn rate.
    fn configure_movement(&mut self, agent: EntityId, profile: &MovementProfile) -> HostResult<()>;
}

/// Entity creation and destruction.
pub trait EntityLifecycle {
    /// Materializes a prefab at `position`.
    fn spawn_entity(
        &mut self,
        prefab: &PrefabRef,
        position: Vec3,
        target_hint: Option<EntityId>,
    ) -> HostResult<EntityId>;
    /// Destroys an entity and its children.
    fn destroy_entity(&mut self, entity: EntityId);
}

/// Everything the horde needs from its host.
pub trait HordeHost:
    SpatialQuery + PlayerDirectory + EntityQuery + Damageable + Navigation + EntityLifecycle
{
}

impl<T> HordeHost for T where
    T: SpatialQuery + PlayerDirectory + EntityQuery + Damageable + Navigation + EntityLifecycle
{
}
