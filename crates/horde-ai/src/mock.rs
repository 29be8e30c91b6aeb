//! In-memory host world.
//!
//! [`SandboxWorld`] implements every host trait over a flat ground plane with
//! optional holes, water, slopes and box obstacles. Tests use it directly and
//! the headless simulator drives whole sessions on it.

use std::collections::BTreeMap;

use horde_common::{horizontal_distance, EntityId, HostError, HostResult, Vec3};

use crate::damage::{BodyPart, DamageProfile, DamageType, MovementProfile};
use crate::host::{
    AgentCapabilities, Damageable, EntityLifecycle, EntityQuery, LayerMask, NavGoal, Navigation,
    PlayerDirectory, PrefabRef, SpatialQuery, TraceFlags, TraceHit, TraceRequest,
};

/// Health of bodies without a damage profile.
pub const DEFAULT_HEALTH: f32 = 100.0;
/// Distance at which a point goal counts as reached.
pub const NAV_ARRIVAL: f32 = 0.5;
/// Distance an agent keeps from an entity it follows.
pub const FOLLOW_DISTANCE: f32 = 1.0;

/// One damage application seen by the world.
#[derive(Debug, Clone, PartialEq)]
pub struct DamageRecord {
    /// Entity hit
    pub target: EntityId,
    /// Requested damage before scaling
    pub amount: f32,
    /// Damage type
    pub damage_type: DamageType,
    /// Entity that dealt it
    pub instigator: EntityId,
}

#[derive(Debug, Clone, Copy)]
struct Circle {
    center: Vec3,
    radius: f32,
    value: f32,
}

impl Circle {
    fn contains(&self, at: Vec3) -> bool {
        horizontal_distance(self.center, at) <= self.radius
    }
}

#[derive(Debug, Clone, Copy)]
struct Obstacle {
    min: Vec3,
    max: Vec3,
    layer: LayerMask,
    kind: TraceFlags,
}

#[derive(Debug, Clone)]
struct Body {
    position: Vec3,
    health: f32,
    destroyed: bool,
    player: bool,
    capabilities: AgentCapabilities,
    nav_goal: Option<NavGoal>,
    max_speed: Option<f32>,
    damage_profile: Option<DamageProfile>,
    movement: Option<MovementProfile>,
    target_hint: Option<EntityId>,
}

impl Body {
    fn new(position: Vec3, player: bool, capabilities: AgentCapabilities) -> Self {
        Self {
            position,
            health: DEFAULT_HEALTH,
            destroyed: false,
            player,
            capabilities,
            nav_goal: None,
            max_speed: None,
            damage_profile: None,
            movement: None,
            target_hint: None,
        }
    }
}

/// Sandbox host world.
#[derive(Debug)]
pub struct SandboxWorld {
    ground_level: f32,
    holes: Vec<Circle>,
    water: Vec<Circle>,
    slopes: Vec<Circle>,
    obstacles: Vec<Obstacle>,
    bodies: BTreeMap<EntityId, Body>,
    spawn_capabilities: AgentCapabilities,
    fail_spawns: bool,
    damage_log: Vec<DamageRecord>,
    destroyed: Vec<EntityId>,
}

impl Default for SandboxWorld {
    fn default() -> Self {
        Self {
            ground_level: 0.0,
            holes: Vec::new(),
            water: Vec::new(),
            slopes: Vec::new(),
            obstacles: Vec::new(),
            bodies: BTreeMap::new(),
            spawn_capabilities: AgentCapabilities::FULL,
            fail_spawns: false,
            damage_log: Vec::new(),
            destroyed: Vec::new(),
        }
    }
}

impl SandboxWorld {
    /// Creates an empty world with flat ground at y = 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the ground plane.
    pub fn set_ground_level(&mut self, y: f32) {
        self.ground_level = y;
    }

    /// Removes terrain within `radius` of `center`.
    pub fn add_hole(&mut self, center: Vec3, radius: f32) {
        self.holes.push(Circle {
            center,
            radius,
            value: 0.0,
        });
    }

    /// Floods a circle with water `depth` deep.
    pub fn add_water(&mut self, center: Vec3, radius: f32, depth: f32) {
        self.water.push(Circle {
            center,
            radius,
            value: depth,
        });
    }

    /// Tilts the terrain normal in a circle so that its Y equals `normal_y`.
    pub fn add_slope(&mut self, center: Vec3, radius: f32, normal_y: f32) {
        self.slopes.push(Circle {
            center,
            radius,
            value: normal_y.clamp(0.0, 1.0),
        });
    }

    /// Adds a building-layer box baked into world geometry. Blocks sight and spawns.
    pub fn add_wall(&mut self, min: Vec3, max: Vec3) {
        self.add_obstacle(min, max, LayerMask::BUILDINGS, TraceFlags::WORLD);
    }

    /// Adds a placed building instance. Only traces that include
    /// [`TraceFlags::ENTITIES`] see it.
    pub fn add_building_entity(&mut self, min: Vec3, max: Vec3) {
        self.add_obstacle(min, max, LayerMask::BUILDINGS, TraceFlags::ENTITIES);
    }

    /// Adds a static-prop box. Ignored by sight and spawn checks.
    pub fn add_prop(&mut self, min: Vec3, max: Vec3) {
        self.add_obstacle(min, max, LayerMask::STATIC, TraceFlags::WORLD);
    }

    fn add_obstacle(&mut self, min: Vec3, max: Vec3, layer: LayerMask, kind: TraceFlags) {
        self.obstacles.push(Obstacle {
            min: min.min(max),
            max: min.max(max),
            layer,
            kind,
        });
    }

    /// Removes every wall and prop.
    pub fn clear_obstacles(&mut self) {
        self.obstacles.clear();
    }

    /// Adds a live player.
    pub fn add_player(&mut self, position: Vec3) -> EntityId {
        let id = EntityId::new();
        let caps = AgentCapabilities {
            navigation: false,
            damage: true,
        };
        self.bodies.insert(id, Body::new(position, true, caps));
        id
    }

    /// Adds an agent body with every capability, bypassing spawn rules.
    pub fn add_agent(&mut self, position: Vec3) -> EntityId {
        let id = EntityId::new();
        self.bodies
            .insert(id, Body::new(position, false, AgentCapabilities::FULL));
        id
    }

    /// Marks an entity destroyed without removing it.
    pub fn kill(&mut self, entity: EntityId) {
        if let Some(body) = self.bodies.get_mut(&entity) {
            body.destroyed = true;
            body.health = 0.0;
        }
    }

    /// Removes an entity outright, as if deleted behind the horde's back.
    pub fn remove(&mut self, entity: EntityId) {
        self.bodies.remove(&entity);
    }

    /// Teleports an entity.
    pub fn place(&mut self, entity: EntityId, position: Vec3) {
        if let Some(body) = self.bodies.get_mut(&entity) {
            body.position = position;
        }
    }

    /// Toggles whether an entity can take damage.
    pub fn set_damageable(&mut self, entity: EntityId, damageable: bool) {
        if let Some(body) = self.bodies.get_mut(&entity) {
            body.capabilities.damage = damageable;
        }
    }

    /// Capabilities given to spawned entities.
    pub fn set_spawn_capabilities(&mut self, capabilities: AgentCapabilities) {
        self.spawn_capabilities = capabilities;
    }

    /// Makes every spawn request fail.
    pub fn set_fail_spawns(&mut self, fail: bool) {
        self.fail_spawns = fail;
    }

    /// Clears an agent's navigation goal.
    pub fn stop(&mut self, entity: EntityId) {
        if let Some(body) = self.bodies.get_mut(&entity) {
            body.nav_goal = None;
        }
    }

    /// Current navigation goal.
    #[must_use]
    pub fn nav_goal(&self, entity: EntityId) -> Option<NavGoal> {
        self.bodies.get(&entity).and_then(|b| b.nav_goal)
    }

    /// Speed cap last set on an entity.
    #[must_use]
    pub fn max_speed(&self, entity: EntityId) -> Option<f32> {
        self.bodies.get(&entity).and_then(|b| b.max_speed)
    }

    /// Remaining health.
    #[must_use]
    pub fn health(&self, entity: EntityId) -> Option<f32> {
        self.bodies.get(&entity).map(|b| b.health)
    }

    /// Damage profile installed on an entity.
    #[must_use]
    pub fn damage_profile(&self, entity: EntityId) -> Option<&DamageProfile> {
        self.bodies.get(&entity).and_then(|b| b.damage_profile.as_ref())
    }

    /// Movement profile installed on an entity.
    #[must_use]
    pub fn movement_profile(&self, entity: EntityId) -> Option<&MovementProfile> {
        self.bodies.get(&entity).and_then(|b| b.movement.as_ref())
    }

    /// Target hint an entity was spawned with.
    #[must_use]
    pub fn target_hint(&self, entity: EntityId) -> Option<EntityId> {
        self.bodies.get(&entity).and_then(|b| b.target_hint)
    }

    /// Returns whether the entity exists.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.bodies.contains_key(&entity)
    }

    /// Non-player entities, ordered by ID.
    #[must_use]
    pub fn agents(&self) -> Vec<EntityId> {
        self.bodies
            .iter()
            .filter(|(_, b)| !b.player)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Every damage application so far.
    #[must_use]
    pub fn damage_log(&self) -> &[DamageRecord] {
        &self.damage_log
    }

    /// Entities destroyed through [`EntityLifecycle::destroy_entity`].
    #[must_use]
    pub fn destroyed_entities(&self) -> &[EntityId] {
        &self.destroyed
    }

    /// Moves agents toward their navigation goals for `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        let positions: BTreeMap<EntityId, Vec3> =
            self.bodies.iter().map(|(id, b)| (*id, b.position)).collect();
        let walk = MovementProfile::default().walk_speed;

        for body in self.bodies.values_mut() {
            if body.destroyed {
                continue;
            }
            let (goal, stop_at) = match body.nav_goal {
                Some(NavGoal::Position(p)) => (p, NAV_ARRIVAL),
                Some(NavGoal::Entity(id)) => match positions.get(&id) {
                    Some(&p) => (p, FOLLOW_DISTANCE),
                    None => {
                        body.nav_goal = None;
                        continue;
                    },
                },
                None => continue,
            };

            let mut offset = goal - body.position;
            offset.y = 0.0;
            let dist = offset.length();
            if dist <= stop_at {
                if matches!(body.nav_goal, Some(NavGoal::Position(_))) {
                    body.nav_goal = None;
                }
                continue;
            }

            let speed = body.max_speed.unwrap_or(walk);
            let travel = (speed * dt).min(dist - stop_at);
            body.position += offset / dist * travel;
        }
    }

    fn terrain_normal(&self, at: Vec3) -> Vec3 {
        match self.slopes.iter().find(|s| s.contains(at)) {
            // Kept unnormalized so the Y component is exact
            Some(slope) => Vec3::new((1.0 - slope.value * slope.value).sqrt(), slope.value, 0.0),
            None => Vec3::Y,
        }
    }

    fn trace_terrain(&self, request: &TraceRequest) -> Option<TraceHit> {
        let g = self.ground_level;
        let (sy, ey) = (request.start.y, request.end.y);
        if (sy - g) * (ey - g) > 0.0 || sy == ey {
            return None;
        }

        let fraction = (sy - g) / (sy - ey);
        let mut point = request.start.lerp(request.end, fraction);
        point.y = g;
        if self.holes.iter().any(|h| h.contains(point)) {
            return None;
        }

        Some(TraceHit {
            fraction,
            point,
            normal: self.terrain_normal(point),
        })
    }

    fn trace_box(request: &TraceRequest, obstacle: &Obstacle) -> Option<TraceHit> {
        let start = request.start;
        let dir = request.end - start;
        let mut t_min = 0.0f32;
        let mut t_max = 1.0f32;
        let mut normal = Vec3::ZERO;

        for axis in 0..3 {
            let s = start[axis];
            let d = dir[axis];
            let (lo, hi) = (obstacle.min[axis], obstacle.max[axis]);

            if d.abs() < f32::EPSILON {
                if s < lo || s > hi {
                    return None;
                }
                continue;
            }

            let mut t1 = (lo - s) / d;
            let mut t2 = (hi - s) / d;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            if t1 > t_min {
                t_min = t1;
                normal = Vec3::ZERO;
                normal[axis] = -d.signum();
            }
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }

        Some(TraceHit {
            fraction: t_min,
            point: start + dir * t_min,
            normal,
        })
    }
}

impl SpatialQuery for SandboxWorld {
    fn trace(&self, request: &TraceRequest) -> Option<TraceHit> {
        let mut best: Option<TraceHit> = None;
        let mut consider = |hit: Option<TraceHit>| {
            if let Some(hit) = hit {
                if best.map_or(true, |b| hit.fraction < b.fraction) {
                    best = Some(hit);
                }
            }
        };

        if request.layers.intersects(LayerMask::TERRAIN) && request.flags.contains(TraceFlags::WORLD) {
            consider(self.trace_terrain(request));
        }
        for obstacle in &self.obstacles {
            if request.layers.intersects(obstacle.layer) && request.flags.contains(obstacle.kind) {
                consider(Self::trace_box(request, obstacle));
            }
        }
        best
    }

    fn water_depth(&self, at: Vec3) -> f32 {
        self.water
            .iter()
            .filter(|w| w.contains(at))
            .map(|w| w.value)
            .fold(0.0, f32::max)
    }
}

impl PlayerDirectory for SandboxWorld {
    fn live_players(&self) -> Vec<EntityId> {
        self.bodies
            .iter()
            .filter(|(_, b)| b.player && !b.destroyed)
            .map(|(id, _)| *id)
            .collect()
    }
}

impl EntityQuery for SandboxWorld {
    fn position(&self, entity: EntityId) -> Option<Vec3> {
        self.bodies.get(&entity).map(|b| b.position)
    }

    fn is_destroyed(&self, entity: EntityId) -> bool {
        self.bodies.get(&entity).map_or(false, |b| b.destroyed)
    }

    fn capabilities(&self, entity: EntityId) -> AgentCapabilities {
        self.bodies
            .get(&entity)
            .map(|b| b.capabilities)
            .unwrap_or_default()
    }
}

impl Damageable for SandboxWorld {
    fn apply_damage(
        &mut self,
        target: EntityId,
        amount: f32,
        damage_type: DamageType,
        instigator: EntityId,
    ) -> HostResult<()> {
        let body = self
            .bodies
            .get_mut(&target)
            .ok_or(HostError::EntityNotFound(target))?;
        if !body.capabilities.damage {
            return Err(HostError::CapabilityMissing {
                entity: target,
                capability: "damage",
            });
        }

        self.damage_log.push(DamageRecord {
            target,
            amount,
            damage_type,
            instigator,
        });

        if body.destroyed {
            return Ok(());
        }
        let taken = match &body.damage_profile {
            Some(profile) => profile.scaled(amount, damage_type, BodyPart::Torso),
            None => amount.max(0.0),
        };
        body.health -= taken;
        if body.health <= 0.0 {
            body.health = 0.0;
            body.destroyed = true;
        }
        Ok(())
    }

    fn configure_damage(&mut self, entity: EntityId, profile: &DamageProfile) -> HostResult<()> {
        let body = self
            .bodies
            .get_mut(&entity)
            .ok_or(HostError::EntityNotFound(entity))?;
        if !body.capabilities.damage {
            return Err(HostError::CapabilityMissing {
                entity,
                capability: "damage",
            });
        }
        body.health = profile.max_health;
        body.damage_profile = Some(profile.clone());
        Ok(())
    }
}

impl SandboxWorld {
    fn navigable(&mut self, agent: EntityId) -> HostResult<&mut Body> {
        let body = self
            .bodies
            .get_mut(&agent)
            .ok_or(HostError::EntityNotFound(agent))?;
        if !body.capabilities.navigation {
            return Err(HostError::CapabilityMissing {
                entity: agent,
                capability: "navigation",
            });
        }
        Ok(body)
    }
}

impl Navigation for SandboxWorld {
    fn steer_to(&mut self, agent: EntityId, goal: NavGoal) -> HostResult<()> {
        self.navigable(agent)?.nav_goal = Some(goal);
        Ok(())
    }

    fn is_idle(&self, agent: EntityId) -> bool {
        self.bodies.get(&agent).map_or(true, |b| b.nav_goal.is_none())
    }

    fn set_max_speed(&mut self, agent: EntityId, speed: f32) -> HostResult<()> {
        self.navigable(agent)?.max_speed = Some(speed.max(0.0));
        Ok(())
    }

    fn configure_movement(&mut self, agent: EntityId, profile: &MovementProfile) -> HostResult<()> {
        self.navigable(agent)?.movement = Some(profile.clone());
        Ok(())
    }
}

impl EntityLifecycle for SandboxWorld {
    fn spawn_entity(
        &mut self,
        prefab: &PrefabRef,
        position: Vec3,
        target_hint: Option<EntityId>,
    ) -> HostResult<EntityId> {
        if self.fail_spawns {
            return Err(HostError::SpawnFailed(prefab.0.clone()));
        }
        let id = EntityId::new();
        let mut body = Body::new(position, false, self.spawn_capabilities);
        body.target_hint = target_hint;
        self.bodies.insert(id, body);
        Ok(id)
    }

    fn destroy_entity(&mut self, entity: EntityId) {
        if self.bodies.remove(&entity).is_some() {
            self.destroyed.push(entity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_starting_inside_box_hits_at_zero() {
        let mut world = SandboxWorld::new();
        world.add_wall(Vec3::splat(-1.0), Vec3::splat(1.0));
        let req = TraceRequest::new(Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0), LayerMask::BUILDINGS);
        let hit = world.trace(&req).expect("hit");
        assert_eq!(hit.fraction, 0.0);
    }

    #[test]
    fn test_trace_reports_nearest_obstacle() {
        let mut world = SandboxWorld::new();
        world.add_wall(Vec3::new(8.0, 0.0, -1.0), Vec3::new(9.0, 3.0, 1.0));
        world.add_wall(Vec3::new(4.0, 0.0, -1.0), Vec3::new(5.0, 3.0, 1.0));
        let req = TraceRequest::new(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(10.0, 1.0, 0.0),
            LayerMask::BUILDINGS,
        );
        let hit = world.trace(&req).expect("hit");
        assert!((hit.fraction - 0.4).abs() < 1e-5);
        assert_eq!(hit.normal, Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_trace_respects_layers() {
        let mut world = SandboxWorld::new();
        world.add_prop(Vec3::new(4.0, 0.0, -1.0), Vec3::new(5.0, 3.0, 1.0));
        let req = TraceRequest::new(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(10.0, 1.0, 0.0),
            LayerMask::BUILDINGS | LayerMask::TERRAIN,
        );
        assert!(world.trace(&req).is_none());
        let req = TraceRequest::new(req.start, req.end, LayerMask::STATIC);
        assert!(world.trace(&req).is_some());
    }

    #[test]
    fn test_trace_respects_flags() {
        let mut world = SandboxWorld::new();
        world.add_building_entity(Vec3::new(4.0, 0.0, -1.0), Vec3::new(5.0, 3.0, 1.0));
        let req = TraceRequest::new(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(10.0, 1.0, 0.0),
            LayerMask::BUILDINGS,
        );
        assert!(world.trace(&req).is_none());
        let hit = world
            .trace(&req.with_flags(TraceFlags::WORLD | TraceFlags::ENTITIES))
            .expect("hit");
        assert!((hit.fraction - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_slope_normal_y_is_exact() {
        let mut world = SandboxWorld::new();
        world.add_slope(Vec3::ZERO, 3.0, 0.7);
        let req = TraceRequest::new(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, -10.0, 0.0), LayerMask::TERRAIN);
        assert_eq!(world.trace(&req).expect("hit").normal.y, 0.7);
    }

    #[test]
    fn test_damage_kills_at_zero_health() {
        let mut world = SandboxWorld::new();
        let attacker = world.add_agent(Vec3::ZERO);
        let player = world.add_player(Vec3::X);
        for _ in 0..7 {
            world
                .apply_damage(player, 15.0, DamageType::Melee, attacker)
                .expect("damage");
        }
        assert!(world.is_destroyed(player));
        assert!(world.live_players().is_empty());
    }

    #[test]
    fn test_damage_scaled_by_profile() {
        let mut world = SandboxWorld::new();
        let agent = world.add_agent(Vec3::ZERO);
        world
            .configure_damage(agent, &DamageProfile::default())
            .expect("configure");
        world
            .apply_damage(agent, 20.0, DamageType::Bullet, EntityId::NULL)
            .expect("damage");
        assert_eq!(world.health(agent), Some(90.0));
    }

    #[test]
    fn test_players_cannot_navigate() {
        let mut world = SandboxWorld::new();
        let player = world.add_player(Vec3::ZERO);
        assert!(matches!(
            world.steer_to(player, NavGoal::Position(Vec3::X)),
            Err(HostError::CapabilityMissing { .. })
        ));
    }

    #[test]
    fn test_step_moves_toward_goal() {
        let mut world = SandboxWorld::new();
        let agent = world.add_agent(Vec3::ZERO);
        world.set_max_speed(agent, 2.0).expect("speed");
        world
            .steer_to(agent, NavGoal::Position(Vec3::new(10.0, 0.0, 0.0)))
            .expect("steer");

        world.step(1.0);
        assert_eq!(world.position(agent), Some(Vec3::new(2.0, 0.0, 0.0)));
        assert!(!world.is_idle(agent));

        for _ in 0..10 {
            world.step(1.0);
        }
        assert!(world.is_idle(agent));
    }

    #[test]
    fn test_step_follows_entity_without_overlapping() {
        let mut world = SandboxWorld::new();
        let agent = world.add_agent(Vec3::ZERO);
        let player = world.add_player(Vec3::new(3.0, 0.0, 0.0));
        world.steer_to(agent, NavGoal::Entity(player)).expect("steer");
        for _ in 0..10 {
            world.step(1.0);
        }
        let pos = world.position(agent).expect("agent");
        assert!((pos.x - 2.0).abs() < 1e-4);
        assert_eq!(world.nav_goal(agent), Some(NavGoal::Entity(player)));
    }

    #[test]
    fn test_failed_spawns() {
        let mut world = SandboxWorld::new();
        world.set_fail_spawns(true);
        assert!(world
            .spawn_entity(&PrefabRef::default(), Vec3::ZERO, None)
            .is_err());
        assert!(world.agents().is_empty());
    }
}
