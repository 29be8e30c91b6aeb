//! Target perception: validity, line of sight and nearest-target search.

use horde_common::{EntityId, Vec3};

use crate::host::{EntityQuery, LayerMask, SpatialQuery, TraceFlags, TraceRequest};

/// Height of the eyes above an entity's origin.
pub const EYE_HEIGHT: f32 = 1.7;

/// Layers that block sight. Movable entities never do.
pub const SIGHT_BLOCKERS: LayerMask = LayerMask(LayerMask::TERRAIN.0 | LayerMask::BUILDINGS.0);

/// Returns whether `target` still refers to a live, undestroyed entity.
pub fn is_valid<Q: EntityQuery + ?Sized>(query: &Q, target: Option<EntityId>) -> bool {
    match target {
        Some(id) if id.is_valid() => query.position(id).is_some() && !query.is_destroyed(id),
        _ => false,
    }
}

/// Single-ray visibility check between two entity origins at eye height.
///
/// Considers world geometry and placed building entities. Blocked when the
/// ray reports a hit at a fraction below 1.0.
pub fn has_line_of_sight<S: SpatialQuery + ?Sized>(spatial: &S, from: Vec3, to: Vec3) -> bool {
    let request = TraceRequest::new(
        from + Vec3::Y * EYE_HEIGHT,
        to + Vec3::Y * EYE_HEIGHT,
        SIGHT_BLOCKERS,
    )
    .with_flags(TraceFlags::WORLD | TraceFlags::ENTITIES);

    match spatial.trace(&request) {
        Some(hit) => hit.fraction >= 1.0,
        None => true,
    }
}

/// Closest valid, visible candidate strictly within `max_range` of `origin`.
///
/// Equidistant candidates resolve to the lowest entity id, so the result
/// does not depend on the order the host lists players in.
pub fn find_nearest_target<H>(
    host: &H,
    origin: Vec3,
    candidates: &[EntityId],
    max_range: f32,
) -> Option<EntityId>
where
    H: EntityQuery + SpatialQuery + ?Sized,
{
    let mut best: Option<(f32, EntityId)> = None;

    for &candidate in candidates {
        if !is_valid(host, Some(candidate)) {
            continue;
        }
        let Some(position) = host.position(candidate) else {
            continue;
        };

        let dist = origin.distance(position);
        if dist >= max_range {
            continue;
        }

        let improves = match best {
            None => true,
            Some((best_dist, best_id)) => {
                dist < best_dist || (dist == best_dist && candidate < best_id)
            },
        };

        // Sight is the expensive part; only pay for it when it matters.
        if improves && has_line_of_sight(host, origin, position) {
            best = Some((dist, candidate));
        }
    }

    best.map(|(_, id)| id)
}
