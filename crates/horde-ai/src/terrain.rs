//! Ground probing and spawn-point validation.

use horde_common::Vec3;
use thiserror::Error;

use crate::host::{LayerMask, SpatialQuery, TraceFlags, TraceRequest};

/// How far above a candidate the ground probe starts.
pub const PROBE_ABOVE: f32 = 50.0;
/// How far below a candidate the ground probe ends.
pub const PROBE_BELOW: f32 = 10.0;
/// Lift applied to a ground hit so agents don't sink into terrain.
pub const GROUND_CLEARANCE: f32 = 0.1;
/// Deepest water an agent may spawn in.
pub const MAX_WATER_DEPTH: f32 = 0.3;
/// Smallest normal Y accepted for spawning (roughly 45 degrees).
pub const MIN_GROUND_NORMAL_Y: f32 = 0.7;
/// Height of the overhead clearance check against buildings.
pub const BUILDING_PROBE_HEIGHT: f32 = 3.0;

/// A walkable point found by a ground probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundPoint {
    /// Hit point lifted by [`GROUND_CLEARANCE`]
    pub position: Vec3,
    /// Terrain normal at the hit
    pub normal: Vec3,
}

/// Reasons a spawn candidate is refused.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SpawnRejection {
    /// Ground probe found no terrain
    #[error("no terrain under candidate")]
    NoGround,
    /// Point is under too much water
    #[error("water too deep ({depth:.2})")]
    Water {
        /// Measured water depth
        depth: f32,
    },
    /// Terrain too steep
    #[error("slope too steep (normal.y = {normal_y:.2})")]
    Slope {
        /// Y component of the terrain normal
        normal_y: f32,
    },
    /// Point is inside a building volume
    #[error("inside a building")]
    Building,
}

/// Drops a vertical ray over `candidate` and returns the terrain under it.
pub fn probe_ground<S: SpatialQuery + ?Sized>(spatial: &S, candidate: Vec3) -> Option<GroundPoint> {
    let start = Vec3::new(candidate.x, candidate.y + PROBE_ABOVE, candidate.z);
    let end = Vec3::new(candidate.x, candidate.y - PROBE_BELOW, candidate.z);
    let request = TraceRequest::new(start, end, LayerMask::TERRAIN).with_flags(TraceFlags::WORLD);

    spatial.trace(&request).map(|hit| GroundPoint {
        position: hit.point + Vec3::Y * GROUND_CLEARANCE,
        normal: hit.normal,
    })
}

/// Resolves `candidate` to a spawnable ground point.
///
/// Rejects points with no terrain under them, in water deeper than
/// [`MAX_WATER_DEPTH`], on slopes whose normal Y is below
/// [`MIN_GROUND_NORMAL_Y`], or with building geometry overhead.
pub fn validate_spawn_point<S: SpatialQuery + ?Sized>(
    spatial: &S,
    candidate: Vec3,
) -> Result<Vec3, SpawnRejection> {
    let ground = probe_ground(spatial, candidate).ok_or(SpawnRejection::NoGround)?;

    let depth = spatial.water_depth(ground.position);
    if depth > MAX_WATER_DEPTH {
        return Err(SpawnRejection::Water { depth });
    }

    if ground.normal.y < MIN_GROUND_NORMAL_Y {
        return Err(SpawnRejection::Slope {
            normal_y: ground.normal.y,
        });
    }

    let overhead = TraceRequest::new(
        ground.position,
        ground.position + Vec3::Y * BUILDING_PROBE_HEIGHT,
        LayerMask::BUILDINGS,
    )
    .with_flags(TraceFlags::WORLD | TraceFlags::ENTITIES);
    if spatial.trace(&overhead).is_some() {
        return Err(SpawnRejection::Building);
    }

    Ok(ground.position)
}
