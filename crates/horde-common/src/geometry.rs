//! Geometry helpers on top of `glam`.
//!
//! The world is Y-up. Horizontal placement happens on the XZ plane.

use glam::Vec3;
use std::f32::consts::TAU;

/// Offset of `distance` along the horizontal direction `angle` (radians).
#[must_use]
pub fn annulus_offset(angle: f32, distance: f32) -> Vec3 {
    Vec3::new(angle.cos() * distance, 0.0, angle.sin() * distance)
}

/// Uniform angle, uniform radius sample on the ring `min..max` around `center`.
///
/// Radii are clamped to be non-negative and swapped if given in the wrong
/// order. The height of `center` is kept.
pub fn sample_annulus(rng: &mut fastrand::Rng, center: Vec3, min: f32, max: f32) -> Vec3 {
    let (lo, hi) = ordered_radii(min, max);
    let angle = rng.f32() * TAU;
    let distance = lo + rng.f32() * (hi - lo);
    center + annulus_offset(angle, distance)
}

/// Horizontal (XZ) distance between two points.
#[must_use]
pub fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    let dx = b.x - a.x;
    let dz = b.z - a.z;
    (dx * dx + dz * dz).sqrt()
}

fn ordered_radii(min: f32, max: f32) -> (f32, f32) {
    let min = min.max(0.0);
    let max = max.max(0.0);
    if min <= max {
        (min, max)
    } else {
        (max, min)
    }
}
