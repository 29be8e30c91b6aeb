//! # Horde Common
//!
//! Common types, utilities, and shared abstractions for Project Horde.
//!
//! This crate provides foundational types used across all Horde subsystems:
//! - ID types (EntityId, TimerId)
//! - Error taxonomy for host, config and IO failures
//! - Geometry helpers for ring sampling on the ground plane
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod geometry;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::geometry::*;
    pub use crate::ids::*;
    pub use glam::Vec3;
}

pub use prelude::*;
