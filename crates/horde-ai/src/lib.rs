//! # Horde AI
//!
//! Hostile agent behavior and population management for Project Horde.
//!
//! This crate provides the simulation core that keeps a horde of undead
//! agents alive around human players:
//! - Host collaborator traits (world queries, navigation, damage, lifecycle)
//! - Perception (validity, line of sight, nearest target)
//! - Terrain probing and spawn-point validation
//! - Per-agent behavior state machine
//! - Call queue for periodic work with owned timer handles
//! - Agent factory and population manager
//! - Game-mode director tying it all together
//! - Event bus for audio/animation feedback
//! - Sandbox host world for tests and headless runs

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod ambient;
pub mod behavior;
pub mod config;
pub mod damage;
pub mod events;
pub mod factory;
pub mod game_mode;
pub mod host;
pub mod mock;
pub mod perception;
pub mod population;
pub mod scheduler;
pub mod terrain;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::ambient::*;
    pub use crate::behavior::*;
    pub use crate::config::*;
    pub use crate::damage::*;
    pub use crate::events::*;
    pub use crate::factory::*;
    pub use crate::game_mode::*;
    pub use crate::host::*;
    pub use crate::mock::*;
    pub use crate::perception::*;
    pub use crate::population::*;
    pub use crate::scheduler::*;
    pub use crate::terrain::*;
}

pub use prelude::*;
