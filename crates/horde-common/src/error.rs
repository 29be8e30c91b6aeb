//! Error types for Project Horde.

use thiserror::Error;

use crate::ids::EntityId;

/// Top-level error type for Horde operations.
#[derive(Debug, Error)]
pub enum HordeError {
    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by the host world the core calls into.
///
/// None of these are fatal to the simulation. Callers log and degrade.
#[derive(Debug, Error)]
pub enum HostError {
    /// Entity is gone or was never known to the host
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Prefab could not be materialized
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    /// Entity lacks the capability the call needs
    #[error("Entity {entity} has no {capability} capability")]
    CapabilityMissing {
        /// Entity the call targeted
        entity: EntityId,
        /// Name of the missing capability
        capability: &'static str,
    },
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config text could not be parsed
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// Config could not be serialized
    #[error("Failed to serialize config: {0}")]
    Serialize(String),
}

/// Result type alias for host calls.
pub type HostResult<T> = Result<T, HostError>;

/// Result type alias for Horde operations.
pub type HordeResult<T> = Result<T, HordeError>;
