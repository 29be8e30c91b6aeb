//! Simulation configuration.
//!
//! Session length, scripted players, sandbox terrain and the horde settings.
//! Loaded from and saved to TOML.

use horde_ai::HordeConfig;
use horde_common::{ConfigError, HordeResult, Vec3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "horde.toml";

/// A player moving on a straight line at constant velocity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerScript {
    /// Starting position
    pub start: Vec3,
    /// Velocity (m/s)
    pub velocity: Vec3,
}

impl Default for PlayerScript {
    fn default() -> Self {
        Self {
            start: Vec3::ZERO,
            velocity: Vec3::ZERO,
        }
    }
}

/// Axis-aligned building volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallConfig {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

/// Circular water body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterConfig {
    /// Center on the ground plane
    pub center: Vec3,
    /// Radius
    pub radius: f32,
    /// Depth
    pub depth: f32,
}

/// Headless session parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulated seconds
    pub duration_secs: f32,
    /// Fixed simulation step (seconds)
    pub step_secs: f32,
    /// Seconds between progress log lines
    pub log_interval_secs: f32,
    /// RNG seed for the horde
    pub seed: u64,
    /// Where to write the JSON summary (None = don't write)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_path: Option<String>,
    /// Scripted players
    pub players: Vec<PlayerScript>,
    /// Building volumes
    pub walls: Vec<WallConfig>,
    /// Water bodies
    pub water: Vec<WaterConfig>,
    /// Horde settings
    pub horde: HordeConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            duration_secs: 300.0,
            step_secs: 0.1,
            log_interval_secs: 30.0,
            seed: 1337,
            summary_path: None,
            players: vec![
                PlayerScript::default(),
                PlayerScript {
                    start: Vec3::new(80.0, 0.0, 0.0),
                    velocity: Vec3::new(0.0, 0.0, 1.2),
                },
            ],
            walls: vec![WallConfig {
                min: Vec3::new(20.0, 0.0, -10.0),
                max: Vec3::new(30.0, 6.0, 10.0),
            }],
            water: vec![WaterConfig {
                center: Vec3::new(-120.0, 0.0, 0.0),
                radius: 40.0,
                depth: 2.0,
            }],
            horde: HordeConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load configuration from a specific path.
    ///
    /// A missing, unreadable or malformed file yields the defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match Self::try_load_from(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("{e}, using defaults");
                Self::default()
            },
        }
    }

    /// Load configuration from a specific path, reporting why it failed.
    pub fn try_load_from<P: AsRef<Path>>(path: P) -> HordeResult<Self> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> HordeResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.duration_secs = self.duration_secs.clamp(0.0, 86_400.0);
        self.step_secs = self.step_secs.clamp(0.01, 1.0);
        self.log_interval_secs = self.log_interval_secs.max(1.0);
        self.horde.validate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horde_common::HordeError;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.players.len(), 2);
        assert_eq!(config.step_secs, 0.1);
        assert_eq!(config.horde.population.max_zombies_per_player, 20);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SimConfig::default();
        config.step_secs = 5.0;
        config.duration_secs = -1.0;
        config.horde.population.spawn_radius = 10.0;

        config.validate();

        assert_eq!(config.step_secs, 1.0);
        assert_eq!(config.duration_secs, 0.0);
        assert_eq!(config.horde.population.spawn_radius, 50.0);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join("horde.toml");

        let mut config = SimConfig::default();
        config.seed = 99;
        config.summary_path = Some("out/summary.json".to_string());
        config.horde.zombie.detection_range = 50.0;
        config.horde.ambient.enabled = false;

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = SimConfig::load_from(&config_path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = SimConfig::load_from("/nonexistent/path/horde.toml");
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_config_load_garbage_falls_back() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&config_path, "duration_secs = [not toml").expect("write");
        assert!(matches!(
            SimConfig::try_load_from(&config_path),
            Err(HordeError::Config(ConfigError::Parse(_)))
        ));
        assert_eq!(SimConfig::load_from(&config_path), SimConfig::default());
    }

    #[test]
    fn test_try_load_missing_file_is_io_error() {
        assert!(matches!(
            SimConfig::try_load_from("/nonexistent/path/horde.toml"),
            Err(HordeError::Io(_))
        ));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SimConfig = toml::from_str(
            r#"
            duration_secs = 60.0

            [horde.population]
            max_zombies_per_player = 4
            "#,
        )
        .expect("parse");
        assert_eq!(config.duration_secs, 60.0);
        assert_eq!(config.horde.population.max_zombies_per_player, 4);
        assert_eq!(config.horde.population.despawn_distance, 200.0);
        assert_eq!(config.players.len(), 2);
    }
}
