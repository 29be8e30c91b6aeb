//! # Horde Sim
//!
//! Headless runner for Project Horde. Loads a TOML session config, drives a
//! sandbox world with scripted players through the horde director on a fixed
//! step and reports a JSON summary.
//!
//! Usage: `horde-sim [config.toml] [--write-default]`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod config;
mod session;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{SimConfig, CONFIG_FILE};
use crate::session::Session;

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("horde=info".parse()?))
        .init();

    info!("Project Horde sim starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config_path = PathBuf::from(CONFIG_FILE);
    let mut write_default = false;
    for arg in std::env::args().skip(1) {
        if arg == "--write-default" {
            write_default = true;
        } else {
            config_path = PathBuf::from(arg);
        }
    }

    if write_default {
        SimConfig::default()
            .save_to(&config_path)
            .with_context(|| format!("writing {}", config_path.display()))?;
        return Ok(());
    }

    let mut config = SimConfig::load_from(&config_path);
    config.validate();
    let summary_path = config.summary_path.clone();

    let summary = Session::new(config).run();
    let json = serde_json::to_string_pretty(&summary)?;

    match summary_path {
        Some(path) => {
            fs::write(&path, &json).with_context(|| format!("writing summary to {path}"))?;
            info!("Summary written to {path}");
        },
        None => println!("{json}"),
    }

    info!("Project Horde sim shutdown complete");
    Ok(())
}
