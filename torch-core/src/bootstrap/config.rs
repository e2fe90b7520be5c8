//! Configuration loading

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::models::MutualPeersConfig;
use crate::Config;

/// Env var naming the settings file explicitly
pub const SETTINGS_PATH_ENV: &str = "TORCH_SETTINGS_PATH";

/// Locate the settings file
///
/// Search order:
/// 1. explicit path (CLI flag)
/// 2. `TORCH_SETTINGS_PATH`
/// 3. ./torch.yaml (current working directory)
/// 4. /config/torch.yaml (Kubernetes mount path)
fn settings_path(explicit: Option<&str>) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(SETTINGS_PATH_ENV).ok())
        .into_iter()
        .chain(["torch.yaml".to_string(), "/config/torch.yaml".to_string()])
        .find(|p| Path::new(p).exists())
}

/// Load service settings from file and `TORCH_*` environment variables
///
/// A malformed file or invalid value is fatal; there is no silent fallback to
/// defaults.
pub fn load_settings(explicit: Option<&str>) -> Result<Config> {
    let config = match settings_path(explicit) {
        Some(path) => {
            eprintln!("Loading settings from {path}");
            Config::from_file(&path).with_context(|| format!("failed to load settings from {path}"))?
        }
        None => {
            eprintln!("No settings file found, using environment variables");
            Config::from_env().context("failed to load settings from environment")?
        }
    };

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Config validation error: {error}");
        }
        anyhow::bail!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        );
    }

    Ok(config)
}

/// Load and validate the mutual-peers topology file
pub fn load_peers(path: &str) -> Result<MutualPeersConfig> {
    let peers = MutualPeersConfig::from_file(path)
        .with_context(|| format!("invalid mutual peers config {path}"))?;

    let nodes: usize = peers.mutual_peers.iter().map(|g| g.peers.len()).sum();
    info!(
        groups = peers.mutual_peers.len(),
        nodes,
        "Mutual peers configuration loaded from {}",
        path
    );
    Ok(peers)
}
