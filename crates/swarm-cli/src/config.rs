//! CLI configuration from environment and config files.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context;
use swarm_core::SimulationConfig;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for exported logs and missions
    pub output_dir: PathBuf,
    /// File name prefix of the collision log
    pub log_prefix: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            output_dir: env::var("SWARM_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            log_prefix: env::var("SWARM_LOG_PREFIX")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "collision_log".to_string()),
        }
    }
}

/// Read a JSON simulation config. Missing sections and fields keep their defaults.
pub fn load_simulation_config(path: &Path) -> anyhow::Result<SimulationConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: SimulationConfig = serde_json::from_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}
