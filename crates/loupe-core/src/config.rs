use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::graph::Direction;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "LOUPE_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoupeConfig {
    #[serde(default)]
    pub timeline: TimelineConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Quiet period before a dragged position is checked out.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl TimelineConfig {
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub direction: Direction,
    #[serde(default = "default_true")]
    pub merge_chains: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            direction: Direction::default(),
            merge_chains: default_true(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Preferred output mode: `pretty`, `text` or `json`.
    #[serde(default)]
    pub format: Option<String>,
}

/// Default config location, `<config dir>/loupe/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("loupe/config.toml"))
}

/// Load the config file at `path`, or defaults when it does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config_from(path: &Path) -> Result<LoupeConfig> {
    if !path.exists() {
        return Ok(LoupeConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<LoupeConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load the config named by `$LOUPE_CONFIG`, else the default location.
///
/// # Errors
///
/// Returns an error if the resolved file exists but cannot be read or parsed.
pub fn load_config() -> Result<LoupeConfig> {
    let path = env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .or_else(default_config_path);

    match path {
        Some(path) => load_config_from(&path),
        None => Ok(LoupeConfig::default()),
    }
}

const fn default_true() -> bool {
    true
}

const fn default_debounce_ms() -> u64 {
    300
}
