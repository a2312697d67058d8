//! Configuration management for Shipflow.
//!
//! Handles loading configuration from TOML files and applying
//! environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::workflow::{GateMode, ModeSource, ProjectLayout, DEFAULT_STATE_DIR};

/// Environment variable naming the project root.
pub const PROJECT_DIR_ENV: &str = "WORKFLOW_PROJECT_DIR";

/// Name of the per-project config file.
pub const LOCAL_CONFIG_FILE: &str = ".shipflow.toml";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gate enforcement settings
    pub gates: GatesConfig,

    /// File locations
    pub paths: PathsConfig,
}

/// Gate enforcement settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatesConfig {
    /// `strict` blocks failed transitions, `warn` only logs them.
    /// Unknown values behave as `strict`.
    pub mode: GateMode,
}

/// File location settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Workflow directory, relative to the project root
    pub state_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self { state_dir: DEFAULT_STATE_DIR.to_string() }
    }
}

impl Config {
    /// Load configuration for a project.
    ///
    /// Looks for config in:
    /// 1. `.shipflow.toml` in the project root
    /// 2. `~/.config/shipflow/config.toml`
    /// 3. Falls back to defaults
    pub fn load(project_root: &Path) -> anyhow::Result<Self> {
        let local_config = project_root.join(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        tracing::debug!(path = ?path, "Loaded configuration");
        Ok(config)
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(crate::APP_NAME))
    }

    /// Project layout rooted at `project_root`.
    pub fn layout(&self, project_root: &Path) -> ProjectLayout {
        ProjectLayout::with_state_dir(project_root, &self.paths.state_dir)
    }

    /// Gate mode source: the environment wins over the configured mode.
    pub fn mode_source(&self) -> ModeSource {
        ModeSource::Environment { fallback: self.gates.mode }
    }
}
