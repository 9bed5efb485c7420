//! Configuration for archsnap.
//!
//! Two layers:
//! - the strategy configuration (JSON): discovery strategies plus global
//!   discovery settings, validated before any scanning starts
//! - tool settings from an optional `.archsnap/config.toml` in the project root

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::strategy::{self, StrategyDescriptor};

/// Technology label used when a container has no configured default.
pub const FALLBACK_TECHNOLOGY: &str = "Java";

/// Default settings directory name
pub const SETTINGS_DIR: &str = ".archsnap";

/// Default settings file name
pub const SETTINGS_FILE: &str = "config.toml";

/// Default snapshot directory
pub const DEFAULT_SNAPSHOT_DIR: &str = "discovered-components";

/// Global discovery settings shared by every strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalDiscoveryConfig {
    /// Container name → scan root.
    #[serde(default)]
    pub base_paths: BTreeMap<String, String>,
    /// Container name → technology label for discovered components.
    #[serde(default)]
    pub default_technologies: BTreeMap<String, String>,
    /// Drop nested types (`Outer$Inner`).
    #[serde(default = "default_true")]
    pub exclude_inner_classes: bool,
    /// Drop types in `.test.` packages or named `*Test` / `*Tests`.
    #[serde(default = "default_true")]
    pub exclude_test_classes: bool,
}

fn default_true() -> bool {
    true
}

impl Default for GlobalDiscoveryConfig {
    fn default() -> Self {
        Self {
            base_paths: BTreeMap::new(),
            default_technologies: BTreeMap::new(),
            exclude_inner_classes: true,
            exclude_test_classes: true,
        }
    }
}

impl GlobalDiscoveryConfig {
    pub fn default_technology(&self, container: &str) -> &str {
        self.default_technologies
            .get(container)
            .map(String::as_str)
            .unwrap_or(FALLBACK_TECHNOLOGY)
    }
}

/// Strategies plus global settings, loaded once per run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyConfiguration {
    #[serde(default)]
    pub strategies: Vec<StrategyDescriptor>,
    #[serde(default)]
    pub global_config: GlobalDiscoveryConfig,
    /// Directory relative scan roots are resolved against.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl StrategyConfiguration {
    /// Load from a JSON file. Relative base paths resolve against the file's directory.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Enabled strategies targeting `container`, in list order.
    pub fn strategies_for_container(&self, container: &str) -> Vec<&StrategyDescriptor> {
        self.strategies
            .iter()
            .filter(|s| s.applies_to(container))
            .collect()
    }

    /// Validate and compile every strategy. The first failure aborts the run.
    pub fn validate_all(&self) -> Result<(), ConfigError> {
        for descriptor in &self.strategies {
            strategy::compile(descriptor)?;
        }
        Ok(())
    }

    /// Configured scan root for `container`, if any.
    pub fn scan_root(&self, container: &str) -> Option<PathBuf> {
        let raw = self.global_config.base_paths.get(container)?;
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let path = PathBuf::from(raw);
        match (&self.base_dir, path.is_relative()) {
            (Some(base), true) => Some(base.join(path)),
            _ => Some(path),
        }
    }
}

/// Tool settings from `.archsnap/config.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Strategy configuration file.
    pub strategies: PathBuf,
    /// Architecture model file (containers and enrichment).
    pub model: PathBuf,
    /// Directory holding the latest and historical snapshots.
    pub snapshot_dir: PathBuf,
    /// Keep at most this many historical snapshots after each save.
    pub history_limit: Option<usize>,
    /// Abort a container's filesystem walk after this many seconds.
    pub scan_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            strategies: PathBuf::from(SETTINGS_DIR).join("strategies.json"),
            model: PathBuf::from(SETTINGS_DIR).join("architecture.json"),
            snapshot_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
            history_limit: None,
            scan_timeout_secs: None,
        }
    }
}

impl Settings {
    /// Load settings from `.archsnap/config.toml` in the given root directory.
    /// Returns defaults if the file doesn't exist or is invalid.
    pub fn load(root: &Path) -> Self {
        Self::load_from_path(&root.join(SETTINGS_DIR).join(SETTINGS_FILE))
    }

    /// Load settings from a specific path.
    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("failed to parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}
