//! Change-detection workflows for CI.
//!
//! Each workflow loads and validates configuration up front, then runs
//! discovery through a [`TypeSource`]. The outcome maps onto exit codes:
//! 0 no changes, 1 changes, 2 validation or I/O failure.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::json;
use tracing::{info, warn};

use crate::canonical::content_hash;
use crate::classfile::TypeSource;
use crate::config::{Settings, StrategyConfiguration};
use crate::diff::{self, ComparisonResult};
use crate::error::{DetectError, SnapshotError};
use crate::model::ArchitectureModel;
use crate::scanner::{ContainerDiscovery, DiscoveryScanner};
use crate::snapshot::{ComponentSnapshot, SnapshotStore};

/// Result of a workflow as seen by CI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    NoChanges,
    Changes,
    ValidationError,
}

impl ChangeOutcome {
    pub fn exit_code(self) -> u8 {
        match self {
            ChangeOutcome::NoChanges => 0,
            ChangeOutcome::Changes => 1,
            ChangeOutcome::ValidationError => 2,
        }
    }

    pub fn from_comparison(result: &ComparisonResult) -> Self {
        if result.has_changes() {
            ChangeOutcome::Changes
        } else {
            ChangeOutcome::NoChanges
        }
    }
}

/// Resolved inputs for a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Strategy configuration file.
    pub strategies: PathBuf,
    /// Architecture model file. `None` runs with strategy containers only.
    pub model: Option<PathBuf>,
    pub snapshot_dir: PathBuf,
    pub history_limit: Option<usize>,
    pub scan_timeout: Option<Duration>,
    /// Treat an empty discovery as a validation error.
    pub require_components: bool,
}

impl RunOptions {
    /// Options from settings, with relative paths resolved against `root`.
    /// The settings' model file is optional and used only if it exists.
    pub fn from_settings(root: &Path, settings: &Settings) -> Self {
        let model = root.join(&settings.model);
        Self {
            strategies: root.join(&settings.strategies),
            model: model.exists().then_some(model),
            snapshot_dir: root.join(&settings.snapshot_dir),
            history_limit: settings.history_limit,
            scan_timeout: settings.scan_timeout_secs.map(Duration::from_secs),
            require_components: false,
        }
    }

    pub fn store(&self) -> SnapshotStore {
        SnapshotStore::new(&self.snapshot_dir)
    }
}

/// Validated configuration and model for one run.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub config: StrategyConfiguration,
    pub model: ArchitectureModel,
}

impl Workspace {
    /// Load and validate everything before any scanning starts.
    pub fn load(options: &RunOptions) -> Result<Self, DetectError> {
        let config = StrategyConfiguration::load_from_path(&options.strategies)?;
        config.validate_all()?;

        let model = match &options.model {
            Some(path) => ArchitectureModel::load_from_path(path)?,
            None => ArchitectureModel::default(),
        };
        let model = model.with_strategy_containers(&config);
        info!(
            strategies = config.strategies.len(),
            containers = model.containers.len(),
            "configuration loaded"
        );
        Ok(Self { config, model })
    }

    pub fn discover(&self, source: &dyn TypeSource) -> Vec<ContainerDiscovery> {
        DiscoveryScanner::new(&self.config, source).discover_all(&self.model)
    }

    pub fn container_names(&self) -> Vec<String> {
        self.model.containers.iter().map(|c| c.name.clone()).collect()
    }
}

/// Scan and build a snapshot, enforcing `require_components`.
pub fn scan_snapshot(
    options: &RunOptions,
    source: &dyn TypeSource,
) -> Result<ComponentSnapshot, DetectError> {
    let workspace = Workspace::load(options)?;
    let snapshot = ComponentSnapshot::from_discoveries(&workspace.discover(source));
    if snapshot.component_count() == 0 {
        if options.require_components {
            return Err(DetectError::NoComponents);
        }
        warn!("no components discovered; check scan roots and strategies");
    }
    Ok(snapshot)
}

fn hash(snapshot: &ComponentSnapshot) -> Result<String, DetectError> {
    content_hash(snapshot).map_err(|e| DetectError::Snapshot(SnapshotError::from(e)))
}

fn save(options: &RunOptions, snapshot: &ComponentSnapshot) -> Result<PathBuf, DetectError> {
    let store = options.store();
    let history = store.save_with_history(snapshot)?;
    if let Some(keep) = options.history_limit {
        store.prune(keep)?;
    }
    Ok(history)
}

#[derive(Debug, Clone)]
pub struct BaselineReport {
    pub latest: PathBuf,
    pub history: PathBuf,
    pub containers: usize,
    pub components: usize,
    pub hash: String,
}

impl BaselineReport {
    pub fn render(&self) -> String {
        format!(
            "Baseline saved: {} components in {} containers\n  latest:  {}\n  history: {}\n  hash:    {}",
            self.components,
            self.containers,
            self.latest.display(),
            self.history.display(),
            self.hash
        )
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "latest": self.latest.display().to_string(),
            "history": self.history.display().to_string(),
            "containers": self.containers,
            "components": self.components,
            "hash": self.hash,
        })
    }
}

/// Record the current state without comparing.
pub fn run_baseline(
    options: &RunOptions,
    source: &dyn TypeSource,
) -> Result<BaselineReport, DetectError> {
    let snapshot = scan_snapshot(options, source)?;
    let history = save(options, &snapshot)?;
    Ok(BaselineReport {
        latest: options.store().latest_path(),
        history,
        containers: snapshot.containers.len(),
        components: snapshot.component_count(),
        hash: hash(&snapshot)?,
    })
}

/// Comparison between a previous and a current snapshot.
#[derive(Debug, Clone)]
pub struct DetectReport {
    pub comparison: ComparisonResult,
    pub previous_hash: Option<String>,
    pub current_hash: String,
    /// Digests matched, so no field-wise comparison ran.
    pub unchanged_by_hash: bool,
    pub history: Option<PathBuf>,
}

impl DetectReport {
    pub fn outcome(&self) -> ChangeOutcome {
        ChangeOutcome::from_comparison(&self.comparison)
    }

    pub fn render(&self) -> String {
        self.comparison.render_report()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut value = self.comparison.to_json();
        if let Some(map) = value.as_object_mut() {
            map.insert("previous_hash".into(), json!(self.previous_hash));
            map.insert("current_hash".into(), json!(self.current_hash));
            map.insert("unchanged_by_hash".into(), json!(self.unchanged_by_hash));
            if let Some(history) = &self.history {
                map.insert("history".into(), json!(history.display().to_string()));
            }
        }
        value
    }
}

/// Compare two snapshots, short-circuiting on equal digests.
pub fn compare_snapshots(
    previous: Option<&ComponentSnapshot>,
    current: &ComponentSnapshot,
) -> Result<DetectReport, DetectError> {
    let current_hash = hash(current)?;
    let previous_hash = previous.map(hash).transpose()?;

    if previous_hash.as_deref() == Some(current_hash.as_str()) {
        info!("snapshot digests match, no changes");
        return Ok(DetectReport {
            comparison: ComparisonResult::default(),
            previous_hash,
            current_hash,
            unchanged_by_hash: true,
            history: None,
        });
    }

    let mut comparison = diff::compare(previous, current);
    if let Some(previous) = previous
        && !comparison.has_changes()
    {
        // Digests differ, so something did change; report the containers
        // that hold the difference as modified.
        comparison.modified_containers = diff::changed_containers(previous, current);
        warn!(
            containers = comparison.modified_containers.len(),
            "digests differ but no component changed"
        );
    }

    Ok(DetectReport {
        comparison,
        previous_hash,
        current_hash,
        unchanged_by_hash: false,
        history: None,
    })
}

/// Scan, compare with the previous latest snapshot, then save.
pub fn run_detect(options: &RunOptions, source: &dyn TypeSource) -> Result<DetectReport, DetectError> {
    let snapshot = scan_snapshot(options, source)?;
    let previous = options.store().load_latest();
    if previous.is_none() {
        info!("no previous snapshot, every component is new");
    }

    let mut report = compare_snapshots(previous.as_ref(), &snapshot)?;
    report.history = Some(save(options, &snapshot)?);
    info!(summary = %report.comparison.summary(), "detection finished");
    Ok(report)
}

/// Compare two snapshot files without scanning or saving.
pub fn compare_files(old: &Path, new: &Path) -> Result<DetectReport, DetectError> {
    let old = ComponentSnapshot::load(old)?;
    let new = ComponentSnapshot::load(new)?;
    compare_snapshots(Some(&old), &new)
}

/// Content digest of a snapshot file.
pub fn hash_file(path: &Path) -> Result<String, DetectError> {
    hash(&ComponentSnapshot::load(path)?)
}

#[derive(Debug, Clone)]
pub struct ValidationSummary {
    pub strategies: usize,
    pub enabled: usize,
    pub containers: Vec<String>,
}

impl ValidationSummary {
    pub fn render(&self) -> String {
        format!(
            "Configuration valid: {} strategies ({} enabled), containers: {}",
            self.strategies,
            self.enabled,
            self.containers.join(", ")
        )
    }
}

/// Load and validate configuration only.
pub fn validate(options: &RunOptions) -> Result<ValidationSummary, DetectError> {
    let workspace = Workspace::load(options)?;
    Ok(ValidationSummary {
        strategies: workspace.config.strategies.len(),
        enabled: workspace.config.strategies.iter().filter(|s| s.enabled).count(),
        containers: workspace.container_names(),
    })
}

/// Trim snapshot history to the newest `keep` files.
pub fn prune(options: &RunOptions, keep: usize) -> Result<usize, DetectError> {
    Ok(options.store().prune(keep)?)
}
