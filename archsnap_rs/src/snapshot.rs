//! Snapshot model and on-disk store.
//!
//! A snapshot is the serialized discovered state of every container at one
//! point in time. The store keeps a `components-latest.json` that each run
//! overwrites, plus append-only timestamped history files.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SnapshotError;
use crate::scanner::{ContainerDiscovery, DiscoveredComponent};

/// Snapshot format version
pub const SNAPSHOT_FORMAT_VERSION: &str = "1.0";

/// Value written to `generatedBy`
pub const GENERATED_BY: &str = "archsnap";

/// Latest snapshot file name
pub const LATEST_FILE: &str = "components-latest.json";

/// History file prefix, followed by `YYYYMMDD-HHMMSS`
pub const HISTORY_PREFIX: &str = "components-snapshot-";

pub const COMPONENT_TYPE: &str = "Component";

const HISTORY_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Serialized discovered state of all containers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSnapshot {
    /// RFC 3339 creation time. Ignored by content comparison.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub generated_by: String,
    #[serde(default)]
    pub version: String,
    /// Container name → container state.
    #[serde(default)]
    pub containers: BTreeMap<String, ContainerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSnapshot {
    pub container_name: String,
    #[serde(default)]
    pub container_description: String,
    #[serde(default)]
    pub container_technology: String,
    #[serde(default)]
    pub component_count: usize,
    /// Component name → component.
    #[serde(default)]
    pub components: BTreeMap<String, SerializedComponent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedComponent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub technology: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(rename = "type", default = "component_type")]
    pub kind: String,
    #[serde(default)]
    pub relationships: Vec<SerializedRelationship>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn component_type() -> String {
    COMPONENT_TYPE.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedRelationship {
    pub target: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl From<&DiscoveredComponent> for SerializedComponent {
    fn from(component: &DiscoveredComponent) -> Self {
        Self {
            name: component.name.clone(),
            description: component.description.clone(),
            technology: component.technology.clone(),
            tags: component.tags.clone(),
            kind: component_type(),
            relationships: component
                .relationships
                .iter()
                .map(|r| SerializedRelationship {
                    target: r.target.clone(),
                    description: r.description.clone().unwrap_or_default(),
                    kind: r.kind.clone(),
                    properties: BTreeMap::new(),
                })
                .collect(),
            metadata: component.metadata.clone(),
        }
    }
}

impl From<&ContainerDiscovery> for ContainerSnapshot {
    fn from(discovery: &ContainerDiscovery) -> Self {
        let components: BTreeMap<_, _> = discovery
            .components
            .iter()
            .map(|(name, c)| (name.clone(), SerializedComponent::from(c)))
            .collect();
        Self {
            container_name: discovery.name.clone(),
            container_description: discovery.description.clone(),
            container_technology: discovery.technology.clone(),
            component_count: components.len(),
            components,
        }
    }
}

impl ComponentSnapshot {
    /// Empty snapshot stamped with the current time.
    pub fn new() -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            generated_by: GENERATED_BY.to_string(),
            version: SNAPSHOT_FORMAT_VERSION.to_string(),
            containers: BTreeMap::new(),
        }
    }

    pub fn from_discoveries(discoveries: &[ContainerDiscovery]) -> Self {
        let mut snapshot = Self::new();
        for discovery in discoveries {
            snapshot
                .containers
                .insert(discovery.name.clone(), ContainerSnapshot::from(discovery));
        }
        snapshot
    }

    pub fn component_count(&self) -> usize {
        self.containers.values().map(|c| c.components.len()).sum()
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let content = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SnapshotError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_pretty_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for ComponentSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Directory of latest + historical snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn latest_path(&self) -> PathBuf {
        self.dir.join(LATEST_FILE)
    }

    /// Previous latest snapshot. Missing or unreadable files yield `None`.
    pub fn load_latest(&self) -> Option<ComponentSnapshot> {
        let path = self.latest_path();
        if !path.exists() {
            debug!(path = %path.display(), "no previous snapshot");
            return None;
        }
        match ComponentSnapshot::load(&path) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("ignoring previous snapshot: {e}");
                None
            }
        }
    }

    /// Overwrite the latest snapshot and append a history file.
    /// Returns the history file path.
    pub fn save_with_history(&self, snapshot: &ComponentSnapshot) -> Result<PathBuf, SnapshotError> {
        let json = snapshot.to_pretty_json()?;
        self.ensure_dir()?;

        let latest = self.latest_path();
        fs::write(&latest, &json).map_err(|source| SnapshotError::Io {
            path: latest.clone(),
            source,
        })?;

        let stamp = chrono::Local::now().format(HISTORY_STAMP_FORMAT).to_string();
        let history = self.write_history(&json, &stamp)?;
        info!(latest = %latest.display(), history = %history.display(), "snapshot saved");
        Ok(history)
    }

    /// Create a new history file for `stamp`, suffixing `-N` on collision.
    fn write_history(&self, json: &str, stamp: &str) -> Result<PathBuf, SnapshotError> {
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                format!("{HISTORY_PREFIX}{stamp}.json")
            } else {
                format!("{HISTORY_PREFIX}{stamp}-{attempt}.json")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(json.as_bytes())
                        .map_err(|source| SnapshotError::Io {
                            path: path.clone(),
                            source,
                        })?;
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(source) => return Err(SnapshotError::Io { path, source }),
            }
        }
    }

    fn ensure_dir(&self) -> Result<(), SnapshotError> {
        fs::create_dir_all(&self.dir).map_err(|source| SnapshotError::Io {
            path: self.dir.clone(),
            source,
        })
    }

    /// History files, oldest first.
    pub fn history(&self) -> Result<Vec<PathBuf>, SnapshotError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir).map_err(|source| SnapshotError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut files: Vec<((String, u32), PathBuf)> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter_map(|path| {
                let key = history_sort_key(path.file_name()?.to_str()?)?;
                Some((key, path))
            })
            .collect();
        files.sort();
        Ok(files.into_iter().map(|(_, path)| path).collect())
    }

    /// Delete the oldest history files beyond `keep`. Returns how many were removed.
    pub fn prune(&self, keep: usize) -> Result<usize, SnapshotError> {
        let history = self.history()?;
        let excess = history.len().saturating_sub(keep);
        for path in &history[..excess] {
            fs::remove_file(path).map_err(|source| SnapshotError::Io {
                path: path.clone(),
                source,
            })?;
            debug!(path = %path.display(), "pruned snapshot");
        }
        if excess > 0 {
            info!(removed = excess, kept = keep, "pruned snapshot history");
        }
        Ok(excess)
    }
}

/// `(stamp, collision index)` for a history file name.
fn history_sort_key(file_name: &str) -> Option<(String, u32)> {
    let stem = file_name
        .strip_prefix(HISTORY_PREFIX)?
        .strip_suffix(".json")?;
    // YYYYMMDD-HHMMSS is 15 chars; anything after is "-N".
    if stem.len() < 15 || !stem.is_char_boundary(15) {
        return None;
    }
    let (stamp, rest) = stem.split_at(15);
    let index = match rest.strip_prefix('-') {
        Some(n) => n.parse().ok()?,
        None if rest.is_empty() => 0,
        None => return None,
    };
    Some((stamp.to_string(), index))
}
