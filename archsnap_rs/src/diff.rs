//! Snapshot comparison.
//!
//! Components are identified across snapshots by their compound key
//! `container::component`, where the container part is the snapshot's
//! container map key. Containers themselves are compared by their own
//! fields, so a changed description or an added empty container still
//! counts as a change.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::snapshot::{
    ComponentSnapshot, ContainerSnapshot, SerializedComponent, SerializedRelationship,
};

pub const KEY_SEPARATOR: &str = "::";

pub const NO_CHANGES_MESSAGE: &str = "No architectural changes detected.";

/// New, removed and modified compound keys between two snapshots, plus
/// the containers that were added, removed or changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonResult {
    pub new: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub modified: BTreeSet<String>,
    pub modified_containers: BTreeSet<String>,
}

impl ComparisonResult {
    pub fn has_changes(&self) -> bool {
        self.total_changes() > 0
    }

    pub fn total_changes(&self) -> usize {
        self.new.len() + self.removed.len() + self.modified.len() + self.modified_containers.len()
    }

    /// One-line summary, e.g. `2 new, 1 modified`.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.new.is_empty() {
            parts.push(format!("{} new", self.new.len()));
        }
        if !self.removed.is_empty() {
            parts.push(format!("{} removed", self.removed.len()));
        }
        if !self.modified.is_empty() {
            parts.push(format!("{} modified", self.modified.len()));
        }
        if !self.modified_containers.is_empty() {
            parts.push(format!("{} container(s) changed", self.modified_containers.len()));
        }

        if parts.is_empty() {
            "No changes".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// Human-readable change report.
    pub fn render_report(&self) -> String {
        if !self.has_changes() {
            return NO_CHANGES_MESSAGE.to_string();
        }

        let mut report = String::from("Component architecture changes detected:\n\n");
        let sections = [
            ("NEW COMPONENTS", '+', &self.new),
            ("REMOVED COMPONENTS", '-', &self.removed),
            ("MODIFIED COMPONENTS", '~', &self.modified),
            ("CHANGED CONTAINERS", '~', &self.modified_containers),
        ];
        for (title, marker, keys) in sections {
            if keys.is_empty() {
                continue;
            }
            report.push_str(&format!("{title} ({}):\n", keys.len()));
            for key in keys {
                report.push_str(&format!("  {marker} {key}\n"));
            }
            report.push('\n');
        }
        report.push_str(&format!("Total changes: {}", self.total_changes()));
        report
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "has_changes": self.has_changes(),
            "total_changes": self.total_changes(),
            "new": self.new,
            "removed": self.removed,
            "modified": self.modified,
            "modified_containers": self.modified_containers,
            "summary": self.summary(),
        })
    }
}

pub fn compound_key(container: &str, component: &str) -> String {
    format!("{container}{KEY_SEPARATOR}{component}")
}

/// Every component of a snapshot keyed by compound key.
pub fn flatten(snapshot: &ComponentSnapshot) -> BTreeMap<String, &SerializedComponent> {
    snapshot
        .containers
        .iter()
        .flat_map(|(container, state)| {
            state
                .components
                .iter()
                .map(move |(name, component)| (compound_key(container, name), component))
        })
        .collect()
}

fn container_fields_equal(a: &ContainerSnapshot, b: &ContainerSnapshot) -> bool {
    a.container_name == b.container_name
        && a.container_description == b.container_description
        && a.container_technology == b.container_technology
}

/// Containers present on one side only, or whose own fields differ.
/// The component count is left out; components are compared by key.
pub fn changed_container_fields(old: &ComponentSnapshot, new: &ComponentSnapshot) -> BTreeSet<String> {
    let mut changed: BTreeSet<String> = old
        .containers
        .keys()
        .filter(|name| !new.containers.contains_key(*name))
        .cloned()
        .collect();
    for (name, container) in &new.containers {
        match old.containers.get(name) {
            Some(previous) if container_fields_equal(previous, container) => {}
            _ => {
                changed.insert(name.clone());
            }
        }
    }
    changed
}

/// Containers whose full state differs, components included.
pub fn changed_containers(old: &ComponentSnapshot, new: &ComponentSnapshot) -> BTreeSet<String> {
    old.containers
        .keys()
        .chain(new.containers.keys())
        .filter(|name| old.containers.get(*name) != new.containers.get(*name))
        .cloned()
        .collect()
}

fn sorted_relationships(component: &SerializedComponent) -> Vec<&SerializedRelationship> {
    let mut relationships: Vec<_> = component.relationships.iter().collect();
    relationships.sort();
    relationships
}

/// Field-wise equality with relationship order ignored.
pub fn components_equal(a: &SerializedComponent, b: &SerializedComponent) -> bool {
    a.name == b.name
        && a.description == b.description
        && a.technology == b.technology
        && a.tags == b.tags
        && a.kind == b.kind
        && a.metadata == b.metadata
        && sorted_relationships(a) == sorted_relationships(b)
}

/// Compare a previous snapshot (if any) with the current one.
pub fn compare(old: Option<&ComponentSnapshot>, new: &ComponentSnapshot) -> ComparisonResult {
    let new_map = flatten(new);
    let Some(old) = old else {
        return ComparisonResult {
            new: new_map.into_keys().collect(),
            ..ComparisonResult::default()
        };
    };
    let old_map = flatten(old);

    let mut result = ComparisonResult::default();
    for (key, component) in &new_map {
        match old_map.get(key) {
            None => {
                result.new.insert(key.clone());
            }
            Some(previous) if !components_equal(previous, component) => {
                result.modified.insert(key.clone());
            }
            Some(_) => {}
        }
    }
    result.removed = old_map
        .keys()
        .filter(|key| !new_map.contains_key(*key))
        .cloned()
        .collect();
    result.modified_containers = changed_container_fields(old, new);
    result
}
