//! Architecture model: the declared containers and the per-component
//! enrichment applied on top of discovery.
//!
//! Component names are keyed lowercased and trimmed. Two details in one
//! container that collapse to the same key are a load error.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::StrategyConfiguration;
use crate::error::ConfigError;

/// Root of the model file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectureModel {
    #[serde(default)]
    pub containers: Vec<ContainerModel>,
}

/// A declared container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerModel {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub technology: String,
    /// Enrichment for components discovered in this container.
    #[serde(default)]
    pub components: Vec<ComponentDetail>,
}

/// Declarative detail merged into a discovered component of the same name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDetail {
    pub component_name: String,
    #[serde(default)]
    pub technology: Option<String>,
    #[serde(default)]
    pub tags: Option<TagList>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub relations: Vec<RelationDetail>,
}

/// Tags as either `"a, b"` or `["a", "b"]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagList {
    Joined(String),
    List(Vec<String>),
}

impl TagList {
    pub fn to_vec(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            TagList::Joined(s) => s.split(',').collect(),
            TagList::List(items) => items.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Outgoing relationship declared for a component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDetail {
    pub target: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Lookup key used for enrichment: lowercased, trimmed.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

impl ComponentDetail {
    pub fn new(component_name: impl Into<String>) -> Self {
        Self {
            component_name: component_name.into(),
            ..Self::default()
        }
    }

    pub fn tag_list(&self) -> Vec<String> {
        self.tags.as_ref().map(TagList::to_vec).unwrap_or_default()
    }
}

impl ContainerModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Enrichment map keyed by normalized component name.
    pub fn component_map(&self) -> Result<BTreeMap<String, &ComponentDetail>, ConfigError> {
        let mut map = BTreeMap::new();
        for detail in &self.components {
            let key = normalize_name(&detail.component_name);
            if key.is_empty() {
                return Err(ConfigError::EmptyIdentifier {
                    what: "component name",
                });
            }
            if map.insert(key, detail).is_some() {
                return Err(ConfigError::DuplicateComponent {
                    container: self.name.clone(),
                    component: detail.component_name.clone(),
                });
            }
        }
        Ok(map)
    }
}

impl ArchitectureModel {
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut model: Self =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        for container in &mut model.containers {
            container.name = container.name.trim().to_string();
        }
        model.validate()?;
        Ok(model)
    }

    /// Reject blank or duplicate container names and duplicate component details.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for container in &self.containers {
            let name = container.name.trim();
            if name.is_empty() {
                return Err(ConfigError::EmptyIdentifier {
                    what: "container name",
                });
            }
            if !seen.insert(name) {
                return Err(ConfigError::DuplicateContainer {
                    container: container.name.clone(),
                });
            }
            container.component_map()?;
        }
        Ok(())
    }

    pub fn container(&self, name: &str) -> Option<&ContainerModel> {
        self.containers.iter().find(|c| c.name.trim() == name)
    }

    /// Declared containers, followed by containers that only appear as a
    /// strategy's container mapping.
    pub fn with_strategy_containers(mut self, config: &StrategyConfiguration) -> Self {
        for descriptor in &config.strategies {
            let Some(name) = descriptor.container() else {
                continue;
            };
            if self.container(name).is_none() {
                let mut implicit = ContainerModel::new(name);
                implicit.technology = config.global_config.default_technology(name).to_string();
                self.containers.push(implicit);
            }
        }
        self
    }
}
