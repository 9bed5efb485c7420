//! Strategy registry: declarative strategy descriptors → matchers.
//!
//! [`validate`] is the single point where required parameters are checked.
//! [`create_matcher`] assumes a validated descriptor and only builds.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::matcher::Matcher;

pub const KEY_ANNOTATION_TYPE: &str = "annotationType";
pub const KEY_PATTERN: &str = "pattern";
pub const KEY_SUFFIX: &str = "suffix";
pub const KEY_PROPERTY_NAME: &str = "propertyName";
pub const KEY_ANNOTATION_PROPERTY: &str = "annotationProperty";

/// How a strategy finds components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyKind {
    Annotation,
    Regex,
    NameSuffix,
    #[serde(alias = "CUSTOM_ANNOTATION")]
    AnnotationProperty,
}

impl StrategyKind {
    /// Parameter keys a descriptor of this kind must carry.
    pub fn required_keys(self) -> &'static [&'static str] {
        match self {
            StrategyKind::Annotation => &[KEY_ANNOTATION_TYPE],
            StrategyKind::Regex => &[KEY_PATTERN],
            StrategyKind::NameSuffix => &[KEY_SUFFIX],
            StrategyKind::AnnotationProperty => {
                &[KEY_ANNOTATION_TYPE, KEY_PROPERTY_NAME, KEY_ANNOTATION_PROPERTY]
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Annotation => "ANNOTATION",
            StrategyKind::Regex => "REGEX",
            StrategyKind::NameSuffix => "NAME_SUFFIX",
            StrategyKind::AnnotationProperty => "ANNOTATION_PROPERTY",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, declarative rule describing how to find components.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: StrategyKind,
    /// Kind-specific parameters.
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
    /// Target container.
    #[serde(default)]
    pub container_mapping: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl StrategyDescriptor {
    pub fn new(name: impl Into<String>, kind: StrategyKind, container: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            config: BTreeMap::new(),
            container_mapping: Some(container.into()),
            enabled: true,
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.config.insert(key.to_string(), value.into());
        self
    }

    /// Parameter rendered as text. Null and blank values count as absent.
    pub fn param(&self, key: &str) -> Option<String> {
        let text = match self.config.get(key)? {
            Value::Null => return None,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn container(&self) -> Option<&str> {
        self.container_mapping
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// True when this strategy is enabled and targets `container`.
    pub fn applies_to(&self, container: &str) -> bool {
        self.enabled && self.container() == Some(container)
    }

    fn required(&self, key: &str) -> String {
        self.param(key).unwrap_or_default()
    }
}

/// Check the kind-specific parameter contract of a descriptor.
pub fn validate(descriptor: &StrategyDescriptor) -> Result<(), ConfigError> {
    if descriptor.container().is_none() {
        return Err(ConfigError::MissingContainerMapping {
            strategy: descriptor.name.clone(),
        });
    }
    for &key in descriptor.kind.required_keys() {
        if descriptor.param(key).is_none() {
            return Err(ConfigError::MissingParameter {
                strategy: descriptor.name.clone(),
                kind: descriptor.kind.as_str(),
                key,
            });
        }
    }
    Ok(())
}

/// Build the matcher for a descriptor that already passed [`validate`].
pub fn create_matcher(descriptor: &StrategyDescriptor) -> Result<Matcher, ConfigError> {
    let built = match descriptor.kind {
        StrategyKind::Annotation => Matcher::annotation(&descriptor.required(KEY_ANNOTATION_TYPE)),
        StrategyKind::Regex => Matcher::regex(&descriptor.required(KEY_PATTERN)),
        StrategyKind::NameSuffix => Matcher::name_suffix(&descriptor.required(KEY_SUFFIX)),
        StrategyKind::AnnotationProperty => Matcher::annotation_property(
            &descriptor.required(KEY_ANNOTATION_TYPE),
            &descriptor.required(KEY_PROPERTY_NAME),
            &descriptor.required(KEY_ANNOTATION_PROPERTY),
        ),
    };
    built.map_err(|e| match e {
        ConfigError::InvalidPattern {
            pattern, message, ..
        } => ConfigError::InvalidPattern {
            strategy: descriptor.name.clone(),
            pattern,
            message,
        },
        other => other,
    })
}

/// Validate, then build. Used where a strategy is about to run.
pub fn compile(descriptor: &StrategyDescriptor) -> Result<Matcher, ConfigError> {
    validate(descriptor)?;
    create_matcher(descriptor)
}
