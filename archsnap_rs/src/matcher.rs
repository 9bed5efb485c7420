//! Matcher primitives: pure predicates over one compiled type.
//!
//! Each variant is built once from validated parameters and never fails at
//! match time. Required identifiers are checked at construction.

use regex::Regex;

use crate::classfile::{TypeInfo, descriptor_for};
use crate::error::ConfigError;

/// Executable predicate a strategy compiles down to.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Type carries an annotation of the given descriptor.
    Annotation { descriptor: String },
    /// Fully-qualified name matches the pattern in full.
    Regex { pattern: Regex },
    /// Simple name ends with the suffix.
    NameSuffix { suffix: String },
    /// Annotation array element starts with `"<property_name>="`.
    AnnotationProperty {
        descriptor: String,
        property_name: String,
        element: String,
    },
}

fn require<'a>(value: &'a str, what: &'static str) -> Result<&'a str, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ConfigError::EmptyIdentifier { what })
    } else {
        Ok(trimmed)
    }
}

impl Matcher {
    /// Match types annotated with `annotation_type` (dotted form).
    pub fn annotation(annotation_type: &str) -> Result<Self, ConfigError> {
        let annotation_type = require(annotation_type, "annotation type")?;
        Ok(Matcher::Annotation {
            descriptor: descriptor_for(annotation_type),
        })
    }

    /// Match fully-qualified names against `pattern`, anchored at both ends.
    pub fn regex(pattern: &str) -> Result<Self, ConfigError> {
        let raw = require(pattern, "regex pattern")?;
        let pattern = Regex::new(&format!("^(?:{raw})$")).map_err(|e| ConfigError::InvalidPattern {
            strategy: String::new(),
            pattern: raw.to_string(),
            message: e.to_string(),
        })?;
        Ok(Matcher::Regex { pattern })
    }

    pub fn name_suffix(suffix: &str) -> Result<Self, ConfigError> {
        let suffix = require(suffix, "name suffix")?;
        Ok(Matcher::NameSuffix {
            suffix: suffix.to_string(),
        })
    }

    /// Match types whose `annotation_type` carries an array element named
    /// `element` with an entry starting with `"<property_name>="`.
    pub fn annotation_property(
        annotation_type: &str,
        property_name: &str,
        element: &str,
    ) -> Result<Self, ConfigError> {
        let annotation_type = require(annotation_type, "annotation type")?;
        let property_name = require(property_name, "property name")?;
        let element = require(element, "annotation property")?;
        Ok(Matcher::AnnotationProperty {
            descriptor: descriptor_for(annotation_type),
            property_name: property_name.to_string(),
            element: element.to_string(),
        })
    }

    pub fn matches(&self, ty: &TypeInfo) -> bool {
        match self {
            Matcher::Annotation { descriptor } => ty.annotation(descriptor).is_some(),
            Matcher::Regex { pattern } => pattern.is_match(&ty.fqn),
            Matcher::NameSuffix { suffix } => ty.simple_name.ends_with(suffix.as_str()),
            Matcher::AnnotationProperty {
                descriptor,
                property_name,
                element,
            } => {
                let Some(entry) = ty.annotation(descriptor) else {
                    return false;
                };
                let Some(values) = entry.element(element).and_then(|v| v.as_array()) else {
                    return false;
                };
                let prefix = format!("{property_name}=");
                values.iter().any(|v| v.stringify().starts_with(&prefix))
            }
        }
    }

    /// Provenance tag attached to components this matcher discovers.
    pub fn provenance_tag(&self) -> &'static str {
        match self {
            Matcher::Annotation { .. } | Matcher::AnnotationProperty { .. } => "Annotated",
            Matcher::Regex { .. } => "Pattern-Matched",
            Matcher::NameSuffix { .. } => "Convention-Based",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{AnnotationEntry, ElementValue};

    const COMPONENT: &str = "org.osgi.service.component.annotations.Component";

    fn osgi_type(element: &str, value: ElementValue) -> TypeInfo {
        TypeInfo::new("com.acme.connect.HimsaConnector")
            .with_annotation(AnnotationEntry::new(descriptor_for(COMPONENT)).with_pair(element, value))
    }

    fn strings(values: &[&str]) -> ElementValue {
        ElementValue::Array(values.iter().map(|v| ElementValue::Const(v.to_string())).collect())
    }

    #[test]
    fn test_annotation_matcher() {
        let matcher = Matcher::annotation(COMPONENT).expect("matcher");
        assert!(matcher.matches(&osgi_type("property", strings(&[]))));
        assert!(!matcher.matches(&TypeInfo::new("com.acme.Plain")));
    }

    #[test]
    fn test_annotation_matcher_rejects_empty_type() {
        assert!(matches!(
            Matcher::annotation("  "),
            Err(ConfigError::EmptyIdentifier { .. })
        ));
    }

    #[test]
    fn test_regex_matcher_is_anchored() {
        let matcher = Matcher::regex(r"com\.acme\..*Service").expect("matcher");
        assert!(matcher.matches(&TypeInfo::new("com.acme.billing.InvoiceService")));
        assert!(!matcher.matches(&TypeInfo::new("com.acme.billing.InvoiceServiceHelper")));
        assert!(!matcher.matches(&TypeInfo::new("org.com.acme.InvoiceService")));
    }

    #[test]
    fn test_regex_matcher_rejects_bad_pattern() {
        assert!(matches!(
            Matcher::regex("com.(acme"),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_suffix_matcher_uses_simple_name() {
        let matcher = Matcher::name_suffix("Repository").expect("matcher");
        assert!(matcher.matches(&TypeInfo::new("com.acme.data.UserRepository")));
        assert!(!matcher.matches(&TypeInfo::new("com.acme.Repository.User")));
    }

    #[test]
    fn test_property_matcher_true_on_prefix() {
        let matcher = Matcher::annotation_property(COMPONENT, "connector", "property").expect("matcher");
        let ty = osgi_type("property", strings(&["service.ranking=10", "connector=isma.himsa"]));
        assert!(matcher.matches(&ty));
    }

    #[test]
    fn test_property_matcher_false_without_annotation() {
        let matcher = Matcher::annotation_property(COMPONENT, "connector", "property").expect("matcher");
        assert!(!matcher.matches(&TypeInfo::new("com.acme.Plain")));
    }

    #[test]
    fn test_property_matcher_false_without_element() {
        let matcher = Matcher::annotation_property(COMPONENT, "connector", "property").expect("matcher");
        let ty = osgi_type("service", strings(&["connector=x"]));
        assert!(!matcher.matches(&ty));
    }

    #[test]
    fn test_property_matcher_false_when_not_array() {
        let matcher = Matcher::annotation_property(COMPONENT, "connector", "property").expect("matcher");
        let ty = osgi_type("property", ElementValue::Const("connector=x".into()));
        assert!(!matcher.matches(&ty));
    }

    #[test]
    fn test_property_matcher_requires_equals_sign() {
        let matcher = Matcher::annotation_property(COMPONENT, "connector", "property").expect("matcher");
        assert!(!matcher.matches(&osgi_type("property", strings(&["connectors=x", "connector"]))));
        assert!(!matcher.matches(&osgi_type("property", strings(&[]))));
    }

    #[test]
    fn test_provenance_tags() {
        assert_eq!(Matcher::annotation(COMPONENT).unwrap().provenance_tag(), "Annotated");
        assert_eq!(
            Matcher::annotation_property(COMPONENT, "a", "b").unwrap().provenance_tag(),
            "Annotated"
        );
        assert_eq!(Matcher::regex(".*").unwrap().provenance_tag(), "Pattern-Matched");
        assert_eq!(Matcher::name_suffix("Impl").unwrap().provenance_tag(), "Convention-Based");
    }
}
