//! Discovery scanner: runs a container's strategies over its scan root.
//!
//! Per container the pipeline is strategies → type load → match → filter →
//! describe/tag → merge → enrich. Nothing here aborts the run: a broken
//! strategy, a missing root or an unreadable tree only shrinks the result.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::classfile::{TypeInfo, TypeSource};
use crate::config::{GlobalDiscoveryConfig, StrategyConfiguration};
use crate::matcher::Matcher;
use crate::model::{ArchitectureModel, ContainerModel, normalize_name};
use crate::strategy::{self, StrategyDescriptor};

pub const META_CANONICAL_NAME: &str = "canonicalName";
pub const META_DISCOVERED_BY: &str = "discoveredBy";

/// Default relationship label when the model leaves `type` blank.
pub const DEFAULT_RELATION_KIND: &str = "uses";

/// Functional tags keyed by the name fragment that triggers them.
const FUNCTIONAL_TAGS: [(&str, &str); 5] = [
    ("Factory", "Factory"),
    ("Impl", "Implementation"),
    ("Serializer", "Serializer"),
    ("Whiteboard", "Whiteboard"),
    ("Connector", "Connector"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredRelationship {
    pub target: String,
    pub kind: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredComponent {
    pub name: String,
    pub description: String,
    pub technology: String,
    pub tags: BTreeSet<String>,
    pub relationships: Vec<DiscoveredRelationship>,
    pub metadata: BTreeMap<String, String>,
}

impl DiscoveredComponent {
    pub fn canonical_name(&self) -> Option<&str> {
        self.metadata.get(META_CANONICAL_NAME).map(String::as_str)
    }
}

/// Discovered state of one container.
#[derive(Debug, Clone, Default)]
pub struct ContainerDiscovery {
    pub name: String,
    pub description: String,
    pub technology: String,
    /// Keyed by component name.
    pub components: BTreeMap<String, DiscoveredComponent>,
}

impl ContainerDiscovery {
    fn empty(container: &ContainerModel) -> Self {
        Self {
            name: container.name.clone(),
            description: container.description.clone(),
            technology: container.technology.clone(),
            components: BTreeMap::new(),
        }
    }
}

/// True when global filters drop this type.
pub fn is_excluded(ty: &TypeInfo, global: &GlobalDiscoveryConfig) -> bool {
    if global.exclude_inner_classes && ty.fqn.contains('$') {
        return true;
    }
    global.exclude_test_classes
        && (ty.fqn.contains(".test.") || ty.fqn.ends_with("Test") || ty.fqn.ends_with("Tests"))
}

/// Description for a component that has none, from its naming pattern.
pub fn default_description(ty: &TypeInfo, strategy_name: &str) -> String {
    let name = ty.simple_name.as_str();
    if ty.fqn.contains("Factory") {
        format!(
            "Factory component for creating {} instances",
            name.replace("Factory", "").to_lowercase()
        )
    } else if ty.fqn.contains("Impl") {
        format!("Implementation of {} interface", name.replace("Impl", ""))
    } else if ty.fqn.contains("Serializer") {
        format!(
            "Serialization component for {}",
            name.replace("Serializer", "").to_lowercase()
        )
    } else if ty.fqn.contains("Whiteboard") {
        format!(
            "OSGi whiteboard pattern implementation for {}",
            name.replace("Whiteboard", "").to_lowercase()
        )
    } else {
        format!("Component discovered by {strategy_name}")
    }
}

/// Provenance tag plus functional tags for a match.
pub fn tags_for(ty: &TypeInfo, matcher: &Matcher) -> BTreeSet<String> {
    let mut tags = BTreeSet::from([matcher.provenance_tag().to_string()]);
    for (fragment, tag) in FUNCTIONAL_TAGS {
        if ty.fqn.contains(fragment) {
            tags.insert(tag.to_string());
        }
    }
    tags
}

pub struct DiscoveryScanner<'a> {
    config: &'a StrategyConfiguration,
    source: &'a dyn TypeSource,
}

impl<'a> DiscoveryScanner<'a> {
    pub fn new(config: &'a StrategyConfiguration, source: &'a dyn TypeSource) -> Self {
        Self { config, source }
    }

    /// Discover every container in the model, in model order.
    pub fn discover_all(&self, model: &ArchitectureModel) -> Vec<ContainerDiscovery> {
        model
            .containers
            .iter()
            .map(|container| self.discover_container(container))
            .collect()
    }

    pub fn discover_container(&self, container: &ContainerModel) -> ContainerDiscovery {
        let mut discovery = ContainerDiscovery::empty(container);
        let name = container.name.as_str();

        let strategies = self.config.strategies_for_container(name);
        if strategies.is_empty() {
            info!(container = name, "no enabled strategies, skipping");
            return discovery;
        }

        let Some(root) = self.config.scan_root(name) else {
            warn!(container = name, "no scan root configured, skipping");
            return discovery;
        };
        if !root.exists() {
            warn!(container = name, root = %root.display(), "scan root does not exist, skipping");
            return discovery;
        }

        let types = match self.source.load_types(&root) {
            Ok(types) => types,
            Err(e) => {
                warn!(container = name, "type loading failed: {e}");
                return discovery;
            }
        };
        info!(container = name, types = types.len(), "loaded types");

        for descriptor in strategies {
            self.apply_strategy(&mut discovery, descriptor, &types);
        }

        match container.component_map() {
            Ok(details) if !details.is_empty() => enrich(&mut discovery, container),
            Ok(_) => {}
            Err(e) => warn!(container = name, "enrichment skipped: {e}"),
        }

        info!(
            container = name,
            components = discovery.components.len(),
            "discovery finished"
        );
        discovery
    }

    fn apply_strategy(
        &self,
        discovery: &mut ContainerDiscovery,
        descriptor: &StrategyDescriptor,
        types: &[TypeInfo],
    ) {
        let matcher = match strategy::compile(descriptor) {
            Ok(m) => m,
            Err(e) => {
                warn!(strategy = %descriptor.name, "strategy failed: {e}");
                return;
            }
        };
        let global = &self.config.global_config;
        let technology = global.default_technology(&discovery.name).to_string();
        let mut matched = 0usize;

        for ty in types.iter().filter(|ty| matcher.matches(ty)) {
            if is_excluded(ty, global) {
                debug!(strategy = %descriptor.name, fqn = %ty.fqn, "filtered");
                continue;
            }

            let tags = tags_for(ty, &matcher);
            match discovery.components.get_mut(&ty.simple_name) {
                Some(existing) if existing.canonical_name() == Some(ty.fqn.as_str()) => {
                    existing.tags.extend(tags);
                }
                Some(existing) => {
                    warn!(
                        strategy = %descriptor.name,
                        fqn = %ty.fqn,
                        existing = existing.canonical_name().unwrap_or_default(),
                        "component name collision, skipping"
                    );
                    continue;
                }
                None => {
                    let metadata = BTreeMap::from([
                        (META_CANONICAL_NAME.to_string(), ty.fqn.clone()),
                        (META_DISCOVERED_BY.to_string(), descriptor.name.clone()),
                    ]);
                    discovery.components.insert(
                        ty.simple_name.clone(),
                        DiscoveredComponent {
                            name: ty.simple_name.clone(),
                            description: default_description(ty, &descriptor.name),
                            technology: technology.clone(),
                            tags,
                            relationships: Vec::new(),
                            metadata,
                        },
                    );
                }
            }
            matched += 1;
            debug!(strategy = %descriptor.name, component = %ty.simple_name, "discovered");
        }

        info!(strategy = %descriptor.name, matched, "strategy applied");
    }
}

/// Merge declarative detail into discovered components.
///
/// Names are compared normalized. Relationships are kept only when their
/// target is a component of the same container.
pub fn enrich(discovery: &mut ContainerDiscovery, container: &ContainerModel) {
    let by_key: BTreeMap<String, String> = discovery
        .components
        .keys()
        .map(|name| (normalize_name(name), name.clone()))
        .collect();

    for detail in &container.components {
        let Some(name) = by_key.get(&normalize_name(&detail.component_name)) else {
            debug!(
                container = %discovery.name,
                component = %detail.component_name,
                "detail has no discovered component"
            );
            continue;
        };

        let mut relationships = Vec::new();
        for relation in &detail.relations {
            match by_key.get(&normalize_name(&relation.target)) {
                Some(target) => {
                    let kind = relation.kind.trim();
                    relationships.push(DiscoveredRelationship {
                        target: target.clone(),
                        kind: if kind.is_empty() {
                            DEFAULT_RELATION_KIND.to_string()
                        } else {
                            kind.to_string()
                        },
                        description: relation.description.clone(),
                    });
                }
                None => warn!(
                    container = %discovery.name,
                    component = %name,
                    target = %relation.target,
                    "relationship target not found, dropped"
                ),
            }
        }

        let Some(component) = discovery.components.get_mut(name) else {
            continue;
        };
        if let Some(technology) = detail.technology.as_deref().map(str::trim)
            && !technology.is_empty()
        {
            component.technology = technology.to_string();
        }
        if let Some(description) = detail.description.as_deref().map(str::trim)
            && !description.is_empty()
        {
            component.description = description.to_string();
        }
        component.tags.extend(detail.tag_list());
        component.relationships.extend(relationships);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{AnnotationEntry, ElementValue, descriptor_for};
    use crate::error::ScanError;
    use crate::model::{ComponentDetail, RelationDetail, TagList};
    use crate::strategy::{
        KEY_ANNOTATION_PROPERTY, KEY_ANNOTATION_TYPE, KEY_PATTERN, KEY_PROPERTY_NAME, KEY_SUFFIX,
        StrategyKind,
    };
    use std::path::Path;
    use tempfile::TempDir;

    struct MemorySource(Vec<TypeInfo>);

    impl TypeSource for MemorySource {
        fn load_types(&self, _root: &Path) -> Result<Vec<TypeInfo>, ScanError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    impl TypeSource for FailingSource {
        fn load_types(&self, root: &Path) -> Result<Vec<TypeInfo>, ScanError> {
            Err(ScanError::Walk {
                root: root.to_path_buf(),
                message: "denied".into(),
            })
        }
    }

    const COMPONENT: &str = "org.osgi.service.component.annotations.Component";

    fn config(root: &Path, strategies: Vec<StrategyDescriptor>) -> StrategyConfiguration {
        let mut config = StrategyConfiguration {
            strategies,
            ..StrategyConfiguration::default()
        };
        config
            .global_config
            .base_paths
            .insert("svc".into(), root.display().to_string());
        config
    }

    fn suffix(name: &str, value: &str) -> StrategyDescriptor {
        StrategyDescriptor::new(name, StrategyKind::NameSuffix, "svc").with_param(KEY_SUFFIX, value)
    }

    fn types() -> Vec<TypeInfo> {
        vec![
            TypeInfo::new("com.acme.UserService"),
            TypeInfo::new("com.acme.UserServiceImpl"),
            TypeInfo::new("com.acme.OrderService"),
            TypeInfo::new("com.acme.Outer$InnerService"),
            TypeInfo::new("com.acme.test.FakeService"),
            TypeInfo::new("com.acme.UserServiceTest"),
            TypeInfo::new("com.acme.WidgetFactory"),
        ]
    }

    #[test]
    fn test_suffix_strategy_with_filters() {
        let temp = TempDir::new().expect("temp dir");
        let config = config(temp.path(), vec![suffix("Services", "Service")]);
        let source = MemorySource(types());
        let scanner = DiscoveryScanner::new(&config, &source);

        let discovery = scanner.discover_container(&ContainerModel::new("svc"));
        let names: Vec<_> = discovery.components.keys().cloned().collect();
        assert_eq!(names, vec!["OrderService", "UserService"]);

        let user = &discovery.components["UserService"];
        assert_eq!(user.description, "Component discovered by Services");
        assert_eq!(user.technology, "Java");
        assert!(user.tags.contains("Convention-Based"));
        assert_eq!(user.canonical_name(), Some("com.acme.UserService"));
        assert_eq!(user.metadata[META_DISCOVERED_BY], "Services");
    }

    #[test]
    fn test_filters_can_be_disabled() {
        let temp = TempDir::new().expect("temp dir");
        let mut config = config(temp.path(), vec![suffix("Services", "Service")]);
        config.global_config.exclude_inner_classes = false;
        config.global_config.exclude_test_classes = false;
        let source = MemorySource(types());

        let discovery =
            DiscoveryScanner::new(&config, &source).discover_container(&ContainerModel::new("svc"));
        assert!(discovery.components.contains_key("Outer$InnerService"));
        assert!(discovery.components.contains_key("FakeService"));
    }

    #[test]
    fn test_descriptions_and_functional_tags() {
        let impl_ty = TypeInfo::new("com.acme.UserServiceImpl");
        assert_eq!(
            default_description(&impl_ty, "x"),
            "Implementation of UserService interface"
        );
        let factory = TypeInfo::new("com.acme.WidgetFactory");
        assert_eq!(
            default_description(&factory, "x"),
            "Factory component for creating widget instances"
        );
        let serializer = TypeInfo::new("com.acme.OrderSerializer");
        assert_eq!(
            default_description(&serializer, "x"),
            "Serialization component for order"
        );
        let whiteboard = TypeInfo::new("com.acme.ConnectorWhiteboard");
        assert_eq!(
            default_description(&whiteboard, "x"),
            "OSGi whiteboard pattern implementation for connector"
        );

        let matcher = Matcher::name_suffix("Whiteboard").expect("matcher");
        let tags = tags_for(&whiteboard, &matcher);
        let expected: BTreeSet<String> = ["Convention-Based", "Whiteboard", "Connector"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(tags, expected);
    }

    #[test]
    fn test_rediscovery_merges_tags() {
        let temp = TempDir::new().expect("temp dir");
        let config = config(
            temp.path(),
            vec![
                suffix("Services", "Service"),
                StrategyDescriptor::new("Acme", StrategyKind::Regex, "svc")
                    .with_param(KEY_PATTERN, r"com\.acme\.User.*"),
            ],
        );
        let source = MemorySource(types());
        let discovery =
            DiscoveryScanner::new(&config, &source).discover_container(&ContainerModel::new("svc"));

        let user = &discovery.components["UserService"];
        assert!(user.tags.contains("Convention-Based"));
        assert!(user.tags.contains("Pattern-Matched"));
        assert_eq!(user.metadata[META_DISCOVERED_BY], "Services");
        assert!(discovery.components.contains_key("UserServiceImpl"));
    }

    #[test]
    fn test_simple_name_collision_keeps_first() {
        let temp = TempDir::new().expect("temp dir");
        let config = config(temp.path(), vec![suffix("Services", "Service")]);
        let source = MemorySource(vec![
            TypeInfo::new("com.acme.a.UserService"),
            TypeInfo::new("com.acme.b.UserService"),
        ]);
        let discovery =
            DiscoveryScanner::new(&config, &source).discover_container(&ContainerModel::new("svc"));
        assert_eq!(discovery.components.len(), 1);
        assert_eq!(
            discovery.components["UserService"].canonical_name(),
            Some("com.acme.a.UserService")
        );
    }

    #[test]
    fn test_broken_strategy_is_isolated() {
        let temp = TempDir::new().expect("temp dir");
        let config = config(
            temp.path(),
            vec![
                StrategyDescriptor::new("Broken", StrategyKind::Annotation, "svc"),
                suffix("Services", "Service"),
            ],
        );
        let source = MemorySource(types());
        let discovery =
            DiscoveryScanner::new(&config, &source).discover_container(&ContainerModel::new("svc"));
        assert_eq!(discovery.components.len(), 2);
    }

    #[test]
    fn test_missing_root_and_no_strategies_are_noops() {
        let source = MemorySource(types());

        let no_root = config(Path::new("/definitely/not/here"), vec![suffix("S", "Service")]);
        let discovery =
            DiscoveryScanner::new(&no_root, &source).discover_container(&ContainerModel::new("svc"));
        assert!(discovery.components.is_empty());

        let temp = TempDir::new().expect("temp dir");
        let no_strategies = config(temp.path(), vec![]);
        let discovery = DiscoveryScanner::new(&no_strategies, &source)
            .discover_container(&ContainerModel::new("svc"));
        assert!(discovery.components.is_empty());
    }

    #[test]
    fn test_type_load_failure_yields_empty_container() {
        let temp = TempDir::new().expect("temp dir");
        let config = config(temp.path(), vec![suffix("S", "Service")]);
        let discovery = DiscoveryScanner::new(&config, &FailingSource)
            .discover_container(&ContainerModel::new("svc"));
        assert!(discovery.components.is_empty());
    }

    #[test]
    fn test_property_strategy_discovers_connectors() {
        let temp = TempDir::new().expect("temp dir");
        let config = config(
            temp.path(),
            vec![
                StrategyDescriptor::new("Connectors", StrategyKind::AnnotationProperty, "svc")
                    .with_param(KEY_ANNOTATION_TYPE, COMPONENT)
                    .with_param(KEY_PROPERTY_NAME, "connector")
                    .with_param(KEY_ANNOTATION_PROPERTY, "property"),
            ],
        );
        let annotated = |fqn: &str, entry: &str| {
            TypeInfo::new(fqn).with_annotation(AnnotationEntry::new(descriptor_for(COMPONENT)).with_pair(
                "property",
                ElementValue::Array(vec![ElementValue::Const(entry.to_string())]),
            ))
        };
        let source = MemorySource(vec![
            annotated("com.acme.HimsaConnector", "connector=himsa"),
            annotated("com.acme.Other", "service.ranking=1"),
        ]);

        let discovery =
            DiscoveryScanner::new(&config, &source).discover_container(&ContainerModel::new("svc"));
        let names: Vec<_> = discovery.components.keys().cloned().collect();
        assert_eq!(names, vec!["HimsaConnector"]);
        let tags = &discovery.components["HimsaConnector"].tags;
        assert!(tags.contains("Annotated") && tags.contains("Connector"));
    }

    #[test]
    fn test_enrichment_overrides_and_relations() {
        let temp = TempDir::new().expect("temp dir");
        let mut config = config(temp.path(), vec![suffix("Services", "Service")]);
        config
            .global_config
            .default_technologies
            .insert("svc".into(), "OSGi".into());

        let mut container = ContainerModel::new("svc");
        container.components.push(ComponentDetail {
            component_name: " userservice ".into(),
            technology: Some("Spring".into()),
            tags: Some(TagList::Joined("Core, Api".into())),
            description: Some("Manages users".into()),
            relations: vec![
                RelationDetail {
                    target: "OrderService".into(),
                    kind: "calls".into(),
                    description: Some("places orders".into()),
                },
                RelationDetail {
                    target: "Ghost".into(),
                    kind: "uses".into(),
                    description: None,
                },
            ],
        });
        container.components.push(ComponentDetail::new("NotDiscovered"));

        let source = MemorySource(types());
        let discovery = DiscoveryScanner::new(&config, &source).discover_container(&container);

        let user = &discovery.components["UserService"];
        assert_eq!(user.technology, "Spring");
        assert_eq!(user.description, "Manages users");
        assert!(user.tags.contains("Core") && user.tags.contains("Api"));
        assert_eq!(
            user.relationships,
            vec![DiscoveredRelationship {
                target: "OrderService".into(),
                kind: "calls".into(),
                description: Some("places orders".into()),
            }]
        );
        assert_eq!(discovery.components["OrderService"].technology, "OSGi");
        assert!(!discovery.components.contains_key("NotDiscovered"));
    }
}
