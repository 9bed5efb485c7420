//! # archsnap
//!
//! **Strategy-driven component discovery for compiled JVM code.**
//!
//! archsnap finds architectural components in `.class` files using
//! declarative strategies, records them as snapshots, and reports what
//! changed between runs so CI can gate on architectural drift.
//!
//! ## Pipeline
//!
//! ```text
//! strategies.json ──► strategy registry ──► matchers
//!                                              │
//! scan roots ──► classfile reader ──► scanner ◄┘ ◄── architecture model (enrichment)
//!                                       │
//!                                       ▼
//!                                   snapshot ──► canonical form + SHA-256
//!                                       │                 │
//!                                       ▼                 ▼
//!                             snapshot store ◄──── comparator ──► report / exit code
//! ```
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,no_run
//! use std::path::Path;
//! use archsnap::classfile::ClassDirSource;
//! use archsnap::config::Settings;
//! use archsnap::detect::{self, RunOptions};
//!
//! let root = Path::new(".");
//! let options = RunOptions::from_settings(root, &Settings::load(root));
//! let report = detect::run_detect(&options, &ClassDirSource::new()).unwrap();
//! println!("{}", report.render());
//! std::process::exit(report.outcome().exit_code().into());
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! archsnap baseline          # record the current architecture
//! archsnap detect            # compare against it (exit 1 on changes)
//! archsnap compare a.json b.json
//! ```

pub mod canonical;
pub mod classfile;
pub mod cli;
pub mod config;
pub mod detect;
pub mod diff;
pub mod error;
pub mod matcher;
pub mod model;
pub mod scanner;
pub mod snapshot;
pub mod strategy;

pub use canonical::{content_hash, snapshots_equal};
pub use classfile::{ClassDirSource, TypeInfo, TypeSource};
pub use config::{GlobalDiscoveryConfig, Settings, StrategyConfiguration};
pub use detect::{ChangeOutcome, RunOptions};
pub use diff::{ComparisonResult, compare};
pub use error::{ClassFileError, ConfigError, DetectError, ScanError, SnapshotError};
pub use matcher::Matcher;
pub use model::ArchitectureModel;
pub use scanner::{ContainerDiscovery, DiscoveredComponent, DiscoveryScanner};
pub use snapshot::{ComponentSnapshot, SnapshotStore};
pub use strategy::{StrategyDescriptor, StrategyKind};
