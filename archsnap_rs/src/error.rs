//! Error types for archsnap.
//!
//! Configuration errors abort a run before any scanning starts. Class-file and
//! scan errors are isolated to the file or container that produced them.
//! Snapshot errors propagate, since a lost snapshot corrupts the next comparison.

use std::path::PathBuf;

/// Configuration and strategy validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("strategy '{strategy}': missing required parameter '{key}' for {kind} strategy")]
    MissingParameter {
        strategy: String,
        kind: &'static str,
        key: &'static str,
    },

    #[error("strategy '{strategy}': container mapping is required")]
    MissingContainerMapping { strategy: String },

    #[error("strategy '{strategy}': invalid regex pattern '{pattern}': {message}")]
    InvalidPattern {
        strategy: String,
        pattern: String,
        message: String,
    },

    #[error("{what} must not be empty")]
    EmptyIdentifier { what: &'static str },

    #[error("container '{container}': duplicate component '{component}' in component list")]
    DuplicateComponent {
        container: String,
        component: String,
    },

    #[error("duplicate container '{container}' in architecture model")]
    DuplicateContainer { container: String },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while decoding a single class file.
#[derive(Debug, thiserror::Error)]
pub enum ClassFileError {
    #[error("not a class file (magic 0x{0:08X})")]
    BadMagic(u32),

    #[error("unexpected end of class file at offset {0}")]
    Truncated(usize),

    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag { tag: u8, index: u16 },

    #[error("constant pool index {0} is invalid or of the wrong kind")]
    BadConstantIndex(u16),

    #[error("unknown element value tag '{0}'")]
    UnknownElementTag(char),
}

/// Errors raised while loading types from a scan root.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to walk {}: {message}", root.display())]
    Walk { root: PathBuf, message: String },

    #[error("scan of {} exceeded the {secs}s timeout", root.display())]
    Timeout { root: PathBuf, secs: u64 },
}

/// Snapshot persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot {} is not valid snapshot JSON: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors that end a detection workflow with a validation outcome.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("no components discovered in any container")]
    NoComponents,
}
