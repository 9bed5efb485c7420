//! Command-line surface: global options and subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "archsnap")]
#[command(about = "Discover JVM components by strategy, snapshot them, and detect architectural drift")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand. Flags override `.archsnap/config.toml`.
#[derive(Args, Debug, Clone)]
pub struct GlobalOptions {
    /// Project root; settings and relative paths resolve against it
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Settings file (default: <root>/.archsnap/config.toml)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Strategy configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Architecture model file
    #[arg(long, global = true)]
    pub model: Option<PathBuf>,

    /// Snapshot directory
    #[arg(long, global = true)]
    pub out: Option<PathBuf>,

    /// Abort a container's scan after this many seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Fail with a validation error when nothing is discovered
    #[arg(long, global = true)]
    pub require_components: bool,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Scan and save a baseline snapshot without comparing
    Baseline,
    /// Scan, compare with the previous snapshot, save, and report
    Detect,
    /// Scan and print discovered components
    Scan,
    /// Compare two snapshot files
    Compare {
        /// Older snapshot
        old: PathBuf,
        /// Newer snapshot
        new: PathBuf,
    },
    /// Print the content digest of a snapshot file
    Hash {
        file: PathBuf,
    },
    /// Load and validate the configuration only
    Validate,
    /// Delete old snapshot history files
    Prune {
        /// Number of history files to keep
        #[arg(long)]
        keep: usize,
    },
}
