//! CLI module for the `archsnap` binary.
//!
//! # Commands
//!
//! ```text
//! archsnap baseline            scan + save, no comparison
//! archsnap detect              scan + compare with latest + save  (exit 0/1)
//! archsnap scan                scan + print, nothing saved
//! archsnap compare OLD NEW     compare two snapshot files        (exit 0/1)
//! archsnap hash FILE           content digest of a snapshot
//! archsnap validate            configuration check only
//! archsnap prune --keep N      trim snapshot history
//! ```
//!
//! Any configuration or I/O failure exits with 2.
//!
//! # Module Structure
//!
//! - [`command`] - clap types (source of truth for flags)
//! - [`dispatch`] - option resolution and command execution

pub mod command;
pub mod dispatch;

pub use command::{Cli, Command, GlobalOptions};
pub use dispatch::{execute, resolve_options, run};
