//! Dispatcher: resolves options, runs the workflow, prints the result.
//!
//! Reports go to stdout; diagnostics go to stderr through `tracing`.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::classfile::ClassDirSource;
use crate::config::Settings;
use crate::detect::{self, ChangeOutcome, RunOptions};
use crate::snapshot::ComponentSnapshot;

use super::command::{Cli, Command, GlobalOptions};

/// Merge settings with command-line overrides.
pub fn resolve_options(global: &GlobalOptions) -> RunOptions {
    let root = global.root.as_path();
    let settings = match &global.settings {
        Some(path) => Settings::load_from_path(&root.join(path)),
        None => Settings::load(root),
    };

    let mut options = RunOptions::from_settings(root, &settings);
    if let Some(config) = &global.config {
        options.strategies = root.join(config);
    }
    if let Some(model) = &global.model {
        options.model = Some(root.join(model));
    }
    if let Some(out) = &global.out {
        options.snapshot_dir = root.join(out);
    }
    if let Some(secs) = global.timeout {
        options.scan_timeout = Some(Duration::from_secs(secs));
    }
    options.require_components = global.require_components;
    options
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_components(snapshot: &ComponentSnapshot) -> String {
    let mut out = String::new();
    for (name, container) in &snapshot.containers {
        out.push_str(&format!(
            "{name} ({} components)\n",
            container.components.len()
        ));
        for component in container.components.values() {
            let tags: Vec<&str> = component.tags.iter().map(String::as_str).collect();
            out.push_str(&format!(
                "  {} [{}] {}\n",
                component.name,
                tags.join(", "),
                component.description
            ));
        }
    }
    out.push_str(&format!("Total components: {}", snapshot.component_count()));
    out
}

/// Run a parsed command line and return its outcome.
pub fn execute(cli: &Cli) -> Result<ChangeOutcome> {
    let global = &cli.global;
    let options = resolve_options(global);
    let source = ClassDirSource::new().with_timeout(options.scan_timeout);

    match &cli.command {
        Command::Baseline => {
            let report = detect::run_baseline(&options, &source).context("baseline failed")?;
            if global.json {
                print_json(&report.to_json())?;
            } else {
                println!("{}", report.render());
            }
            Ok(ChangeOutcome::NoChanges)
        }
        Command::Detect => {
            let report = detect::run_detect(&options, &source).context("change detection failed")?;
            if global.json {
                print_json(&report.to_json())?;
            } else {
                println!("{}", report.render());
            }
            Ok(report.outcome())
        }
        Command::Scan => {
            let snapshot = detect::scan_snapshot(&options, &source).context("scan failed")?;
            if global.json {
                println!("{}", snapshot.to_pretty_json()?);
            } else {
                println!("{}", render_components(&snapshot));
            }
            Ok(ChangeOutcome::NoChanges)
        }
        Command::Compare { old, new } => {
            let report = detect::compare_files(&global.root.join(old), &global.root.join(new))
                .with_context(|| format!("comparing {} with {}", old.display(), new.display()))?;
            if global.json {
                print_json(&report.to_json())?;
            } else {
                println!("{}", report.render());
            }
            Ok(report.outcome())
        }
        Command::Hash { file } => {
            let hash = detect::hash_file(&global.root.join(file))
                .with_context(|| format!("hashing {}", file.display()))?;
            if global.json {
                print_json(&serde_json::json!({ "file": file, "hash": hash }))?;
            } else {
                println!("{hash}");
            }
            Ok(ChangeOutcome::NoChanges)
        }
        Command::Validate => {
            let summary = detect::validate(&options).context("invalid configuration")?;
            if global.json {
                print_json(&serde_json::json!({
                    "valid": true,
                    "strategies": summary.strategies,
                    "enabled": summary.enabled,
                    "containers": summary.containers,
                }))?;
            } else {
                println!("{}", summary.render());
            }
            Ok(ChangeOutcome::NoChanges)
        }
        Command::Prune { keep } => {
            let removed = detect::prune(&options, *keep).context("prune failed")?;
            if global.json {
                print_json(&serde_json::json!({ "removed": removed, "kept": keep }))?;
            } else {
                println!(
                    "Removed {removed} snapshot(s) from {}",
                    options.snapshot_dir.display()
                );
            }
            Ok(ChangeOutcome::NoChanges)
        }
    }
}

/// Execute, reporting any error on stderr as a validation outcome.
pub fn run(cli: &Cli) -> ChangeOutcome {
    match execute(cli) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("[archsnap] error: {e:#}");
            ChangeOutcome::ValidationError
        }
    }
}
