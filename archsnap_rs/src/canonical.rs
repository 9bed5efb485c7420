//! Canonical form and content digest of a snapshot.
//!
//! The canonical form drops the volatile top-level fields, sorts every array
//! and renders compact JSON with sorted object keys. Two snapshots with the
//! same components produce the same SHA-256 regardless of discovery order.

use std::cmp::Ordering;

use rayon::prelude::*;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::snapshot::ComponentSnapshot;

/// Top-level fields that change on every run.
pub const VOLATILE_FIELDS: [&str; 3] = ["timestamp", "generatedBy", "version"];

/// Arrays at least this long are sorted on the rayon pool.
const PARALLEL_SORT_THRESHOLD: usize = 1000;

/// Snapshot as a normalized JSON tree.
pub fn canonical_value(snapshot: &ComponentSnapshot) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(snapshot)?;
    if let Value::Object(map) = &mut value {
        for field in VOLATILE_FIELDS {
            map.remove(field);
        }
    }
    normalize(&mut value);
    Ok(value)
}

/// Compact canonical JSON text.
pub fn canonical_json(snapshot: &ComponentSnapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string(&canonical_value(snapshot)?)
}

/// Lowercase hex SHA-256 of `text`.
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn content_hash(snapshot: &ComponentSnapshot) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(&canonical_json(snapshot)?))
}

/// Content equality via digests.
pub fn snapshots_equal(
    a: &ComponentSnapshot,
    b: &ComponentSnapshot,
) -> Result<bool, serde_json::Error> {
    Ok(content_hash(a)? == content_hash(b)?)
}

/// Recursively sort arrays, children first.
pub fn normalize(value: &mut Value) {
    match value {
        Value::Object(map) => map.values_mut().for_each(normalize),
        Value::Array(items) => {
            items.iter_mut().for_each(normalize);
            sort_array(items);
        }
        _ => {}
    }
}

#[derive(Clone, Copy)]
enum SortMode {
    Strings,
    Targets,
    Json,
}

fn sort_mode(items: &[Value]) -> SortMode {
    if items.iter().all(Value::is_string) {
        SortMode::Strings
    } else if items
        .iter()
        .all(|v| v.as_object().is_some_and(|o| o.contains_key("target")))
    {
        SortMode::Targets
    } else {
        SortMode::Json
    }
}

fn primary_key(value: &Value, mode: SortMode) -> String {
    let text_of = |v: &Value| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match mode {
        SortMode::Strings => text_of(value),
        SortMode::Targets => value.get("target").map(text_of).unwrap_or_default(),
        SortMode::Json => value.to_string(),
    }
}

fn sort_array(items: &mut Vec<Value>) {
    if items.len() < 2 {
        return;
    }
    let mode = sort_mode(items);
    let mut keyed: Vec<(String, String, Value)> = items
        .drain(..)
        .map(|v| (primary_key(&v, mode), v.to_string(), v))
        .collect();

    let compare = |a: &(String, String, Value), b: &(String, String, Value)| -> Ordering {
        a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1))
    };
    if keyed.len() >= PARALLEL_SORT_THRESHOLD {
        keyed.par_sort_by(compare);
    } else {
        keyed.sort_by(compare);
    }
    items.extend(keyed.into_iter().map(|(_, _, v)| v));
}
