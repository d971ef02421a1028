//! Comparing a decoded snapshot against a freshly merged reference.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::Entry;

/// What to do with baseline entries whose key is absent from the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingPolicy {
    /// Skip them.
    #[default]
    Ignore,
    /// Report them as differences.
    Report,
}

/// Trims and collapses every whitespace run (newlines and NBSP included)
/// into a single space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns the baseline entries whose `original` differs from the reference
/// entry with the same key after whitespace normalization.
///
/// Output keeps baseline order. If the reference repeats a key, its first
/// occurrence is used.
pub fn diff_snapshots(
    baseline: &[Entry],
    reference: &[Entry],
    missing: MissingPolicy,
) -> Vec<Entry> {
    let mut by_key: HashMap<&str, &Entry> = HashMap::with_capacity(reference.len());
    for entry in reference {
        by_key.entry(entry.key.as_str()).or_insert(entry);
    }

    baseline
        .iter()
        .filter(|entry| match by_key.get(entry.key.as_str()) {
            Some(other) => {
                normalize_whitespace(&entry.original) != normalize_whitespace(&other.original)
            }
            None => missing == MissingPolicy::Report,
        })
        .cloned()
        .collect()
}
