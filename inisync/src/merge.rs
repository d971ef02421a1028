//! Folding content files into a single key → entry mapping.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    classify::FetchedFile,
    error::Error,
    formats::IniDocument,
    types::{Entry, MergedMapping},
};

/// Strategy for resolving a key that appears in more than one content file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Keep the entry with the largest remote id; exact ties keep the first
    /// seen. Independent of fetch order.
    #[default]
    HighestId,
    /// Keep the entry seen last. Depends on iteration order.
    LastSeen,
}

impl TieBreak {
    /// Whether the result can change with the order files are folded in.
    pub fn is_order_dependent(self) -> bool {
        matches!(self, TieBreak::LastSeen)
    }
}

impl FromStr for TieBreak {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "highest-id" | "id" => Ok(TieBreak::HighestId),
            "last-seen" | "last" => Ok(TieBreak::LastSeen),
            other => Err(Error::InvalidConfig(format!("unknown tie-break `{}`", other))),
        }
    }
}

/// Folds one more entry into `merged` according to `tie_break`.
pub fn merge_entry(mut merged: MergedMapping, entry: Entry, tie_break: TieBreak) -> MergedMapping {
    // Absent ids rank below every remote id.
    let keep_current = tie_break == TieBreak::HighestId
        && merged.get(&entry.key).is_some_and(|current| {
            entry.source_id.unwrap_or(-1) <= current.source_id.unwrap_or(-1)
        });
    if !keep_current {
        merged.insert(entry.key.clone(), entry);
    }
    merged
}

/// Merges every content file's entries, files in the order given.
///
/// The result holds the union of all keys; under [`TieBreak::HighestId`]
/// each key maps to the entry with the largest `source_id`.
pub fn merge_content(files: &[FetchedFile], tie_break: TieBreak) -> MergedMapping {
    files
        .iter()
        .flat_map(|f| f.entries.iter().cloned())
        .fold(MergedMapping::new(), |merged, entry| {
            merge_entry(merged, entry, tie_break)
        })
}

/// Merges loose entry lists, e.g. several snapshots.
pub fn merge_entries<I>(entries: I, tie_break: TieBreak) -> MergedMapping
where
    I: IntoIterator<Item = Entry>,
{
    entries
        .into_iter()
        .fold(MergedMapping::new(), |merged, entry| {
            merge_entry(merged, entry, tie_break)
        })
}

/// A merged mapping restricted to the keys of a base document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Anchored {
    pub merged: MergedMapping,
    /// Base keys the corpus had no entry for, in base order.
    pub missing: Vec<String>,
    /// Merged keys the base does not know about.
    pub dropped: Vec<String>,
}

/// Keeps exactly the keys of `base`.
///
/// Merged entries for base keys are kept as they are. A base key with no
/// merged entry gets the base text as both original and translation and no
/// id. Keys the base lacks are dropped. A base that repeats a key cannot be
/// anchored to and yields [`Error::BaseMismatch`].
pub fn anchor_to_base(mut merged: MergedMapping, base: &IniDocument) -> Result<Anchored, Error> {
    let mut anchored = MergedMapping::new();
    let mut missing = Vec::new();
    for pair in &base.pairs {
        if anchored.contains_key(&pair.key) {
            continue;
        }
        let entry = match merged.remove(&pair.key) {
            Some(entry) => entry,
            None => {
                missing.push(pair.key.clone());
                Entry {
                    translation: pair.value.clone(),
                    ..Entry::decoded(&pair.key, &pair.value)
                }
            }
        };
        anchored.insert(pair.key.clone(), entry);
    }

    if anchored.len() != base.pairs.len() {
        return Err(Error::BaseMismatch {
            merged: anchored.len(),
            base: base.pairs.len(),
        });
    }
    Ok(Anchored {
        merged: anchored,
        missing,
        dropped: merged.into_keys().collect(),
    })
}
