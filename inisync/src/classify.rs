//! Partitioning of fetched files into content files and override rule files.

use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    types::{Entry, SourceFile, display_stem},
};

/// A remote file together with all of its entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub file: SourceFile,
    pub entries: Vec<Entry>,
}

/// How override rule files are recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSelector {
    /// Folder holding override rule files.
    pub folder: String,
    /// Display stem of the baseline override file.
    pub baseline: String,
}

impl Default for RuleSelector {
    fn default() -> Self {
        RuleSelector {
            folder: "override-rules".to_string(),
            baseline: "3d-replacement".to_string(),
        }
    }
}

impl RuleSelector {
    pub fn new(folder: impl Into<String>, baseline: impl Into<String>) -> Self {
        RuleSelector {
            folder: folder.into(),
            baseline: baseline.into(),
        }
    }

    /// A file is a rule file when it sits in the rules folder, either by its
    /// folder label or by a `folder/` prefix on its name.
    pub fn is_rule_file(&self, file: &SourceFile) -> bool {
        if file.folder == self.folder {
            return true;
        }
        let nested = format!("/{}", self.folder);
        file.name
            .rsplit_once('/')
            .is_some_and(|(dir, _)| dir == self.folder || dir.ends_with(&nested))
    }

    pub fn is_baseline(&self, file: &SourceFile) -> bool {
        self.is_rule_file(file) && display_stem(&file.name) == self.baseline
    }
}

/// Whether a run may proceed without the baseline override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaselinePolicy {
    /// Missing baseline aborts the run.
    #[default]
    Required,
    /// Missing baseline layers as empty.
    Optional,
}

/// The three disjoint partitions of a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classified {
    pub baseline: Option<FetchedFile>,
    /// Named override rule files in discovery order.
    pub named: Vec<FetchedFile>,
    /// Ordinary content files in discovery order.
    pub content: Vec<FetchedFile>,
}

impl Classified {
    /// Enforces `policy` on the baseline partition.
    pub fn check_baseline(
        &self,
        selector: &RuleSelector,
        policy: BaselinePolicy,
    ) -> Result<(), Error> {
        match (policy, &self.baseline) {
            (BaselinePolicy::Required, None) => Err(Error::missing_resource(
                selector.folder.clone(),
                selector.baseline.clone(),
            )),
            _ => Ok(()),
        }
    }

    pub fn baseline_entries(&self) -> &[Entry] {
        self.baseline
            .as_ref()
            .map(|f| f.entries.as_slice())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.baseline.iter().count() + self.named.len() + self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits `files` into baseline, named overrides and content.
///
/// Every file lands in exactly one partition. When several files qualify as
/// baseline, the one with the highest id is used and the rest are treated as
/// named overrides.
pub fn classify(files: Vec<FetchedFile>, selector: &RuleSelector) -> Classified {
    let baseline_index = files
        .iter()
        .enumerate()
        .filter(|(_, f)| selector.is_baseline(&f.file))
        .fold(None::<(usize, i64)>, |best, (i, f)| match best {
            Some((_, id)) if id >= f.file.id => best,
            _ => Some((i, f.file.id)),
        })
        .map(|(i, _)| i);

    let mut classified = Classified::default();
    for (i, fetched) in files.into_iter().enumerate() {
        if Some(i) == baseline_index {
            classified.baseline = Some(fetched);
        } else if selector.is_rule_file(&fetched.file) {
            classified.named.push(fetched);
        } else {
            classified.content.push(fetched);
        }
    }
    classified
}
