//! End-to-end orchestration: fetch, classify, merge, layer, encode.
//!
//! Fetching is the only concurrent stage. Everything after the fan-in runs
//! sequentially over owned data, and every document is rendered in memory
//! before the first byte is written.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, error, info, warn};

use crate::{
    check::{Inconsistency, ItemTypeMarkers, check_consistency, check_item_types},
    classify::{BaselinePolicy, Classified, FetchedFile, RuleSelector, classify},
    diff::{MissingPolicy, diff_snapshots},
    error::Error,
    formats::IniDocument,
    layering::layer_overrides,
    merge::{TieBreak, anchor_to_base, merge_content},
    traits::CorpusReader,
    types::{Entry, MergedMapping, OverrideMapping, TextField, display_stem, validate_file_name},
};

/// Number of file fetches in flight at once unless configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Policies and naming for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub selector: RuleSelector,
    pub baseline_policy: BaselinePolicy,
    pub tie_break: TieBreak,
    pub text_field: TextField,
    /// Also render the baseline layered over nothing.
    pub render_baseline_only: bool,
    /// Also render with no overrides at all.
    pub render_plain: bool,
    pub plain_name: String,
    /// Maximum concurrent per-file fetches.
    pub concurrency: usize,
    /// Restrict the merged content to this document's keys.
    pub base: Option<IniDocument>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            selector: RuleSelector::default(),
            baseline_policy: BaselinePolicy::default(),
            tie_break: TieBreak::default(),
            text_field: TextField::default(),
            render_baseline_only: true,
            render_plain: true,
            plain_name: "plain".to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            base: None,
        }
    }
}

impl PipelineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selector(mut self, selector: RuleSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_baseline_policy(mut self, policy: BaselinePolicy) -> Self {
        self.baseline_policy = policy;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_text_field(mut self, field: TextField) -> Self {
        self.text_field = field;
        self
    }

    pub fn with_baseline_only(mut self, enabled: bool) -> Self {
        self.render_baseline_only = enabled;
        self
    }

    /// Enables the override-free rendering under `name`, or disables it.
    pub fn with_plain(mut self, name: Option<String>) -> Self {
        match name {
            Some(name) => {
                self.render_plain = true;
                self.plain_name = name;
            }
            None => self.render_plain = false,
        }
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_base(mut self, base: Option<IniDocument>) -> Self {
        self.base = base;
        self
    }
}

/// One rendered document and the directory name it is written under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendering {
    pub name: String,
    pub document: IniDocument,
}

/// Everything a render run produces.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderOutput {
    pub merged: MergedMapping,
    pub renderings: Vec<Rendering>,
}

impl RenderOutput {
    /// The merged mapping as a reference-shaped snapshot, ordered by key.
    pub fn merged_snapshot(&self) -> Vec<Entry> {
        self.merged.values().cloned().collect()
    }
}

/// Lists every remote file and fetches all of their entries.
///
/// At most `concurrency` fetches run at once. Results come back in listing
/// order whatever order the fetches finish in. The first failure aborts
/// every other fetch and is returned.
pub async fn fetch_corpus(
    reader: Arc<dyn CorpusReader>,
    concurrency: usize,
) -> Result<Vec<FetchedFile>, Error> {
    let files = reader.list_files().await?;
    info!(files = files.len(), concurrency, "listed remote files");

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for (index, file) in files.into_iter().enumerate() {
        let reader = Arc::clone(&reader);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| Error::remote_fetch("fetch pool closed", Some(Box::new(e))))?;
            let entries: Vec<Entry> = reader
                .get_entries(file.id)
                .await?
                .into_iter()
                .map(|remote| Entry::from_remote(remote, &file))
                .collect();
            debug!(file = %file, entries = entries.len(), "fetched file");
            Ok::<_, Error>((index, FetchedFile { file, entries }))
        });
    }

    let mut fetched = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        // Returning drops the set, which aborts whatever is still running.
        let result = joined
            .map_err(|e| Error::remote_fetch("fetch task did not complete", Some(Box::new(e))))?;
        fetched.push(result?);
    }
    fetched.sort_by_key(|(index, _)| *index);
    Ok(fetched.into_iter().map(|(_, file)| file).collect())
}

/// Classifies, merges and renders every document for `files`.
///
/// Renderings are one per named override file (baseline under the file's own
/// entries), then the baseline alone, then the plain rendering, each as
/// enabled. A name already taken by an earlier rendering is skipped, as is
/// any name that is not a single path component. Rule files that lost the
/// baseline role to a higher id are not rendered at all.
///
/// With [`PipelineOptions::base`] set, the merged content is anchored to the
/// base document's keys first.
pub fn build_renderings(
    files: Vec<FetchedFile>,
    options: &PipelineOptions,
) -> Result<RenderOutput, Error> {
    let classified = classify(files, &options.selector);
    if let Err(err) = classified.check_baseline(&options.selector, options.baseline_policy) {
        log_missing_baseline(&classified, &options.selector);
        return Err(err);
    }
    info!(
        content = classified.content.len(),
        named = classified.named.len(),
        baseline = classified.baseline.is_some(),
        "classified remote files"
    );
    if options.tie_break.is_order_dependent() {
        warn!("tie-break `last-seen` depends on fetch order; results may differ between runs");
    }

    let merged = merge_content(&classified.content, options.tie_break);
    let merged = match &options.base {
        Some(base) => anchor(merged, base)?,
        None => merged,
    };
    let baseline = classified.baseline_entries();
    let field = options.text_field;

    let mut layers: Vec<(String, OverrideMapping)> = classified
        .named
        .iter()
        .filter(|rule| {
            let duplicate = options.selector.is_baseline(&rule.file);
            if duplicate {
                warn!(file = %rule.file, "ignoring baseline override superseded by a higher id");
            }
            !duplicate
        })
        .map(|rule| {
            (
                rule.file.display_stem().to_string(),
                layer_overrides(baseline, &rule.entries, field),
            )
        })
        .collect();
    if options.render_baseline_only {
        if let Some(file) = &classified.baseline {
            layers.push((
                file.file.display_stem().to_string(),
                layer_overrides(baseline, &[], field),
            ));
        }
    }
    if options.render_plain {
        layers.push((
            display_stem(&options.plain_name).to_string(),
            OverrideMapping::new(),
        ));
    }

    let mut seen = HashSet::new();
    let renderings = layers
        .into_iter()
        .filter(|(name, _)| {
            if let Err(reason) = validate_file_name(name) {
                warn!(
                    name = %name,
                    reason = %reason,
                    "skipping rendering with an unusable name"
                );
                return false;
            }
            let fresh = seen.insert(name.clone());
            if !fresh {
                warn!(name = %name, "skipping rendering with a duplicate name");
            }
            fresh
        })
        .map(|(name, overrides)| Rendering {
            document: IniDocument::render(&merged, &overrides, field),
            name,
        })
        .collect();

    Ok(RenderOutput { merged, renderings })
}

fn anchor(merged: MergedMapping, base: &IniDocument) -> Result<MergedMapping, Error> {
    let anchored = anchor_to_base(merged, base)?;
    for key in &anchored.missing {
        error!(key = %key, "key missing from remote corpus; keeping base text");
    }
    info!(
        keys = anchored.merged.len(),
        missing = anchored.missing.len(),
        dropped = anchored.dropped.len(),
        "anchored merged content to base document"
    );
    Ok(anchored.merged)
}

fn log_missing_baseline(classified: &Classified, selector: &RuleSelector) {
    error!(
        folder = %selector.folder,
        baseline = %selector.baseline,
        "baseline override not found; {} files were fetched",
        classified.len()
    );
    for fetched in classified.named.iter().chain(&classified.content) {
        error!("  fetched {}", fetched.file);
    }
}

/// Writes each rendering to `<out_dir>/<name>/<file_name>`.
pub fn write_renderings(
    out_dir: impl AsRef<Path>,
    file_name: &str,
    renderings: &[Rendering],
) -> Result<Vec<PathBuf>, Error> {
    let out_dir = out_dir.as_ref();
    let mut written = Vec::with_capacity(renderings.len());
    for rendering in renderings {
        let dir = out_dir.join(&rendering.name);
        fs::create_dir_all(&dir)?;
        let path = dir.join(file_name);
        fs::write(&path, rendering.document.to_bytes())?;
        info!(path = %path.display(), keys = rendering.document.pairs.len(), "wrote rendering");
        written.push(path);
    }
    Ok(written)
}

/// Fetches and renders in one go.
pub async fn render(
    reader: Arc<dyn CorpusReader>,
    options: &PipelineOptions,
) -> Result<RenderOutput, Error> {
    let files = fetch_corpus(reader, options.concurrency).await?;
    build_renderings(files, options)
}

/// Merges content files into a reference snapshot.
///
/// Content files are folded newest `createdAt` first; rule files are
/// left out. The snapshot is ordered by key.
pub fn reference_snapshot(
    files: Vec<FetchedFile>,
    selector: &RuleSelector,
    tie_break: TieBreak,
) -> Vec<Entry> {
    let mut content: Vec<FetchedFile> = files
        .into_iter()
        .filter(|f| !selector.is_rule_file(&f.file))
        .collect();
    content.sort_by(|a, b| b.file.created_at.cmp(&a.file.created_at));
    merge_content(&content, tie_break).into_values().collect()
}

/// Outcome of comparing a rendered document against the remote corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub decoded: Vec<Entry>,
    pub reference: Vec<Entry>,
    pub difference: Vec<Entry>,
}

/// Decodes `document`, rebuilds the reference from `files`, and lists
/// decoded entries whose text no longer matches.
pub fn verify(
    document: &IniDocument,
    files: Vec<FetchedFile>,
    options: &PipelineOptions,
    missing: MissingPolicy,
) -> Verification {
    let decoded = document.to_entries();
    let reference = reference_snapshot(files, &options.selector, options.tie_break);
    let difference = diff_snapshots(&decoded, &reference, missing);
    info!(
        decoded = decoded.len(),
        reference = reference.len(),
        changed = difference.len(),
        "compared decoded document with remote corpus"
    );
    Verification {
        decoded,
        reference,
        difference,
    }
}

/// Findings of the consistency checker over merged content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckReport {
    pub inconsistencies: Vec<Inconsistency>,
    pub item_type_issues: Vec<String>,
}

/// Merges content files and runs every consistency check on the result.
///
/// Rule files are not checked: their text replaces rendered values as is
/// and is not a translation of the original.
pub fn check_corpus(
    files: Vec<FetchedFile>,
    options: &PipelineOptions,
    markers: &ItemTypeMarkers,
) -> CheckReport {
    let entries = reference_snapshot(files, &options.selector, options.tie_break);
    let report = CheckReport {
        inconsistencies: check_consistency(&entries),
        item_type_issues: check_item_types(&entries, markers),
    };
    if report.inconsistencies.is_empty() && report.item_type_issues.is_empty() {
        info!(entries = entries.len(), "no format inconsistencies found");
    } else {
        warn!(
            inconsistencies = report.inconsistencies.len(),
            item_type_issues = report.item_type_issues.len(),
            "format inconsistencies found"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{traits::Parser, types::SourceFile};
    use chrono::DateTime;

    fn entry(key: &str, text: &str, id: i64) -> Entry {
        Entry {
            key: key.to_string(),
            original: text.to_string(),
            translation: String::new(),
            context: None,
            source_id: Some(id),
            file_name: None,
            source_created_at: None,
        }
    }

    fn file(id: i64, name: &str, folder: &str, entries: Vec<Entry>) -> FetchedFile {
        FetchedFile {
            file: SourceFile {
                id,
                name: name.to_string(),
                folder: folder.to_string(),
                created_at: DateTime::from_timestamp(1_700_000_000 + id * 60, 0).unwrap(),
            },
            entries,
        }
    }

    fn corpus() -> Vec<FetchedFile> {
        vec![
            file(1, "ui.json", "", vec![entry("zeta", "v1", 1), entry("alpha", "old", 2)]),
            file(2, "items.json", "", vec![entry("alpha", "v2", 5)]),
            file(
                3,
                "override-rules/3d-replacement.json",
                "override-rules",
                vec![entry("zeta", "base", 10)],
            ),
            file(
                4,
                "override-rules/pinyin.json",
                "override-rules",
                vec![entry("alpha", "py", 11)],
            ),
        ]
    }

    fn text(rendering: &Rendering) -> String {
        String::from_utf8(rendering.document.to_bytes()[3..].to_vec()).unwrap()
    }

    #[test]
    fn test_renderings_in_order() {
        let output = build_renderings(corpus(), &PipelineOptions::default()).unwrap();
        let names: Vec<_> = output.renderings.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["pinyin", "3d-replacement", "plain"]);

        assert_eq!(text(&output.renderings[0]), "alpha=py\nzeta=base\n");
        assert_eq!(text(&output.renderings[1]), "alpha=v2\nzeta=base\n");
        assert_eq!(text(&output.renderings[2]), "alpha=v2\nzeta=v1\n");
    }

    #[test]
    fn test_optional_renderings_can_be_disabled() {
        let options = PipelineOptions::new()
            .with_baseline_only(false)
            .with_plain(None);
        let output = build_renderings(corpus(), &options).unwrap();
        assert_eq!(output.renderings.len(), 1);
        assert_eq!(output.renderings[0].name, "pinyin");
    }

    #[test]
    fn test_missing_baseline() {
        let files = vec![file(1, "ui.json", "", vec![entry("a", "1", 1)])];
        let err = build_renderings(files.clone(), &PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingRequiredResource { .. }));

        let options = PipelineOptions::new().with_baseline_policy(BaselinePolicy::Optional);
        let output = build_renderings(files, &options).unwrap();
        assert_eq!(output.renderings.len(), 1);
        assert_eq!(output.renderings[0].name, "plain");
    }

    #[test]
    fn test_duplicate_names_are_skipped() {
        let options = PipelineOptions::new().with_plain(Some("pinyin".to_string()));
        let output = build_renderings(corpus(), &options).unwrap();
        let names: Vec<_> = output.renderings.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["pinyin", "3d-replacement"]);
    }

    #[test]
    fn test_names_that_leave_the_output_dir_are_skipped() {
        let mut files = corpus();
        files.push(file(5, "override-rules/...json", "override-rules", vec![]));
        files.push(file(6, "override-rules/..json", "override-rules", vec![]));
        files.push(file(7, "override-rules/.json", "override-rules", vec![]));
        let output = build_renderings(files, &PipelineOptions::default()).unwrap();
        let names: Vec<_> = output.renderings.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["pinyin", "3d-replacement", "plain"]);

        let root = tempfile::TempDir::new().unwrap();
        let out_dir = root.path().join("out");
        write_renderings(&out_dir, "global.ini", &output.renderings).unwrap();
        let mut top: Vec<_> = fs::read_dir(root.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        top.sort();
        assert_eq!(top, vec!["out"]);
    }

    #[test]
    fn test_superseded_baseline_is_not_rendered() {
        let mut files = corpus();
        files.push(file(
            9,
            "override-rules/3d-replacement.json",
            "override-rules",
            vec![entry("zeta", "newer base", 12)],
        ));
        let output = build_renderings(files, &PipelineOptions::default()).unwrap();
        let names: Vec<_> = output.renderings.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["pinyin", "3d-replacement", "plain"]);
        assert_eq!(text(&output.renderings[0]), "alpha=py\nzeta=newer base\n");
        assert_eq!(text(&output.renderings[1]), "alpha=v2\nzeta=newer base\n");
    }

    #[test]
    fn test_base_document_anchors_merged_content() {
        let base = <IniDocument as Parser>::from_str("alpha=Alpha\nomega=Omega\n").unwrap();
        let options = PipelineOptions::new().with_base(Some(base));
        let output = build_renderings(corpus(), &options).unwrap();

        assert_eq!(output.merged.keys().collect::<Vec<_>>(), vec!["alpha", "omega"]);
        assert_eq!(output.merged["omega"].translation, "Omega");
        assert_eq!(output.merged["omega"].source_id, None);
        let plain = output.renderings.last().unwrap();
        assert_eq!(plain.name, "plain");
        assert_eq!(text(plain), "alpha=v2\nomega=Omega\n");
    }

    #[test]
    fn test_repeated_base_key_aborts() {
        let base = <IniDocument as Parser>::from_str("alpha=A\nalpha=B\n").unwrap();
        let options = PipelineOptions::new().with_base(Some(base));
        let err = build_renderings(corpus(), &options).unwrap_err();
        assert!(matches!(err, Error::BaseMismatch { merged: 1, base: 2 }));
    }

    #[test]
    fn test_merged_snapshot_excludes_rules() {
        let output = build_renderings(corpus(), &PipelineOptions::default()).unwrap();
        let snapshot = output.merged_snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].key, "alpha");
        assert_eq!(snapshot[0].source_id, Some(5));
    }

    #[test]
    fn test_write_renderings() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = build_renderings(corpus(), &PipelineOptions::default()).unwrap();
        let written = write_renderings(dir.path(), "global.ini", &output.renderings).unwrap();
        assert_eq!(written.len(), 3);
        let bytes = fs::read(dir.path().join("pinyin").join("global.ini")).unwrap();
        assert!(bytes.starts_with(&crate::formats::BOM));
    }

    #[test]
    fn test_verify_reports_changed_text() {
        let document = <IniDocument as Parser>::from_str("alpha=v2\nzeta=changed\n").unwrap();
        let verification = verify(
            &document,
            corpus(),
            &PipelineOptions::default(),
            MissingPolicy::Ignore,
        );
        assert_eq!(verification.reference.len(), 2);
        assert_eq!(verification.difference.len(), 1);
        assert_eq!(verification.difference[0].key, "zeta");
    }

    #[test]
    fn test_check_corpus_flags_broken_markup() {
        let mut broken = entry("mission", "Go to ~mission(Location)", 1);
        broken.translation = "前往".to_string();
        let report = check_corpus(
            vec![file(1, "missions.json", "", vec![broken])],
            &PipelineOptions::default(),
            &ItemTypeMarkers::default(),
        );
        assert_eq!(report.inconsistencies.len(), 1);
        assert!(report.item_type_issues.is_empty());
    }

    #[test]
    fn test_check_corpus_skips_rule_files() {
        let mut replacement = entry("mission", "Go to ~mission(Location)", 7);
        replacement.translation = "Go to Location".to_string();
        let files = vec![
            file(1, "missions.json", "", vec![entry("other", "Fine", 1)]),
            file(
                2,
                "override-rules/3d-replacement.json",
                "override-rules",
                vec![replacement],
            ),
        ];
        let report = check_corpus(files, &PipelineOptions::default(), &ItemTypeMarkers::default());
        assert!(report.inconsistencies.is_empty());
    }
}
