use std::path::Path;

use anyhow::{Context, Result};
use inisync::{Entry, MissingPolicy, Parser, diff_snapshots};
use tracing::info;

use crate::validation::validate_output_path;

/// Run the diff command over two local snapshots.
///
/// A missing or unparsable input is reported with its path and nothing is
/// written.
pub fn run_diff_command(
    baseline: &Path,
    reference: &Path,
    output: &Path,
    missing: MissingPolicy,
) -> Result<()> {
    let baseline_entries = Vec::<Entry>::read_from(baseline)?;
    let reference_entries = Vec::<Entry>::read_from(reference)?;

    let difference = diff_snapshots(&baseline_entries, &reference_entries, missing);

    validate_output_path(output).map_err(anyhow::Error::msg)?;
    difference
        .write_to(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(
        compared = baseline_entries.len(),
        changed = difference.len(),
        output = %output.display(),
        "diff finished"
    );
    Ok(())
}
