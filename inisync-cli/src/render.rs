use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use inisync::{Entry, IniDocument, Parser, pipeline};
use tracing::info;

use crate::config::Config;
use crate::validation::{validate_file_path, validate_output_dir};

/// Name of the merged reference snapshot written next to the renderings.
pub const MERGED_SNAPSHOT: &str = "merged.json";

/// Run the render command: fetch the project, render every override layer
/// and write them under `out_dir`.
///
/// With a `base` document the rendered keys are exactly the base's keys.
pub async fn run_render_command(
    config: &Config,
    out_dir: &Path,
    base: Option<&Path>,
) -> Result<()> {
    let base = match base {
        Some(path) => {
            validate_file_path(path).map_err(anyhow::Error::msg)?;
            let document = IniDocument::read_from(path)?;
            info!(path = %path.display(), keys = document.pairs.len(), "read base document");
            Some(document)
        }
        None => None,
    };
    let client = config.client()?;
    let options = config.pipeline_options().with_base(base);

    let output = pipeline::render(Arc::new(client), &options).await?;

    // Nothing touches the disk until every document is rendered.
    validate_output_dir(out_dir).map_err(anyhow::Error::msg)?;
    let written = pipeline::write_renderings(out_dir, &config.output.file_name, &output.renderings)
        .with_context(|| format!("Failed to write renderings to {}", out_dir.display()))?;

    let snapshot_path = out_dir.join(MERGED_SNAPSHOT);
    let snapshot: Vec<Entry> = output.merged_snapshot();
    snapshot
        .write_to(&snapshot_path)
        .with_context(|| format!("Failed to write {}", snapshot_path.display()))?;

    info!(
        renderings = written.len(),
        keys = snapshot.len(),
        out_dir = %out_dir.display(),
        "render finished"
    );
    Ok(())
}
