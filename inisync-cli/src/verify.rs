use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use inisync::{IniDocument, MissingPolicy, Parser, pipeline};
use tracing::info;

use crate::config::Config;
use crate::validation::{validate_file_path, validate_output_dir};

pub const DECODED_SNAPSHOT: &str = "global.json";
pub const REFERENCE_SNAPSHOT: &str = "final.json";
pub const DIFFERENCE_SNAPSHOT: &str = "difference.json";

/// Run the verify command: decode a shipped document, rebuild the reference
/// from the remote project and write both snapshots plus their difference.
pub async fn run_verify_command(
    config: &Config,
    input: &Path,
    out_dir: &Path,
    missing: MissingPolicy,
) -> Result<()> {
    validate_file_path(input).map_err(anyhow::Error::msg)?;
    let document = IniDocument::read_from(input)?;

    let client = config.client()?;
    let options = config.pipeline_options();
    let files = pipeline::fetch_corpus(Arc::new(client), options.concurrency).await?;
    let verification = pipeline::verify(&document, files, &options, missing);

    validate_output_dir(out_dir).map_err(anyhow::Error::msg)?;
    for (name, entries) in [
        (DECODED_SNAPSHOT, &verification.decoded),
        (REFERENCE_SNAPSHOT, &verification.reference),
        (DIFFERENCE_SNAPSHOT, &verification.difference),
    ] {
        let path = out_dir.join(name);
        entries
            .write_to(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    info!(
        changed = verification.difference.len(),
        out_dir = %out_dir.display(),
        "verify finished"
    );
    Ok(())
}
