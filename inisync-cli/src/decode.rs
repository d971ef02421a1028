use std::path::Path;

use anyhow::{Context, Result};
use inisync::{Entry, IniDocument, Parser};
use tracing::info;

use crate::validation::{validate_file_path, validate_output_path};

/// Decodes a rendered document into the decoded snapshot shape.
pub fn decode_file(input: &Path) -> Result<Vec<Entry>> {
    validate_file_path(input).map_err(anyhow::Error::msg)?;
    let document = IniDocument::read_from(input)?;
    Ok(document.to_entries())
}

/// Run the decode command: `global.ini` to a JSON snapshot.
pub fn run_decode_command(input: &Path, output: &Path) -> Result<()> {
    let entries = decode_file(input)?;
    validate_output_path(output).map_err(anyhow::Error::msg)?;
    entries
        .write_to(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(
        entries = entries.len(),
        input = %input.display(),
        output = %output.display(),
        "decoded document"
    );
    Ok(())
}
