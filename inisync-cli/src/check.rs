use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::Arc,
};

use anyhow::{Context, Result};
use inisync::{check::ItemTypeMarkers, pipeline};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::validation::validate_output_dir;

pub const INCONSISTENCIES_REPORT: &str = "inconsistencies.json";
pub const ITEM_TYPE_REPORT: &str = "item_type_issues.json";

/// Run the check command: merge the project's content files and report
/// translations whose markup, line breaks or item numbers drifted.
///
/// Findings are a report, not a failure.
pub async fn run_check_command(config: &Config, out_dir: &Path) -> Result<()> {
    let client = config.client()?;
    let options = config.pipeline_options();
    let files = pipeline::fetch_corpus(Arc::new(client), options.concurrency).await?;
    let report = pipeline::check_corpus(files, &options, &ItemTypeMarkers::default());

    validate_output_dir(out_dir).map_err(anyhow::Error::msg)?;
    write_json(&out_dir.join(INCONSISTENCIES_REPORT), &report.inconsistencies)?;
    write_json(&out_dir.join(ITEM_TYPE_REPORT), &report.item_type_issues)?;

    for issue in &report.item_type_issues {
        warn!("{}", issue);
    }
    info!(
        inconsistencies = report.inconsistencies.len(),
        item_type_issues = report.item_type_issues.len(),
        out_dir = %out_dir.display(),
        "check finished"
    );
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
