//! Download the results of a succeeded job.

use std::io::Write;
use std::path::Path;

use anyhow::{Context as _, Result};
use console::style;

use arvak_workspace::{ContextFlags, TreeItem, WorkspaceConfig};

use super::common::Context;

/// Execute the download command.
pub async fn execute(
    config: WorkspaceConfig,
    key: &str,
    job_id: &str,
    output: Option<&Path>,
) -> Result<()> {
    let ctx = Context::open(config).await?;
    let id = ctx.resolve(key)?;
    ctx.fetch(&id).await?;

    let selection = ctx
        .service
        .job_item(&id, job_id)
        .ok_or_else(|| anyhow::anyhow!("Job {job_id} not found in {key}"))?;

    if !ContextFlags::for_selection(Some(&selection)).supports_download {
        let status = match &selection {
            TreeItem::Job { job, .. } => job.status.as_str().to_string(),
            _ => "unknown".to_string(),
        };
        anyhow::bail!("Job {job_id} has no results to download (status: {status})");
    }

    let bytes = ctx
        .service
        .download_results(&selection)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Job {job_id} has no results to download"))?;

    match output {
        Some(path) => {
            std::fs::write(path, &bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{} Wrote {} bytes to {}",
                style("✓").green().bold(),
                bytes.len(),
                style(path.display()).bold()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}
