//! List the jobs of a workspace.

use anyhow::Result;
use console::style;

use arvak_workspace::{ContextFlags, Job, TreeItem, WorkspaceConfig};

use super::common::{Context, styled_status};

/// Execute the jobs command.
pub async fn execute(config: WorkspaceConfig, key: &str) -> Result<()> {
    let ctx = Context::open(config).await?;
    let id = ctx.resolve(key)?;
    let ws = ctx.fetch(&id).await?;

    let root = TreeItem::Workspace {
        workspace_id: ws.id.clone(),
        name: ws.name.clone(),
    };
    let jobs: Vec<TreeItem> = root
        .children(ctx.service.registry())
        .into_iter()
        .filter(|item| matches!(item, TreeItem::Job { .. }))
        .collect();

    if jobs.is_empty() {
        println!("No jobs in {}.", style(&ws.name).bold());
        return Ok(());
    }

    println!(
        "{:<38} {:<24} {:<28} {:<12} {}",
        style("ID").bold(),
        style("NAME").bold(),
        style("TARGET").bold(),
        style("STATUS").bold(),
        style("CREATED").bold()
    );
    for item in &jobs {
        if let TreeItem::Job { job, .. } = item {
            let flags = ContextFlags::for_selection(Some(item));
            println!(
                "{:<38} {:<24} {:<28} {:<12} {}{}",
                job.id,
                truncate(job.display_name(), 24),
                job.target.as_deref().unwrap_or("-"),
                styled_status(&job.status),
                created(job),
                if flags.supports_download { "  ↓" } else { "" }
            );
            if let Some(err) = &job.error_data {
                println!("    {} {}: {}", style("✗").red(), err.code, err.message);
            }
        }
    }
    Ok(())
}

fn created(job: &Job) -> String {
    job.creation_time
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
