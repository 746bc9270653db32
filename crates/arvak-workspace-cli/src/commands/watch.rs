//! Follow a workspace until none of its jobs is pending.

use anyhow::Result;
use console::style;
use tokio::sync::broadcast::{self, error::RecvError};

use arvak_workspace::{
    RefreshHandle, RefreshOutcome, RegistryEvent, WorkspaceConfig, WorkspaceConnection,
};

use super::common::{Context, spinner, styled_status};

/// Execute the watch command.
pub async fn execute(config: WorkspaceConfig, key: &str, job: Option<String>) -> Result<()> {
    let ctx = Context::open(config).await?;
    let id = ctx.resolve(key)?;

    println!(
        "{} Watching {}",
        style("→").cyan().bold(),
        style(&id).dim()
    );

    let events = ctx.service.registry().subscribe();
    let handle = ctx.service.refresh_manager().start(&id, job.clone());
    follow(&ctx, events, handle, job.as_deref()).await
}

/// Show progress of a refresh cycle until it ends, then report the outcome.
///
/// `events` must be subscribed before the cycle was started.
pub async fn follow(
    ctx: &Context,
    mut events: broadcast::Receiver<RegistryEvent>,
    handle: RefreshHandle,
    job: Option<&str>,
) -> Result<()> {
    let id = handle.workspace_id().to_string();
    let registry = ctx.service.registry();
    let spinner = spinner("Refreshing...")?;

    let outcome = handle.outcome();
    tokio::pin!(outcome);

    let outcome = loop {
        tokio::select! {
            outcome = &mut outcome => break outcome,
            event = events.recv() => match event {
                Ok(RegistryEvent::Upserted(ws_id)) if ws_id == id => {
                    if let Some(ws) = registry.get(&id) {
                        spinner.set_message(progress_message(&ws, job));
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break (&mut outcome).await,
            },
        }
    };
    spinner.finish_and_clear();

    match outcome {
        Some(RefreshOutcome::Settled { ticks }) => {
            println!(
                "{} No pending jobs after {} refresh(es)",
                style("✓").green().bold(),
                ticks
            );
            if let (Some(job_id), Some(ws)) = (job, registry.get(&id)) {
                match ws.job(job_id) {
                    Some(j) => println!("  Job {} {}", style(job_id).dim(), styled_status(&j.status)),
                    None => println!("  Job {} was never listed", style(job_id).dim()),
                }
            }
            Ok(())
        }
        Some(RefreshOutcome::Superseded) => {
            println!("{} Refresh superseded by a newer one", style("!").yellow().bold());
            Ok(())
        }
        Some(RefreshOutcome::WorkspaceRemoved) => {
            anyhow::bail!("Workspace {id} was removed while refreshing")
        }
        None => anyhow::bail!("Refresh task for {id} ended unexpectedly"),
    }
}

fn progress_message(ws: &WorkspaceConnection, job: Option<&str>) -> String {
    let pending = ws.jobs.iter().filter(|j| j.status.is_pending()).count();
    match job {
        Some(job_id) => match ws.job(job_id) {
            Some(j) => format!("Job {job_id}: {} ({pending} pending)", j.status),
            None => format!("Waiting for job {job_id} to be listed ({pending} pending)"),
        },
        None => format!("{pending} job(s) pending"),
    }
}
