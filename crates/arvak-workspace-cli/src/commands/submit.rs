//! Submit a QIR program to a workspace target.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use console::style;

use arvak_workspace::{
    ContextFlags, StaticProgram, SubmitRequest, TargetProfile, WorkspaceConfig,
};

use super::common::Context;
use super::watch::follow;

/// Arguments of the submit command.
pub struct SubmitArgs {
    pub workspace: String,
    pub provider: String,
    pub target: String,
    pub input: PathBuf,
    pub shots: u32,
    pub name: Option<String>,
    pub entry_point: Option<String>,
    pub adaptive: bool,
    pub wait: bool,
}

/// Execute the submit command.
pub async fn execute(config: WorkspaceConfig, args: SubmitArgs) -> Result<()> {
    let payload = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let profile = if args.adaptive {
        TargetProfile::Adaptive
    } else {
        TargetProfile::Base
    };
    let program = StaticProgram::new(payload, profile);

    let ctx = Context::open(config).await?;
    let id = ctx.resolve(&args.workspace)?;
    ctx.fetch(&id).await?;

    let selection = ctx
        .service
        .target_item(&id, &args.provider, &args.target)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Target {}/{} is not available in this workspace. Use 'arvak-ws targets {}' to list targets.",
                args.provider,
                args.target,
                args.workspace
            )
        })?;
    if !ContextFlags::for_selection(Some(&selection)).supports_qir {
        anyhow::bail!("Target {} does not accept QIR programs", args.target);
    }

    let mut request = SubmitRequest::new(
        args.name.unwrap_or_else(|| job_name(&args.input)),
        args.shots,
    );
    request.entry_point = args.entry_point;

    println!(
        "{} Submitting {} to {} ({} shots)",
        style("→").cyan().bold(),
        style(args.input.display()).bold(),
        style(&args.target).cyan(),
        args.shots
    );

    // Subscribe before the submission starts its refresh cycle.
    let events = ctx.service.registry().subscribe();
    let submitted = ctx
        .service
        .submit_to_target(&selection, &program, request)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Workspace {id} is no longer connected"))?;

    println!(
        "{} Job submitted: {}",
        style("✓").green().bold(),
        style(&submitted.job_id).bold()
    );

    if args.wait {
        follow(&ctx, events, submitted.refresh, Some(&submitted.job_id)).await?;
    } else {
        println!(
            "  Use 'arvak-ws watch {} --job {}' to follow it.",
            args.workspace, submitted.job_id
        );
    }
    Ok(())
}

fn job_name(input: &Path) -> String {
    input
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("arvak-job")
        .to_string()
}
