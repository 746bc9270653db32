//! Show providers and targets of a workspace.

use anyhow::Result;
use console::style;

use arvak_workspace::{ContextFlags, TreeItem, TreeItemKind, WorkspaceConfig};

use super::common::Context;

/// Execute the targets command.
pub async fn execute(config: WorkspaceConfig, key: &str) -> Result<()> {
    let ctx = Context::open(config).await?;
    let id = ctx.resolve(key)?;
    let ws = ctx.fetch(&id).await?;
    let registry = ctx.service.registry();

    let root = TreeItem::Workspace {
        workspace_id: ws.id.clone(),
        name: ws.name.clone(),
    };
    println!("{}", style(root.label()).bold());

    let providers: Vec<TreeItem> = root
        .children(registry)
        .into_iter()
        .filter(|item| item.kind() == TreeItemKind::Provider)
        .collect();
    if providers.is_empty() {
        println!("  No providers installed.");
        return Ok(());
    }

    for provider in providers {
        let availability = match &provider {
            TreeItem::Provider { provider_id, .. } => ws
                .provider(provider_id)
                .and_then(|p| p.current_availability.clone()),
            _ => None,
        };
        println!(
            "  {} {}",
            style(provider.label()).cyan().bold(),
            style(availability.unwrap_or_default()).dim()
        );

        for target in provider.children(registry) {
            println!("    {}", target_line(&target));
        }
    }
    Ok(())
}

fn target_line(item: &TreeItem) -> String {
    let TreeItem::Target { target, .. } = item else {
        return item.label();
    };
    let flags = ContextFlags::for_selection(Some(item));

    let mut line = format!("{:<40}", target.id);
    if flags.supports_qir {
        line.push_str(&format!(" [QIR {}]", target.profile()));
    }
    if let Some(availability) = &target.current_availability {
        line.push_str(&format!(" {availability}"));
    }
    if let Some(queue) = target.average_queue_time {
        line.push_str(&format!(" (queue ~{queue:.0}s)"));
    }
    line
}
