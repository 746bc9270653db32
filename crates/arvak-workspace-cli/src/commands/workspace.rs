//! Workspace management commands.

use anyhow::Result;
use console::style;

use arvak_workspace::{WorkspaceConfig, WorkspaceConnection};

use super::common::Context;

/// How the user identified the workspace to add.
pub enum AddSource {
    /// Connection string copied from the portal.
    ConnectionString(String),
    /// Individual fields; authenticates with a bearer token unless an access
    /// key is given.
    Fields {
        id: String,
        name: String,
        endpoint: String,
        tenant: Option<String>,
        api_key: Option<String>,
    },
}

impl AddSource {
    fn into_connection(self) -> Result<WorkspaceConnection> {
        match self {
            AddSource::ConnectionString(s) => Ok(WorkspaceConnection::from_connection_string(&s)?),
            AddSource::Fields {
                id,
                name,
                endpoint,
                tenant,
                api_key,
            } => {
                if !id.starts_with('/') {
                    anyhow::bail!("Workspace id must be a resource id starting with '/', got '{id}'");
                }
                let mut ws = WorkspaceConnection::new(id, name, endpoint);
                if let Some(tenant) = tenant {
                    ws = ws.with_tenant(tenant);
                }
                if let Some(key) = api_key {
                    ws = ws.with_api_key(key);
                }
                Ok(ws)
            }
        }
    }
}

/// Execute `workspace add`.
pub async fn execute_add(config: WorkspaceConfig, source: AddSource) -> Result<()> {
    let ctx = Context::open(config).await?;
    let workspace = source.into_connection()?;
    let id = workspace.id.clone();

    println!(
        "{} Connecting to {}",
        style("→").cyan().bold(),
        style(&workspace.name).bold()
    );
    let pending = ctx.service.connect(workspace).await?;

    let Some(ws) = ctx.service.registry().get(&id) else {
        anyhow::bail!("Workspace {id} disappeared while adding it");
    };
    let targets: usize = ws.providers.iter().map(|p| p.targets.len()).sum();
    println!(
        "{} Added {} ({} provider(s), {} target(s), {} job(s))",
        style("✓").green().bold(),
        style(&ws.name).bold(),
        ws.providers.len(),
        targets,
        ws.jobs.len()
    );

    if pending {
        println!(
            "  {} job(s) pending. Run 'arvak-ws watch {}' to follow them.",
            ws.jobs.iter().filter(|j| j.status.is_pending()).count(),
            ws.name
        );
    }
    Ok(())
}

/// Execute `workspace remove`.
pub async fn execute_remove(config: WorkspaceConfig, key: &str) -> Result<()> {
    let ctx = Context::open(config).await?;
    let id = ctx.resolve(key)?;
    ctx.service.remove_workspace(&id).await?;

    println!("{} Removed {}", style("✓").green().bold(), style(&id).dim());
    Ok(())
}

/// Execute `workspace list`.
pub async fn execute_list(config: WorkspaceConfig) -> Result<()> {
    let ctx = Context::open(config).await?;
    let workspaces = ctx.service.registry().snapshot();

    if workspaces.is_empty() {
        println!("No workspaces connected. Use 'arvak-ws workspace add' to connect one.");
        return Ok(());
    }

    println!("{}", style("Connected workspaces:").bold());
    for ws in workspaces {
        println!(
            "  {} {} [{}]",
            style("●").green(),
            style(&ws.name).bold(),
            auth_kind(&ws)
        );
        println!("      {}", style(&ws.id).dim());
        println!("      {}", style(&ws.endpoint_uri).dim());
    }
    Ok(())
}

fn auth_kind(ws: &WorkspaceConnection) -> &'static str {
    if ws.api_key.is_some() {
        "access key"
    } else {
        "token"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_to_connection() {
        let ws = AddSource::Fields {
            id: "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Quantum/Workspaces/w".into(),
            name: "w".into(),
            endpoint: "https://westeurope.quantum.azure.com/".into(),
            tenant: Some("t".into()),
            api_key: None,
        }
        .into_connection()
        .unwrap();

        assert_eq!(ws.endpoint_uri, "https://westeurope.quantum.azure.com");
        assert_eq!(ws.tenant_id.as_deref(), Some("t"));
        assert_eq!(auth_kind(&ws), "token");
    }

    #[test]
    fn test_fields_reject_bare_id() {
        let result = AddSource::Fields {
            id: "w".into(),
            name: "w".into(),
            endpoint: "https://eastus.quantum.azure.com".into(),
            tenant: None,
            api_key: None,
        }
        .into_connection();
        assert!(result.is_err());
    }

    #[test]
    fn test_connection_string_to_connection() {
        let ws = AddSource::ConnectionString(
            "SubscriptionId=s;ResourceGroupName=rg;WorkspaceName=w;ApiKey=k;QuantumEndpoint=https://eastus.quantum.azure.com/".into(),
        )
        .into_connection()
        .unwrap();

        assert!(ws.id.ends_with("/Workspaces/w"));
        assert_eq!(auth_kind(&ws), "access key");
    }
}
