//! Arvak Workspace Command-Line Interface
//!
//! Track Azure Quantum workspaces from the terminal: connect workspaces,
//! browse providers and targets, submit QIR programs, and follow jobs until
//! they finish.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{common, download, jobs, submit, targets, watch, workspace};

/// arvak-ws - track Azure Quantum workspaces and jobs
#[derive(Parser)]
#[command(name = "arvak-ws")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (YAML)
    #[arg(long, global = true, env = "ARVAK_WS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage connected workspaces
    Workspace {
        #[command(subcommand)]
        action: WorkspaceAction,
    },

    /// Show providers and targets of a workspace
    Targets {
        /// Workspace id or name
        workspace: String,
    },

    /// List the jobs of a workspace
    Jobs {
        /// Workspace id or name
        workspace: String,
    },

    /// Submit a QIR program to a target
    Submit {
        /// Workspace id or name
        #[arg(short, long)]
        workspace: String,

        /// Provider id (e.g. ionq)
        #[arg(short, long)]
        provider: String,

        /// Target id (e.g. ionq.simulator)
        #[arg(short, long)]
        target: String,

        /// QIR bitcode file
        #[arg(short, long)]
        input: PathBuf,

        /// Number of shots
        #[arg(short, long, default_value = "100")]
        shots: u32,

        /// Job name (defaults to the input file stem)
        #[arg(short, long)]
        name: Option<String>,

        /// Entry point of the program
        #[arg(long)]
        entry_point: Option<String>,

        /// The program uses the adaptive profile
        #[arg(long)]
        adaptive: bool,

        /// Follow the job until it finishes
        #[arg(long)]
        wait: bool,
    },

    /// Refresh a workspace until no job is pending
    Watch {
        /// Workspace id or name
        workspace: String,

        /// Keep watching until this job has finished
        #[arg(short, long)]
        job: Option<String>,
    },

    /// Download the results of a succeeded job
    Download {
        /// Workspace id or name
        workspace: String,

        /// Job id
        job: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum WorkspaceAction {
    /// Connect a workspace
    Add {
        /// Connection string from the Azure portal
        #[arg(long, conflicts_with_all = ["id", "name", "endpoint", "api_key"])]
        connection_string: Option<String>,

        /// Workspace resource id
        #[arg(long, requires_all = ["name", "endpoint"])]
        id: Option<String>,

        /// Workspace name
        #[arg(long)]
        name: Option<String>,

        /// Regional endpoint (https://{location}.quantum.azure.com)
        #[arg(long)]
        endpoint: Option<String>,

        /// Directory tenant id
        #[arg(long)]
        tenant: Option<String>,

        /// Workspace access key
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Disconnect a workspace
    Remove {
        /// Workspace id or name
        workspace: String,
    },

    /// List connected workspaces
    List,
}

fn log_filter(verbose: u8, config_level: &str) -> EnvFilter {
    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config_level)),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match common::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(2);
        }
    };

    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, &config.log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Execute command
    let result = match cli.command {
        Commands::Workspace { action } => match action {
            WorkspaceAction::Add {
                connection_string,
                id,
                name,
                endpoint,
                tenant,
                api_key,
            } => {
                let source = match (connection_string, id, name, endpoint) {
                    (Some(s), ..) => workspace::AddSource::ConnectionString(s),
                    (None, Some(id), Some(name), Some(endpoint)) => workspace::AddSource::Fields {
                        id,
                        name,
                        endpoint,
                        tenant,
                        api_key,
                    },
                    _ => {
                        eprintln!(
                            "{} pass --connection-string, or --id, --name and --endpoint",
                            style("Error:").red().bold()
                        );
                        std::process::exit(2);
                    }
                };
                workspace::execute_add(config, source).await
            }
            WorkspaceAction::Remove { workspace: key } => {
                workspace::execute_remove(config, &key).await
            }
            WorkspaceAction::List => workspace::execute_list(config).await,
        },

        Commands::Targets { workspace } => targets::execute(config, &workspace).await,

        Commands::Jobs { workspace } => jobs::execute(config, &workspace).await,

        Commands::Submit {
            workspace,
            provider,
            target,
            input,
            shots,
            name,
            entry_point,
            adaptive,
            wait,
        } => {
            submit::execute(
                config,
                submit::SubmitArgs {
                    workspace,
                    provider,
                    target,
                    input,
                    shots,
                    name,
                    entry_point,
                    adaptive,
                    wait,
                },
            )
            .await
        }

        Commands::Watch { workspace, job } => watch::execute(config, &workspace, job).await,

        Commands::Download {
            workspace,
            job,
            output,
        } => download::execute(config, &workspace, &job, output.as_deref()).await,
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        for cause in e.chain().skip(1) {
            eprintln!("  {} {}", style("caused by:").dim(), cause);
        }
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workspace_add_connection_string() {
        let cli = Cli::try_parse_from([
            "arvak-ws",
            "workspace",
            "add",
            "--connection-string",
            "SubscriptionId=s;ResourceGroupName=rg;WorkspaceName=w;ApiKey=k;QuantumEndpoint=https://x",
        ])
        .unwrap();
        match cli.command {
            Commands::Workspace {
                action: WorkspaceAction::Add {
                    connection_string, ..
                },
            } => assert!(connection_string.unwrap().contains("WorkspaceName=w")),
            _ => panic!("Expected workspace add"),
        }
    }

    #[test]
    fn test_parse_workspace_add_fields() {
        let cli = Cli::try_parse_from([
            "arvak-ws",
            "workspace",
            "add",
            "--id",
            "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Quantum/Workspaces/w",
            "--name",
            "w",
            "--endpoint",
            "https://eastus.quantum.azure.com",
            "--tenant",
            "t",
        ])
        .unwrap();
        match cli.command {
            Commands::Workspace {
                action: WorkspaceAction::Add {
                    id, tenant, api_key, ..
                },
            } => {
                assert!(id.unwrap().ends_with("/Workspaces/w"));
                assert_eq!(tenant.as_deref(), Some("t"));
                assert!(api_key.is_none());
            }
            _ => panic!("Expected workspace add"),
        }
    }

    #[test]
    fn test_parse_workspace_add_id_requires_endpoint() {
        let result = Cli::try_parse_from(["arvak-ws", "workspace", "add", "--id", "/x", "--name", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_workspace_add_conflicting_sources() {
        let result = Cli::try_parse_from([
            "arvak-ws",
            "workspace",
            "add",
            "--connection-string",
            "a=b",
            "--id",
            "/x",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_submit_defaults() {
        let cli = Cli::try_parse_from([
            "arvak-ws", "submit", "-w", "ws", "-p", "ionq", "-t", "ionq.simulator", "-i",
            "bell.bc",
        ])
        .unwrap();
        match cli.command {
            Commands::Submit {
                shots,
                wait,
                adaptive,
                name,
                input,
                ..
            } => {
                assert_eq!(shots, 100);
                assert!(!wait);
                assert!(!adaptive);
                assert!(name.is_none());
                assert_eq!(input, PathBuf::from("bell.bc"));
            }
            _ => panic!("Expected submit"),
        }
    }

    #[test]
    fn test_parse_submit_missing_target() {
        let result = Cli::try_parse_from(["arvak-ws", "submit", "-w", "ws", "-p", "ionq", "-i", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_watch_with_job() {
        let cli = Cli::try_parse_from(["arvak-ws", "watch", "ws", "--job", "j1"]).unwrap();
        match cli.command {
            Commands::Watch { workspace, job } => {
                assert_eq!(workspace, "ws");
                assert_eq!(job.as_deref(), Some("j1"));
            }
            _ => panic!("Expected watch"),
        }
    }

    #[test]
    fn test_parse_download() {
        let cli =
            Cli::try_parse_from(["arvak-ws", "download", "ws", "j1", "-o", "out.json"]).unwrap();
        match cli.command {
            Commands::Download { job, output, .. } => {
                assert_eq!(job, "j1");
                assert_eq!(output, Some(PathBuf::from("out.json")));
            }
            _ => panic!("Expected download"),
        }
    }

    #[test]
    fn test_parse_verbose_is_global() {
        let cli = Cli::try_parse_from(["arvak-ws", "workspace", "list", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_log_filter_levels() {
        assert_eq!(log_filter(1, "warn").to_string(), "info");
        assert_eq!(log_filter(3, "warn").to_string(), "trace");
    }
}
