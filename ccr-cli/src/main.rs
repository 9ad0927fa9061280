//! ccr-registry: inspect and configure the agent/workflow project registry.
//!
//! # Usage
//!
//! ```text
//! ccr-registry project add <path>
//! ccr-registry project list [--json]
//! ccr-registry project show <project-id> [--json]
//! ccr-registry project scan <project-id>
//! ccr-registry project rescan <project-id> [--json]
//! ccr-registry project remove <project-id>
//! ccr-registry agent set-model <project-id> <agent-id> [<provider,model> | --clear]
//! ccr-registry workflow set <project-id> <workflow-id> [--model <provider,model>] [--mode inherit|default]
//! ccr-registry lookup agent|workflow <id> [--project <project-id>]
//! ```
//!
//! Global flags: `--registry <path>` overrides the registry file and
//! `--bmad-folder <name>` (repeatable) overrides the folders scanned inside a
//! project. Set `RUST_LOG` for diagnostics on stderr.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use ccr_core::{RegistryConfig, RegistryStore, ResourceLayout};
use ccr_reconcile::ProjectManager;
use commands::{
    agent::AgentCommand, lookup::LookupCommand, project::ProjectCommand,
    workflow::WorkflowCommand,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "ccr-registry",
    version,
    about = "Track agent and workflow resources across projects and assign their models",
    long_about = None,
)]
struct Cli {
    /// Registry file to use instead of $CCR_PROJECTS_FILE or
    /// ~/.claude-code-router/projects.json.
    #[arg(long, global = true, value_name = "PATH")]
    registry: Option<PathBuf>,

    /// Folder name to scan for `bmm/agents` and `bmm/workflows`. Repeatable;
    /// defaults to _bmad, .bmad and bmad.
    #[arg(long = "bmad-folder", global = true, value_name = "NAME")]
    bmad_folders: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register, inspect and reconcile projects.
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },

    /// Configure agents.
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },

    /// Configure workflows.
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommand,
    },

    /// Resolve an identifier to its configured model.
    Lookup {
        #[command(subcommand)]
        command: LookupCommand,
    },
}

impl Cli {
    fn manager(&self) -> Result<ProjectManager> {
        let config = match &self.registry {
            Some(path) => RegistryConfig::new(path),
            None => RegistryConfig::from_env().context("could not locate the registry file")?,
        };
        let layout = if self.bmad_folders.is_empty() {
            ResourceLayout::default()
        } else {
            ResourceLayout {
                bmad_folders: self.bmad_folders.clone(),
            }
        };
        Ok(ProjectManager::new(RegistryStore::new(config), layout))
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let manager = cli.manager()?;
    tracing::debug!("using registry {}", manager.store().path().display());
    match cli.command {
        Commands::Project { command } => commands::project::run(&manager, command),
        Commands::Agent { command } => commands::agent::run(&manager, command),
        Commands::Workflow { command } => commands::workflow::run(&manager, command),
        Commands::Lookup { command } => commands::lookup::run(&manager, command),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
