//! `ccr-registry lookup agent|workflow <id>`

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use ccr_core::{InheritanceMode, ModelLookup};
use ccr_reconcile::ProjectManager;

#[derive(Subcommand, Debug)]
pub enum LookupCommand {
    /// Resolve an agent identifier.
    Agent(LookupArgs),
    /// Resolve a workflow identifier, including its inheritance mode.
    Workflow(LookupArgs),
}

#[derive(Args, Debug)]
pub struct LookupArgs {
    pub id: String,

    /// Only look inside this project.
    #[arg(long, short = 'p')]
    pub project: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct LookupJson {
    id: String,
    project: Option<String>,
    status: &'static str,
    model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inheritance_mode: Option<InheritanceMode>,
}

pub fn run(manager: &ProjectManager, cmd: LookupCommand) -> Result<()> {
    let (args, lookup, mode, project) = match cmd {
        LookupCommand::Agent(args) => {
            let lookup = manager.get_model_by_agent_id(&args.id, args.project.as_deref())?;
            let project = match &args.project {
                Some(p) => Some(p.clone()),
                None => manager.detect_project(&args.id)?.map(|p| p.0),
            };
            (args, lookup, None, project)
        }
        LookupCommand::Workflow(args) => {
            let lookup = manager.get_model_by_workflow_id(&args.id, args.project.as_deref())?;
            let mode = manager.get_workflow_inheritance_mode(&args.id, args.project.as_deref())?;
            let project = match &args.project {
                Some(p) => Some(p.clone()),
                None => manager.detect_project_by_workflow_id(&args.id)?.map(|p| p.0),
            };
            (args, lookup, mode, project)
        }
    };

    if args.json {
        let payload = LookupJson {
            id: args.id,
            project,
            status: status_key(&lookup),
            model: lookup.model().map(str::to_string),
            inheritance_mode: mode,
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    match &lookup {
        ModelLookup::Configured(model) => println!("{model}"),
        ModelLookup::NotConfigured => println!("not configured (router default)"),
        ModelLookup::NotFound => println!("not found"),
    }
    if let Some(mode) = mode {
        println!("mode: {mode}");
    }
    Ok(())
}

fn status_key(lookup: &ModelLookup) -> &'static str {
    match lookup {
        ModelLookup::Configured(_) => "configured",
        ModelLookup::NotConfigured => "not_configured",
        ModelLookup::NotFound => "not_found",
    }
}
