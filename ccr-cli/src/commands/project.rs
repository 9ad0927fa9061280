//! `ccr-registry project add|list|show|scan|rescan|remove`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use ccr_core::Project;
use ccr_reconcile::{FailedResource, ProjectManager, RescanResult};

/// Register, inspect and reconcile projects.
#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Register a project directory and tag its agents and workflows.
    Add {
        /// Project root (the directory containing `_bmad/`).
        path: PathBuf,
    },

    /// List registered projects.
    List {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show one project's agents and workflows.
    Show(ProjectArgs),

    /// Rebuild a project's resource lists from disk, keeping model settings.
    Scan {
        project_id: String,
    },

    /// Add new resources and drop deleted ones.
    Rescan(ProjectArgs),

    /// Unregister a project. Files and their tags are left in place.
    Remove {
        project_id: String,
    },
}

#[derive(Args, Debug)]
pub struct ProjectArgs {
    pub project_id: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(manager: &ProjectManager, cmd: ProjectCommand) -> Result<()> {
    match cmd {
        ProjectCommand::Add { path } => add(manager, path),
        ProjectCommand::List { json } => list(manager, json),
        ProjectCommand::Show(args) => show(manager, args),
        ProjectCommand::Scan { project_id } => scan(manager, &project_id),
        ProjectCommand::Rescan(args) => rescan(manager, args),
        ProjectCommand::Remove { project_id } => remove(manager, &project_id),
    }
}

fn add(manager: &ProjectManager, path: PathBuf) -> Result<()> {
    let project = manager
        .add_project(&path)
        .with_context(|| format!("failed to register {}", path.display()))?;
    println!(
        "{} Registered '{}' ({})",
        "✓".green(),
        project.name,
        project.id
    );
    println!(
        "  {} agent(s), {} workflow(s)",
        project.agents.len(),
        project.workflows.len()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// list / show
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "agents")]
    agents: usize,
    #[tabled(rename = "workflows")]
    workflows: usize,
    #[tabled(rename = "path")]
    path: String,
}

#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "kind")]
    kind: &'static str,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "model")]
    model: String,
    #[tabled(rename = "mode")]
    mode: String,
}

fn list(manager: &ProjectManager, json: bool) -> Result<()> {
    let projects = manager.list_projects();
    if json {
        println!("{}", serde_json::to_string_pretty(&projects)?);
        return Ok(());
    }
    if projects.is_empty() {
        println!("No projects registered.");
        println!("Run: ccr-registry project add <path>");
        return Ok(());
    }

    let rows: Vec<ProjectRow> = projects
        .iter()
        .map(|p| ProjectRow {
            id: p.id.to_string(),
            name: p.name.clone(),
            agents: p.agents.len(),
            workflows: p.workflows.len(),
            path: p.path.display().to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn show(manager: &ProjectManager, args: ProjectArgs) -> Result<()> {
    let project = manager.get_project(&args.project_id)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&project)?);
        return Ok(());
    }
    print_project(&project);
    Ok(())
}

fn print_project(project: &Project) {
    println!("{} ({})", project.name.bold(), project.id);
    println!("  path:    {}", project.path.display());
    println!("  updated: {}", project.updated_at.to_rfc3339());

    let unset = || "-".dimmed().to_string();
    let mut rows: Vec<ResourceRow> = project
        .agents
        .iter()
        .map(|a| ResourceRow {
            kind: "agent",
            name: a.name.clone(),
            id: a.id.to_string(),
            model: a.model.clone().unwrap_or_else(unset),
            mode: String::new(),
        })
        .collect();
    rows.extend(project.workflows.iter().map(|w| ResourceRow {
        kind: "workflow",
        name: w.name.clone(),
        id: w.id.to_string(),
        model: w.model.clone().unwrap_or_else(unset),
        mode: w.effective_inheritance_mode().to_string(),
    }));

    if rows.is_empty() {
        println!("\nNo agents or workflows found.");
        return;
    }
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("\n{table}");
}

// ---------------------------------------------------------------------------
// scan / rescan / remove
// ---------------------------------------------------------------------------

fn scan(manager: &ProjectManager, project_id: &str) -> Result<()> {
    let project = manager
        .scan_project(project_id)
        .with_context(|| format!("failed to scan project {project_id}"))?;
    println!("{} Rescanned '{}' from disk", "✓".green(), project.name);
    print_project(&project);
    Ok(())
}

#[derive(Serialize)]
struct RescanJson<'a> {
    project_id: &'a str,
    new_agents: &'a [String],
    deleted_agents: &'a [String],
    failed_agents: Vec<FailedJson<'a>>,
    new_workflows: &'a [String],
    deleted_workflows: &'a [String],
    failed_workflows: Vec<FailedJson<'a>>,
    total_agents: usize,
    total_workflows: usize,
}

#[derive(Serialize)]
struct FailedJson<'a> {
    name: &'a str,
    path: String,
    error: &'a str,
}

impl<'a> From<&'a FailedResource> for FailedJson<'a> {
    fn from(f: &'a FailedResource) -> Self {
        Self {
            name: &f.name,
            path: f.path.display().to_string(),
            error: &f.error,
        }
    }
}

fn rescan(manager: &ProjectManager, args: ProjectArgs) -> Result<()> {
    let result = manager
        .rescan_project(&args.project_id)
        .with_context(|| format!("failed to rescan project {}", args.project_id))?;
    if args.json {
        let payload = RescanJson {
            project_id: &result.project_id,
            new_agents: &result.new_agents,
            deleted_agents: &result.deleted_agents,
            failed_agents: result.failed_agents.iter().map(FailedJson::from).collect(),
            new_workflows: &result.new_workflows,
            deleted_workflows: &result.deleted_workflows,
            failed_workflows: result.failed_workflows.iter().map(FailedJson::from).collect(),
            total_agents: result.total_agents,
            total_workflows: result.total_workflows,
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    print_rescan(&result);
    Ok(())
}

fn print_rescan(result: &RescanResult) {
    if !result.has_changes() && result.failed_agents.is_empty() && result.failed_workflows.is_empty()
    {
        println!("{} No changes", "✓".green());
    }
    for name in &result.new_agents {
        println!("  {} agent {name}", "+".green());
    }
    for name in &result.deleted_agents {
        println!("  {} agent {name}", "-".red());
    }
    for name in &result.new_workflows {
        println!("  {} workflow {name}", "+".green());
    }
    for name in &result.deleted_workflows {
        println!("  {} workflow {name}", "-".red());
    }
    for failed in result.failed_agents.iter().chain(&result.failed_workflows) {
        println!("  {} {}: {}", "!".yellow(), failed.name, failed.error);
    }
    println!(
        "{} agent(s), {} workflow(s)",
        result.total_agents, result.total_workflows
    );
}

fn remove(manager: &ProjectManager, project_id: &str) -> Result<()> {
    let project = manager.remove_project(project_id)?;
    println!("{} Removed '{}' ({})", "✓".green(), project.name, project.id);
    Ok(())
}
