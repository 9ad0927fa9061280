//! Reconciliation of a project's recorded resources against its tree.
//!
//! Resources are matched by name: an agent by file name, a workflow by the
//! name its descriptor declares. Names present on disk but not in the project
//! are tagged (or have their existing tag read) and appended; names recorded
//! but no longer on disk are removed. An entry that reappears under a new
//! name with the same identifier keeps its model configuration.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use ccr_core::{AgentResource, InheritanceMode, Project, ResourceLayout, ValidationError, WorkflowResource};
use ccr_scanner::ScannedWorkflow;

use crate::error::ManagerError;
use crate::inject;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A resource that could not be registered during a rescan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedResource {
    pub name: String,
    pub path: PathBuf,
    pub error: String,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RescanResult {
    pub project_id: String,
    pub new_agents: Vec<String>,
    pub deleted_agents: Vec<String>,
    pub failed_agents: Vec<FailedResource>,
    pub new_workflows: Vec<String>,
    pub deleted_workflows: Vec<String>,
    pub failed_workflows: Vec<FailedResource>,
    pub total_agents: usize,
    pub total_workflows: usize,
}

impl RescanResult {
    pub fn has_changes(&self) -> bool {
        !(self.new_agents.is_empty()
            && self.deleted_agents.is_empty()
            && self.new_workflows.is_empty()
            && self.deleted_workflows.is_empty())
    }
}

/// What to do when a discovered resource's identifier or name is already
/// taken inside the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Record the resource as failed and carry on.
    Skip,
    /// Abort with [`ValidationError::DuplicateId`].
    Reject,
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct WorkflowConfig {
    model: Option<String>,
    inheritance_mode: Option<InheritanceMode>,
}

/// Configuration of entries removed during this pass, keyed by lower-cased
/// identifier, so a resource that comes back under another name keeps it.
#[derive(Debug, Default)]
struct Retired {
    agents: HashMap<String, Option<String>>,
    workflows: HashMap<String, WorkflowConfig>,
}

impl Retired {
    fn retire_agent(&mut self, agent: AgentResource) {
        self.agents.insert(agent.id.0.to_ascii_lowercase(), agent.model);
    }

    fn retire_workflow(&mut self, workflow: WorkflowResource) {
        self.workflows.insert(
            workflow.id.0.to_ascii_lowercase(),
            WorkflowConfig {
                model: workflow.model,
                inheritance_mode: workflow.inheritance_mode,
            },
        );
    }
}

/// Bring `project`'s resource lists in line with its directory tree.
///
/// Per-resource failures land in the result's `failed_*` lists. Only a
/// collision under [`CollisionPolicy::Reject`] aborts the pass. The caller
/// owns `updated_at` and persistence.
pub fn reconcile(
    project: &mut Project,
    layout: &ResourceLayout,
    policy: CollisionPolicy,
) -> Result<RescanResult, ManagerError> {
    reconcile_with(project, layout, policy, Retired::default())
}

/// Rebuild `project`'s resource lists from scratch.
///
/// Every resource is re-read from disk. Model and inheritance settings are
/// kept for resources whose identifier tag is unchanged. `new_*` lists
/// report every resource found and `deleted_*` lists only those that are
/// gone.
pub fn rebuild(project: &mut Project, layout: &ResourceLayout) -> Result<RescanResult, ManagerError> {
    let mut retired = Retired::default();
    let old_agents: BTreeSet<String> = project.agents.iter().map(|a| a.name.clone()).collect();
    let old_workflows: BTreeSet<String> = project.workflows.iter().map(|w| w.name.clone()).collect();
    for agent in project.agents.drain(..) {
        retired.retire_agent(agent);
    }
    for workflow in project.workflows.drain(..) {
        retired.retire_workflow(workflow);
    }

    let mut result = reconcile_with(project, layout, CollisionPolicy::Skip, retired)?;

    let kept_agents: BTreeSet<&str> = project.agents.iter().map(|a| a.name.as_str()).collect();
    let kept_workflows: BTreeSet<&str> = project.workflows.iter().map(|w| w.name.as_str()).collect();
    result.deleted_agents = old_agents
        .into_iter()
        .filter(|name| !kept_agents.contains(name.as_str()))
        .collect();
    result.deleted_workflows = old_workflows
        .into_iter()
        .filter(|name| !kept_workflows.contains(name.as_str()))
        .collect();
    Ok(result)
}

fn reconcile_with(
    project: &mut Project,
    layout: &ResourceLayout,
    policy: CollisionPolicy,
    mut retired: Retired,
) -> Result<RescanResult, ManagerError> {
    let root = project.path.clone();
    let mut result = RescanResult {
        project_id: project.id.to_string(),
        ..RescanResult::default()
    };

    reconcile_agents(project, &root, layout, policy, &mut retired, &mut result)?;
    reconcile_workflows(project, &root, layout, policy, &mut retired, &mut result)?;

    result.total_agents = project.agents.len();
    result.total_workflows = project.workflows.len();
    tracing::info!(
        "reconciled project {}: +{}/-{} agents, +{}/-{} workflows, {} failed",
        project.id,
        result.new_agents.len(),
        result.deleted_agents.len(),
        result.new_workflows.len(),
        result.deleted_workflows.len(),
        result.failed_agents.len() + result.failed_workflows.len(),
    );
    Ok(result)
}

fn reconcile_agents(
    project: &mut Project,
    root: &Path,
    layout: &ResourceLayout,
    policy: CollisionPolicy,
    retired: &mut Retired,
    result: &mut RescanResult,
) -> Result<(), ManagerError> {
    let mut on_disk: BTreeMap<String, PathBuf> = BTreeMap::new();
    for path in ccr_scanner::discover_agents(root, layout) {
        let name = file_name(&path);
        if let Some(first) = on_disk.get(&name) {
            tracing::warn!(
                "agent {} shadows {} with the same name; ignoring it",
                path.display(),
                first.display()
            );
            continue;
        }
        on_disk.insert(name, path);
    }

    let (kept, gone): (Vec<_>, Vec<_>) = std::mem::take(&mut project.agents)
        .into_iter()
        .partition(|a| on_disk.contains_key(&a.name));
    project.agents = kept;
    for agent in gone {
        tracing::debug!("agent {} no longer on disk", agent.name);
        result.deleted_agents.push(agent.name.clone());
        retired.retire_agent(agent);
    }

    for (name, path) in on_disk {
        if let Some(kept) = project.agents.iter_mut().find(|a| a.name == name) {
            if kept.absolute_path != path {
                tracing::debug!("agent {name} moved to {}", path.display());
                kept.relative_path = relative(root, &path);
                kept.absolute_path = path;
            }
            continue;
        }
        let injection = match inject::ensure_agent_id(&path) {
            Ok(injection) => injection,
            Err(e) => {
                tracing::warn!("failed to register agent {}: {e}", path.display());
                result.failed_agents.push(failure(&name, &path, &e));
                continue;
            }
        };
        if let Some(existing) = project.agent(&injection.id.0) {
            let err = ManagerError::Validation(ValidationError::DuplicateId {
                project: project.id.to_string(),
                kind: "agent",
                id: injection.id.to_string(),
            });
            if policy == CollisionPolicy::Reject {
                return Err(err);
            }
            tracing::warn!(
                "agent {} carries the identifier of {}; skipping",
                path.display(),
                existing.name
            );
            result.failed_agents.push(failure(&name, &path, &err));
            continue;
        }

        let model = retired
            .agents
            .remove(&injection.id.0.to_ascii_lowercase())
            .flatten();
        project.agents.push(AgentResource {
            id: injection.id,
            relative_path: relative(root, &path),
            absolute_path: path,
            name: name.clone(),
            model,
        });
        result.new_agents.push(name);
    }
    Ok(())
}

fn reconcile_workflows(
    project: &mut Project,
    root: &Path,
    layout: &ResourceLayout,
    policy: CollisionPolicy,
    retired: &mut Retired,
    result: &mut RescanResult,
) -> Result<(), ManagerError> {
    let mut on_disk: BTreeMap<String, ScannedWorkflow> = BTreeMap::new();
    for workflow in ccr_scanner::scan_workflows(root, layout) {
        if let Some(first) = on_disk.get(&workflow.name) {
            tracing::warn!(
                "workflow {} reuses the name '{}' of {}; ignoring it",
                workflow.dir.display(),
                workflow.name,
                first.dir.display()
            );
            continue;
        }
        on_disk.insert(workflow.name.clone(), workflow);
    }

    let (kept, gone): (Vec<_>, Vec<_>) = std::mem::take(&mut project.workflows)
        .into_iter()
        .partition(|w| on_disk.contains_key(&w.name));
    project.workflows = kept;
    for workflow in gone {
        tracing::debug!("workflow {} no longer on disk", workflow.name);
        result.deleted_workflows.push(workflow.name.clone());
        retired.retire_workflow(workflow);
    }

    for (name, scanned) in on_disk {
        if let Some(kept) = project.workflows.iter_mut().find(|w| w.name == name) {
            if kept.absolute_path != scanned.dir {
                tracing::debug!("workflow {name} moved to {}", scanned.dir.display());
                kept.relative_path = relative(root, &scanned.dir);
                kept.absolute_path = scanned.dir;
            }
            kept.description = scanned.description;
            continue;
        }
        let injection = match inject::ensure_workflow_id(&scanned) {
            Ok(injection) => injection,
            Err(e) => {
                tracing::warn!("failed to register workflow {}: {e}", scanned.dir.display());
                result.failed_workflows.push(failure(&name, &scanned.dir, &e));
                continue;
            }
        };
        if let Some(existing) = project.workflow(&injection.id.0) {
            let err = ManagerError::Validation(ValidationError::DuplicateId {
                project: project.id.to_string(),
                kind: "workflow",
                id: injection.id.to_string(),
            });
            if policy == CollisionPolicy::Reject {
                return Err(err);
            }
            tracing::warn!(
                "workflow {} carries the identifier of {}; skipping",
                scanned.dir.display(),
                existing.name
            );
            result.failed_workflows.push(failure(&name, &scanned.dir, &err));
            continue;
        }

        let config = retired.workflows.remove(&injection.id.0.to_ascii_lowercase());
        let (model, inheritance_mode) = match config {
            Some(c) => (c.model, c.inheritance_mode),
            None => (None, None),
        };
        project.workflows.push(WorkflowResource {
            id: injection.id,
            name: name.clone(),
            description: scanned.description,
            relative_path: relative(root, &scanned.dir),
            absolute_path: scanned.dir,
            model,
            inheritance_mode,
        });
        result.new_workflows.push(name);
    }
    Ok(())
}

fn failure(name: &str, path: &Path, error: &ManagerError) -> FailedResource {
    FailedResource {
        name: name.to_string(),
        path: path.to_path_buf(),
        error: error.to_string(),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn relative(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
