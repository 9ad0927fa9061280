//! Read-only identifier → model resolution for the routing layer.
//!
//! Scoped lookups (a `project` is given) only consult that project, so two
//! projects carrying the same resource identifier each resolve to their own
//! configuration. Unscoped lookups scan projects in key order and return the
//! first match.

use crate::error::ValidationError;
use crate::store::RegistryStore;
use crate::types::{InheritanceMode, Project, ProjectId, Registry};
use crate::validate::validate_id;

/// Outcome of resolving a resource identifier to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelLookup {
    Configured(String),
    /// The resource exists but has no model; the caller uses its default.
    NotConfigured,
    NotFound,
}

impl ModelLookup {
    pub fn model(&self) -> Option<&str> {
        match self {
            ModelLookup::Configured(m) => Some(m),
            _ => None,
        }
    }
}

/// Projects a lookup may consult. Project keys compare case-insensitively,
/// like every other identifier in the registry.
fn candidates<'r>(
    registry: &'r Registry,
    project: Option<&ProjectId>,
) -> Box<dyn Iterator<Item = &'r Project> + 'r> {
    match project {
        Some(id) => {
            let wanted = id.0.clone();
            Box::new(
                registry
                    .projects
                    .iter()
                    .filter(move |(key, _)| key.0.eq_ignore_ascii_case(&wanted))
                    .map(|(_, p)| p),
            )
        }
        None => Box::new(registry.projects.values()),
    }
}

fn to_lookup(found: Option<Option<&String>>) -> ModelLookup {
    match found {
        Some(Some(model)) => ModelLookup::Configured(model.clone()),
        Some(None) => ModelLookup::NotConfigured,
        None => ModelLookup::NotFound,
    }
}

pub fn agent_model(
    registry: &Registry,
    agent_id: &str,
    project: Option<&ProjectId>,
) -> Result<ModelLookup, ValidationError> {
    validate_id(agent_id)?;
    let found = candidates(registry, project)
        .find_map(|p| p.agent(agent_id))
        .map(|a| a.model.as_ref());
    Ok(to_lookup(found))
}

pub fn workflow_model(
    registry: &Registry,
    workflow_id: &str,
    project: Option<&ProjectId>,
) -> Result<ModelLookup, ValidationError> {
    validate_id(workflow_id)?;
    let found = candidates(registry, project)
        .find_map(|p| p.workflow(workflow_id))
        .map(|w| w.model.as_ref());
    Ok(to_lookup(found))
}

/// Effective inheritance mode, or `None` when the workflow is unknown.
pub fn workflow_inheritance_mode(
    registry: &Registry,
    workflow_id: &str,
    project: Option<&ProjectId>,
) -> Result<Option<InheritanceMode>, ValidationError> {
    validate_id(workflow_id)?;
    Ok(candidates(registry, project)
        .find_map(|p| p.workflow(workflow_id))
        .map(|w| w.effective_inheritance_mode()))
}

pub fn detect_project<'r>(
    registry: &'r Registry,
    agent_id: &str,
) -> Result<Option<&'r ProjectId>, ValidationError> {
    validate_id(agent_id)?;
    Ok(registry
        .projects
        .values()
        .find(|p| p.agent(agent_id).is_some())
        .map(|p| &p.id))
}

pub fn detect_project_by_workflow_id<'r>(
    registry: &'r Registry,
    workflow_id: &str,
) -> Result<Option<&'r ProjectId>, ValidationError> {
    validate_id(workflow_id)?;
    Ok(registry
        .projects
        .values()
        .find(|p| p.workflow(workflow_id).is_some())
        .map(|p| &p.id))
}

/// The same queries, each against a fresh read of the store.
#[derive(Debug, Clone)]
pub struct LookupIndex {
    store: RegistryStore,
}

impl LookupIndex {
    pub fn new(store: RegistryStore) -> Self {
        Self { store }
    }

    pub fn get_model_by_agent_id(
        &self,
        agent_id: &str,
        project: Option<&ProjectId>,
    ) -> Result<ModelLookup, ValidationError> {
        agent_model(&self.store.load_or_empty(), agent_id, project)
    }

    pub fn get_model_by_workflow_id(
        &self,
        workflow_id: &str,
        project: Option<&ProjectId>,
    ) -> Result<ModelLookup, ValidationError> {
        workflow_model(&self.store.load_or_empty(), workflow_id, project)
    }

    pub fn get_workflow_inheritance_mode(
        &self,
        workflow_id: &str,
        project: Option<&ProjectId>,
    ) -> Result<Option<InheritanceMode>, ValidationError> {
        workflow_inheritance_mode(&self.store.load_or_empty(), workflow_id, project)
    }

    pub fn detect_project(&self, agent_id: &str) -> Result<Option<ProjectId>, ValidationError> {
        detect_project(&self.store.load_or_empty(), agent_id).map(|p| p.cloned())
    }

    pub fn detect_project_by_workflow_id(
        &self,
        workflow_id: &str,
    ) -> Result<Option<ProjectId>, ValidationError> {
        detect_project_by_workflow_id(&self.store.load_or_empty(), workflow_id).map(|p| p.cloned())
    }
}
