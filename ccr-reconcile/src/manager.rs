//! [`ProjectManager`]: the entry point for everything that changes the
//! registry.
//!
//! Every mutation is a full read-modify-write of `projects.json`: load (a
//! corrupt registry is an error here, never silently replaced), change one
//! project, bump its `updatedAt`, validate the whole document, save.
//! Explicit setters additionally re-read the project immediately before the
//! save and fail with [`ManagerError::ConcurrentModification`] if another
//! writer got there first.

use std::path::Path;

use chrono::{DateTime, Utc};

use ccr_core::{
    validate, InheritanceMode, LookupIndex, ModelLookup, Project, ProjectId, Registry,
    RegistryConfig, RegistryStore, ResourceLayout,
};

use crate::error::{io_err, ManagerError};
use crate::rescan::{self, CollisionPolicy, RescanResult};

/// Model and inheritance mode of a workflow, set together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowConfig {
    pub model: Option<String>,
    pub inheritance_mode: Option<InheritanceMode>,
}

#[derive(Debug, Clone)]
pub struct ProjectManager {
    store: RegistryStore,
    layout: ResourceLayout,
    index: LookupIndex,
}

impl ProjectManager {
    pub fn new(store: RegistryStore, layout: ResourceLayout) -> Self {
        let index = LookupIndex::new(store.clone());
        Self {
            store,
            layout,
            index,
        }
    }

    /// Manager over `<home>/.claude-code-router/projects.json` with the
    /// default layout.
    pub fn at(home: &Path) -> Self {
        Self::new(RegistryStore::at(home), ResourceLayout::default())
    }

    pub fn from_env() -> Result<Self, ManagerError> {
        let config = RegistryConfig::from_env()?;
        Ok(Self::new(RegistryStore::new(config), ResourceLayout::default()))
    }

    pub fn store(&self) -> &RegistryStore {
        &self.store
    }

    pub fn layout(&self) -> &ResourceLayout {
        &self.layout
    }

    // -----------------------------------------------------------------------
    // Registration and reconciliation
    // -----------------------------------------------------------------------

    /// Register the directory at `path` and tag every resource inside it.
    ///
    /// Two resources carrying the same identifier abort the registration.
    pub fn add_project(&self, path: &Path) -> Result<Project, ManagerError> {
        let root = path.canonicalize().map_err(|e| ManagerError::InvalidProjectPath {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !root.is_dir() {
            return Err(ManagerError::InvalidProjectPath {
                path: root,
                reason: "not a directory".to_string(),
            });
        }

        let mut registry = self.store.load_for_update()?;
        if let Some(existing) = registry.project_by_path(&root) {
            return Err(ManagerError::ProjectAlreadyRegistered {
                path: root,
                id: existing.id.to_string(),
            });
        }

        let now = Utc::now();
        let mut project = Project {
            id: ProjectId::generate(),
            name: root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| root.display().to_string()),
            path: root,
            agents: Vec::new(),
            workflows: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let result = rescan::reconcile(&mut project, &self.layout, CollisionPolicy::Reject)?;
        report_failures(&result);

        registry.projects.insert(project.id.clone(), project.clone());
        self.persist(&registry)?;
        tracing::info!(
            "registered project {} ({}) with {} agent(s) and {} workflow(s)",
            project.name,
            project.id,
            project.agents.len(),
            project.workflows.len()
        );
        Ok(project)
    }

    /// Rebuild the project's resource lists from disk, keeping model and
    /// inheritance settings of resources whose identifiers persist.
    pub fn scan_project(&self, project_id: &str) -> Result<Project, ManagerError> {
        let mut registry = self.store.load_for_update()?;
        let key = resolve(&registry, project_id)?;
        let project = registry
            .project_mut(&key)
            .ok_or_else(|| ManagerError::ProjectNotFound(project_id.to_string()))?;
        ensure_root_exists(project)?;

        let result = rescan::rebuild(project, &self.layout)?;
        report_failures(&result);
        project.touch();
        let refreshed = project.clone();

        self.persist(&registry)?;
        Ok(refreshed)
    }

    /// Reconcile the project against its directory tree and save.
    pub fn rescan_project(&self, project_id: &str) -> Result<RescanResult, ManagerError> {
        let mut registry = self.store.load_for_update()?;
        let key = resolve(&registry, project_id)?;
        let project = registry
            .project_mut(&key)
            .ok_or_else(|| ManagerError::ProjectNotFound(project_id.to_string()))?;
        ensure_root_exists(project)?;

        let result = rescan::reconcile(project, &self.layout, CollisionPolicy::Skip)?;
        report_failures(&result);
        project.touch();

        self.persist(&registry)?;
        Ok(result)
    }

    /// Unregister a project. Its files are left as they are, tags included.
    pub fn remove_project(&self, project_id: &str) -> Result<Project, ManagerError> {
        let mut registry = self.store.load_for_update()?;
        let key = resolve(&registry, project_id)?;
        let removed = registry
            .projects
            .remove(&key)
            .ok_or_else(|| ManagerError::ProjectNotFound(project_id.to_string()))?;
        self.persist(&registry)?;
        tracing::info!("removed project {} ({})", removed.name, removed.id);
        Ok(removed)
    }

    pub fn get_project(&self, project_id: &str) -> Result<Project, ManagerError> {
        let registry = self.store.load_or_empty();
        let key = resolve(&registry, project_id)?;
        registry
            .projects
            .get(&key)
            .cloned()
            .ok_or_else(|| ManagerError::ProjectNotFound(project_id.to_string()))
    }

    pub fn list_projects(&self) -> Vec<Project> {
        self.store.load_or_empty().projects.into_values().collect()
    }

    // -----------------------------------------------------------------------
    // Guarded setters
    // -----------------------------------------------------------------------

    /// Set or clear an agent's model. Returns the project's new `updatedAt`.
    ///
    /// `expected_updated_at` is the `updatedAt` the caller last saw; `None`
    /// uses the value read at the start of this call.
    pub fn set_agent_model(
        &self,
        project_id: &str,
        agent_id: &str,
        model: Option<&str>,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>, ManagerError> {
        validate::validate_id(agent_id)?;
        if let Some(model) = model {
            validate::validate_model(model)?;
        }
        self.update_project(project_id, expected_updated_at, |project| {
            let agent = project
                .agent_mut(agent_id)
                .ok_or_else(|| ManagerError::AgentNotFound {
                    project: project_id.to_string(),
                    agent: agent_id.to_string(),
                })?;
            agent.model = model.map(str::to_string);
            Ok(())
        })
    }

    pub fn set_workflow_model(
        &self,
        project_id: &str,
        workflow_id: &str,
        model: Option<&str>,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>, ManagerError> {
        validate::validate_id(workflow_id)?;
        if let Some(model) = model {
            validate::validate_model(model)?;
        }
        self.update_workflow(project_id, workflow_id, expected_updated_at, |workflow| {
            workflow.model = model.map(str::to_string);
        })
    }

    pub fn set_workflow_inheritance_mode(
        &self,
        project_id: &str,
        workflow_id: &str,
        mode: Option<InheritanceMode>,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>, ManagerError> {
        validate::validate_id(workflow_id)?;
        self.update_workflow(project_id, workflow_id, expected_updated_at, |workflow| {
            workflow.inheritance_mode = mode;
        })
    }

    /// Replace a workflow's model and inheritance mode in one save.
    pub fn set_workflow_config(
        &self,
        project_id: &str,
        workflow_id: &str,
        config: WorkflowConfig,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>, ManagerError> {
        validate::validate_id(workflow_id)?;
        if let Some(model) = &config.model {
            validate::validate_model(model)?;
        }
        self.update_workflow(project_id, workflow_id, expected_updated_at, |workflow| {
            workflow.model = config.model;
            workflow.inheritance_mode = config.inheritance_mode;
        })
    }

    fn update_workflow<F>(
        &self,
        project_id: &str,
        workflow_id: &str,
        expected_updated_at: Option<DateTime<Utc>>,
        apply: F,
    ) -> Result<DateTime<Utc>, ManagerError>
    where
        F: FnOnce(&mut ccr_core::WorkflowResource),
    {
        self.update_project(project_id, expected_updated_at, |project| {
            let workflow = project
                .workflow_mut(workflow_id)
                .ok_or_else(|| ManagerError::WorkflowNotFound {
                    project: project_id.to_string(),
                    workflow: workflow_id.to_string(),
                })?;
            apply(workflow);
            Ok(())
        })
    }

    fn update_project<F>(
        &self,
        project_id: &str,
        expected_updated_at: Option<DateTime<Utc>>,
        apply: F,
    ) -> Result<DateTime<Utc>, ManagerError>
    where
        F: FnOnce(&mut Project) -> Result<(), ManagerError>,
    {
        let registry = self.store.load_for_update()?;
        let key = resolve(&registry, project_id)?;
        let mut project = registry
            .project(&key)
            .cloned()
            .ok_or_else(|| ManagerError::ProjectNotFound(project_id.to_string()))?;
        let expected = expected_updated_at.unwrap_or(project.updated_at);
        check_unchanged(&project, expected)?;

        apply(&mut project)?;
        project.touch();
        let updated_at = project.updated_at;

        let mut latest = self.store.load_for_update()?;
        let current = latest
            .project(&key)
            .ok_or_else(|| ManagerError::ProjectNotFound(project_id.to_string()))?;
        check_unchanged(current, expected)?;

        latest.projects.insert(key, project);
        self.persist(&latest)?;
        Ok(updated_at)
    }

    fn persist(&self, registry: &Registry) -> Result<(), ManagerError> {
        validate::validate_registry(registry)?;
        self.store.save(registry)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn get_model_by_agent_id(
        &self,
        agent_id: &str,
        project_id: Option<&str>,
    ) -> Result<ModelLookup, ManagerError> {
        let project = project_id.map(ProjectId::from);
        Ok(self.index.get_model_by_agent_id(agent_id, project.as_ref())?)
    }

    pub fn get_model_by_workflow_id(
        &self,
        workflow_id: &str,
        project_id: Option<&str>,
    ) -> Result<ModelLookup, ManagerError> {
        let project = project_id.map(ProjectId::from);
        Ok(self.index.get_model_by_workflow_id(workflow_id, project.as_ref())?)
    }

    pub fn get_workflow_inheritance_mode(
        &self,
        workflow_id: &str,
        project_id: Option<&str>,
    ) -> Result<Option<InheritanceMode>, ManagerError> {
        let project = project_id.map(ProjectId::from);
        Ok(self
            .index
            .get_workflow_inheritance_mode(workflow_id, project.as_ref())?)
    }

    pub fn detect_project(&self, agent_id: &str) -> Result<Option<ProjectId>, ManagerError> {
        Ok(self.index.detect_project(agent_id)?)
    }

    pub fn detect_project_by_workflow_id(
        &self,
        workflow_id: &str,
    ) -> Result<Option<ProjectId>, ManagerError> {
        Ok(self.index.detect_project_by_workflow_id(workflow_id)?)
    }

    pub fn index(&self) -> &LookupIndex {
        &self.index
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Registry key for `project_id`, compared case-insensitively. A value that
/// is not a v4 UUID can never be registered, so it is reported as not found.
fn resolve(registry: &Registry, project_id: &str) -> Result<ProjectId, ManagerError> {
    if !validate::is_valid_id(project_id) {
        return Err(ManagerError::ProjectNotFound(project_id.to_string()));
    }
    registry
        .projects
        .keys()
        .find(|k| k.0.eq_ignore_ascii_case(project_id))
        .cloned()
        .ok_or_else(|| ManagerError::ProjectNotFound(project_id.to_string()))
}

fn check_unchanged(project: &Project, expected: DateTime<Utc>) -> Result<(), ManagerError> {
    if project.updated_at != expected {
        return Err(ManagerError::ConcurrentModification {
            project: project.id.to_string(),
            expected,
            found: project.updated_at,
        });
    }
    Ok(())
}

/// A project whose root has disappeared would otherwise reconcile to zero
/// resources.
fn ensure_root_exists(project: &Project) -> Result<(), ManagerError> {
    match std::fs::metadata(&project.path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ManagerError::InvalidProjectPath {
            path: project.path.clone(),
            reason: "not a directory".to_string(),
        }),
        Err(e) => Err(io_err(&project.path, e)),
    }
}

fn report_failures(result: &RescanResult) {
    for failed in result.failed_agents.iter().chain(&result.failed_workflows) {
        tracing::warn!("{} ({}): {}", failed.name, failed.path.display(), failed.error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project_tree() -> TempDir {
        let dir = TempDir::new().expect("project");
        let agents = dir.path().join("_bmad/bmm/agents");
        fs::create_dir_all(&agents).unwrap();
        fs::write(agents.join("dev.md"), "# Dev\n").unwrap();
        dir
    }

    #[test]
    fn invalid_project_id_is_not_found() {
        let home = TempDir::new().unwrap();
        let manager = ProjectManager::at(home.path());
        for id in ["", "nope", "../../etc"] {
            let err = manager.rescan_project(id).unwrap_err();
            assert!(matches!(err, ManagerError::ProjectNotFound(_)), "got: {err}");
        }
    }

    #[test]
    fn project_id_lookup_ignores_case() {
        let home = TempDir::new().unwrap();
        let tree = project_tree();
        let manager = ProjectManager::at(home.path());
        let project = manager.add_project(tree.path()).unwrap();

        let upper = project.id.0.to_ascii_uppercase();
        assert_eq!(manager.get_project(&upper).unwrap().id, project.id);
    }

    #[test]
    fn missing_root_is_reported_not_emptied() {
        let home = TempDir::new().unwrap();
        let tree = project_tree();
        let manager = ProjectManager::at(home.path());
        let project = manager.add_project(tree.path()).unwrap();
        let root = project.path.clone();
        drop(tree);

        let err = manager.rescan_project(&project.id.0).unwrap_err();
        assert!(matches!(err, ManagerError::Io { .. }), "got: {err}");
        assert!(!root.exists());
        assert_eq!(manager.get_project(&project.id.0).unwrap().agents.len(), 1);
    }

    #[test]
    fn setter_bumps_updated_at() {
        let home = TempDir::new().unwrap();
        let tree = project_tree();
        let manager = ProjectManager::at(home.path());
        let project = manager.add_project(tree.path()).unwrap();
        let agent = project.agents[0].id.0.clone();

        let stamp = manager
            .set_agent_model(&project.id.0, &agent, Some("openai,gpt-4o"), None)
            .unwrap();
        assert!(stamp > project.updated_at);
        assert_eq!(manager.get_project(&project.id.0).unwrap().updated_at, stamp);
    }
}
