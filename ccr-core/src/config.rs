//! Where the registry lives and where resources are looked for.
//!
//! # Storage layout
//!
//! ```text
//! ~/.claude-code-router/
//!   projects.json          (registry, mode 0600)
//!   projects.json.backup   (transient; present only if a save was interrupted)
//! ```
//!
//! Every constructor has an explicit-home form (`at`) used by tests with a
//! `TempDir`; `from_env` derives the home from the environment.

use std::path::{Path, PathBuf};

use crate::error::RegistryError;

/// Environment variable that overrides the registry file location.
pub const PROJECTS_FILE_ENV: &str = "CCR_PROJECTS_FILE";

const ROUTER_DIR: &str = ".claude-code-router";
const PROJECTS_FILE: &str = "projects.json";

/// Registry location, injected into the store at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub registry_path: PathBuf,
}

impl RegistryConfig {
    pub fn new(registry_path: impl Into<PathBuf>) -> Self {
        Self {
            registry_path: registry_path.into(),
        }
    }

    /// `<home>/.claude-code-router/projects.json`. Pure, no I/O.
    pub fn at(home: &Path) -> Self {
        Self::new(home.join(ROUTER_DIR).join(PROJECTS_FILE))
    }

    /// `$CCR_PROJECTS_FILE` if set, else the default under the home directory.
    pub fn from_env() -> Result<Self, RegistryError> {
        if let Some(path) = std::env::var_os(PROJECTS_FILE_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(path));
        }
        let home = dirs::home_dir().ok_or(RegistryError::HomeNotFound)?;
        Ok(Self::at(&home))
    }
}

/// Conventional directory layout scanned inside a project.
///
/// Agents: `<project>/<bmad>/bmm/agents/*.md`.
/// Workflows: `<project>/<bmad>/bmm/workflows/**/workflow.yaml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLayout {
    /// Candidate names for the bmad folder. Every one that exists is scanned.
    pub bmad_folders: Vec<String>,
}

impl Default for ResourceLayout {
    fn default() -> Self {
        Self {
            bmad_folders: vec!["_bmad".to_string(), ".bmad".to_string(), "bmad".to_string()],
        }
    }
}

impl ResourceLayout {
    pub fn with_folder(folder: impl Into<String>) -> Self {
        Self {
            bmad_folders: vec![folder.into()],
        }
    }

    /// `<project>/<bmad>/bmm/agents` for each configured folder that exists.
    pub fn agent_dirs(&self, project: &Path) -> Vec<PathBuf> {
        self.existing(project, "agents")
    }

    /// `<project>/<bmad>/bmm/workflows` for each configured folder that exists.
    pub fn workflow_dirs(&self, project: &Path) -> Vec<PathBuf> {
        self.existing(project, "workflows")
    }

    fn existing(&self, project: &Path, leaf: &str) -> Vec<PathBuf> {
        self.bmad_folders
            .iter()
            .map(|folder| project.join(folder).join("bmm").join(leaf))
            .filter(|dir| dir.is_dir())
            .collect()
    }
}
