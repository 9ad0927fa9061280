//! Domain types for the project registry.
//!
//! All path fields use `PathBuf`. All types serialize with camelCase field
//! names so the on-disk document matches `projects.json` as other tools
//! read it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Schema version stamped into every saved registry document.
pub const SCHEMA_VERSION: &str = "1.0.0";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier of a registered project (a v4 UUID string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifier embedded in an agent or workflow file (a v4 UUID string).
///
/// Stored exactly as it appears in the file tag; comparisons elsewhere are
/// case-insensitive via [`ResourceId::matches`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub String);

impl ResourceId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Whether a workflow reuses the active agent's model or falls back to the
/// router default. Absent in the document means [`InheritanceMode::Default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InheritanceMode {
    Inherit,
    #[default]
    Default,
}

impl fmt::Display for InheritanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InheritanceMode::Inherit => write!(f, "inherit"),
            InheritanceMode::Default => write!(f, "default"),
        }
    }
}

impl FromStr for InheritanceMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inherit" => Ok(Self::Inherit),
            "default" => Ok(Self::Default),
            other => Err(ValidationError::InvalidInheritanceMode {
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// An agent definition file (`<bmad>/bmm/agents/*.md`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResource {
    pub id: ResourceId,
    /// File name, e.g. `dev.md`. Reconciliation keys on this.
    pub name: String,
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A workflow directory described by `workflow.yaml` (or `instructions.md`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResource {
    pub id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inheritance_mode: Option<InheritanceMode>,
}

impl WorkflowResource {
    pub fn effective_inheritance_mode(&self) -> InheritanceMode {
        self.inheritance_mode.unwrap_or_default()
    }
}

/// A registered project tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// Absolute path to the project root. Unique across the registry.
    pub path: PathBuf,
    #[serde(default)]
    pub agents: Vec<AgentResource>,
    #[serde(default)]
    pub workflows: Vec<WorkflowResource>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Advance `updated_at`, strictly, even when the clock has not moved
    /// since the previous mutation.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::milliseconds(1)
        };
    }

    pub fn agent(&self, id: &str) -> Option<&AgentResource> {
        self.agents.iter().find(|a| a.id.matches(id))
    }

    pub fn agent_mut(&mut self, id: &str) -> Option<&mut AgentResource> {
        self.agents.iter_mut().find(|a| a.id.matches(id))
    }

    pub fn workflow(&self, id: &str) -> Option<&WorkflowResource> {
        self.workflows.iter().find(|w| w.id.matches(id))
    }

    pub fn workflow_mut(&mut self, id: &str) -> Option<&mut WorkflowResource> {
        self.workflows.iter_mut().find(|w| w.id.matches(id))
    }
}

/// Root of `projects.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    /// `None` for documents written before versioning existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub projects: BTreeMap<ProjectId, Project>,
    /// Top-level fields written by newer versions; carried through saves.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Registry {
    pub fn project(&self, id: &ProjectId) -> Option<&Project> {
        self.projects.get(id)
    }

    pub fn project_mut(&mut self, id: &ProjectId) -> Option<&mut Project> {
        self.projects.get_mut(id)
    }

    pub fn project_by_path(&self, path: &Path) -> Option<&Project> {
        self.projects.values().find(|p| p.path == path)
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        let now = Utc::now();
        Project {
            id: ProjectId::from("6f1f2a4e-8d3b-4c6a-9e2f-1a2b3c4d5e6f"),
            name: "demo".to_string(),
            path: PathBuf::from("/code/demo"),
            agents: vec![AgentResource {
                id: ResourceId::from("A1B2C3D4-E5F6-4A7B-8C9D-0E1F2A3B4C5D"),
                name: "dev.md".to_string(),
                relative_path: PathBuf::from("_bmad/bmm/agents/dev.md"),
                absolute_path: PathBuf::from("/code/demo/_bmad/bmm/agents/dev.md"),
                model: Some("openrouter,anthropic/claude-sonnet-4".to_string()),
            }],
            workflows: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn newtype_display() {
        assert_eq!(ProjectId::from("p").to_string(), "p");
        assert_eq!(ResourceId::from("r").to_string(), "r");
    }

    #[test]
    fn resource_lookup_ignores_case() {
        let p = project();
        assert!(p.agent("a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d").is_some());
    }

    #[test]
    fn touch_advances_strictly() {
        let mut p = project();
        p.updated_at = Utc::now() + Duration::hours(1);
        let before = p.updated_at;
        p.touch();
        assert!(p.updated_at > before);
    }

    #[test]
    fn absent_inheritance_mode_means_default() {
        let json = r#"{
            "id": "6f1f2a4e-8d3b-4c6a-9e2f-1a2b3c4d5e6f",
            "name": "plan",
            "relativePath": "_bmad/bmm/workflows/plan",
            "absolutePath": "/code/demo/_bmad/bmm/workflows/plan"
        }"#;
        let wf: WorkflowResource = serde_json::from_str(json).expect("deserialize");
        assert_eq!(wf.inheritance_mode, None);
        assert_eq!(wf.effective_inheritance_mode(), InheritanceMode::Default);
        assert_eq!(wf.description, "");
    }

    #[test]
    fn inheritance_mode_parses_and_rejects() {
        assert_eq!("inherit".parse::<InheritanceMode>().unwrap(), InheritanceMode::Inherit);
        assert!("Inherit".parse::<InheritanceMode>().is_err());
    }

    #[test]
    fn registry_serializes_camel_case_and_keeps_unknown_fields() {
        let mut reg = Registry::default();
        let p = project();
        reg.projects.insert(p.id.clone(), p);
        reg.extra.insert("routerHints".to_string(), serde_json::json!({"a": 1}));

        let json = serde_json::to_string(&reg).expect("serialize");
        assert!(json.contains("\"relativePath\""));
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"routerHints\""));

        let back: Registry = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, reg);
    }
}
