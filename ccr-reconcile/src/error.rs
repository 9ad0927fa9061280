//! Error types for ccr-reconcile.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use ccr_core::{RegistryError, ValidationError};

/// All errors that can arise from project management and reconciliation.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// An error from the registry store.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("agent {agent} not found in project {project}")]
    AgentNotFound { project: String, agent: String },

    #[error("workflow {workflow} not found in project {project}")]
    WorkflowNotFound { project: String, workflow: String },

    #[error("{path} is already registered as project {id}")]
    ProjectAlreadyRegistered { path: PathBuf, id: String },

    #[error("cannot register {path}: {reason}")]
    InvalidProjectPath { path: PathBuf, reason: String },

    /// The project changed on disk after the caller read it.
    #[error(
        "project {project} was modified concurrently (expected updatedAt {expected}, found {found}); reload and retry"
    )]
    ConcurrentModification {
        project: String,
        expected: DateTime<Utc>,
        found: DateTime<Utc>,
    },

    /// A resource file carries an identifier tag whose value is not a v4 UUID.
    #[error("malformed identifier tag in {path}: '{value}'")]
    InvalidTag { path: PathBuf, value: String },

    #[error("permission denied: {path} is not writable")]
    PermissionDenied { path: PathBuf },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`ManagerError::Io`]; permission failures map
/// to [`ManagerError::PermissionDenied`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ManagerError {
    let path = path.into();
    match source.kind() {
        std::io::ErrorKind::PermissionDenied => ManagerError::PermissionDenied { path },
        _ => ManagerError::Io { path, source },
    }
}
