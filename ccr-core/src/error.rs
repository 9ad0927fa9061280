//! Error types for ccr-core.

use std::path::PathBuf;

use thiserror::Error;

/// Rejections produced by the validators in [`crate::validate`].
///
/// Every validation runs before any state is mutated, so receiving one of
/// these means nothing was written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Identifier is not a version-4 UUID.
    #[error("invalid identifier '{value}': expected a version-4 UUID")]
    InvalidId { value: String },

    /// Model string does not have the `provider,model` shape.
    #[error("invalid model '{value}': expected \"provider,model\"")]
    InvalidModel { value: String },

    /// Model string looks like it carries credential material. The message
    /// never contains the offending value.
    #[error("model string rejected: it matches the credential pattern '{pattern}'")]
    SecretDetected { pattern: String },

    #[error("invalid inheritance mode '{value}': expected \"inherit\" or \"default\"")]
    InvalidInheritanceMode { value: String },

    /// Two resources of the same kind share an identifier inside one project.
    #[error("duplicate {kind} identifier {id} in project {project}")]
    DuplicateId {
        project: String,
        kind: &'static str,
        id: String,
    },
}

/// All errors that can arise from registry persistence.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// I/O failure, annotated with the path that was being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (save path).
    #[error("registry JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("permission denied: {path} is not writable")]
    PermissionDenied { path: PathBuf },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The in-memory document failed shape validation right before a save.
    #[error("refusing to save invalid registry: {reason}")]
    InvalidRegistry { reason: String },

    /// The on-disk document could not be parsed; mutating it would discard
    /// whatever the user had there.
    #[error("registry at {path} is corrupt ({reason}); fix or move it before making changes")]
    Corrupt { path: PathBuf, reason: String },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or CCR_PROJECTS_FILE")]
    HomeNotFound,
}

/// Convenience constructor for [`RegistryError::Io`].
pub fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.into(),
        source,
    }
}
