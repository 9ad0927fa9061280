//! # ccr-reconcile
//!
//! Keeps the registry, the resource files and the identifier tags inside
//! them consistent.
//!
//! [`ProjectManager`] is the collaborator-facing API: registration, rescans,
//! guarded model setters and lookups. [`inject`] owns the tag format and
//! [`rescan`] the name-based reconciliation.

pub mod error;
pub mod inject;
pub mod manager;
pub mod rescan;

pub use error::ManagerError;
pub use inject::{ensure_agent_id, ensure_workflow_id, Injection, TagStyle};
pub use manager::{ProjectManager, WorkflowConfig};
pub use rescan::{CollisionPolicy, FailedResource, RescanResult};
