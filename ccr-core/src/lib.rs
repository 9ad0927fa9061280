//! ccr-core: registry types, validators, persistence and lookups.
//!
//! - [`types`]: newtypes and domain structs
//! - [`error`]: [`RegistryError`], [`ValidationError`]
//! - [`validate`]: identifier / model / shape validators
//! - [`atomic`]: backup-guarded file replacement
//! - [`store`]: load / save of `projects.json`
//! - [`lookup`]: identifier → model resolution
//! - [`config`]: registry location and resource layout

pub mod atomic;
pub mod config;
pub mod error;
pub mod lookup;
pub mod store;
pub mod types;
pub mod validate;

pub use config::{RegistryConfig, ResourceLayout};
pub use error::{RegistryError, ValidationError};
pub use lookup::{LookupIndex, ModelLookup};
pub use store::{LoadOutcome, RegistryStore};
pub use types::{
    AgentResource, InheritanceMode, Project, ProjectId, Registry, ResourceId, WorkflowResource,
    SCHEMA_VERSION,
};
