//! Registry persistence.
//!
//! `load` never fails: a missing file is an empty registry, and an unreadable
//! or malformed one is reported as [`LoadOutcome::Corrupt`] so the caller can
//! decide whether degrading to "no resources known" is acceptable. `save`
//! validates the whole document, stamps [`SCHEMA_VERSION`] and replaces the
//! file through [`crate::atomic::write_atomic`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::atomic;
use crate::config::RegistryConfig;
use crate::error::{io_err, RegistryError};
use crate::types::{Registry, SCHEMA_VERSION};
use crate::validate;

/// Result of reading the registry file.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The file parsed and passed shape validation.
    Loaded(Registry),
    /// No file yet (or a blank one).
    Empty,
    /// The file exists but could not be read, parsed or typed.
    Corrupt { reason: String },
}

impl LoadOutcome {
    /// Collapse to a registry, treating corruption as empty.
    pub fn into_registry(self) -> Registry {
        match self {
            LoadOutcome::Loaded(registry) => registry,
            LoadOutcome::Empty | LoadOutcome::Corrupt { .. } => Registry::default(),
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, LoadOutcome::Corrupt { .. })
    }
}

/// Owner of the registry file.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    config: RegistryConfig,
}

impl RegistryStore {
    pub fn new(config: RegistryConfig) -> Self {
        Self { config }
    }

    /// Store rooted at `<home>/.claude-code-router/projects.json`.
    pub fn at(home: &Path) -> Self {
        Self::new(RegistryConfig::at(home))
    }

    pub fn path(&self) -> &Path {
        &self.config.registry_path
    }

    pub fn load(&self) -> LoadOutcome {
        let path = self.path();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("no registry at {}; starting empty", path.display());
                return LoadOutcome::Empty;
            }
            Err(e) => return corrupt(path, format!("unreadable: {e}")),
        };
        if text.trim().is_empty() {
            return LoadOutcome::Empty;
        }

        let doc: serde_json::Value = match json5::from_str(&text) {
            Ok(doc) => doc,
            Err(e) => return corrupt(path, format!("parse error: {e}")),
        };
        if let Err(reason) = validate::validate_document_shape(&doc) {
            return corrupt(path, reason);
        }
        check_schema_version(path, &doc);

        match serde_json::from_value::<Registry>(doc) {
            Ok(registry) => LoadOutcome::Loaded(registry),
            Err(e) => corrupt(path, format!("unexpected structure: {e}")),
        }
    }

    pub fn load_or_empty(&self) -> Registry {
        self.load().into_registry()
    }

    /// Load for a read-modify-write cycle.
    ///
    /// Returns [`RegistryError::Corrupt`] instead of an empty registry so a
    /// save can never silently replace a document that failed to parse.
    pub fn load_for_update(&self) -> Result<Registry, RegistryError> {
        match self.load() {
            LoadOutcome::Loaded(registry) => Ok(registry),
            LoadOutcome::Empty => Ok(Registry::default()),
            LoadOutcome::Corrupt { reason } => Err(RegistryError::Corrupt {
                path: self.path().to_path_buf(),
                reason,
            }),
        }
    }

    pub fn save(&self, registry: &Registry) -> Result<(), RegistryError> {
        validate::validate_registry(registry).map_err(|e| RegistryError::InvalidRegistry {
            reason: e.to_string(),
        })?;

        let path = self.path();
        ensure_writable_dir(path)?;

        let mut stamped = registry.clone();
        stamped.schema_version = Some(SCHEMA_VERSION.to_string());
        let json = serde_json::to_string_pretty(&stamped)?;

        let existed = path.exists();
        atomic::write_atomic(path, json.as_bytes()).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => RegistryError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => io_err(path, e),
        })?;
        if !existed {
            set_file_permissions(path)?;
        }
        tracing::debug!(
            "saved registry with {} project(s) to {}",
            registry.projects.len(),
            path.display()
        );
        Ok(())
    }
}

fn corrupt(path: &Path, reason: String) -> LoadOutcome {
    tracing::warn!(
        "registry at {} is unusable ({reason}); treating as empty",
        path.display()
    );
    LoadOutcome::Corrupt { reason }
}

fn check_schema_version(path: &Path, doc: &serde_json::Value) {
    match doc.get("schemaVersion").and_then(|v| v.as_str()) {
        None => tracing::debug!("registry at {} predates schemaVersion", path.display()),
        Some(v) if v == SCHEMA_VERSION => {}
        Some(v) => tracing::warn!(
            "registry at {} has schemaVersion {v}, expected {SCHEMA_VERSION}; loading anyway",
            path.display()
        ),
    }
}

/// Create the registry directory (mode `0700`) if absent, or verify that the
/// existing one is writable.
fn ensure_writable_dir(path: &Path) -> Result<(), RegistryError> {
    let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) else {
        return Ok(());
    };
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        set_dir_permissions(dir)?;
        return Ok(());
    }
    let meta = std::fs::metadata(dir).map_err(|e| io_err(dir, e))?;
    if meta.permissions().readonly() {
        return Err(RegistryError::PermissionDenied {
            path: PathBuf::from(dir),
        });
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs;
    use tempfile::TempDir;

    use crate::types::{AgentResource, Project, ProjectId, ResourceId};

    fn sample_registry() -> Registry {
        let now = Utc::now();
        let project = Project {
            id: ProjectId::generate(),
            name: "demo".to_string(),
            path: PathBuf::from("/code/demo"),
            agents: vec![AgentResource {
                id: ResourceId::generate(),
                name: "dev.md".to_string(),
                relative_path: PathBuf::from("_bmad/bmm/agents/dev.md"),
                absolute_path: PathBuf::from("/code/demo/_bmad/bmm/agents/dev.md"),
                model: None,
            }],
            workflows: vec![],
            created_at: now,
            updated_at: now,
        };
        let mut registry = Registry::default();
        registry.projects.insert(project.id.clone(), project);
        registry
    }

    fn write_registry(home: &TempDir, text: &str) -> RegistryStore {
        let store = RegistryStore::at(home.path());
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), text).unwrap();
        store
    }

    #[test]
    fn missing_file_is_empty() {
        let home = TempDir::new().unwrap();
        let store = RegistryStore::at(home.path());
        assert_eq!(store.load(), LoadOutcome::Empty);
        assert!(store.load_or_empty().is_empty());
    }

    #[test]
    fn invalid_json_is_corrupt_and_degrades_to_empty() {
        let home = TempDir::new().unwrap();
        let store = write_registry(&home, "{ invalid json }");
        assert!(store.load().is_corrupt());
        assert!(store.load_or_empty().projects.is_empty());
    }

    #[test]
    fn projects_array_is_corrupt() {
        let home = TempDir::new().unwrap();
        let store = write_registry(&home, r#"{"projects": []}"#);
        assert!(store.load().is_corrupt());
    }

    #[test]
    fn comments_are_tolerated() {
        let home = TempDir::new().unwrap();
        let store = write_registry(
            &home,
            "// hand edited\n{\n  /* block */ \"schemaVersion\": \"1.0.0\",\n  \"projects\": {},\n}\n",
        );
        assert!(matches!(store.load(), LoadOutcome::Loaded(_)));
    }

    #[test]
    fn legacy_and_future_versions_still_load() {
        let home = TempDir::new().unwrap();
        let store = write_registry(&home, r#"{"projects": {}}"#);
        assert!(matches!(store.load(), LoadOutcome::Loaded(r) if r.schema_version.is_none()));

        let store = write_registry(&home, r#"{"schemaVersion": "9.0.0", "projects": {}}"#);
        assert!(matches!(store.load(), LoadOutcome::Loaded(_)));
    }

    #[test]
    fn load_for_update_refuses_corrupt_document() {
        let home = TempDir::new().unwrap();
        let store = write_registry(&home, "not even close");
        let err = store.load_for_update().unwrap_err();
        assert!(matches!(err, RegistryError::Corrupt { .. }));
        assert!(err.to_string().contains("projects.json"));
    }

    #[test]
    fn save_stamps_version_and_roundtrips() {
        let home = TempDir::new().unwrap();
        let store = RegistryStore::at(home.path());
        let registry = sample_registry();
        store.save(&registry).unwrap();

        let LoadOutcome::Loaded(loaded) = store.load() else {
            panic!("expected loaded registry");
        };
        assert_eq!(loaded.schema_version.as_deref(), Some(SCHEMA_VERSION));
        assert_eq!(loaded.projects, registry.projects);
        assert!(!atomic::backup_path(store.path()).exists());
    }

    #[test]
    fn save_rejects_duplicate_agent_ids() {
        let home = TempDir::new().unwrap();
        let store = RegistryStore::at(home.path());
        let mut registry = sample_registry();
        let project = registry.projects.values_mut().next().unwrap();
        let dup = project.agents[0].clone();
        project.agents.push(dup);

        let err = store.save(&registry).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRegistry { .. }));
        assert!(!store.path().exists(), "nothing written on validation failure");
    }

    #[test]
    #[cfg(unix)]
    fn new_registry_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let home = TempDir::new().unwrap();
        let store = RegistryStore::at(home.path());
        store.save(&Registry::default()).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
