//! Registry load tolerance, atomic-write safety, and on-disk format tests.

use assert_fs::prelude::*;
use ccr_core::{atomic, LoadOutcome, Registry, RegistryError, RegistryStore};
use predicates::prelude::predicate;
use std::fs;

fn store_with(home: &assert_fs::TempDir, text: &str) -> RegistryStore {
    home.child(".claude-code-router/projects.json")
        .write_str(text)
        .expect("write registry");
    RegistryStore::at(home.path())
}

// ---------------------------------------------------------------------------
// 1. Load tolerance
// ---------------------------------------------------------------------------

#[test]
fn invalid_json_loads_as_empty_without_error() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let store = store_with(&home, "{ invalid json }");
    let registry = store.load_or_empty();
    assert!(registry.projects.is_empty());
}

#[test]
fn wrong_shape_is_reported_as_corrupt() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    for text in [r#"{"projects": null}"#, r#"{"projects": [1, 2]}"#, "{}", "[]", "42"] {
        let store = store_with(&home, text);
        assert!(
            matches!(store.load(), LoadOutcome::Corrupt { .. }),
            "expected corrupt for {text}"
        );
    }
}

#[test]
fn project_with_bad_field_types_is_corrupt() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let store = store_with(&home, r#"{"projects": {"x": {"id": 1}}}"#);
    assert!(store.load().is_corrupt());
}

#[test]
fn corrupt_registry_error_names_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let store = store_with(&home, "{{{{");
    let err = store.load_for_update().unwrap_err();
    assert!(matches!(err, RegistryError::Corrupt { .. }), "got: {err}");
    assert!(err.to_string().contains("projects.json"));
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn save_creates_directory_and_leaves_no_artifacts() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let store = RegistryStore::at(home.path());
    store.save(&Registry::default()).expect("save");

    home.child(".claude-code-router/projects.json")
        .assert(predicate::path::exists());
    assert!(!atomic::backup_path(store.path()).exists());
    assert!(!atomic::tmp_path(store.path()).exists());
}

#[test]
fn stray_backup_does_not_affect_load() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let store = RegistryStore::at(home.path());
    store.save(&Registry::default()).expect("save");

    // Simulate a crash after rename but before the backup was removed.
    fs::write(atomic::backup_path(store.path()), b"{ partial").expect("write backup");

    assert!(matches!(store.load(), LoadOutcome::Loaded(_)));
    store.save(&Registry::default()).expect("save over stray backup");
    assert!(!atomic::backup_path(store.path()).exists());
}

#[test]
fn saved_document_uses_camel_case_and_version() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let store = RegistryStore::at(home.path());
    store.save(&Registry::default()).expect("save");

    let text = fs::read_to_string(store.path()).expect("read");
    let doc: serde_json::Value = serde_json::from_str(&text).expect("plain JSON on disk");
    assert_eq!(doc["schemaVersion"], "1.0.0");
    assert!(doc["projects"].is_object());
}
