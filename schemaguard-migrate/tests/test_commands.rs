//! Tests for the command handlers

use schemaguard::{GenerateOptions, SchemaDetector};
use schemaguard_migrate::commands::{
    handle_accept, handle_generate, handle_status, load_config, load_registry, Overrides,
};
use schemaguard_migrate::error::{CommandError, EXIT_DRIFT, EXIT_FAILURE};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const POSTS_MANIFEST: &str = r#"{
    "collections": [{
        "name": "Posts",
        "fields": {
            "_id": {"type": "String", "primaryKey": true, "nullable": false},
            "title": {"type": "String", "nullable": false},
            "userId": {"type": "String", "foreignKey": "Users"}
        },
        "indexes": [{"fields": ["userId"]}]
    }]
}"#;

fn write_manifest(root: &Path, manifest: &str) {
    let schema = root.join("schema");
    fs::create_dir_all(&schema).unwrap();
    fs::write(schema.join("registry.json"), manifest).unwrap();
}

fn overrides(root: &Path) -> Overrides {
    Overrides {
        root: Some(root.to_path_buf()),
        registry: None,
    }
}

fn detector_for(root: &Path) -> (SchemaDetector, schemaguard::SchemaRegistry) {
    let config = load_config(Path::new("config/schemaguard.toml"), &overrides(root)).unwrap();
    let registry = load_registry(&config).unwrap();
    (SchemaDetector::new(config), registry)
}

#[test]
fn test_load_config_applies_overrides() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("schemaguard.toml"),
        "[schema]\nmigrations_dir = \"db/migrations\"\nworkers = 2\n",
    )
    .unwrap();

    let config = load_config(
        Path::new("config/schemaguard.toml"),
        &Overrides {
            root: Some(root.to_path_buf()),
            registry: Some(PathBuf::from("other/registry.json")),
        },
    )
    .unwrap();

    assert_eq!(config.root_dir, root);
    assert_eq!(config.workers, 2);
    assert_eq!(config.migrations_path(), root.join("db/migrations"));
    assert_eq!(config.registry_manifest_path(), root.join("other/registry.json"));
}

#[test]
fn test_missing_registry_is_failure() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_config(Path::new("config/schemaguard.toml"), &overrides(temp_dir.path())).unwrap();

    let err = load_registry(&config).unwrap_err();
    assert!(matches!(err, CommandError::Registry(_)));
    assert_eq!(err.exit_code(), EXIT_FAILURE);
}

#[test]
fn test_generate_accept_generate() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_manifest(root, POSTS_MANIFEST);
    let (detector, registry) = detector_for(root);

    let err = handle_generate(&detector, &registry, &GenerateOptions::default()).unwrap_err();
    assert_eq!(err.exit_code(), EXIT_DRIFT);
    assert!(root.join("schema/schema_to_accept.sql").exists());
    let stubs: Vec<_> = fs::read_dir(root.join("migrations")).unwrap().collect();
    assert_eq!(stubs.len(), 1);

    let accepted = handle_accept(&detector, &registry, None, Some("posts")).unwrap();
    assert!(accepted.appended);

    let report = handle_generate(&detector, &registry, &GenerateOptions::default()).unwrap();
    assert_eq!(report.hash, accepted.hash);
    assert!(root.join("schema/accepted_schema.sql").exists());
    assert!(!root.join("schema/schema_to_accept.sql").exists());
}

#[test]
fn test_accept_twice_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    write_manifest(temp_dir.path(), POSTS_MANIFEST);
    let (detector, registry) = detector_for(temp_dir.path());

    assert!(handle_accept(&detector, &registry, None, None).unwrap().appended);
    assert!(!handle_accept(&detector, &registry, None, None).unwrap().appended);

    let status = handle_status(&detector, &registry, None).unwrap();
    assert_eq!(status.ledger_entries, 1);
    assert!(status.is_up_to_date());
}

#[test]
fn test_status_reports_pending_stub() {
    let temp_dir = TempDir::new().unwrap();
    write_manifest(temp_dir.path(), POSTS_MANIFEST);
    let (detector, registry) = detector_for(temp_dir.path());

    let _ = handle_generate(&detector, &registry, &GenerateOptions::default());
    let status = handle_status(&detector, &registry, None).unwrap();

    assert!(!status.is_up_to_date());
    assert_eq!(status.pending_stubs.len(), 1);
    assert!(status.to_accept_present);
}

#[test]
fn test_unsupported_type_is_failure() {
    let temp_dir = TempDir::new().unwrap();
    write_manifest(
        temp_dir.path(),
        r#"{"collections": [{"name": "Posts", "fields": {"blob": {"type": "Binary"}}}]}"#,
    );
    let (detector, registry) = detector_for(temp_dir.path());

    let err = handle_generate(&detector, &registry, &GenerateOptions::default()).unwrap_err();
    assert_eq!(err.exit_code(), EXIT_FAILURE);
    assert!(!temp_dir.path().join("migrations").exists());
}
