//! End-to-end generation passes against a temporary project root

use chrono::{DateTime, TimeZone, Utc};
use schemaguard::migration::{read_snapshot, SnapshotRead};
use schemaguard::{
    CollectionDescriptor, FieldSchema, GenerateOptions, IndexSpec, SchemaConfig, SchemaDetector,
    SchemaError, SchemaRegistry,
};
use std::fs;
use tempfile::TempDir;

fn clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 8, 30, 0).unwrap()
}

fn forum_registry(with_slug: bool) -> SchemaRegistry {
    let users = CollectionDescriptor::new("Users")
        .field("_id", FieldSchema::new("Id").primary_key().not_null())
        .field("username", FieldSchema::new("String").not_null())
        .field("karma", FieldSchema::new("Number").default_value(serde_json::json!(0)))
        .field("createdAt", FieldSchema::new("Date").default_expr("now()"))
        .index(IndexSpec::new(["username"]).unique());

    let mut posts = CollectionDescriptor::new("Posts")
        .field("_id", FieldSchema::new("Id").primary_key().not_null())
        .field("userId", FieldSchema::reference("Users"))
        .field("title", FieldSchema::new("String").not_null())
        .field("tagIds", FieldSchema::array("Id").foreign_key("Tags"))
        .index(IndexSpec::new(["userId"]));
    if with_slug {
        posts = posts
            .field("slug", FieldSchema::new("String"))
            .index(IndexSpec::new(["slug"]).unique());
    }

    let mut registry = SchemaRegistry::new();
    registry.register_collection(users).unwrap();
    registry.register_collection(posts).unwrap();
    registry.add_extension("pg_trgm");
    registry
}

fn detector(dir: &TempDir) -> SchemaDetector {
    SchemaDetector::new(SchemaConfig::with_root(dir.path())).with_clock(clock)
}

fn drift(result: Result<schemaguard::CleanReport, SchemaError>) -> (String, Option<std::path::PathBuf>) {
    match result {
        Err(SchemaError::SchemaDriftDetected { hash, migration }) => (hash, migration),
        other => panic!("expected drift, got {:?}", other),
    }
}

#[test]
fn test_full_round_trip() {
    let dir = TempDir::new().unwrap();
    let detector = detector(&dir);
    let options = GenerateOptions::default();

    // Nothing accepted yet
    let (first_hash, stub) = drift(detector.run(&forum_registry(false), &options));
    assert!(stub.is_some());

    detector
        .accept_current(&forum_registry(false), None, Some("20240315T083000.auto"))
        .unwrap();
    let clean = detector.run(&forum_registry(false), &options).unwrap();
    assert_eq!(clean.hash, first_hash);

    // Adding a field is drift, and the stub diff shows the new column
    let accepted_path = detector.config().accepted_schema_path();
    let accepted_before = fs::read(&accepted_path).unwrap();
    let (second_hash, stub) = drift(detector.run(&forum_registry(true), &options));
    assert_eq!(fs::read(&accepted_path).unwrap(), accepted_before);
    let pending = fs::read_to_string(detector.config().schema_to_accept_path()).unwrap();
    assert!(pending.contains(&format!("-- Overall schema hash: {}\n", second_hash)));
    assert_ne!(first_hash, second_hash);
    let stub = fs::read_to_string(stub.unwrap()).unwrap();
    assert!(stub.contains("//! +  \"slug\" TEXT"));
    assert!(stub.contains("//! --- a/schema/accepted_schema.sql"));
    assert!(stub.contains("//! +++ b/schema/schema_to_accept.sql"));

    detector.accept_current(&forum_registry(true), None, None).unwrap();
    let clean = detector.run(&forum_registry(true), &options).unwrap();
    assert_eq!(clean.hash, second_hash);
    assert!(clean.removed_to_accept);
}

#[test]
fn test_clean_pass_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let detector = detector(&dir);
    let registry = forum_registry(false);
    let options = GenerateOptions::default();

    detector.accept_current(&registry, None, None).unwrap();
    let first = detector.run(&registry, &options).unwrap();
    assert!(first.snapshot_written);
    let snapshot = fs::read_to_string(detector.config().accepted_schema_path()).unwrap();

    let second = detector.run(&registry, &options).unwrap();
    assert!(!second.snapshot_written);
    assert_eq!(
        fs::read_to_string(detector.config().accepted_schema_path()).unwrap(),
        snapshot
    );

    let ledger = fs::read_to_string(detector.config().changelog_path()).unwrap();
    let entries: Vec<serde_json::Value> = serde_json::from_str(&ledger).unwrap();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_migration_file_accepts_hash() {
    let dir = TempDir::new().unwrap();
    let detector = detector(&dir);
    let registry = forum_registry(false);

    let (hash, stub) = drift(detector.run(&registry, &GenerateOptions::default()));
    let stub = stub.unwrap();

    // A human edits the stub and uncomments the hash line
    let edited = fs::read_to_string(&stub)
        .unwrap()
        .replace("// pub const ACCEPTS_SCHEMA_HASH", "pub const ACCEPTS_SCHEMA_HASH");
    fs::write(&stub, edited).unwrap();

    let report = detector.run(&registry, &GenerateOptions::default()).unwrap();
    assert_eq!(report.hash, hash);
    assert_eq!(report.synced_entries, 1);
    assert_eq!(
        report.accepted.migration_name.as_deref(),
        Some("20240315T083000.auto")
    );
}

#[test]
fn test_collection_failure_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let detector = detector(&dir);

    let mut registry = forum_registry(false);
    registry
        .register_collection(
            CollectionDescriptor::new("Broken").field("payload", FieldSchema::new("Blob")),
        )
        .unwrap();

    let err = detector
        .run(&registry, &GenerateOptions::default())
        .unwrap_err();
    let SchemaError::PartialSchemaGenerationFailure { failures } = err else {
        panic!("expected partial failure");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].collection, "Broken");
    assert!(!dir.path().join("schema").exists());
    assert!(!dir.path().join("migrations").exists());
}

#[test]
fn test_corrupt_changelog_aborts_before_writes() {
    let dir = TempDir::new().unwrap();
    let detector = detector(&dir);
    let changelog = detector.config().changelog_path();
    fs::create_dir_all(changelog.parent().unwrap()).unwrap();
    fs::write(&changelog, "[{\"hash\": \"not-a-hash\", \"timestamp\": \"2024-01-01T00:00:00Z\"}]")
        .unwrap();

    let err = detector
        .run(&forum_registry(false), &GenerateOptions::default())
        .unwrap_err();
    assert!(matches!(err, SchemaError::LedgerCorrupt { .. }));
    assert!(!detector.config().schema_to_accept_path().exists());
    assert!(!dir.path().join("migrations").exists());
}

#[test]
fn test_truncated_snapshot_is_rewritten() {
    let dir = TempDir::new().unwrap();
    let detector = detector(&dir);
    let registry = forum_registry(false);
    let options = GenerateOptions::default();

    detector.accept_current(&registry, None, None).unwrap();
    detector.run(&registry, &options).unwrap();

    let path = detector.config().accepted_schema_path();
    let full = fs::read_to_string(&path).unwrap();
    fs::write(&path, &full[..full.len() / 2]).unwrap();
    assert!(matches!(read_snapshot(&path).unwrap(), SnapshotRead::Corrupt(_)));
    assert!(detector.status(&registry, None).unwrap().accepted_snapshot_corrupt);

    let report = detector.run(&registry, &options).unwrap();
    assert!(report.snapshot_written);
    assert_eq!(fs::read_to_string(&path).unwrap(), full);
}

#[test]
fn test_flavor_changes_hash() {
    let dir = TempDir::new().unwrap();
    let detector = detector(&dir);

    let mut registry = SchemaRegistry::new();
    registry
        .register_collection(CollectionDescriptor::new("Posts").field(
            "hideAuthor",
            FieldSchema::new("Boolean")
                .default_value(serde_json::json!(false))
                .flavor_default("EAForum", schemaguard::FieldDefault::Value(serde_json::json!(true))),
        ))
        .unwrap();

    let base = detector.compute(&registry, None).unwrap();
    let other = detector.compute(&registry, Some("LessWrong")).unwrap();
    let ea = detector.compute(&registry, Some("EAForum")).unwrap();
    assert_eq!(base.overall_hash(), other.overall_hash());
    assert_ne!(base.overall_hash(), ea.overall_hash());
}

#[test]
fn test_sample_manifest_compiles() {
    let manifest = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("schema/registry.json");
    let registry = SchemaRegistry::from_manifest(&manifest).unwrap();
    assert_eq!(registry.collection_names(), vec!["Posts", "Users"]);

    let dir = TempDir::new().unwrap();
    let plan = detector(&dir).compute(&registry, Some("EAForum")).unwrap();
    let custom = plan
        .artifacts()
        .iter()
        .find(|artifact| artifact.name == "idx_posts_title_trgm")
        .unwrap();
    assert!(!custom.statement.contains("CONCURRENTLY"));
}

#[test]
fn test_seeded_ledger_with_other_hash_is_drift() {
    let dir = TempDir::new().unwrap();
    let detector = detector(&dir);
    let old_hash = schemaguard::migration::hash_sql("an older schema");
    let changelog = detector.config().changelog_path();
    fs::create_dir_all(changelog.parent().unwrap()).unwrap();
    fs::write(
        &changelog,
        format!("[{{\"hash\": \"{}\", \"timestamp\": \"2024-01-01T00:00:00Z\"}}]", old_hash),
    )
    .unwrap();

    let (hash, stub) = drift(detector.run(&forum_registry(false), &GenerateOptions::default()));
    assert_ne!(hash, old_hash);
    assert!(stub.unwrap().exists());

    let pending = fs::read_to_string(detector.config().schema_to_accept_path()).unwrap();
    assert!(pending.contains("CREATE TABLE IF NOT EXISTS \"Posts\" ("));
    assert!(pending.contains("CREATE TABLE IF NOT EXISTS \"Users\" ("));
    assert!(pending.find("\"Posts\" (").unwrap() < pending.find("\"Users\" (").unwrap());
    assert!(!detector.config().accepted_schema_path().exists());

    let ledger = fs::read_to_string(&changelog).unwrap();
    let entries: Vec<serde_json::Value> = serde_json::from_str(&ledger).unwrap();
    assert_eq!(entries.len(), 1);
}

fn accepting_migration(dir: &std::path::Path, name: &str, hash: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join(format!("{}.rs", name)),
        format!("pub fn up() {{}}\n\npub const ACCEPTS_SCHEMA_HASH: &str = \"{}\";\n", hash),
    )
    .unwrap();
}

#[test]
fn test_migration_reverting_schema_is_accepted() {
    let dir = TempDir::new().unwrap();
    let detector = detector(&dir);
    let options = GenerateOptions {
        generate_migration: false,
        ..GenerateOptions::default()
    };
    let migrations = detector.config().migrations_path();

    let h0 = detector.compute(&forum_registry(false), None).unwrap().overall_hash().to_string();
    let h1 = detector.compute(&forum_registry(true), None).unwrap().overall_hash().to_string();
    accepting_migration(&migrations, "20240101T000000_create_posts", &h0);
    accepting_migration(&migrations, "20240201T000000_add_slug", &h1);
    assert_eq!(detector.run(&forum_registry(true), &options).unwrap().hash, h1);

    // Dropping the slug again returns to the first schema
    accepting_migration(&migrations, "20240301T000000_drop_slug", &h0);
    let report = detector.run(&forum_registry(false), &options).unwrap();
    assert_eq!(report.hash, h0);
    assert_eq!(report.synced_entries, 1);
    assert_eq!(
        report.accepted.migration_name.as_deref(),
        Some("20240301T000000_drop_slug")
    );
}
