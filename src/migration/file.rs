//! Migration file discovery, stub naming and atomic file writes

use crate::migration::SchemaError;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static STUB_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{8}T\d{6})(?:_\d+)?\.auto\.[A-Za-z0-9]+$").expect("stub name pattern is valid")
});

static ACCEPTS_HASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*pub const ACCEPTS_SCHEMA_HASH: &str = "([0-9a-fA-F]+)";"#)
        .expect("ACCEPTS_SCHEMA_HASH pattern is valid")
});

/// Timestamp layout of generated stub names (ISO-8601 basic format)
pub const STUB_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Represents a discovered migration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Path to the migration file
    pub path: PathBuf,

    /// File name without extension (`20240120T120000.auto`, `add_karma_index`)
    pub name: String,

    /// Hash declared by an uncommented `ACCEPTS_SCHEMA_HASH` constant
    pub accepts_hash: Option<String>,

    /// Whether the file name still has the generated stub form
    pub generated: bool,
}

impl MigrationFile {
    /// Parse the timestamp out of a generated stub file name
    ///
    /// Expected format: `{YYYYMMDD}T{HHMMSS}[_{n}].auto.{ext}`
    ///
    /// # Example
    /// - `20240120T120000.auto.rs` → 2024-01-20 12:00:00 UTC
    pub fn parse_stub_timestamp(filename: &str) -> Option<DateTime<Utc>> {
        let caps = STUB_NAME.captures(filename)?;
        let naive =
            chrono::NaiveDateTime::parse_from_str(caps.get(1)?.as_str(), STUB_TIMESTAMP_FORMAT)
                .ok()?;
        Some(naive.and_utc())
    }
}

/// Extract the accepted hash from migration source
///
/// Only an uncommented `pub const ACCEPTS_SCHEMA_HASH: &str = "<hex>";` at the
/// start of a line counts; the commented-out line in a fresh stub does not.
pub fn parse_accepts_hash(source: &str) -> Option<String> {
    ACCEPTS_HASH
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// Discover migration files in a directory
///
/// Scans for files with the given extension and returns them sorted by file
/// name, which for generated stubs is chronological order. A missing
/// directory has no migrations.
///
/// # Errors
///
/// Returns `SchemaError::Io` if the directory or a file cannot be read
pub fn discover_migrations(
    migrations_dir: &Path,
    extension: &str,
) -> Result<Vec<MigrationFile>, SchemaError> {
    if !migrations_dir.exists() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(migrations_dir)
        .map_err(|e| SchemaError::io("Failed to read migrations directory", migrations_dir, e))?;

    let mut migrations = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| SchemaError::io("Failed to read migrations directory", migrations_dir, e))?;
        let path = entry.path();

        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some(extension) {
            continue;
        }
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let source = fs::read_to_string(&path)
            .map_err(|e| SchemaError::io("Failed to read migration file", &path, e))?;
        let name = filename
            .strip_suffix(&format!(".{}", extension))
            .unwrap_or(filename)
            .to_string();

        migrations.push(MigrationFile {
            generated: MigrationFile::parse_stub_timestamp(filename).is_some(),
            accepts_hash: parse_accepts_hash(&source),
            name,
            path,
        });
    }

    migrations.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(migrations)
}

/// Path for a new migration stub
///
/// Named `<timestamp>.auto.<ext>`. If that file already exists a numeric
/// suffix is added, so an existing stub is never overwritten and name order
/// stays chronological.
pub fn next_stub_path(migrations_dir: &Path, timestamp: DateTime<Utc>, extension: &str) -> PathBuf {
    let stamp = timestamp.format(STUB_TIMESTAMP_FORMAT).to_string();
    let mut path = migrations_dir.join(format!("{}.auto.{}", stamp, extension));
    let mut n = 1;
    while path.exists() {
        path = migrations_dir.join(format!("{}_{:02}.auto.{}", stamp, n, extension));
        n += 1;
    }
    path
}

/// Write a file by writing a sibling temp file and renaming it into place
///
/// Readers see either the old content or the new content, never a partial
/// write. Parent directories are created as needed.
///
/// # Errors
///
/// Returns `SchemaError::Io` if any step fails
pub fn write_atomic(path: &Path, content: &str) -> Result<(), SchemaError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .map_err(|e| SchemaError::io("Failed to create directory", parent, e))?;
    }

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            SchemaError::io(
                "Invalid file name",
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })?;
    let tmp_path = path.with_file_name(format!(".{}.{}.tmp", filename, std::process::id()));

    let result = (|| -> io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(SchemaError::io("Failed to write", path, e));
    }
    Ok(())
}

/// Write a file only if its content would change
///
/// Returns whether the file was written.
pub fn write_if_changed(path: &Path, content: &str) -> Result<bool, SchemaError> {
    match fs::read_to_string(path) {
        Ok(existing) if existing == content => return Ok(false),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(SchemaError::io("Failed to read", path, e)),
    }
    write_atomic(path, content)?;
    Ok(true)
}

/// Remove a file, treating an already missing file as success
///
/// Returns whether a file was removed.
pub fn remove_if_exists(path: &Path) -> Result<bool, SchemaError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(SchemaError::io("Failed to remove", path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_parse_stub_timestamp() {
        let ts = MigrationFile::parse_stub_timestamp("20240120T120000.auto.rs").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap());
        assert!(MigrationFile::parse_stub_timestamp("20240120T120000_01.auto.rs").is_some());
        assert!(MigrationFile::parse_stub_timestamp("m20240120120000_create_users.rs").is_none());
        assert!(MigrationFile::parse_stub_timestamp("20241340T120000.auto.rs").is_none());
    }

    #[test]
    fn test_parse_accepts_hash_ignores_comment() {
        let stub = "// pub const ACCEPTS_SCHEMA_HASH: &str = \"abc123\";\n";
        assert_eq!(parse_accepts_hash(stub), None);

        let accepted = "pub const ACCEPTS_SCHEMA_HASH: &str = \"ABC123\";\n";
        assert_eq!(parse_accepts_hash(accepted).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_discover_migrations_sorted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("20240102T000000.auto.rs"), "").unwrap();
        fs::write(
            dir.path().join("20240101T000000_add_karma.rs"),
            "pub const ACCEPTS_SCHEMA_HASH: &str = \"aa\";",
        )
        .unwrap();
        fs::write(dir.path().join("notes.md"), "").unwrap();

        let migrations = discover_migrations(dir.path(), "rs").unwrap();
        let names: Vec<&str> = migrations.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["20240101T000000_add_karma", "20240102T000000.auto"]);
        assert_eq!(migrations[0].accepts_hash.as_deref(), Some("aa"));
        assert!(!migrations[0].generated);
        assert!(migrations[1].generated);
    }

    #[test]
    fn test_discover_missing_directory() {
        let dir = TempDir::new().unwrap();
        assert!(discover_migrations(&dir.path().join("missing"), "rs").unwrap().is_empty());
    }

    #[test]
    fn test_next_stub_path_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();

        let first = next_stub_path(dir.path(), ts, "rs");
        assert_eq!(first.file_name().unwrap(), "20240506T070809.auto.rs");
        fs::write(&first, "").unwrap();

        let second = next_stub_path(dir.path(), ts, "rs");
        assert_eq!(second.file_name().unwrap(), "20240506T070809_01.auto.rs");
        assert!(first.file_name() < second.file_name());
    }

    #[test]
    fn test_write_if_changed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema").join("accepted_schema.sql");

        assert!(write_if_changed(&path, "a").unwrap());
        assert!(!write_if_changed(&path, "a").unwrap());
        assert!(write_if_changed(&path, "b").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "b");

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_remove_if_exists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema_to_accept.sql");
        assert!(!remove_if_exists(&path).unwrap());
        fs::write(&path, "x").unwrap();
        assert!(remove_if_exists(&path).unwrap());
        assert!(!path.exists());
    }
}
