//! Migration stub generation.

use crate::migration::file::{next_stub_path, write_atomic};
use crate::migration::SchemaError;
use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use std::path::{Path, PathBuf};

/// Contents of a generated migration stub
#[derive(Debug, Clone)]
pub struct MigrationStub<'a> {
    pub generated_at: DateTime<Utc>,
    /// Unified diff between the accepted and pending snapshots
    pub diff: &'a str,
    /// Overall hash the migration will accept once uncommented
    pub hash: &'a str,
    /// Snapshot paths shown in the "see the full diff" hint
    pub accepted_path: &'a Path,
    pub to_accept_path: &'a Path,
    /// Largest embedded diff, in bytes, before it is truncated
    pub diff_size_limit: usize,
}

impl MigrationStub<'_> {
    pub fn render(&self) -> String {
        format!(
            r#"//! Generated on {} by `schemaguard-migrate generate-schema`
//! The following schema changes were detected:
//! -------------------------------------------
{}//! -------------------------------------------
//! (run `git diff --no-index {} {}` to see this more clearly)
//!
//! - [ ] Write a migration to represent these changes
//! - [ ] Rename this file to something more readable
//! - [ ] Uncomment `ACCEPTS_SCHEMA_HASH` below
//! - [ ] Run `schemaguard-migrate accept-schema` to update the accepted schema hash
//!       (running `schemaguard-migrate generate-schema --write-changelog` again will also do this)

// pub const ACCEPTS_SCHEMA_HASH: &str = "{}";

pub fn up() -> Result<(), Box<dyn std::error::Error>> {{
    // TODO
    Ok(())
}}

pub fn down() -> Result<(), Box<dyn std::error::Error>> {{
    // TODO, not required
    Ok(())
}}
"#,
            self.generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            padded_diff(self.diff, self.diff_size_limit),
            self.accepted_path.display(),
            self.to_accept_path.display(),
            self.hash,
        )
    }

    /// Write the stub into `migrations_dir` and return its path
    ///
    /// The file is named after `generated_at`; an existing stub is never
    /// overwritten.
    pub fn write(&self, migrations_dir: &Path, extension: &str) -> Result<PathBuf, SchemaError> {
        let path = next_stub_path(migrations_dir, self.generated_at, extension);
        write_atomic(&path, &self.render())?;
        info!("Generated migration stub {}", path.display());
        Ok(path)
    }
}

/// Prefix every diff line with `//! `, truncating at a line boundary when the
/// result would exceed `limit` bytes
fn padded_diff(diff: &str, limit: usize) -> String {
    let total: usize = diff.lines().map(|line| pad(line).len()).sum();

    let mut out = String::new();
    for line in diff.lines() {
        let padded = pad(line);
        if out.len() + padded.len() > limit {
            out.push_str(&format!(
                "//! ***Diff too large to display: showing {} of {} bytes***\n",
                out.len(),
                total
            ));
            break;
        }
        out.push_str(&padded);
    }
    out
}

fn pad(line: &str) -> String {
    if line.is_empty() {
        "//!\n".to_string()
    } else {
        format!("//! {}\n", line)
    }
}
