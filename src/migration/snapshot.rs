//! Schema snapshot documents.
//!
//! A snapshot is the whole schema as one reviewable SQL file: a banner, the
//! overall hash, an optional acceptance line, then every artifact under a
//! comment naming it and its hash. The last line is a checksum of everything
//! above it, so a file cut short by a crash is detected on read instead of
//! being mistaken for a valid snapshot.

use crate::migration::checksum::hash_sql;
use crate::migration::file::write_if_changed;
use crate::migration::plan::SchemaPlan;
use crate::migration::SchemaError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::io;
use std::path::Path;

const BANNER: &str = "\
-- GENERATED FILE
-- Do not edit this file directly. Instead, change the schema definitions and
-- run `schemaguard-migrate generate-schema`. This file should nevertheless be
-- checked in to version control.
--
";

const OVERALL_HASH_PREFIX: &str = "-- Overall schema hash: ";
const CHECKSUM_PREFIX: &str = "-- Snapshot checksum: ";

/// Who accepted a snapshot, and when
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acceptance {
    pub accepted_at: DateTime<Utc>,
    pub migration: Option<String>,
}

/// A renderable snapshot of a computed schema
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    plan: &'a SchemaPlan,
    acceptance: Option<&'a Acceptance>,
}

impl<'a> Snapshot<'a> {
    /// Snapshot awaiting acceptance
    pub fn pending(plan: &'a SchemaPlan) -> Self {
        Self {
            plan,
            acceptance: None,
        }
    }

    /// Snapshot of the accepted schema
    pub fn accepted(plan: &'a SchemaPlan, acceptance: &'a Acceptance) -> Self {
        Self {
            plan,
            acceptance: Some(acceptance),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::from(BANNER);
        out.push_str(OVERALL_HASH_PREFIX);
        out.push_str(self.plan.overall_hash());
        out.push('\n');
        if let Some(acceptance) = self.acceptance {
            out.push_str("-- Accepted on ");
            out.push_str(
                &acceptance
                    .accepted_at
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            );
            if let Some(migration) = &acceptance.migration {
                out.push_str(" by ");
                out.push_str(migration);
            }
            out.push('\n');
        }

        for artifact in self.plan.artifacts() {
            out.push('\n');
            out.push_str(&format!(
                "-- {} \"{}\", hash: {}\n",
                artifact.kind, artifact.name, artifact.hash
            ));
            out.push_str(&artifact.pretty);
            out.push('\n');
        }

        out.push('\n');
        let checksum = hash_sql(&out);
        out.push_str(CHECKSUM_PREFIX);
        out.push_str(&checksum);
        out.push('\n');
        out
    }

    /// Write the snapshot unless the file already holds identical content
    ///
    /// Returns whether the file was written.
    pub fn write(&self, path: &Path) -> Result<bool, SchemaError> {
        write_if_changed(path, &self.render())
    }
}

/// Outcome of reading a snapshot file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotRead {
    Missing,
    Valid(String),
    /// The file exists but its checksum trailer is absent or wrong
    Corrupt(String),
}

impl SnapshotRead {
    /// Text usable as the old side of a diff; empty unless valid
    pub fn diff_text(&self) -> &str {
        match self {
            SnapshotRead::Valid(text) => text,
            SnapshotRead::Missing | SnapshotRead::Corrupt(_) => "",
        }
    }
}

/// Read and verify a snapshot file
///
/// # Errors
///
/// Returns `SchemaError::Io` for read failures other than a missing file
pub fn read_snapshot(path: &Path) -> Result<SnapshotRead, SchemaError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SnapshotRead::Missing),
        Err(e) => return Err(SchemaError::io("Failed to read snapshot", path, e)),
    };
    Ok(match verify(&text) {
        Ok(()) => SnapshotRead::Valid(text),
        Err(reason) => SnapshotRead::Corrupt(reason),
    })
}

fn verify(text: &str) -> Result<(), String> {
    let body_end = text
        .rfind(CHECKSUM_PREFIX)
        .ok_or_else(|| "missing checksum trailer".to_string())?;
    let (body, trailer) = text.split_at(body_end);
    let recorded = trailer[CHECKSUM_PREFIX.len()..].trim_end();
    if recorded.contains('\n') {
        return Err("content after checksum trailer".to_string());
    }
    let actual = hash_sql(body);
    if recorded == actual {
        Ok(())
    } else {
        Err(format!("checksum mismatch (recorded {}, actual {})", recorded, actual))
    }
}
