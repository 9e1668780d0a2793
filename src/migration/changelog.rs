//! The schema changelog: an append-only ledger of accepted schema hashes.
//!
//! Stored as a JSON array in `schema_changelog.json`. The last entry is the
//! accepted schema. Entries are only ever appended; the file is rewritten
//! atomically with the new entry at the end.

use crate::migration::checksum::is_hex_digest;
use crate::migration::file::{discover_migrations, write_atomic, MigrationFile};
use crate::migration::snapshot::Acceptance;
use crate::migration::SchemaError;
use chrono::{DateTime, SubsecRound, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One accepted schema hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogEntry {
    /// Overall schema hash
    pub hash: String,

    /// When the hash was accepted
    pub timestamp: DateTime<Utc>,

    /// Migration that accepted the hash, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_name: Option<String>,
}

impl ChangelogEntry {
    /// Create a new entry, truncating the timestamp to milliseconds
    #[must_use]
    pub fn new(hash: String, timestamp: DateTime<Utc>, migration_name: Option<String>) -> Self {
        Self {
            hash,
            timestamp: timestamp.trunc_subsecs(3),
            migration_name,
        }
    }

    pub fn acceptance(&self) -> Acceptance {
        Acceptance {
            accepted_at: self.timestamp,
            migration: self.migration_name.clone(),
        }
    }
}

/// The loaded ledger and where it lives
#[derive(Debug, Clone)]
pub struct SchemaChangelog {
    path: PathBuf,
    entries: Vec<ChangelogEntry>,
}

impl SchemaChangelog {
    /// Load the ledger
    ///
    /// A missing file is an empty ledger: nothing has been accepted yet.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::LedgerCorrupt` if the file can't be read or is
    /// not a valid ledger. There is no safe baseline in that case.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let corrupt = |reason: String| SchemaError::LedgerCorrupt {
            path: path.to_path_buf(),
            reason,
        };

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No schema changelog at {}, starting empty", path.display());
                return Ok(Self {
                    path: path.to_path_buf(),
                    entries: Vec::new(),
                });
            }
            Err(e) => return Err(corrupt(e.to_string())),
        };

        let entries: Vec<ChangelogEntry> =
            serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;
        if let Some(bad) = entries.iter().find(|e| !is_hex_digest(&e.hash)) {
            return Err(corrupt(format!("'{}' is not a schema hash", bad.hash)));
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn entries(&self) -> &[ChangelogEntry] {
        &self.entries
    }

    /// The most recent entry: the accepted schema
    pub fn accepted(&self) -> Option<&ChangelogEntry> {
        self.entries.last()
    }

    pub fn accepted_hash(&self) -> Option<&str> {
        self.accepted().map(|e| e.hash.as_str())
    }

    /// Migrations whose `ACCEPTS_SCHEMA_HASH` the ledger doesn't record yet
    ///
    /// A migration is recorded by an entry with its hash and its name. An
    /// unattributed entry with the same hash (written by an explicit
    /// acceptance) also records it, but each such entry covers only the first
    /// migration, in file-name order, that claims it. A migration reverting to
    /// an earlier hash is therefore still reported.
    pub fn unrecorded<'m>(&self, migrations: &'m [MigrationFile]) -> Vec<&'m MigrationFile> {
        let mut claimed = vec![false; self.entries.len()];
        migrations
            .iter()
            .filter(|migration| {
                let Some(hash) = migration.accepts_hash.as_deref() else {
                    return false;
                };
                let by_name = self.entries.iter().any(|e| {
                    e.hash.eq_ignore_ascii_case(hash)
                        && e.migration_name.as_deref() == Some(migration.name.as_str())
                });
                if by_name {
                    return false;
                }
                let unattributed = self.entries.iter().enumerate().position(|(i, e)| {
                    !claimed[i] && e.migration_name.is_none() && e.hash.eq_ignore_ascii_case(hash)
                });
                match unattributed {
                    Some(i) => {
                        claimed[i] = true;
                        false
                    }
                    None => true,
                }
            })
            .collect()
    }

    /// Append an acceptance and persist the ledger
    ///
    /// Recording the hash that is already accepted is a no-op and returns
    /// `false`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Io` if the ledger cannot be written
    pub fn record_acceptance(
        &mut self,
        hash: &str,
        migration_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, SchemaError> {
        if self.accepted_hash() == Some(hash) {
            debug!("Schema hash {} is already accepted", hash);
            return Ok(false);
        }
        self.entries.push(ChangelogEntry::new(
            hash.to_string(),
            now,
            migration_name.map(str::to_string),
        ));
        self.save()?;
        info!(
            "Accepted schema hash {}{}",
            hash,
            migration_name.map(|m| format!(" by {}", m)).unwrap_or_default()
        );
        Ok(true)
    }

    /// Append hashes accepted by migration files but missing from the ledger
    ///
    /// Migrations are visited in file-name order. Each uncommented
    /// `ACCEPTS_SCHEMA_HASH` the ledger doesn't record for that migration (see
    /// [`SchemaChangelog::unrecorded`]) is appended, attributed to the
    /// migration's name. Returns how many entries were added.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Io` if a migration can't be read or the ledger
    /// can't be written
    pub fn sync_from_migrations(
        &mut self,
        migrations_dir: &Path,
        extension: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, SchemaError> {
        let migrations = discover_migrations(migrations_dir, extension)?;
        let new_entries: Vec<ChangelogEntry> = self
            .unrecorded(&migrations)
            .into_iter()
            .filter_map(|migration| {
                let hash = migration.accepts_hash.clone()?;
                info!("Migration {} accepts schema hash {}", migration.name, hash);
                Some(ChangelogEntry::new(hash, now, Some(migration.name.clone())))
            })
            .collect();

        let added = new_entries.len();
        if added > 0 {
            self.entries.extend(new_entries);
            self.save()?;
        }
        Ok(added)
    }

    fn save(&self) -> Result<(), SchemaError> {
        let mut json = serde_json::to_string_pretty(&self.entries).map_err(|e| {
            SchemaError::io(
                "Failed to serialize",
                &self.path,
                io::Error::new(io::ErrorKind::InvalidData, e),
            )
        })?;
        json.push('\n');
        write_atomic(&self.path, &json)
    }
}
