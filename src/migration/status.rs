//! Read-only schema status reporting

use crate::migration::file::MigrationFile;
use crate::migration::ChangelogEntry;

/// Schema status information
#[derive(Debug, Clone)]
pub struct SchemaStatus {
    /// Latest changelog entry, if anything was ever accepted
    pub accepted: Option<ChangelogEntry>,

    /// Overall hash of the schema as currently defined
    pub current_hash: String,

    /// Number of changelog entries
    pub ledger_entries: usize,

    /// Generated stubs that don't accept a hash yet
    pub pending_stubs: Vec<MigrationFile>,

    /// Migrations accepting a hash the changelog doesn't record yet
    pub unsynced_migrations: Vec<MigrationFile>,

    /// Whether `schema_to_accept.sql` exists
    pub to_accept_present: bool,

    /// Whether `accepted_schema.sql` failed its checksum
    pub accepted_snapshot_corrupt: bool,
}

impl SchemaStatus {
    /// Check if the current schema is the accepted one
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.accepted_hash() == Some(self.current_hash.as_str())
    }

    #[must_use]
    pub fn accepted_hash(&self) -> Option<&str> {
        self.accepted.as_ref().map(|e| e.hash.as_str())
    }

    /// Whether syncing the changelog from migrations would change it
    #[must_use]
    pub fn needs_sync(&self) -> bool {
        !self.unsynced_migrations.is_empty()
    }
}
