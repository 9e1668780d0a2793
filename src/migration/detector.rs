//! Drift detection: the full generation pass.
//!
//! A pass loads the changelog, computes the schema, and compares the overall
//! hash with the accepted one:
//!
//! - **Clean**: the accepted snapshot is (re)written if its content changed and
//!   any stale `schema_to_accept.sql` is removed.
//! - **Drift**: `schema_to_accept.sql` is written, diffed against the accepted
//!   snapshot, and a migration stub embedding the diff is generated. The pass
//!   then fails with [`SchemaError::SchemaDriftDetected`] so pipelines stop
//!   until someone accepts the change.
//!
//! Every failure that can happen before the comparison (corrupt changelog,
//! collection errors) is raised before anything is written.

use crate::config::SchemaConfig;
use crate::migration::changelog::{ChangelogEntry, SchemaChangelog};
use crate::migration::diff::{snapshot_diff, DiffSide};
use crate::migration::file::{discover_migrations, remove_if_exists, write_if_changed};
use crate::migration::plan::SchemaPlan;
use crate::migration::scaffold::MigrationStub;
use crate::migration::snapshot::{read_snapshot, Snapshot, SnapshotRead};
use crate::migration::status::SchemaStatus;
use crate::migration::SchemaError;
use crate::registry::SchemaRegistry;
#[cfg(feature = "tracing")]
use crate::tracing_helpers;
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::path::PathBuf;

/// What a generation pass is allowed to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Sync the changelog from migration files before comparing
    pub write_changelog: bool,
    /// Write `accepted_schema.sql` / `schema_to_accept.sql`
    pub write_snapshot: bool,
    /// Generate a migration stub on drift
    pub generate_migration: bool,
    /// Deployment flavor selecting per-flavor field defaults
    pub flavor: Option<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            write_changelog: true,
            write_snapshot: true,
            generate_migration: true,
            flavor: None,
        }
    }
}

/// Outcome of a pass that found no drift
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub hash: String,
    /// The changelog entry that accepts `hash`
    pub accepted: ChangelogEntry,
    /// Entries appended while syncing from migration files
    pub synced_entries: usize,
    /// Whether `accepted_schema.sql` was (re)written
    pub snapshot_written: bool,
    /// Whether a stale `schema_to_accept.sql` was removed
    pub removed_to_accept: bool,
}

/// Outcome of an explicit acceptance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptReport {
    pub hash: String,
    /// False when the hash was already the accepted one
    pub appended: bool,
}

/// Runs generation passes against one project layout
#[derive(Debug, Clone)]
pub struct SchemaDetector {
    config: SchemaConfig,
    clock: fn() -> DateTime<Utc>,
}

impl SchemaDetector {
    pub fn new(config: SchemaConfig) -> Self {
        Self {
            config,
            clock: Utc::now,
        }
    }

    /// Replace the clock used for changelog timestamps and stub names
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// Compute the schema without touching the filesystem
    pub fn compute(
        &self,
        registry: &SchemaRegistry,
        flavor: Option<&str>,
    ) -> Result<SchemaPlan, SchemaError> {
        SchemaPlan::compute(registry, flavor, self.config.workers)
    }

    /// Run a full generation pass
    ///
    /// # Errors
    ///
    /// - `SchemaError::LedgerCorrupt` if the changelog can't be trusted
    /// - `SchemaError::PartialSchemaGenerationFailure` if any collection failed
    /// - `SchemaError::SchemaDriftDetected` if the schema is not accepted
    /// - `SchemaError::Io` if a write fails
    pub fn run(
        &self,
        registry: &SchemaRegistry,
        options: &GenerateOptions,
    ) -> Result<CleanReport, SchemaError> {
        let flavor = options.flavor.as_deref();
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::generate_schema_span(flavor).entered();

        let mut ledger = SchemaChangelog::load(&self.config.changelog_path())?;
        let plan = self.compute(registry, flavor)?;
        let now = (self.clock)();

        let synced_entries = if options.write_changelog {
            ledger.sync_from_migrations(
                &self.config.migrations_path(),
                &self.config.migration_extension,
                now,
            )?
        } else {
            0
        };

        let hash = plan.overall_hash().to_string();
        match ledger.accepted() {
            Some(entry) if entry.hash == hash => {
                let accepted = entry.clone();
                self.finish_clean(&plan, accepted, synced_entries, options)
            }
            other => {
                warn!(
                    "Schema hash {} does not match accepted hash {}",
                    hash,
                    other.map_or("<none>", |e| e.hash.as_str())
                );
                Err(self.finish_drift(&plan, now, options)?)
            }
        }
    }

    fn finish_clean(
        &self,
        plan: &SchemaPlan,
        accepted: ChangelogEntry,
        synced_entries: usize,
        options: &GenerateOptions,
    ) -> Result<CleanReport, SchemaError> {
        let (snapshot_written, removed_to_accept) = if options.write_snapshot {
            let acceptance = accepted.acceptance();
            let written =
                Snapshot::accepted(plan, &acceptance).write(&self.config.accepted_schema_path())?;
            let removed = remove_if_exists(&self.config.schema_to_accept_path())?;
            (written, removed)
        } else {
            (false, false)
        };

        info!("Schema is up to date (hash {})", plan.overall_hash());
        Ok(CleanReport {
            hash: plan.overall_hash().to_string(),
            accepted,
            synced_entries,
            snapshot_written,
            removed_to_accept,
        })
    }

    /// Write the drift artifacts and build the drift error
    fn finish_drift(
        &self,
        plan: &SchemaPlan,
        now: DateTime<Utc>,
        options: &GenerateOptions,
    ) -> Result<SchemaError, SchemaError> {
        let accepted_path = self.config.accepted_schema_path();
        let to_accept_path = self.config.schema_to_accept_path();
        let pending = Snapshot::pending(plan).render();

        if options.write_snapshot {
            write_if_changed(&to_accept_path, &pending)?;
            info!("Wrote {}", to_accept_path.display());
        }

        let mut migration = None;
        if options.generate_migration {
            let accepted = read_snapshot(&accepted_path)?;
            if let SnapshotRead::Corrupt(reason) = &accepted {
                warn!(
                    "Ignoring corrupt snapshot {}: {}",
                    accepted_path.display(),
                    reason
                );
            }

            let accepted_label = self.relative_schema_file("accepted_schema.sql");
            let to_accept_label = self.relative_schema_file("schema_to_accept.sql");
            let diff = snapshot_diff(
                DiffSide {
                    path: &accepted_path,
                    label: &accepted_label.display().to_string(),
                    text: accepted.diff_text(),
                },
                DiffSide {
                    path: &to_accept_path,
                    label: &to_accept_label.display().to_string(),
                    text: &pending,
                },
                self.config.external_diff
                    && options.write_snapshot
                    && matches!(accepted, SnapshotRead::Valid(_)),
                self.config.diff_timeout(),
            );

            let stub = MigrationStub {
                generated_at: now,
                diff: &diff,
                hash: plan.overall_hash(),
                accepted_path: &accepted_label,
                to_accept_path: &to_accept_label,
                diff_size_limit: self.config.diff_size_limit,
            };
            migration = Some(stub.write(
                &self.config.migrations_path(),
                &self.config.migration_extension,
            )?);
        }

        Ok(SchemaError::SchemaDriftDetected {
            hash: plan.overall_hash().to_string(),
            migration,
        })
    }

    fn relative_schema_file(&self, file: &str) -> PathBuf {
        self.config.schema_dir.join(file)
    }

    /// Append the current schema hash to the changelog
    ///
    /// Used once a human has written the migration for a detected change.
    /// Nothing but the changelog is written; the next pass rewrites the
    /// snapshots.
    pub fn accept_current(
        &self,
        registry: &SchemaRegistry,
        flavor: Option<&str>,
        migration_name: Option<&str>,
    ) -> Result<AcceptReport, SchemaError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::accept_schema_span(migration_name).entered();

        let mut ledger = SchemaChangelog::load(&self.config.changelog_path())?;
        let plan = self.compute(registry, flavor)?;
        let hash = plan.overall_hash().to_string();
        let appended = ledger.record_acceptance(&hash, migration_name, (self.clock)())?;
        Ok(AcceptReport { hash, appended })
    }

    /// Report the schema state without writing anything
    pub fn status(
        &self,
        registry: &SchemaRegistry,
        flavor: Option<&str>,
    ) -> Result<SchemaStatus, SchemaError> {
        let ledger = SchemaChangelog::load(&self.config.changelog_path())?;
        let plan = self.compute(registry, flavor)?;
        let migrations = discover_migrations(
            &self.config.migrations_path(),
            &self.config.migration_extension,
        )?;

        let unsynced_migrations: Vec<_> = ledger.unrecorded(&migrations).into_iter().cloned().collect();
        let pending_stubs: Vec<_> = migrations
            .into_iter()
            .filter(|m| m.accepts_hash.is_none() && m.generated)
            .collect();

        let accepted_snapshot_corrupt = matches!(
            read_snapshot(&self.config.accepted_schema_path())?,
            SnapshotRead::Corrupt(_)
        );

        Ok(SchemaStatus {
            accepted: ledger.accepted().cloned(),
            current_hash: plan.overall_hash().to_string(),
            ledger_entries: ledger.entries().len(),
            pending_stubs,
            unsynced_migrations,
            to_accept_present: self.config.schema_to_accept_path().exists(),
            accepted_snapshot_corrupt,
        })
    }
}
