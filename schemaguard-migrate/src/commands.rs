//! Command handlers

use crate::error::CommandError;
use colored::Colorize;
use log::debug;
use schemaguard::migration::AcceptReport;
use schemaguard::{
    CleanReport, GenerateOptions, SchemaConfig, SchemaDetector, SchemaError, SchemaRegistry,
    SchemaStatus,
};
use std::path::{Path, PathBuf};

/// Where the CLI reads its settings from, after flag overrides
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Project root (`--root`)
    pub root: Option<PathBuf>,
    /// Registry manifest (`--registry`)
    pub registry: Option<PathBuf>,
}

/// Load configuration from `config_path` and apply command-line overrides
///
/// A relative `config_path` is resolved against `--root` when one is given.
pub fn load_config(config_path: &Path, overrides: &Overrides) -> Result<SchemaConfig, CommandError> {
    let config_path = match &overrides.root {
        Some(root) if config_path.is_relative() => root.join(config_path),
        _ => config_path.to_path_buf(),
    };
    debug!("Loading configuration from {}", config_path.display());
    let mut config = SchemaConfig::load_from(&config_path)?;
    if let Some(root) = &overrides.root {
        config.root_dir = root.clone();
    }
    if let Some(registry) = &overrides.registry {
        config.registry_path = registry.clone();
    }
    Ok(config)
}

/// Load the registry manifest named by the configuration
pub fn load_registry(config: &SchemaConfig) -> Result<SchemaRegistry, CommandError> {
    let path = config.registry_manifest_path();
    let registry = SchemaRegistry::from_manifest(&path).map_err(CommandError::Registry)?;
    debug!(
        "Loaded {} collection(s) from {}",
        registry.collections().len(),
        path.display()
    );
    Ok(registry)
}

/// `generate-schema`
pub fn handle_generate(
    detector: &SchemaDetector,
    registry: &SchemaRegistry,
    options: &GenerateOptions,
) -> Result<CleanReport, CommandError> {
    match detector.run(registry, options) {
        Ok(report) => {
            if report.synced_entries > 0 {
                println!(
                    "Recorded {} accepted schema hash(es) from migrations",
                    report.synced_entries
                );
            }
            println!(
                "{} Schema is up to date ({})",
                "✅".green(),
                report.hash
            );
            if report.snapshot_written {
                println!(
                    "   Updated {}",
                    detector.config().accepted_schema_path().display()
                );
            }
            Ok(report)
        }
        Err(SchemaError::SchemaDriftDetected { hash, migration }) => {
            println!("{} Schema has changed: {}", "⚠️".yellow(), hash.as_str().bold());
            if let Some(path) = &migration {
                println!("   Generated migration stub: {}", path.display());
                println!("   Edit the file, uncomment ACCEPTS_SCHEMA_HASH, then run `schemaguard-migrate accept-schema`");
            }
            Err(SchemaError::SchemaDriftDetected { hash, migration }.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// `accept-schema`
pub fn handle_accept(
    detector: &SchemaDetector,
    registry: &SchemaRegistry,
    flavor: Option<&str>,
    migration: Option<&str>,
) -> Result<AcceptReport, CommandError> {
    let report = detector.accept_current(registry, flavor, migration)?;
    if report.appended {
        println!("{} Accepted schema hash {}", "✅".green(), report.hash);
    } else {
        println!("✅ Schema hash {} was already accepted", report.hash);
    }
    Ok(report)
}

/// `status`
pub fn handle_status(
    detector: &SchemaDetector,
    registry: &SchemaRegistry,
    flavor: Option<&str>,
) -> Result<SchemaStatus, CommandError> {
    let status = detector.status(registry, flavor)?;

    println!("\n📊 Schema Status\n");
    match &status.accepted {
        Some(entry) => println!(
            "Accepted:  {} ({}{})",
            entry.hash,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry
                .migration_name
                .as_deref()
                .map(|m| format!(", by {}", m))
                .unwrap_or_default()
        ),
        None => println!("Accepted:  none"),
    }
    println!("Current:   {}", status.current_hash);
    println!("Changelog: {} entries", status.ledger_entries);

    if status.is_up_to_date() {
        println!("\n{}", "✓ Schema is up to date".green());
    } else {
        println!("\n{}", "✗ Schema has unaccepted changes".red());
    }
    if status.to_accept_present {
        println!("  schema_to_accept.sql is present");
    }
    if status.accepted_snapshot_corrupt {
        println!("  {}", "accepted_schema.sql failed its checksum".yellow());
    }
    if !status.pending_stubs.is_empty() {
        println!("\n⏳ Migration stubs awaiting a hash ({}):", status.pending_stubs.len());
        for stub in &status.pending_stubs {
            println!("  ⏳ {}", stub.path.display());
        }
    }
    if status.needs_sync() {
        println!(
            "\n📝 Migrations not yet in the changelog ({}):",
            status.unsynced_migrations.len()
        );
        for migration in &status.unsynced_migrations {
            println!("  • {}", migration.name);
        }
    }

    Ok(status)
}
