//! Schema generation error types

use std::path::{Path, PathBuf};

/// A collection that failed to compile during a generation pass
#[derive(Debug)]
pub struct CollectionFailure {
    pub collection: String,
    pub error: SchemaError,
}

/// Schema generation errors
#[derive(Debug)]
pub enum SchemaError {
    /// Field type has no SQL mapping
    UnsupportedColumnType {
        collection: String,
        field: String,
        type_name: String,
    },
    /// Index references unknown fields or has no fields
    InvalidIndex { table: String, reason: String },
    /// A statement carried bound arguments where literal DDL was required
    ArgumentBindingNotAllowed { statement: String, count: usize },
    /// Collection registered twice
    DuplicateCollection(String),
    /// Registry manifest could not be parsed
    Registry(String),
    /// Changelog file exists but cannot be trusted
    LedgerCorrupt { path: PathBuf, reason: String },
    /// One or more collections failed; nothing was written
    PartialSchemaGenerationFailure { failures: Vec<CollectionFailure> },
    /// Current schema hash is not the accepted one
    SchemaDriftDetected {
        hash: String,
        migration: Option<PathBuf>,
    },
    /// Filesystem failure
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SchemaError {
    pub(crate) fn io(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        SchemaError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this error reports drift rather than a failure
    pub fn is_drift(&self) -> bool {
        matches!(self, SchemaError::SchemaDriftDetected { .. })
    }
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::UnsupportedColumnType {
                collection,
                field,
                type_name,
            } => write!(
                f,
                "Field '{}.{}' has type '{}' which has no SQL column mapping",
                collection, field, type_name
            ),
            SchemaError::InvalidIndex { table, reason } => {
                write!(f, "Invalid index on table '{}': {}", table, reason)
            }
            SchemaError::ArgumentBindingNotAllowed { statement, count } => write!(
                f,
                "Statement has {} bound argument(s) but DDL must be fully literal: {}",
                count, statement
            ),
            SchemaError::DuplicateCollection(name) => {
                write!(f, "Collection '{}' is registered more than once", name)
            }
            SchemaError::Registry(msg) => write!(f, "Invalid schema registry: {}", msg),
            SchemaError::LedgerCorrupt { path, reason } => write!(
                f,
                "Schema changelog {} is corrupt: {}\n\
                 Suggestion: restore the file from version control before accepting new schemas",
                path.display(),
                reason
            ),
            SchemaError::PartialSchemaGenerationFailure { failures } => {
                write!(
                    f,
                    "Failed to generate schema for {} collection(s):",
                    failures.len()
                )?;
                for failure in failures {
                    write!(f, "\n  - {}: {}", failure.collection, failure.error)?;
                }
                Ok(())
            }
            SchemaError::SchemaDriftDetected { hash, migration } => {
                write!(
                    f,
                    "Schema has changed (current hash {}). Write a migration that accepts this hash",
                    hash
                )?;
                if let Some(path) = migration {
                    write!(f, "\nA migration stub was created at {}", path.display())?;
                }
                Ok(())
            }
            SchemaError::Io { action, path, source } => {
                write!(f, "{} {}: {}", action, path.display(), source)
            }
        }
    }
}

impl std::error::Error for SchemaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SchemaError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
