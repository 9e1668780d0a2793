//! CLI error type and exit codes

use schemaguard::SchemaError;
use thiserror::Error;

/// Exit code for a clean schema
pub const EXIT_CLEAN: i32 = 0;
/// Exit code for any failure other than drift
pub const EXIT_FAILURE: i32 = 1;
/// Exit code when the schema needs a migration
pub const EXIT_DRIFT: i32 = 2;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Failed to load schema registry: {0}")]
    Registry(#[source] SchemaError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl CommandError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::Schema(e) if e.is_drift() => EXIT_DRIFT,
            _ => EXIT_FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let drift = CommandError::Schema(SchemaError::SchemaDriftDetected {
            hash: "ab".to_string(),
            migration: None,
        });
        assert_eq!(drift.exit_code(), EXIT_DRIFT);

        let corrupt = CommandError::Schema(SchemaError::LedgerCorrupt {
            path: "schema/schema_changelog.json".into(),
            reason: "bad".to_string(),
        });
        assert_eq!(corrupt.exit_code(), EXIT_FAILURE);

        let registry = CommandError::Registry(SchemaError::Registry("bad".to_string()));
        assert_eq!(registry.exit_code(), EXIT_FAILURE);
    }
}
