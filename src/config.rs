//! Layered configuration for schema generation.
//!
//! [`SchemaConfig`] is read from the `[schema]` table of
//! `config/schemaguard.toml` (optional) overlaid by environment variables such
//! as `SCHEMAGUARD__SCHEMA__MIGRATIONS_DIR`. Every key has a default, so an
//! empty environment yields a usable configuration rooted at `.`.

use config::{Config, ConfigError, Environment, File};
use log::warn;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/schemaguard.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchemaConfig {
    /// Project root; relative paths below are resolved against it
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    /// Directory holding the snapshots and the changelog
    #[serde(default = "default_schema_dir")]
    pub schema_dir: PathBuf,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
    /// JSON registry manifest used by the CLI
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,
    /// Extension of migration files, without the dot
    #[serde(default = "default_migration_extension")]
    pub migration_extension: String,
    /// Bytes of diff embedded in a stub before truncation
    #[serde(default = "default_diff_size_limit")]
    pub diff_size_limit: usize,
    /// Render diffs with `git diff` instead of the built-in diff
    #[serde(default)]
    pub external_diff: bool,
    #[serde(default = "default_diff_timeout_ms")]
    pub diff_timeout_ms: u64,
    /// Threads compiling collections
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_schema_dir() -> PathBuf {
    PathBuf::from("schema")
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("schema/registry.json")
}

fn default_migration_extension() -> String {
    "rs".to_string()
}

fn default_diff_size_limit() -> usize {
    30_000
}

fn default_diff_timeout_ms() -> u64 {
    5_000
}

fn default_workers() -> usize {
    4
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            schema_dir: default_schema_dir(),
            migrations_dir: default_migrations_dir(),
            registry_path: default_registry_path(),
            migration_extension: default_migration_extension(),
            diff_size_limit: default_diff_size_limit(),
            external_diff: false,
            diff_timeout_ms: default_diff_timeout_ms(),
            workers: default_workers(),
        }
    }
}

impl SchemaConfig {
    /// Default configuration rooted at `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root.into(),
            ..Self::default()
        }
    }

    /// Load from `config/schemaguard.toml`, falling back to env vars
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Load from a specific TOML file (optional) plus env vars
    ///
    /// An unreadable file is logged and skipped. A missing `[schema]` section
    /// yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let env = || {
            Environment::with_prefix("SCHEMAGUARD")
                .separator("__")
                .try_parsing(true)
        };

        let builder = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(env());

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                if path.exists() {
                    warn!(
                        "Failed to load config file {}, falling back to env. Error: {}",
                        path.display(),
                        err
                    );
                }
                Config::builder().add_source(env()).build().map_err(|env_err| {
                    ConfigError::Message(format!(
                        "Failed to load configuration from file and env: {}, then env-only error: {}",
                        err, env_err
                    ))
                })?
            }
        };

        match settings.get::<SchemaConfig>("schema") {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "Schema configuration could not be loaded from file or environment: {}",
                e
            ))),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_dir.join(path)
        }
    }

    pub fn schema_path(&self) -> PathBuf {
        self.resolve(&self.schema_dir)
    }

    pub fn accepted_schema_path(&self) -> PathBuf {
        self.schema_path().join("accepted_schema.sql")
    }

    pub fn schema_to_accept_path(&self) -> PathBuf {
        self.schema_path().join("schema_to_accept.sql")
    }

    pub fn changelog_path(&self) -> PathBuf {
        self.schema_path().join("schema_changelog.json")
    }

    pub fn migrations_path(&self) -> PathBuf {
        self.resolve(&self.migrations_dir)
    }

    pub fn registry_manifest_path(&self) -> PathBuf {
        self.resolve(&self.registry_path)
    }

    pub fn diff_timeout(&self) -> Duration {
        Duration::from_millis(self.diff_timeout_ms)
    }
}
