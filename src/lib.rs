//! # Schemaguard
//!
//! Content-addressed schema snapshots for PostgreSQL.
//!
//! Collections registered in a [`SchemaRegistry`] are turned into table
//! definitions, compiled to canonical DDL, hashed, and compared against the
//! last accepted hash recorded in `schema_changelog.json`. When the hashes
//! differ, a `schema_to_accept.sql` snapshot and a migration stub are written
//! so a human can acknowledge the change.
//!
//! ```rust,no_run
//! use schemaguard::{CollectionDescriptor, FieldSchema, GenerateOptions, SchemaConfig, SchemaDetector, SchemaRegistry};
//!
//! let mut registry = SchemaRegistry::new();
//! registry.register_collection(
//!     CollectionDescriptor::new("Posts").field("title", FieldSchema::new("String").not_null()),
//! )?;
//!
//! let detector = SchemaDetector::new(SchemaConfig::with_root("."));
//! detector.run(&registry, &GenerateOptions::default())?;
//! # Ok::<(), schemaguard::SchemaError>(())
//! ```

pub mod config;
pub mod migration;
pub mod query;
pub mod registry;
pub mod table;
#[cfg(feature = "tracing")]
pub mod tracing_helpers;

pub use config::SchemaConfig;
pub use migration::{
    AcceptReport, ChangelogEntry, CleanReport, GenerateOptions, SchemaChangelog, SchemaDetector,
    SchemaError, SchemaPlan, SchemaStatus,
};
pub use registry::{
    CollectionDescriptor, FieldDefault, FieldSchema, IndexSpec, SchemaRegistry, ViewDescriptor,
};
pub use table::{ColumnDefinition, IndexDefinition, SqlType, TableDefinition};
