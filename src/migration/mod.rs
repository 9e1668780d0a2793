//! Schema hashing, snapshots, the acceptance changelog and drift detection
//!
//! A generation pass runs these stages in order:
//! - [`plan`]: registry → table definitions → DDL → per-artifact hashes → overall hash
//! - [`changelog`]: the last accepted hash
//! - [`detector`]: compare, then write snapshots and scaffold a migration stub on drift
//!
//! # Example
//!
//! ```rust,no_run
//! use schemaguard::migration::{GenerateOptions, SchemaDetector, SchemaError};
//! use schemaguard::{SchemaConfig, SchemaRegistry};
//! use std::path::Path;
//!
//! let registry = SchemaRegistry::from_manifest(Path::new("schema/registry.json"))?;
//! let detector = SchemaDetector::new(SchemaConfig::with_root("."));
//!
//! match detector.run(&registry, &GenerateOptions::default()) {
//!     Ok(report) => println!("schema {} is accepted", report.hash),
//!     Err(SchemaError::SchemaDriftDetected { hash, migration }) => {
//!         println!("accept {} by editing {:?}", hash, migration);
//!     }
//!     Err(e) => return Err(e),
//! }
//! # Ok::<(), SchemaError>(())
//! ```

pub mod changelog;
pub mod checksum;
pub mod detector;
pub mod diff;
pub mod error;
pub mod file;
pub mod plan;
pub mod scaffold;
pub mod snapshot;
pub mod status;

pub use changelog::{ChangelogEntry, SchemaChangelog};
pub use checksum::{aggregate_hash, hash_sql};
pub use detector::{AcceptReport, CleanReport, GenerateOptions, SchemaDetector};
pub use error::{CollectionFailure, SchemaError};
pub use file::MigrationFile;
pub use plan::{Artifact, ArtifactKey, ArtifactKind, SchemaPlan};
pub use snapshot::{read_snapshot, Snapshot, SnapshotRead};
pub use status::SchemaStatus;
