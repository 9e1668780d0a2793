//! Span constructors for generation passes.
//!
//! Callers enter these behind `#[cfg(feature = "tracing")]`:
//!
//! ```rust,ignore
//! #[cfg(feature = "tracing")]
//! let _span = tracing_helpers::generate_schema_span(flavor).entered();
//! ```

use tracing::Span;

/// Span covering one full detection pass
pub fn generate_schema_span(flavor: Option<&str>) -> Span {
    tracing::info_span!("schemaguard.generate", flavor = flavor.unwrap_or("default"))
}

/// Span covering the compilation of one collection
pub fn compile_collection_span(collection: &str) -> Span {
    tracing::debug_span!("schemaguard.compile_collection", collection = collection)
}

/// Span covering an explicit acceptance
pub fn accept_schema_span(migration: Option<&str>) -> Span {
    tracing::info_span!("schemaguard.accept", migration = migration.unwrap_or(""))
}

/// Span covering a diff between two snapshots
pub fn diff_span(external: bool) -> Span {
    tracing::debug_span!("schemaguard.diff", external = external)
}
