//! The compute stage of a generation pass.
//!
//! Turns a registry into an ordered list of hashed artifacts and the overall
//! schema hash. Nothing here touches the filesystem.
//!
//! Collections are compiled on a small pool of scoped worker threads. Each
//! worker reports either the collection's artifacts or its error; the pool is
//! joined before anything is aggregated, and results are sorted by collection
//! name so the output never depends on scheduling.

use crate::migration::checksum::{aggregate_hash, hash_sql};
use crate::migration::error::CollectionFailure;
use crate::migration::SchemaError;
use crate::query::{
    format_statement, CreateExtensionQuery, CreateIndexQuery, CreateTableQuery, CreateViewQuery,
    CustomIndexQuery, RawFunctionQuery, SchemaQuery,
};
use crate::registry::{CollectionDescriptor, SchemaRegistry};
use crate::table::TableDefinition;
#[cfg(feature = "tracing")]
use crate::tracing_helpers;
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::thread;

/// Kind of schema artifact, in snapshot order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKind {
    Extension,
    Table,
    Index,
    Function,
    CustomIndex,
    View,
    ViewIndex,
}

impl ArtifactKind {
    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::Extension => "Extension",
            ArtifactKind::Table => "Table",
            ArtifactKind::Index => "Index",
            ArtifactKind::Function => "Function",
            ArtifactKind::CustomIndex => "Custom index",
            ArtifactKind::View => "View",
            ArtifactKind::ViewIndex => "View index",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifies an artifact within one pass
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactKey {
    pub kind: ArtifactKind,
    pub name: String,
}

/// One compiled and hashed piece of the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    /// Display name used in snapshot comments
    pub name: String,
    /// Canonical single-line statement the hash is computed over
    pub statement: String,
    /// Statement as it appears in the snapshot
    pub pretty: String,
    pub hash: String,
}

impl Artifact {
    fn compile(kind: ArtifactKind, name: String, query: &dyn SchemaQuery) -> Result<Self, SchemaError> {
        let statement = query.statement()?;
        let hash = hash_sql(&statement);
        debug!("{} \"{}\" hash {}", kind, name, hash);
        Ok(Self {
            kind,
            name,
            pretty: format_statement(&statement),
            statement,
            hash,
        })
    }

    pub fn key(&self) -> ArtifactKey {
        ArtifactKey {
            kind: self.kind,
            name: self.name.clone(),
        }
    }
}

/// Result of the compute stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPlan {
    artifacts: Vec<Artifact>,
    overall_hash: String,
}

impl SchemaPlan {
    /// Compile every artifact in the registry
    ///
    /// Artifacts are ordered extensions, collections by name (each table
    /// followed by its indexes), functions, custom indexes, then views each
    /// followed by its indexes. An artifact whose kind and statement repeat an
    /// earlier one is dropped.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::PartialSchemaGenerationFailure` naming every
    /// collection that failed, after all collections were attempted. Errors in
    /// registry-level fragments are returned directly.
    pub fn compute(
        registry: &SchemaRegistry,
        flavor: Option<&str>,
        workers: usize,
    ) -> Result<Self, SchemaError> {
        let mut builder = PlanBuilder::default();

        for name in registry.extensions() {
            builder.push(Artifact::compile(
                ArtifactKind::Extension,
                name.trim().to_string(),
                &CreateExtensionQuery::new(name.as_str()),
            )?);
        }

        let mut failures = Vec::new();
        for (collection, result) in compile_collections(registry.collections(), flavor, workers) {
            match result {
                Ok(artifacts) => artifacts.into_iter().for_each(|a| builder.push(a)),
                Err(error) => {
                    error!("Failed to generate schema for collection {}: {}", collection, error);
                    failures.push(CollectionFailure { collection, error });
                }
            }
        }
        if !failures.is_empty() {
            return Err(SchemaError::PartialSchemaGenerationFailure { failures });
        }

        for body in registry.functions() {
            let query = RawFunctionQuery::new(body.as_str());
            let name = query.name();
            builder.push_unnamed(ArtifactKind::Function, name, &query)?;
        }

        for body in registry.custom_indexes() {
            let query = CustomIndexQuery::new(body.as_str());
            let name = query.name();
            builder.push_unnamed(ArtifactKind::CustomIndex, name, &query)?;
        }

        for view in registry.views() {
            builder.push(Artifact::compile(
                ArtifactKind::View,
                view.name.clone(),
                &CreateViewQuery::new(view.query.as_str()),
            )?);
            for index_query in &view.index_queries {
                let name = CustomIndexQuery::new(index_query.as_str()).name();
                builder.push_unnamed(
                    ArtifactKind::ViewIndex,
                    name,
                    &CreateViewQuery::new(index_query.as_str()),
                )?;
            }
        }

        let plan = builder.finish();
        info!(
            "Computed schema hash {} from {} artifacts",
            plan.overall_hash,
            plan.artifacts.len()
        );
        Ok(plan)
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Aggregate of every artifact hash
    pub fn overall_hash(&self) -> &str {
        &self.overall_hash
    }

    /// Per-artifact hashes keyed by kind and name
    pub fn hashes(&self) -> BTreeMap<ArtifactKey, String> {
        self.artifacts
            .iter()
            .map(|a| (a.key(), a.hash.clone()))
            .collect()
    }
}

#[derive(Default)]
struct PlanBuilder {
    artifacts: Vec<Artifact>,
    seen: HashSet<(ArtifactKind, String)>,
}

impl PlanBuilder {
    fn push(&mut self, artifact: Artifact) {
        if self.seen.insert((artifact.kind, artifact.statement.clone())) {
            self.artifacts.push(artifact);
        } else {
            debug!("Skipping repeated {} \"{}\"", artifact.kind, artifact.name);
        }
    }

    /// Raw fragments without an extractable name are named by their hash
    fn push_unnamed(
        &mut self,
        kind: ArtifactKind,
        name: Option<String>,
        query: &dyn SchemaQuery,
    ) -> Result<(), SchemaError> {
        let mut artifact = Artifact::compile(kind, name.unwrap_or_default(), query)?;
        if artifact.name.is_empty() {
            artifact.name = artifact.hash[..12].to_string();
        }
        self.push(artifact);
        Ok(())
    }

    fn finish(self) -> SchemaPlan {
        let overall_hash = aggregate_hash(self.artifacts.iter().map(|a| a.hash.as_str()));
        SchemaPlan {
            artifacts: self.artifacts,
            overall_hash,
        }
    }
}

/// Compile one collection to its table and index artifacts
pub fn compile_collection(
    collection: &CollectionDescriptor,
    flavor: Option<&str>,
) -> Result<Vec<Artifact>, SchemaError> {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::compile_collection_span(&collection.name).entered();

    let table = TableDefinition::from_collection(collection, flavor)?;
    let mut artifacts = Vec::with_capacity(table.indexes.len() + 1);
    artifacts.push(Artifact::compile(
        ArtifactKind::Table,
        table.name.clone(),
        &CreateTableQuery::new(&table),
    )?);
    for index in &table.indexes {
        artifacts.push(Artifact::compile(
            ArtifactKind::Index,
            index.name(),
            &CreateIndexQuery::new(index),
        )?);
    }
    Ok(artifacts)
}

type CollectionResult = (String, Result<Vec<Artifact>, SchemaError>);

fn compile_collections(
    collections: &[CollectionDescriptor],
    flavor: Option<&str>,
    workers: usize,
) -> Vec<CollectionResult> {
    let workers = workers.clamp(1, collections.len().max(1));
    let (job_tx, job_rx) = crossbeam_channel::unbounded::<&CollectionDescriptor>();
    let (result_tx, result_rx) = crossbeam_channel::unbounded::<CollectionResult>();

    for collection in collections {
        let _ = job_tx.send(collection);
    }
    drop(job_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let rx = job_rx.clone();
            let tx = result_tx.clone();
            scope.spawn(move || run_compile_worker(rx, tx, flavor));
        }
    });
    drop(result_tx);

    let mut results: Vec<CollectionResult> = result_rx.iter().collect();
    results.sort_by(|a, b| a.0.cmp(&b.0));
    results
}

fn run_compile_worker(
    rx: Receiver<&CollectionDescriptor>,
    tx: Sender<CollectionResult>,
    flavor: Option<&str>,
) {
    while let Ok(collection) = rx.recv() {
        let result = compile_collection(collection, flavor);
        let _ = tx.send((collection.name.clone(), result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FieldSchema, IndexSpec, ViewDescriptor};

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.add_extension("pg_trgm");
        registry
            .register_collection(
                CollectionDescriptor::new("Users").field("karma", FieldSchema::new("Number")),
            )
            .unwrap();
        registry
            .register_collection(
                CollectionDescriptor::new("Posts")
                    .field("title", FieldSchema::new("String"))
                    .field("userId", FieldSchema::reference("Users"))
                    .index(IndexSpec::new(["userId"])),
            )
            .unwrap();
        registry.add_function("CREATE OR REPLACE FUNCTION one() RETURNS INT AS $$ SELECT 1 $$ LANGUAGE sql;");
        registry.add_custom_index("CREATE INDEX CONCURRENTLY IF NOT EXISTS idx_title ON \"Posts\" (title)");
        registry.add_view(
            ViewDescriptor::new("PostTitles", "CREATE VIEW \"PostTitles\" AS SELECT title FROM \"Posts\"")
                .with_index("CREATE INDEX IF NOT EXISTS idx_post_titles ON \"PostTitles\" (title)"),
        );
        registry
    }

    #[test]
    fn test_artifact_order() {
        let plan = SchemaPlan::compute(&registry(), None, 4).unwrap();
        let order: Vec<(ArtifactKind, &str)> = plan
            .artifacts()
            .iter()
            .map(|a| (a.kind, a.name.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (ArtifactKind::Extension, "pg_trgm"),
                (ArtifactKind::Table, "Posts"),
                (ArtifactKind::Index, "idx_Posts_userId"),
                (ArtifactKind::Table, "Users"),
                (ArtifactKind::Function, "one"),
                (ArtifactKind::CustomIndex, "idx_title"),
                (ArtifactKind::View, "PostTitles"),
                (ArtifactKind::ViewIndex, "idx_post_titles"),
            ]
        );
    }

    #[test]
    fn test_worker_count_does_not_change_hash() {
        let one = SchemaPlan::compute(&registry(), None, 1).unwrap();
        let many = SchemaPlan::compute(&registry(), None, 8).unwrap();
        assert_eq!(one, many);
    }

    #[test]
    fn test_overall_hash_aggregates_artifacts() {
        let plan = SchemaPlan::compute(&registry(), None, 2).unwrap();
        let expected = aggregate_hash(plan.hashes().values());
        assert_eq!(plan.overall_hash(), expected);
    }

    #[test]
    fn test_repeated_fragments_dropped() {
        let mut registry = registry();
        registry.add_function("  CREATE OR REPLACE FUNCTION one() RETURNS INT AS $$ SELECT 1 $$ LANGUAGE sql");
        let plan = SchemaPlan::compute(&registry, None, 2).unwrap();
        let functions = plan
            .artifacts()
            .iter()
            .filter(|a| a.kind == ArtifactKind::Function)
            .count();
        assert_eq!(functions, 1);
    }

    #[test]
    fn test_all_failures_reported() {
        let mut registry = registry();
        registry
            .register_collection(CollectionDescriptor::new("Bad").field("x", FieldSchema::new("Geo")))
            .unwrap();
        registry
            .register_collection(
                CollectionDescriptor::new("AlsoBad")
                    .field("x", FieldSchema::new("String"))
                    .index(IndexSpec::new(["y"])),
            )
            .unwrap();

        let err = SchemaPlan::compute(&registry, None, 3).unwrap_err();
        match err {
            SchemaError::PartialSchemaGenerationFailure { failures } => {
                let names: Vec<&str> = failures.iter().map(|f| f.collection.as_str()).collect();
                assert_eq!(names, vec!["AlsoBad", "Bad"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unnamed_fragment_named_by_hash() {
        let mut registry = SchemaRegistry::new();
        registry.add_function("DO $$ BEGIN PERFORM 1; END $$");
        let plan = SchemaPlan::compute(&registry, None, 1).unwrap();
        let artifact = &plan.artifacts()[0];
        assert_eq!(artifact.name, artifact.hash[..12]);
    }
}
