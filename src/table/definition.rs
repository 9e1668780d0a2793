//! Table definitions built from registered collections.
//!
//! This module provides `TableDefinition`, which holds a table's columns in
//! declaration order and its deduplicated index set.

use super::column::ColumnDefinition;
use super::type_mapping::map_field_type;
use crate::migration::SchemaError;
use crate::registry::{CollectionDescriptor, IndexSpec};
use log::{debug, warn};

/// Longest identifier PostgreSQL keeps; longer names are truncated
const MAX_IDENTIFIER_BYTES: usize = 63;

/// An identifier as PostgreSQL stores it
fn stored_identifier(name: &str) -> &str {
    if name.len() <= MAX_IDENTIFIER_BYTES {
        return name;
    }
    let mut end = MAX_IDENTIFIER_BYTES;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Index definition metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Table the index belongs to
    pub table: String,
    /// Indexed fields in order. A dotted field (`data.kind`) indexes a path
    /// inside a JSONB column.
    pub fields: Vec<String>,
    /// Whether this is a unique index
    pub unique: bool,
    /// Partial index WHERE clause (if any)
    pub predicate: Option<String>,
    /// Access method (if any)
    pub using: Option<String>,
    /// Name given by the collection, overriding the derived one
    pub explicit_name: Option<String>,
}

impl IndexDefinition {
    /// Canonical index name
    ///
    /// `idx_<table>_<field>_<field>...`, with dots in field paths replaced by
    /// `__`, unless the collection supplied an explicit name.
    pub fn name(&self) -> String {
        if let Some(name) = &self.explicit_name {
            return name.clone();
        }
        format!("idx_{}_{}", self.table, self.fields.join("_")).replace('.', "__")
    }

    fn same_options(&self, other: &IndexDefinition) -> bool {
        self.unique == other.unique
            && self.predicate == other.predicate
            && self.using == other.using
            && self.explicit_name == other.explicit_name
    }
}

/// Result of adding an index to a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexInsert {
    Added,
    /// Same field list and options as an existing index
    Duplicate,
    /// Same field list as an existing index but different options; the
    /// existing index is kept
    ConflictingDuplicate,
}

/// Table definition metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    /// Columns in the collection's field declaration order
    pub columns: Vec<ColumnDefinition>,
    /// Indexes in the order they were first added
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    /// Empty table with no columns
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Build the table for a collection
    ///
    /// `flavor` selects per-deployment field defaults. The result depends only
    /// on the arguments.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::UnsupportedColumnType` for a field with no SQL
    /// mapping, or `SchemaError::InvalidIndex` for an index naming an unknown
    /// field.
    pub fn from_collection(
        collection: &CollectionDescriptor,
        flavor: Option<&str>,
    ) -> Result<Self, SchemaError> {
        let mut table = Self::new(&collection.name);

        for (field_name, field) in &collection.fields {
            let sql_type = map_field_type(&collection.name, field_name, field)?;
            table.columns.push(ColumnDefinition {
                name: field_name.clone(),
                sql_type,
                nullable: field.nullable,
                default: field.default_for(flavor).cloned(),
                primary_key: field.primary_key,
            });
        }

        for spec in &collection.indexes {
            if table.add_index(spec)? != IndexInsert::Added {
                debug!(
                    "Skipping duplicate index on {} ({})",
                    table.name,
                    spec.fields.join(", ")
                );
            }
        }

        Ok(table)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Add an index unless one with the same ordered field list exists
    ///
    /// Index identity is the table plus the ordered field list. Adding an index
    /// that matches an existing one is a no-op; if the options differ the first
    /// definition wins and a warning is logged.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidIndex` if the field list is empty, names
    /// a column the table doesn't have, or the index name (as PostgreSQL would
    /// store it, truncated to 63 bytes) is already taken by an index on other
    /// fields.
    pub fn add_index(&mut self, spec: &IndexSpec) -> Result<IndexInsert, SchemaError> {
        if spec.fields.is_empty() {
            return Err(self.invalid_index("index has no fields".to_string()));
        }
        for field in &spec.fields {
            self.check_index_field(field)?;
        }

        let candidate = IndexDefinition {
            table: self.name.clone(),
            fields: spec.fields.clone(),
            unique: spec.unique,
            predicate: spec.predicate.clone(),
            using: spec.using.clone(),
            explicit_name: spec.name.clone(),
        };

        match self.indexes.iter().find(|idx| idx.fields == candidate.fields) {
            Some(existing) if existing.same_options(&candidate) => Ok(IndexInsert::Duplicate),
            Some(existing) => {
                warn!(
                    "Index {} on {} redeclared with different options; keeping the first declaration",
                    existing.name(),
                    self.name
                );
                Ok(IndexInsert::ConflictingDuplicate)
            }
            None => {
                let name = candidate.name();
                if let Some(existing) = self
                    .indexes
                    .iter()
                    .find(|idx| stored_identifier(&idx.name()) == stored_identifier(&name))
                {
                    return Err(self.invalid_index(format!(
                        "index name '{}' on ({}) collides with '{}' on ({})",
                        name,
                        candidate.fields.join(", "),
                        existing.name(),
                        existing.fields.join(", ")
                    )));
                }
                self.indexes.push(candidate);
                Ok(IndexInsert::Added)
            }
        }
    }

    fn check_index_field(&self, field: &str) -> Result<(), SchemaError> {
        let mut path = field.split('.');
        let root = path.next().unwrap_or_default();
        let is_path = path.next().is_some();

        match self.column(root) {
            None => Err(self.invalid_index(format!("unknown field '{}'", field))),
            Some(column) if is_path && !column.sql_type.is_json() => Err(self.invalid_index(
                format!("field path '{}' requires '{}' to be a JSONB column", field, root),
            )),
            Some(_) => Ok(()),
        }
    }

    fn invalid_index(&self, reason: String) -> SchemaError {
        SchemaError::InvalidIndex {
            table: self.name.clone(),
            reason,
        }
    }
}
