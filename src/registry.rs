//! Schema artifact registry.
//!
//! The registry is the boundary with the host application. It lists every
//! collection that should become a table together with the raw SQL the schema
//! depends on: extensions, functions, hand-written indexes and views. It is
//! built once, either in code or from a JSON manifest, and passed explicitly
//! into each generation pass.

use crate::migration::SchemaError;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;

/// Default value attached to a collection field
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldDefault {
    /// A literal value, rendered as a SQL literal for the column's type
    Value(JsonValue),
    /// A SQL expression copied verbatim (e.g. `now()`)
    Expr(String),
}

/// Schema of a single collection field
///
/// `field_type` is the source type name (`String`, `Number`, `Integer`,
/// `Boolean`, `Date`, `Object`, `Array`, `Id`). The mapping to SQL column
/// types lives in [`crate::table::type_mapping`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    /// Source type name
    #[serde(rename = "type")]
    pub field_type: String,
    /// Element type name for `Array` fields
    #[serde(default)]
    pub array_of: Option<String>,
    /// Maximum length for `String` fields (renders `VARCHAR(n)`)
    #[serde(default)]
    pub max_length: Option<u32>,
    /// Referenced collection, if this field stores another document's id
    #[serde(default)]
    pub foreign_key: Option<String>,
    /// Whether the column accepts NULL
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Whether this column is the table's primary key
    #[serde(default)]
    pub primary_key: bool,
    /// Default used when no flavor-specific default applies
    #[serde(default)]
    pub default: Option<FieldDefault>,
    /// Per-flavor default overrides, keyed by flavor name
    #[serde(default)]
    pub flavor_defaults: IndexMap<String, FieldDefault>,
}

fn default_nullable() -> bool {
    true
}

impl FieldSchema {
    /// Create a nullable field of the given source type
    pub fn new(field_type: impl Into<String>) -> Self {
        Self {
            field_type: field_type.into(),
            array_of: None,
            max_length: None,
            foreign_key: None,
            nullable: true,
            primary_key: false,
            default: None,
            flavor_defaults: IndexMap::new(),
        }
    }

    /// `Array` field holding elements of `element_type`
    pub fn array(element_type: impl Into<String>) -> Self {
        Self::new("Array").array_of(element_type)
    }

    /// Id field referencing another collection
    pub fn reference(collection: impl Into<String>) -> Self {
        Self::new("Id").foreign_key(collection)
    }

    #[must_use]
    pub fn array_of(mut self, element_type: impl Into<String>) -> Self {
        self.array_of = Some(element_type.into());
        self
    }

    #[must_use]
    pub fn max_length(mut self, len: u32) -> Self {
        self.max_length = Some(len);
        self
    }

    #[must_use]
    pub fn foreign_key(mut self, collection: impl Into<String>) -> Self {
        self.foreign_key = Some(collection.into());
        self
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: JsonValue) -> Self {
        self.default = Some(FieldDefault::Value(value));
        self
    }

    #[must_use]
    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(FieldDefault::Expr(expr.into()));
        self
    }

    #[must_use]
    pub fn flavor_default(mut self, flavor: impl Into<String>, default: FieldDefault) -> Self {
        self.flavor_defaults.insert(flavor.into(), default);
        self
    }

    /// Resolve the default for a deployment flavor
    ///
    /// A flavor-specific default wins over the base default; with no flavor
    /// selected only the base default is considered.
    pub fn default_for(&self, flavor: Option<&str>) -> Option<&FieldDefault> {
        flavor
            .and_then(|f| self.flavor_defaults.get(f))
            .or(self.default.as_ref())
    }
}

/// Index declared by a collection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSpec {
    /// Indexed columns, in index order
    pub fields: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    /// Partial index predicate (`WHERE ...`)
    #[serde(default, rename = "where")]
    pub predicate: Option<String>,
    /// Access method (`btree`, `gin`, ...)
    #[serde(default)]
    pub using: Option<String>,
    /// Explicit index name; derived from the field list when absent
    #[serde(default)]
    pub name: Option<String>,
}

impl IndexSpec {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            unique: false,
            predicate: None,
            using: None,
            name: None,
        }
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    #[must_use]
    pub fn using(mut self, method: impl Into<String>) -> Self {
        self.using = Some(method.into());
        self
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A logical collection that maps to one table
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDescriptor {
    pub name: String,
    /// Fields in declaration order
    #[serde(default)]
    pub fields: IndexMap<String, FieldSchema>,
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
}

impl CollectionDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            indexes: Vec::new(),
        }
    }

    /// Append a field; declaration order becomes column order
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, schema: FieldSchema) -> Self {
        self.fields.insert(name.into(), schema);
        self
    }

    #[must_use]
    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }
}

/// A SQL view plus the indexes created on it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDescriptor {
    pub name: String,
    /// Full `CREATE VIEW` / `CREATE MATERIALIZED VIEW` statement
    pub query: String,
    #[serde(default)]
    pub index_queries: Vec<String>,
}

impl ViewDescriptor {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            index_queries: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_index(mut self, query: impl Into<String>) -> Self {
        self.index_queries.push(query.into());
        self
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RegistryManifest {
    #[serde(default)]
    collections: Vec<CollectionDescriptor>,
    #[serde(default)]
    extensions: Vec<String>,
    #[serde(default)]
    functions: Vec<String>,
    #[serde(default)]
    custom_indexes: Vec<String>,
    #[serde(default)]
    views: Vec<ViewDescriptor>,
}

/// Every schema artifact known to the application
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    collections: Vec<CollectionDescriptor>,
    extensions: Vec<String>,
    functions: Vec<String>,
    custom_indexes: Vec<String>,
    views: Vec<ViewDescriptor>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry from a JSON manifest file
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Io` if the file cannot be read and
    /// `SchemaError::Registry` if it is not a valid manifest.
    pub fn from_manifest(path: &Path) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path)
            .map_err(|e| SchemaError::io("Failed to read registry manifest", path, e))?;
        Self::from_json_str(&content)
    }

    /// Parse a registry from JSON manifest text
    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let manifest: RegistryManifest =
            serde_json::from_str(json).map_err(|e| SchemaError::Registry(e.to_string()))?;

        let mut registry = Self::new();
        for collection in manifest.collections {
            registry.register_collection(collection)?;
        }
        registry.extensions = manifest.extensions;
        registry.functions = manifest.functions;
        registry.custom_indexes = manifest.custom_indexes;
        registry.views = manifest.views;
        Ok(registry)
    }

    /// Register a collection
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::DuplicateCollection` if a collection with the same
    /// name is already registered.
    pub fn register_collection(&mut self, collection: CollectionDescriptor) -> Result<(), SchemaError> {
        if self.collection(&collection.name).is_some() {
            return Err(SchemaError::DuplicateCollection(collection.name));
        }
        self.collections.push(collection);
        Ok(())
    }

    pub fn add_extension(&mut self, name: impl Into<String>) {
        self.extensions.push(name.into());
    }

    pub fn add_function(&mut self, sql: impl Into<String>) {
        self.functions.push(sql.into());
    }

    pub fn add_custom_index(&mut self, sql: impl Into<String>) {
        self.custom_indexes.push(sql.into());
    }

    pub fn add_view(&mut self, view: ViewDescriptor) {
        self.views.push(view);
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionDescriptor> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Collections in registration order
    pub fn collections(&self) -> &[CollectionDescriptor] {
        &self.collections
    }

    /// Collection names sorted, the order artifacts are emitted in
    pub fn collection_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.collections.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn functions(&self) -> &[String] {
        &self.functions
    }

    pub fn custom_indexes(&self) -> &[String] {
        &self.custom_indexes
    }

    pub fn views(&self) -> &[ViewDescriptor] {
        &self.views
    }
}
