//! Column definitions and the fixed set of SQL column types.

use crate::registry::FieldDefault;
use std::fmt;

/// Width of the document id type used for `Id` fields and foreign keys
pub const ID_LENGTH: u32 = 27;

/// SQL column type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Varchar(u32),
    Bool,
    Integer,
    DoublePrecision,
    Timestamptz,
    Jsonb,
    Array(Box<SqlType>),
    /// Id of a document in another collection
    ///
    /// Stored as the id type. No `REFERENCES` constraint is rendered since
    /// tables are created in name order, not dependency order.
    ForeignKey { collection: String },
}

impl SqlType {
    pub fn is_json(&self) -> bool {
        matches!(self, SqlType::Jsonb)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Text => f.write_str("TEXT"),
            SqlType::Varchar(len) => write!(f, "VARCHAR({})", len),
            SqlType::Bool => f.write_str("BOOL"),
            SqlType::Integer => f.write_str("INTEGER"),
            SqlType::DoublePrecision => f.write_str("DOUBLE PRECISION"),
            SqlType::Timestamptz => f.write_str("TIMESTAMPTZ"),
            SqlType::Jsonb => f.write_str("JSONB"),
            SqlType::Array(inner) => write!(f, "{}[]", inner),
            SqlType::ForeignKey { .. } => write!(f, "VARCHAR({})", ID_LENGTH),
        }
    }
}

/// Column definition metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name, as declared by the collection field
    pub name: String,
    pub sql_type: SqlType,
    /// Whether the column is nullable
    pub nullable: bool,
    /// Default applied by `CREATE TABLE` (if any)
    pub default: Option<FieldDefault>,
    pub primary_key: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            default: None,
            primary_key: false,
        }
    }

    /// Whether `NOT NULL` is rendered for this column
    ///
    /// Primary keys are never nullable.
    pub fn is_not_null(&self) -> bool {
        !self.nullable || self.primary_key
    }
}
