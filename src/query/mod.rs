//! DDL builders for schema artifacts.
//!
//! Every artifact kind has a builder implementing [`SchemaQuery`]. Builders
//! compile to a [`CompiledSql`] pair of SQL text and bound arguments; schema
//! snapshots are static text, so [`SchemaQuery::ddl`] rejects any compiled
//! statement that carries arguments.
//!
//! Builders are deterministic: the same input always yields byte-identical
//! SQL, which is what makes the per-artifact hashes stable across runs.

pub mod create_extension;
pub mod create_index;
pub mod create_table;
pub mod create_view;
pub mod format;
pub mod raw;

pub use create_extension::CreateExtensionQuery;
pub use create_index::CreateIndexQuery;
pub use create_table::CreateTableQuery;
pub use create_view::CreateViewQuery;
pub use format::format_statement;
pub use raw::{CustomIndexQuery, RawFunctionQuery};

use crate::migration::SchemaError;
use sea_query::Values;

/// SQL text plus the arguments bound to its placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSql {
    pub sql: String,
    pub args: Values,
}

impl CompiledSql {
    /// Literal SQL with no bound arguments
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Values(Vec::new()),
        }
    }

    pub fn with_args(sql: impl Into<String>, args: Values) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    /// The SQL text, provided nothing is bound to it
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::ArgumentBindingNotAllowed` if any arguments are
    /// bound.
    pub fn into_ddl(self) -> Result<String, SchemaError> {
        if self.args.0.is_empty() {
            Ok(self.sql)
        } else {
            Err(SchemaError::ArgumentBindingNotAllowed {
                count: self.args.0.len(),
                statement: self.sql,
            })
        }
    }
}

/// A compilable schema-definition statement
pub trait SchemaQuery {
    /// Compile to SQL text and bound arguments
    fn compile(&self) -> Result<CompiledSql, SchemaError>;

    /// Literal DDL without a trailing semicolon
    fn ddl(&self) -> Result<String, SchemaError> {
        self.compile()?.into_ddl()
    }

    /// Canonical single-line statement, terminated by `;`
    ///
    /// This is the text artifact hashes are computed over.
    fn statement(&self) -> Result<String, SchemaError> {
        Ok(ensure_semicolon(&self.ddl()?))
    }
}

/// Double-quote an identifier, escaping embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Single-quote a string literal, escaping embedded quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Trim whitespace and any trailing semicolons
pub fn strip_terminator(sql: &str) -> &str {
    sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// Trimmed statement with exactly one trailing semicolon
pub fn ensure_semicolon(sql: &str) -> String {
    format!("{};", strip_terminator(sql))
}
