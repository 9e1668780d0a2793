//! `CREATE TABLE` builder.

use super::{quote_ident, quote_literal, CompiledSql, SchemaQuery};
use crate::migration::checksum::canonical_json;
use crate::migration::SchemaError;
use crate::registry::FieldDefault;
use crate::table::{ColumnDefinition, SqlType, TableDefinition};
use serde_json::Value as JsonValue;

/// Compiles a table's columns, in declaration order, to `CREATE TABLE`
#[derive(Debug, Clone, Copy)]
pub struct CreateTableQuery<'a> {
    table: &'a TableDefinition,
}

impl<'a> CreateTableQuery<'a> {
    pub fn new(table: &'a TableDefinition) -> Self {
        Self { table }
    }
}

impl SchemaQuery for CreateTableQuery<'_> {
    fn compile(&self) -> Result<CompiledSql, SchemaError> {
        let columns: Vec<String> = self.table.columns.iter().map(column_sql).collect();

        Ok(CompiledSql::new(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(&self.table.name),
            columns.join(", ")
        )))
    }
}

fn column_sql(column: &ColumnDefinition) -> String {
    let mut sql = format!("{} {}", quote_ident(&column.name), column.sql_type);
    if column.is_not_null() {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default_sql(default, &column.sql_type));
    }
    if column.primary_key {
        sql.push_str(" PRIMARY KEY");
    }
    sql
}

/// Render a column default
///
/// Expressions are copied verbatim. Literal values are rendered according to
/// the column type; JSON objects go through canonical JSON so key order in
/// the source never changes the output.
pub fn default_sql(default: &FieldDefault, sql_type: &SqlType) -> String {
    match default {
        FieldDefault::Expr(expr) => expr.trim().to_string(),
        FieldDefault::Value(value) => literal_sql(value, sql_type),
    }
}

fn literal_sql(value: &JsonValue, sql_type: &SqlType) -> String {
    match (value, sql_type) {
        (JsonValue::Null, _) => "NULL".to_string(),
        (_, SqlType::Jsonb) => format!("{}::JSONB", quote_literal(&canonical_json(value))),
        (JsonValue::Array(items), SqlType::Array(element)) => {
            if items.is_empty() {
                "'{}'".to_string()
            } else {
                let rendered: Vec<String> =
                    items.iter().map(|item| literal_sql(item, element)).collect();
                format!("ARRAY[{}]::{}", rendered.join(", "), sql_type)
            }
        }
        (JsonValue::Bool(true), _) => "TRUE".to_string(),
        (JsonValue::Bool(false), _) => "FALSE".to_string(),
        (JsonValue::Number(n), _) => n.to_string(),
        (JsonValue::String(s), _) => quote_literal(s),
        (JsonValue::Array(_) | JsonValue::Object(_), _) => {
            format!("{}::JSONB", quote_literal(&canonical_json(value)))
        }
    }
}
