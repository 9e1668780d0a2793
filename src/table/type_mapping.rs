//! Type mapping from collection field types to SQL column types.
//!
//! Field type names are matched case-insensitively:
//! - "String" / "Text" → `TEXT`, or `VARCHAR(n)` when `maxLength` is set
//! - "Id" → `VARCHAR(27)`
//! - "Number" / "Float" / "Double" → `DOUBLE PRECISION`
//! - "Integer" / "Int" → `INTEGER`
//! - "Boolean" / "Bool" → `BOOL`
//! - "Date" / "Datetime" → `TIMESTAMPTZ`
//! - "Object" / "Json" / "Jsonb" → `JSONB`
//! - "Array" + `arrayOf` → `<element>[]`
//!
//! A field with `foreignKey` set is a reference to another collection's ids,
//! either a single id or an array of ids. Its type (or array element type)
//! must be "Id" or "String".

use super::column::{SqlType, ID_LENGTH};
use crate::migration::SchemaError;
use crate::registry::FieldSchema;

/// Map a collection field to its SQL column type
///
/// # Errors
///
/// Returns `SchemaError::UnsupportedColumnType` for unknown type names, arrays
/// without an element type, and arrays of arrays.
pub fn map_field_type(
    collection: &str,
    field_name: &str,
    field: &FieldSchema,
) -> Result<SqlType, SchemaError> {
    let unsupported = |type_name: &str| SchemaError::UnsupportedColumnType {
        collection: collection.to_string(),
        field: field_name.to_string(),
        type_name: type_name.to_string(),
    };

    if is_array(&field.field_type) {
        let element = field
            .array_of
            .as_deref()
            .ok_or_else(|| unsupported("Array (missing arrayOf)"))?;
        if is_array(element) {
            return Err(unsupported(&format!("Array of {}", element)));
        }
        let element_type = match &field.foreign_key {
            Some(_) if !holds_id(element) => {
                return Err(unsupported(&format!("Array of {} (foreign key)", element)))
            }
            Some(target) => SqlType::ForeignKey {
                collection: target.clone(),
            },
            None => map_scalar(element, None).ok_or_else(|| unsupported(element))?,
        };
        return Ok(SqlType::Array(Box::new(element_type)));
    }

    if let Some(target) = &field.foreign_key {
        if !holds_id(&field.field_type) {
            return Err(unsupported(&format!("{} (foreign key)", field.field_type)));
        }
        return Ok(SqlType::ForeignKey {
            collection: target.clone(),
        });
    }

    map_scalar(&field.field_type, field.max_length).ok_or_else(|| unsupported(&field.field_type))
}

fn is_array(type_name: &str) -> bool {
    type_name.eq_ignore_ascii_case("array")
}

/// Only id-typed fields can reference another collection
fn holds_id(type_name: &str) -> bool {
    type_name.eq_ignore_ascii_case("id") || type_name.eq_ignore_ascii_case("string")
}

fn map_scalar(type_name: &str, max_length: Option<u32>) -> Option<SqlType> {
    let sql_type = match type_name.to_lowercase().as_str() {
        "string" | "text" => match max_length {
            Some(len) => SqlType::Varchar(len),
            None => SqlType::Text,
        },
        "id" => SqlType::Varchar(ID_LENGTH),
        "number" | "float" | "double" => SqlType::DoublePrecision,
        "integer" | "int" => SqlType::Integer,
        "boolean" | "bool" => SqlType::Bool,
        "date" | "datetime" => SqlType::Timestamptz,
        "object" | "json" | "jsonb" => SqlType::Jsonb,
        _ => return None,
    };
    Some(sql_type)
}
