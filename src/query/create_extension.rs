//! `CREATE EXTENSION` builder.

use super::{quote_ident, CompiledSql, SchemaQuery};
use crate::migration::SchemaError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateExtensionQuery {
    pub name: String,
}

impl CreateExtensionQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl SchemaQuery for CreateExtensionQuery {
    fn compile(&self) -> Result<CompiledSql, SchemaError> {
        Ok(CompiledSql::new(format!(
            "CREATE EXTENSION IF NOT EXISTS {}",
            quote_ident(self.name.trim())
        )))
    }
}
