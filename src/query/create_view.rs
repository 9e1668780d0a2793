//! View and view-index statements supplied verbatim by the registry.

use super::{strip_terminator, CompiledSql, SchemaQuery};
use crate::migration::SchemaError;

/// A `CREATE VIEW` (or view index) body copied from the registry
///
/// The body is trimmed and its trailing semicolons dropped; [`SchemaQuery::statement`]
/// adds exactly one back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateViewQuery {
    pub body: String,
}

impl CreateViewQuery {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

impl SchemaQuery for CreateViewQuery {
    fn compile(&self) -> Result<CompiledSql, SchemaError> {
        Ok(CompiledSql::new(strip_terminator(&self.body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_body_normalized() {
        let a = CreateViewQuery::new("\n  CREATE VIEW \"PostsView\" AS SELECT * FROM \"Posts\";\n");
        let b = CreateViewQuery::new("CREATE VIEW \"PostsView\" AS SELECT * FROM \"Posts\"");
        assert_eq!(
            a.statement().unwrap(),
            "CREATE VIEW \"PostsView\" AS SELECT * FROM \"Posts\";"
        );
        assert_eq!(a.statement().unwrap(), b.statement().unwrap());
    }
}
