//! `CREATE INDEX` builder.

use super::{quote_ident, quote_literal, CompiledSql, SchemaQuery};
use crate::migration::SchemaError;
use crate::table::IndexDefinition;

/// Compiles one index of a table
#[derive(Debug, Clone, Copy)]
pub struct CreateIndexQuery<'a> {
    index: &'a IndexDefinition,
}

impl<'a> CreateIndexQuery<'a> {
    pub fn new(index: &'a IndexDefinition) -> Self {
        Self { index }
    }
}

impl SchemaQuery for CreateIndexQuery<'_> {
    fn compile(&self) -> Result<CompiledSql, SchemaError> {
        let index = self.index;
        let mut sql = String::from("CREATE ");
        if index.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX IF NOT EXISTS ");
        sql.push_str(&quote_ident(&index.name()));
        sql.push_str(" ON ");
        sql.push_str(&quote_ident(&index.table));
        if let Some(method) = &index.using {
            sql.push_str(" USING ");
            sql.push_str(method.trim());
        }

        let fields: Vec<String> = index.fields.iter().map(|f| index_field_sql(f)).collect();
        sql.push_str(" (");
        sql.push_str(&fields.join(", "));
        sql.push(')');

        if let Some(predicate) = &index.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(predicate.trim());
        }

        Ok(CompiledSql::new(sql))
    }
}

/// A plain field is a quoted column; `column.key.leaf` indexes a JSONB path
fn index_field_sql(field: &str) -> String {
    let mut parts = field.split('.');
    let root = parts.next().unwrap_or_default();
    let keys: Vec<&str> = parts.collect();
    match keys.split_last() {
        None => quote_ident(root),
        Some((leaf, path)) => {
            let mut expr = quote_ident(root);
            for key in path {
                expr.push_str("->");
                expr.push_str(&quote_literal(key));
            }
            expr.push_str("->>");
            expr.push_str(&quote_literal(leaf));
            format!("({})", expr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(fields: &[&str]) -> IndexDefinition {
        IndexDefinition {
            table: "Posts".to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            unique: false,
            predicate: None,
            using: None,
            explicit_name: None,
        }
    }

    #[test]
    fn test_create_index() {
        let idx = index(&["userId", "postedAt"]);
        assert_eq!(
            CreateIndexQuery::new(&idx).statement().unwrap(),
            "CREATE INDEX IF NOT EXISTS \"idx_Posts_userId_postedAt\" ON \"Posts\" (\"userId\", \"postedAt\");"
        );
    }

    #[test]
    fn test_create_unique_partial_index() {
        let mut idx = index(&["slug"]);
        idx.unique = true;
        idx.using = Some("btree".to_string());
        idx.predicate = Some("\"deleted\" IS NOT TRUE".to_string());
        assert_eq!(
            CreateIndexQuery::new(&idx).ddl().unwrap(),
            "CREATE UNIQUE INDEX IF NOT EXISTS \"idx_Posts_slug\" ON \"Posts\" USING btree (\"slug\") WHERE \"deleted\" IS NOT TRUE"
        );
    }

    #[test]
    fn test_json_path_index() {
        let idx = index(&["contents.meta.kind"]);
        assert_eq!(
            CreateIndexQuery::new(&idx).ddl().unwrap(),
            "CREATE INDEX IF NOT EXISTS \"idx_Posts_contents__meta__kind\" ON \"Posts\" ((\"contents\"->'meta'->>'kind'))"
        );
    }
}
