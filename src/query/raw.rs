//! Hand-written SQL fragments: functions and custom indexes.
//!
//! These are not parsed. They are normalized just enough that whitespace and
//! terminators don't change their hash, and a name is pulled out for the
//! snapshot comment when the statement has the usual shape.

use super::{strip_terminator, CompiledSql, SchemaQuery};
use crate::migration::SchemaError;
use regex::Regex;
use std::sync::LazyLock;

static FUNCTION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?(?:FUNCTION|PROCEDURE)\s+("?[\w.]+"?)"#)
        .expect("function name pattern is valid")
});

static INDEX_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^\s*CREATE\s+(?:UNIQUE\s+)?INDEX\s+(?:CONCURRENTLY\s+)?(?:IF\s+NOT\s+EXISTS\s+)?("?[\w.]+"?)\s+ON\b"#,
    )
    .expect("index name pattern is valid")
});

static CONCURRENTLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+CONCURRENTLY\s+").expect("CONCURRENTLY pattern is valid")
});

/// `CREATE [OR REPLACE] FUNCTION` body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFunctionQuery {
    pub body: String,
}

impl RawFunctionQuery {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// Function name, if the body starts like a function definition
    pub fn name(&self) -> Option<String> {
        capture_name(&FUNCTION_NAME, &self.body)
    }
}

impl SchemaQuery for RawFunctionQuery {
    fn compile(&self) -> Result<CompiledSql, SchemaError> {
        Ok(CompiledSql::new(strip_terminator(&self.body)))
    }
}

/// Hand-written `CREATE INDEX` statement
///
/// `CONCURRENTLY` is removed: the snapshot describes the schema, not how an
/// index was built, and it cannot run inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomIndexQuery {
    pub body: String,
}

impl CustomIndexQuery {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// Index name, if the statement names one
    pub fn name(&self) -> Option<String> {
        capture_name(&INDEX_NAME, &self.body)
    }
}

impl SchemaQuery for CustomIndexQuery {
    fn compile(&self) -> Result<CompiledSql, SchemaError> {
        let body = strip_terminator(&self.body);
        Ok(CompiledSql::new(CONCURRENTLY.replace_all(body, " ").into_owned()))
    }
}

fn capture_name(re: &Regex, sql: &str) -> Option<String> {
    let caps = re.captures(sql)?;
    Some(caps.get(1)?.as_str().trim_matches('"').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_normalized() {
        let f = RawFunctionQuery::new(
            "\n  CREATE OR REPLACE FUNCTION fm_add(a INT, b INT) RETURNS INT AS $$ SELECT a + b; $$ LANGUAGE sql;\n",
        );
        assert_eq!(f.name().as_deref(), Some("fm_add"));
        assert_eq!(
            f.statement().unwrap(),
            "CREATE OR REPLACE FUNCTION fm_add(a INT, b INT) RETURNS INT AS $$ SELECT a + b; $$ LANGUAGE sql;"
        );
    }

    #[test]
    fn test_custom_index_strips_concurrently() {
        let idx = CustomIndexQuery::new(
            "CREATE INDEX CONCURRENTLY IF NOT EXISTS \"idx_posts_slug\" ON \"Posts\" (slug);",
        );
        assert_eq!(idx.name().as_deref(), Some("idx_posts_slug"));
        assert_eq!(
            idx.statement().unwrap(),
            "CREATE INDEX IF NOT EXISTS \"idx_posts_slug\" ON \"Posts\" (slug);"
        );
    }

    #[test]
    fn test_custom_index_without_name() {
        let idx = CustomIndexQuery::new("CREATE INDEX ON \"Posts\" (slug)");
        assert_eq!(idx.name(), None);
    }

    #[test]
    fn test_unrecognized_function_has_no_name() {
        assert_eq!(RawFunctionQuery::new("SELECT 1").name(), None);
    }

    #[test]
    fn test_patterns_shared_across_queries() {
        for pattern in [&FUNCTION_NAME, &INDEX_NAME, &CONCURRENTLY] {
            LazyLock::force(pattern);
        }
        let names: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|n| CustomIndexQuery::new(format!("CREATE INDEX CONCURRENTLY idx_{} ON t (x)", n)))
            .map(|q| (q.name(), q.ddl().unwrap()))
            .collect();
        assert_eq!(names[2].0.as_deref(), Some("idx_c"));
        assert_eq!(names[2].1, "CREATE INDEX idx_c ON t (x)");
    }
}
