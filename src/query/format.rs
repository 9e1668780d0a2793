//! Pretty printing for snapshot files.
//!
//! Only the snapshot is pretty printed. Hashes are always computed over the
//! canonical single-line statement.

use super::ensure_semicolon;

const INDENT: &str = "  ";

/// Format a statement for a snapshot file, terminated by `;`
///
/// `CREATE TABLE` column lists are broken onto one line per column; every
/// other statement is returned as-is.
pub fn format_statement(sql: &str) -> String {
    let statement = ensure_semicolon(sql);
    let body = &statement[..statement.len() - 1];

    if !starts_with_ignore_case(body, "CREATE TABLE") {
        return statement;
    }
    let (Some(open), true) = (body.find('('), body.ends_with(')')) else {
        return statement;
    };

    let head = body[..open].trim_end();
    let columns = split_top_level(&body[open + 1..body.len() - 1]);
    if columns.is_empty() {
        return statement;
    }

    let mut out = format!("{} (\n", head);
    for (i, column) in columns.iter().enumerate() {
        out.push_str(INDENT);
        out.push_str(column);
        if i + 1 < columns.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str(");");
    out
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Split on commas outside quotes, brackets and parentheses
fn split_top_level(list: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in list.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    parts.push(current.trim().to_string());
                    current.clear();
                    continue;
                }
                _ => {}
            },
        }
        current.push(c);
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_create_table() {
        let sql = "CREATE TABLE IF NOT EXISTS \"Posts\" (\"title\" TEXT, \"ids\" TEXT[] DEFAULT ARRAY['a', 'b']::TEXT[], \"note\" TEXT DEFAULT 'x, y')";
        assert_eq!(
            format_statement(sql),
            "CREATE TABLE IF NOT EXISTS \"Posts\" (\n  \"title\" TEXT,\n  \"ids\" TEXT[] DEFAULT ARRAY['a', 'b']::TEXT[],\n  \"note\" TEXT DEFAULT 'x, y'\n);"
        );
    }

    #[test]
    fn test_format_other_statements_unchanged() {
        assert_eq!(
            format_statement("CREATE EXTENSION IF NOT EXISTS \"pg_trgm\""),
            "CREATE EXTENSION IF NOT EXISTS \"pg_trgm\";"
        );
    }

    #[test]
    fn test_format_empty_table() {
        assert_eq!(
            format_statement("CREATE TABLE IF NOT EXISTS \"Empty\" ()"),
            "CREATE TABLE IF NOT EXISTS \"Empty\" ();"
        );
    }
}
