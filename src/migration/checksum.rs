//! Content hashing for schema artifacts and snapshot files

use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

/// Hex SHA-256 of a piece of SQL text
pub fn hash_sql(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Combine per-artifact hashes into one schema hash
///
/// The input is sorted lexicographically before hashing, so the result does
/// not depend on the order artifacts were produced in. Hashes are concatenated
/// with no separator; every input is a fixed-width hex digest.
pub fn aggregate_hash<I, S>(hashes: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut sorted: Vec<S> = hashes.into_iter().collect();
    sorted.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));

    let mut hasher = Sha256::new();
    for hash in &sorted {
        hasher.update(hash.as_ref().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Whether `value` looks like a lowercase or uppercase hex digest
pub fn is_hex_digest(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Serialize JSON with object keys sorted at every level
///
/// Used for literal defaults so two semantically identical values always
/// produce the same DDL text and therefore the same hash.
pub fn canonical_json(value: &JsonValue) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &JsonValue, out: &mut String) {
    match value {
        JsonValue::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&JsonValue::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        JsonValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
