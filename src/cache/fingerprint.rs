//! Deterministic request fingerprints.
//!
//! Two requests that differ only in object key order, surrounding
//! whitespace or letter case map to the same key. Array order is kept.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// SHA-256 hex digest of the operation name and the normalized request.
pub fn fingerprint(operation: &str, request: &Value) -> String {
    let mut canonical = fold(operation);
    canonical.push('\n');
    write_canonical(request, &mut canonical);

    format!("{:x}", Sha256::digest(canonical.as_bytes()))
}

fn fold(text: &str) -> String {
    text.trim().to_lowercase()
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(String, &Value)> = map.iter().map(|(k, v)| (fold(k), v)).collect();
            fields.sort_by(|a, b| a.0.cmp(&b.0));

            out.push('{');
            for (i, (key, value)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => out.push_str(&Value::String(fold(s)).to_string()),
        other => out.push_str(&other.to_string()),
    }
}
