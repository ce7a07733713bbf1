// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Canonical JSON encoding.
//!
//! Two logically equal values always encode to the same bytes:
//! - Object keys are sorted lexicographically (byte order) at every depth
//! - Arrays keep element order
//! - Primitives use their JSON encoding
//! - No whitespace between tokens
//!
//! For string-valued records such as ledger entries the output is identical to
//! a sorted-key `JSON.stringify`, so digests are reproducible across
//! implementations.

use serde::Serialize;
use serde_json::Value;

use crate::error::{KernelError, KernelResult};

/// Canonical encoding of an already-built JSON value. Never fails.
pub fn canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

/// Canonical encoding of any serializable value.
pub fn to_canonical_string<T: Serialize + ?Sized>(value: &T) -> KernelResult<String> {
    let value = serde_json::to_value(value).map_err(|e| KernelError::Serialization(e.to_string()))?;
    Ok(canonical_string(&value))
}

/// Canonical encoding as bytes, ready for hashing.
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> KernelResult<Vec<u8>> {
    to_canonical_string(value).map(String::into_bytes)
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, field)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(field, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        // null, bool and numbers have a single JSON spelling
        primitive => out.push_str(&primitive.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    // serde_json escapes only what JSON requires, same as JSON.stringify
    out.push_str(&Value::String(s.to_owned()).to_string());
}
