//! Canonical JSON serialization: sorted keys, no whitespace.
//!
//! Everything that is hashed, signed, or cost-accounted goes through this
//! form so the bytes are deterministic regardless of key ordering.

use serde_json::Value;

use crate::error::{LedgerError, Result};

/// Serialize a value to canonical JSON.
///
/// Rejects non-finite numbers: they have no JSON representation and would
/// make the canonical form lossy.
pub fn canonical_json(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(if *b { "true" } else { "false" }.to_string()),
        Value::Number(n) => {
            let f = n.as_f64().unwrap_or(f64::NAN);
            if !f.is_finite() {
                return Err(LedgerError::Serialization(
                    "non-finite number is not representable in JSON".to_string(),
                ));
            }
            Ok(serde_json::to_string(n).unwrap())
        }
        Value::String(s) => Ok(serde_json::to_string(s).unwrap()),
        Value::Array(arr) => {
            let items: Result<Vec<String>> = arr.iter().map(canonical_json).collect();
            Ok(format!("[{}]", items?.join(",")))
        }
        Value::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            let pairs: Result<Vec<String>> = keys
                .iter()
                .map(|k| {
                    let v = canonical_json(&obj[*k])?;
                    Ok(format!("{}:{}", serde_json::to_string(*k).unwrap(), v))
                })
                .collect();
            Ok(format!("{{{}}}", pairs?.join(",")))
        }
    }
}
