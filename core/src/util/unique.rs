//! Order-preserving deduplication of JSON values.

use std::collections::HashSet;

use serde_json::Value;

/// Drop repeated values, keeping first occurrences in order.
///
/// Values are compared by type and JSON text, so `1` and `"1"` are distinct
/// while two equal objects collapse.
pub fn unique(items: &[Value]) -> Vec<Value> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(fingerprint(item)))
        .cloned()
        .collect()
}

fn fingerprint(value: &Value) -> String {
    let kind = match value {
        Value::Null | Value::Array(_) | Value::Object(_) => "object",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
    };
    format!("{kind}{value}")
}
