//! Deep merge of JSON route settings.
//!
//! Semantics follow JSON Merge Patch (RFC 7386) with one exception: two
//! arrays are concatenated instead of the patch replacing the original.
//! A `null` in the patch removes the key.

use serde_json::{Map, Value};

/// Merge `patch` into `original`, returning the result.
pub fn deep_merge(original: &Map<String, Value>, patch: &Map<String, Value>) -> Map<String, Value> {
    let mut result = original.clone();
    for (key, patch_value) in patch {
        if patch_value.is_null() {
            result.remove(key);
            continue;
        }
        match (result.get_mut(key), patch_value) {
            (Some(Value::Object(existing)), Value::Object(patch_map)) => {
                *existing = deep_merge(existing, patch_map);
                continue;
            }
            (Some(Value::Array(existing)), Value::Array(items)) => {
                existing.extend(items.iter().map(strip_nulls));
                continue;
            }
            _ => {}
        }
        result.insert(key.clone(), strip_nulls(patch_value));
    }
    result
}

/// Merge a sequence of optional layers, later layers winning.
pub fn merge_layers<'a, I>(layers: I) -> Option<Map<String, Value>>
where
    I: IntoIterator<Item = Option<&'a Map<String, Value>>>,
{
    layers.into_iter().flatten().fold(None, |acc, layer| {
        Some(match acc {
            None => strip_null_keys(layer),
            Some(acc) => deep_merge(&acc, layer),
        })
    })
}

fn strip_null_keys(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), strip_nulls(v)))
        .collect()
}

/// Patch values are copied without their null object members.
fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(strip_null_keys(map)),
        Value::Array(items) => Value::Array(items.iter().map(strip_nulls).collect()),
        other => other.clone(),
    }
}
