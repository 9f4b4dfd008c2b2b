//! Default filling for JSON configs.
//!
//! Burn's `Config` derive requires every non-optional field when
//! deserializing. Configs here are read by overlaying the user's JSON onto
//! the serialized defaults, so omitted fields keep their default values.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Key selecting the component variant.
pub(crate) const TYPE_KEY: &str = "type";

/// Overlay `overrides` onto `defaults`, recursing into objects.
///
/// Arrays and scalars are replaced whole. An object whose `type` differs
/// from the default's replaces it instead of merging.
pub(crate) fn merge(defaults: Value, overrides: Value) -> Value {
    match (defaults, overrides) {
        (Value::Object(mut base), Value::Object(over)) => {
            if let (Some(a), Some(b)) = (base.get(TYPE_KEY), over.get(TYPE_KEY)) {
                if a != b {
                    return Value::Object(over);
                }
            }
            for (key, value) in over {
                let merged = match base.remove(&key) {
                    Some(default) => merge(default, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, over) => over,
    }
}

/// Split `{"type": kind, ...fields}` into `kind` and the remaining fields.
pub(crate) fn split_tagged(value: Value) -> Result<(String, Value), String> {
    let Value::Object(mut map) = value else {
        return Err("expected a JSON object with a \"type\" key".to_string());
    };
    match map.remove(TYPE_KEY) {
        Some(Value::String(kind)) => Ok((kind, Value::Object(map))),
        Some(other) => Err(format!("\"type\" must be a string, got {}", other)),
        None => Err("missing field `type`".to_string()),
    }
}

/// Deserialize `fields` with anything missing taken from `defaults`.
pub(crate) fn from_defaults<T: DeserializeOwned>(defaults: Value, fields: Value) -> serde_json::Result<T> {
    serde_json::from_value(merge(defaults, fields))
}
