//! Lossy conversion of attribute values to JSON, for display and debugging.

use serde_json::{Map, Number, Value};

use super::{AttributeMap, AttributeValue};

/// Convert an attribute value to a JSON value.
///
/// Numbers that do not fit a JSON number are kept as strings; binaries are
/// rendered as arrays of bytes.
pub fn attribute_to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => number_to_json(n),
        AttributeValue::B(b) => bytes_to_json(b),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null => Value::Null,
        AttributeValue::L(items) => Value::Array(items.iter().map(attribute_to_json).collect()),
        AttributeValue::M(map) => item_to_json(map),
        AttributeValue::Ss(values) => {
            Value::Array(values.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(values) => {
            Value::Array(values.iter().map(|n| number_to_json(n)).collect())
        }
        AttributeValue::Bs(values) => {
            Value::Array(values.iter().map(|b| bytes_to_json(b)).collect())
        }
    }
}

/// Convert a whole item to a JSON object.
pub fn item_to_json(item: &AttributeMap) -> Value {
    let map: Map<String, Value> = item
        .iter()
        .map(|(k, v)| (k.clone(), attribute_to_json(v)))
        .collect();
    Value::Object(map)
}

/// Convert a JSON value to an attribute value.
///
/// Arrays become lists and objects become maps; sets are never produced.
pub fn json_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(json_to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_attribute(v)))
                .collect(),
        ),
    }
}

fn number_to_json(n: &str) -> Value {
    if let Ok(i) = n.parse::<i64>() {
        return Value::Number(i.into());
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or_else(|| Value::String(n.to_string()), Value::Number)
}

fn bytes_to_json(bytes: &[u8]) -> Value {
    Value::Array(bytes.iter().map(|b| Value::Number((*b).into())).collect())
}
