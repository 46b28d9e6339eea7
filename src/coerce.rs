//! Type coercion: flattens backend-native values into plain JSON. Total over
//! every shape a backend can produce; unrecognized shapes pass through
//! unchanged instead of failing, since result shapes are caller-determined.

use serde_json::{Map, Number, Value, json};
use tracing::warn;

use crate::value::{BackendValue, NodeValue, PathValue, RelationshipValue};

/// Largest integer magnitude a double-precision consumer can round-trip.
const MAX_DOUBLE_SAFE_INT: i64 = (1 << 53) - 1;

/// Recursively convert one backend value into a plain JSON value.
pub fn coerce_value(value: BackendValue) -> Value {
    match value {
        BackendValue::Null => Value::Null,
        BackendValue::Bool(b) => Value::Bool(b),
        BackendValue::Int(i) => {
            if i.unsigned_abs() > MAX_DOUBLE_SAFE_INT as u64 {
                warn!(value = i, "integer exceeds 2^53; double-precision consumers will round it");
            }
            Value::Number(Number::from(i))
        }
        BackendValue::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        BackendValue::Str(s) => Value::String(s),
        BackendValue::List(items) => Value::Array(items.into_iter().map(coerce_value).collect()),
        BackendValue::Map(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, coerce_value(v)))
                .collect(),
        ),
        BackendValue::Node(node) => coerce_node(node),
        BackendValue::Relationship(rel) => coerce_relationship(rel),
        BackendValue::Path(path) => coerce_path(path),
        BackendValue::Raw(raw) => raw,
    }
}

/// Convert one result row into a JSON object keyed by column name.
pub fn coerce_row(columns: &[String], row: Vec<BackendValue>) -> Value {
    let mut object = Map::with_capacity(columns.len());
    for (column, value) in columns.iter().zip(row) {
        object.insert(column.clone(), coerce_value(value));
    }
    Value::Object(object)
}

fn coerce_node(node: NodeValue) -> Value {
    let mut object = node.properties;
    // The injected identity wins over any stored property of the same name.
    object.insert("id".to_string(), Value::String(node.id));
    Value::Object(object)
}

fn coerce_relationship(rel: RelationshipValue) -> Value {
    let mut object = rel.properties;
    object.insert("id".to_string(), Value::String(rel.id));
    object.insert("startNodeId".to_string(), Value::String(rel.start_id));
    object.insert("endNodeId".to_string(), Value::String(rel.end_id));
    Value::Object(object)
}

fn coerce_path(path: PathValue) -> Value {
    let PathValue {
        nodes,
        relationships,
    } = path;
    let coerced: Vec<Value> = nodes.into_iter().map(coerce_node).collect();
    let start = coerced.first().cloned().unwrap_or(Value::Null);
    let end = coerced.last().cloned().unwrap_or(Value::Null);
    let segments: Vec<Value> = relationships
        .into_iter()
        .enumerate()
        .map(|(i, rel)| {
            json!({
                "start": coerced.get(i).cloned().unwrap_or(Value::Null),
                "relationship": coerce_relationship(rel),
                "end": coerced.get(i + 1).cloned().unwrap_or(Value::Null),
            })
        })
        .collect();
    json!({ "start": start, "end": end, "segments": segments })
}
