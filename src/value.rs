//! Backend-native value model shared by both backends. Wrapper shapes
//! (nodes, relationships, paths) stay intact until the coercion layer
//! flattens them into plain JSON.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A graph node as reported by a backend: internal identity, label, and the
/// declared property map.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeValue {
    pub id: String,
    pub label: String,
    pub properties: Map<String, Value>,
}

/// A relationship as reported by a backend, including both endpoint ids.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipValue {
    pub id: String,
    pub start_id: String,
    pub end_id: String,
    pub rel_type: String,
    pub properties: Map<String, Value>,
}

/// An alternating node/relationship sequence. `nodes.len()` is always
/// `relationships.len() + 1` for a well-formed path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathValue {
    pub nodes: Vec<NodeValue>,
    pub relationships: Vec<RelationshipValue>,
}

/// One result cell. `Raw` carries shapes the backend did not recognize;
/// they pass through coercion unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<BackendValue>),
    Map(BTreeMap<String, BackendValue>),
    Node(NodeValue),
    Relationship(RelationshipValue),
    Path(PathValue),
    Raw(Value),
}

impl BackendValue {
    /// Lift a plain JSON value into the backend model. Integral numbers map
    /// to `Int`, everything else keeps its JSON shape.
    pub fn from_json(value: Value) -> BackendValue {
        match value {
            Value::Null => BackendValue::Null,
            Value::Bool(b) => BackendValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    BackendValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    BackendValue::Float(f)
                } else {
                    // u64 beyond i64 range; keep the exact JSON number.
                    BackendValue::Raw(Value::Number(n))
                }
            }
            Value::String(s) => BackendValue::Str(s),
            Value::Array(items) => {
                BackendValue::List(items.into_iter().map(BackendValue::from_json).collect())
            }
            Value::Object(map) => BackendValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, BackendValue::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Rows returned by one backend statement, before coercion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<BackendValue>>,
    /// Execution time as reported by the backend itself, when available.
    pub server_time_ms: Option<u64>,
}
