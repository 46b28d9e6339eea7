//! Client-server backend: a Cypher-speaking graph engine behind a JSON HTTP
//! API. Statements are POSTed pre-rendered; result cells arrive either as
//! plain JSON values or as typed envelopes (`{"type": "node", ...}`) that
//! decode into the backend value model.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::GraphBackend;
use crate::config::GraphConfig;
use crate::errors::GraphError;
use crate::statements::Dialect;
use crate::value::{BackendValue, NodeValue, PathValue, RelationshipValue, ResultSet};

use async_trait::async_trait;

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    request_timeout_ms: u64,
}

impl HttpBackend {
    pub fn new(config: &GraphConfig) -> Result<HttpBackend, GraphError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| GraphError::connection(format!("http client build failed: {e}")))?;
        Ok(HttpBackend {
            client,
            base_url: config.http.base_url.trim_end_matches('/').to_string(),
            database: config.http.database.clone(),
            username: config.http.username.clone(),
            password: config.http.password.clone(),
            request_timeout_ms: config.request_timeout_secs * 1000,
        })
    }

    async fn post(&self, route: &str, payload: &Value, context: &str) -> Result<reqwest::Response, GraphError> {
        let mut request = self
            .client
            .post(format!("{}{route}", self.base_url))
            .json(payload);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }
        let response = request.send().await.map_err(|e| self.send_error(context, e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GraphError::query_execution(
            context,
            format!("http {status}: {}", server_message(&body)),
        ))
    }

    fn send_error(&self, context: &str, err: reqwest::Error) -> GraphError {
        if err.is_timeout() {
            GraphError::timeout(context.to_string(), self.request_timeout_ms)
        } else if err.is_connect() {
            GraphError::connection(format!("cannot reach {}: {err}", self.base_url))
        } else {
            GraphError::query_execution(context, err.to_string())
        }
    }
}

#[async_trait]
impl GraphBackend for HttpBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Cypher
    }

    fn source(&self) -> &'static str {
        "http"
    }

    async fn connect(&self) -> Result<(), GraphError> {
        // A trivial statement verifies auth and the query path, not just TCP.
        match self.execute("RETURN 1").await {
            Ok(_) => {
                debug!(base = %self.base_url, "graph server reachable");
                Ok(())
            }
            Err(e @ GraphError::Timeout { .. }) => Err(e),
            Err(e) => Err(GraphError::connection(format!(
                "graph server unreachable: {e}"
            ))),
        }
    }

    async fn execute(&self, statement: &str) -> Result<ResultSet, GraphError> {
        let mut payload = json!({ "statement": statement });
        if let Some(database) = &self.database {
            payload["database"] = json!(database);
        }
        let response = self.post("/query", &payload, statement).await?;
        let wire: WireResponse = response.json().await.map_err(|e| {
            GraphError::query_execution(statement, format!("malformed response body: {e}"))
        })?;
        Ok(decode_response(wire))
    }

    async fn execute_batch(&self, statements: &[String]) -> Result<(), GraphError> {
        if statements.is_empty() {
            return Ok(());
        }
        let context = statements.join("\n");
        let mut payload = json!({ "statements": statements });
        if let Some(database) = &self.database {
            payload["database"] = json!(database);
        }
        self.post("/batch", &payload, &context).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), GraphError> {
        // Connections are pooled inside the client; nothing to release.
        debug!("http session closed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
    #[serde(default, rename = "queryTimeMs")]
    query_time_ms: Option<u64>,
}

fn server_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn decode_response(wire: WireResponse) -> ResultSet {
    ResultSet {
        columns: wire.columns,
        rows: wire
            .rows
            .into_iter()
            .map(|row| row.into_iter().map(decode_value).collect())
            .collect(),
        server_time_ms: wire.query_time_ms,
    }
}

/// Decode one result cell. Envelopes the server does not mark, or marks with
/// an unrecognized type, fall back to `Raw`/plain shapes; decoding is total.
pub(crate) fn decode_value(value: Value) -> BackendValue {
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return BackendValue::from_json(value);
    };
    match kind {
        "node" => match decode_node(&value) {
            Some(node) => BackendValue::Node(node),
            None => BackendValue::Raw(value),
        },
        "relationship" => match decode_relationship(&value) {
            Some(rel) => BackendValue::Relationship(rel),
            None => BackendValue::Raw(value),
        },
        "path" => match decode_path(&value) {
            Some(path) => BackendValue::Path(path),
            None => BackendValue::Raw(value),
        },
        // 64-bit integers travel string-encoded to survive JSON doubles.
        "integer" => match value.get("value") {
            Some(Value::String(s)) => match s.parse::<i64>() {
                Ok(i) => BackendValue::Int(i),
                Err(_) => BackendValue::Raw(value),
            },
            Some(Value::Number(n)) if n.as_i64().is_some() => {
                BackendValue::Int(n.as_i64().unwrap_or_default())
            }
            _ => BackendValue::Raw(value),
        },
        _ => BackendValue::Raw(value),
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn decode_node(value: &Value) -> Option<NodeValue> {
    let id = id_string(value.get("id")?)?;
    let label = value
        .get("label")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            value
                .get("labels")
                .and_then(Value::as_array)
                .and_then(|labels| labels.first())
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_default();
    let properties = value
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    Some(NodeValue {
        id,
        label,
        properties,
    })
}

fn decode_relationship(value: &Value) -> Option<RelationshipValue> {
    Some(RelationshipValue {
        id: id_string(value.get("id")?)?,
        start_id: id_string(value.get("startNodeId")?)?,
        end_id: id_string(value.get("endNodeId")?)?,
        rel_type: value.get("relType").and_then(Value::as_str)?.to_string(),
        properties: value
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
    })
}

fn decode_path(value: &Value) -> Option<PathValue> {
    let nodes = value
        .get("nodes")
        .and_then(Value::as_array)?
        .iter()
        .map(decode_node)
        .collect::<Option<Vec<_>>>()?;
    let relationships = value
        .get("relationships")
        .and_then(Value::as_array)?
        .iter()
        .map(decode_relationship)
        .collect::<Option<Vec<_>>>()?;
    Some(PathValue {
        nodes,
        relationships,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_envelope_decodes() {
        let cell = json!({
            "type": "node",
            "id": 42,
            "label": "Gene",
            "properties": {"symbol": "HBB"}
        });
        match decode_value(cell) {
            BackendValue::Node(node) => {
                assert_eq!(node.id, "42");
                assert_eq!(node.label, "Gene");
                assert_eq!(node.properties["symbol"], json!("HBB"));
            }
            other => panic!("expected node, got {other:?}"),
        }
    }

    #[test]
    fn string_encoded_integer_decodes_exactly() {
        let cell = json!({"type": "integer", "value": "9007199254740993"});
        assert_eq!(decode_value(cell), BackendValue::Int(9_007_199_254_740_993));
    }

    #[test]
    fn unknown_envelope_passes_through_raw() {
        let cell = json!({"type": "geometry", "wkt": "POINT(0 0)"});
        let original = cell.clone();
        assert_eq!(decode_value(cell), BackendValue::Raw(original));
    }

    #[test]
    fn plain_object_without_type_stays_a_map() {
        let cell = json!({"symbol": "HBB"});
        match decode_value(cell) {
            BackendValue::Map(map) => assert!(map.contains_key("symbol")),
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn malformed_node_envelope_is_raw_not_an_error() {
        let cell = json!({"type": "node", "label": "Gene"});
        assert!(matches!(decode_value(cell), BackendValue::Raw(_)));
    }

    #[test]
    fn server_error_body_is_extracted() {
        assert_eq!(server_message(r#"{"error": "boom"}"#), "boom");
        assert_eq!(server_message("plain failure"), "plain failure");
    }
}
