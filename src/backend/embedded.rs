//! Embedded graph store on SQLite. Nodes and edges live in two tables with
//! JSON property columns; statements arrive pre-rendered in the SQL dialect.
//! All SQLite work runs inside `spawn_blocking` so callers never stall the
//! async executor.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row};
use serde_json::{Map, Value};
use tracing::debug;

use super::GraphBackend;
use crate::config::GraphConfig;
use crate::errors::GraphError;
use crate::statements::Dialect;
use crate::value::{BackendValue, NodeValue, RelationshipValue, ResultSet};

const BASE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS graph_nodes (
    id TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    properties TEXT NOT NULL DEFAULT '{}'
);
CREATE TABLE IF NOT EXISTS graph_edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_id TEXT NOT NULL REFERENCES graph_nodes(id),
    to_id TEXT NOT NULL REFERENCES graph_nodes(id),
    rel_type TEXT NOT NULL,
    properties TEXT NOT NULL DEFAULT '{}',
    UNIQUE(from_id, rel_type, to_id)
);
CREATE INDEX IF NOT EXISTS idx_nodes_label ON graph_nodes(label);
CREATE INDEX IF NOT EXISTS idx_edges_from ON graph_edges(from_id);
CREATE INDEX IF NOT EXISTS idx_edges_to ON graph_edges(to_id);
CREATE INDEX IF NOT EXISTS idx_edges_type ON graph_edges(rel_type);
";

/// SQLite-backed store. The connection is exclusively owned; in-memory
/// databases exist only for the lifetime of that one connection, which is
/// why it is opened once and held rather than reopened per call.
pub struct EmbeddedBackend {
    path: Option<PathBuf>,
    create_if_missing: bool,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl EmbeddedBackend {
    pub fn new(config: &GraphConfig) -> EmbeddedBackend {
        EmbeddedBackend {
            path: config.embedded.path.clone(),
            create_if_missing: config.embedded.create_if_missing,
            conn: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl GraphBackend for EmbeddedBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sql
    }

    fn source(&self) -> &'static str {
        "embedded"
    }

    async fn connect(&self) -> Result<(), GraphError> {
        let path = self.path.clone();
        let create = self.create_if_missing;
        let conn = tokio::task::spawn_blocking(move || open_store(path.as_deref(), create))
            .await
            .map_err(|e| GraphError::connection(format!("open task failed: {e}")))??;
        *self.conn.lock() = Some(conn);
        debug!(path = ?self.path, "embedded store open");
        Ok(())
    }

    async fn execute(&self, statement: &str) -> Result<ResultSet, GraphError> {
        let text = statement.to_string();
        let task_text = text.clone();
        let conn = Arc::clone(&self.conn);
        let joined = tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            let conn = guard
                .as_ref()
                .ok_or_else(|| GraphError::connection("embedded store is not open"))?;
            run_statement(conn, &task_text)
        })
        .await;
        match joined {
            Ok(result) => result,
            Err(e) => Err(GraphError::query_execution(
                text,
                format!("worker task failed: {e}"),
            )),
        }
    }

    async fn execute_batch(&self, statements: &[String]) -> Result<(), GraphError> {
        if statements.is_empty() {
            return Ok(());
        }
        let statements = statements.to_vec();
        let conn = Arc::clone(&self.conn);
        let joined = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            let conn = guard
                .as_mut()
                .ok_or_else(|| GraphError::connection("embedded store is not open"))?;
            let tx = conn
                .transaction()
                .map_err(|e| GraphError::connection(format!("begin failed: {e}")))?;
            for text in &statements {
                tx.execute_batch(text)
                    .map_err(|e| GraphError::query_execution(text, e.to_string()))?;
            }
            tx.commit()
                .map_err(|e| GraphError::connection(format!("commit failed: {e}")))
        })
        .await;
        match joined {
            Ok(result) => result,
            Err(e) => Err(GraphError::connection(format!("worker task failed: {e}"))),
        }
    }

    async fn close(&self) -> Result<(), GraphError> {
        let conn = self.conn.lock().take();
        if let Some(conn) = conn {
            // Drop off the executor; closing a WAL database touches disk.
            let _ = tokio::task::spawn_blocking(move || drop(conn)).await;
            debug!("embedded store closed");
        }
        Ok(())
    }
}

fn open_store(path: Option<&Path>, create_if_missing: bool) -> Result<Connection, GraphError> {
    let conn = match path {
        None => Connection::open_in_memory()
            .map_err(|e| GraphError::connection(format!("in-memory open failed: {e}")))?,
        Some(path) => {
            let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI;
            if create_if_missing {
                flags |= OpenFlags::SQLITE_OPEN_CREATE;
            }
            let conn = Connection::open_with_flags(path, flags).map_err(|e| {
                GraphError::connection(format!("cannot open {}: {e}", path.display()))
            })?;
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|e| GraphError::connection(format!("wal pragma failed: {e}")))?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(|e| GraphError::connection(format!("sync pragma failed: {e}")))?;
            conn
        }
    };
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| GraphError::connection(format!("fk pragma failed: {e}")))?;
    conn.execute_batch(BASE_SCHEMA)
        .map_err(|e| GraphError::connection(format!("base schema failed: {e}")))?;
    Ok(conn)
}

fn run_statement(conn: &Connection, text: &str) -> Result<ResultSet, GraphError> {
    let mut stmt = conn
        .prepare(text)
        .map_err(|e| GraphError::query_execution(text, e.to_string()))?;
    if stmt.column_count() == 0 {
        stmt.execute([])
            .map_err(|e| GraphError::query_execution(text, e.to_string()))?;
        return Ok(ResultSet::default());
    }
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let mut raw_rows: Vec<Vec<Value>> = Vec::new();
    let mut rows = stmt
        .query([])
        .map_err(|e| GraphError::query_execution(text, e.to_string()))?;
    loop {
        let row = match rows.next() {
            Ok(Some(row)) => row,
            Ok(None) => break,
            Err(e) => return Err(GraphError::query_execution(text, e.to_string())),
        };
        let mut cells = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            let cell = read_cell(row, idx)
                .map_err(|e| GraphError::query_execution(text, e.to_string()))?;
            cells.push(cell);
        }
        raw_rows.push(cells);
    }
    Ok(shape_rows(columns, raw_rows))
}

fn read_cell(row: &Row<'_>, idx: usize) -> rusqlite::Result<Value> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        // Property storage is JSON text; blobs do not occur in this schema.
        ValueRef::Blob(_) => Value::Null,
    })
}

enum ColumnPlan {
    Scalar {
        name: String,
        idx: usize,
    },
    Node {
        alias: String,
        id: usize,
        label: usize,
        properties: usize,
    },
    Relationship {
        alias: String,
        id: usize,
        from_id: usize,
        to_id: usize,
        rel_type: usize,
        properties: usize,
    },
}

/// Recognize `alias.field` projection groups. A complete
/// `{id, label, properties}` group folds into one node column named by its
/// alias; `{id, from_id, to_id, rel_type, properties}` folds into a
/// relationship column. Anything else stays a plain scalar column, so every
/// projection shapes to something.
fn plan_columns(columns: &[String]) -> Vec<ColumnPlan> {
    let mut groups: AHashMap<&str, AHashMap<&str, usize>> = AHashMap::new();
    for (idx, name) in columns.iter().enumerate() {
        if let Some((alias, field)) = name.split_once('.') {
            if !alias.is_empty() && !field.is_empty() && !field.contains('.') {
                groups.entry(alias).or_default().insert(field, idx);
            }
        }
    }

    let mut recognized: AHashMap<String, ColumnPlan> = AHashMap::new();
    for (alias, fields) in &groups {
        let node_keys = ["id", "label", "properties"];
        let edge_keys = ["id", "from_id", "to_id", "rel_type", "properties"];
        if fields.len() == node_keys.len() && node_keys.iter().all(|k| fields.contains_key(k)) {
            recognized.insert(
                alias.to_string(),
                ColumnPlan::Node {
                    alias: alias.to_string(),
                    id: fields["id"],
                    label: fields["label"],
                    properties: fields["properties"],
                },
            );
        } else if fields.len() == edge_keys.len()
            && edge_keys.iter().all(|k| fields.contains_key(k))
        {
            recognized.insert(
                alias.to_string(),
                ColumnPlan::Relationship {
                    alias: alias.to_string(),
                    id: fields["id"],
                    from_id: fields["from_id"],
                    to_id: fields["to_id"],
                    rel_type: fields["rel_type"],
                    properties: fields["properties"],
                },
            );
        }
    }

    let mut plans = Vec::new();
    let mut consumed: Vec<String> = Vec::new();
    for (idx, name) in columns.iter().enumerate() {
        if let Some((alias, _)) = name.split_once('.') {
            if consumed.iter().any(|a| a == alias) {
                continue;
            }
            if let Some(plan) = recognized.remove(alias) {
                consumed.push(alias.to_string());
                plans.push(plan);
                continue;
            }
        }
        plans.push(ColumnPlan::Scalar {
            name: name.clone(),
            idx,
        });
    }
    plans
}

fn shape_rows(columns: Vec<String>, raw: Vec<Vec<Value>>) -> ResultSet {
    let plans = plan_columns(&columns);
    let out_columns: Vec<String> = plans
        .iter()
        .map(|plan| match plan {
            ColumnPlan::Scalar { name, .. } => name.clone(),
            ColumnPlan::Node { alias, .. } => alias.clone(),
            ColumnPlan::Relationship { alias, .. } => alias.clone(),
        })
        .collect();
    let rows = raw
        .into_iter()
        .map(|row| plans.iter().map(|plan| shape_cell(plan, &row)).collect())
        .collect();
    ResultSet {
        columns: out_columns,
        rows,
        server_time_ms: None,
    }
}

fn shape_cell(plan: &ColumnPlan, row: &[Value]) -> BackendValue {
    match plan {
        ColumnPlan::Scalar { idx, .. } => BackendValue::from_json(row[*idx].clone()),
        ColumnPlan::Node {
            id,
            label,
            properties,
            ..
        } => {
            // A null id means an outer join missed; the whole cell is null.
            let Value::String(id) = &row[*id] else {
                return BackendValue::Null;
            };
            BackendValue::Node(NodeValue {
                id: id.clone(),
                label: string_cell(&row[*label]),
                properties: parse_properties(&row[*properties]),
            })
        }
        ColumnPlan::Relationship {
            id,
            from_id,
            to_id,
            rel_type,
            properties,
            ..
        } => {
            let rel_id = match &row[*id] {
                Value::Number(n) => n.to_string(),
                Value::String(s) => s.clone(),
                _ => return BackendValue::Null,
            };
            BackendValue::Relationship(RelationshipValue {
                id: rel_id,
                start_id: string_cell(&row[*from_id]),
                end_id: string_cell(&row[*to_id]),
                rel_type: string_cell(&row[*rel_type]),
                properties: parse_properties(&row[*properties]),
            })
        }
    }
}

fn string_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_properties(value: &Value) -> Map<String, Value> {
    match value {
        Value::String(text) => serde_json::from_str(text).unwrap_or_default(),
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn col(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn complete_node_group_folds_into_one_column() {
        let columns = col(&["g.id", "g.label", "g.properties", "total"]);
        let rows = vec![vec![
            json!("gene:hbb"),
            json!("Gene"),
            json!(r#"{"symbol":"HBB"}"#),
            json!(3),
        ]];
        let shaped = shape_rows(columns, rows);
        assert_eq!(shaped.columns, vec!["g", "total"]);
        match &shaped.rows[0][0] {
            BackendValue::Node(node) => {
                assert_eq!(node.id, "gene:hbb");
                assert_eq!(node.label, "Gene");
                assert_eq!(node.properties["symbol"], json!("HBB"));
            }
            other => panic!("expected node, got {other:?}"),
        }
        assert_eq!(shaped.rows[0][1], BackendValue::Int(3));
    }

    #[test]
    fn incomplete_group_stays_scalar() {
        let columns = col(&["g.id", "g.label"]);
        let rows = vec![vec![json!("gene:hbb"), json!("Gene")]];
        let shaped = shape_rows(columns, rows);
        assert_eq!(shaped.columns, vec!["g.id", "g.label"]);
        assert_eq!(shaped.rows[0][0], BackendValue::Str("gene:hbb".to_string()));
    }

    #[test]
    fn edge_group_folds_into_relationship() {
        let columns = col(&["e.id", "e.from_id", "e.to_id", "e.rel_type", "e.properties"]);
        let rows = vec![vec![
            json!(7),
            json!("gene:hbb"),
            json!("variant:1"),
            json!("HAS_VARIANT"),
            json!(r#"{"frequency":0.02}"#),
        ]];
        let shaped = shape_rows(columns, rows);
        assert_eq!(shaped.columns, vec!["e"]);
        match &shaped.rows[0][0] {
            BackendValue::Relationship(rel) => {
                assert_eq!(rel.id, "7");
                assert_eq!(rel.start_id, "gene:hbb");
                assert_eq!(rel.end_id, "variant:1");
                assert_eq!(rel.rel_type, "HAS_VARIANT");
                assert_eq!(rel.properties["frequency"], json!(0.02));
            }
            other => panic!("expected relationship, got {other:?}"),
        }
    }

    #[test]
    fn null_node_id_shapes_to_null() {
        let columns = col(&["g.id", "g.label", "g.properties"]);
        let rows = vec![vec![json!(null), json!(null), json!(null)]];
        let shaped = shape_rows(columns, rows);
        assert_eq!(shaped.rows[0][0], BackendValue::Null);
    }
}
