//! Per-dialect statement construction and safe parameter rendering.
//!
//! Builders emit statement text with `$name` placeholders and a parameter
//! map; `render` embeds the parameters as escaped literals in a single pass,
//! so a parameter value can never introduce new statement syntax and a
//! rendered value is never re-scanned for further placeholders.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::errors::GraphError;
use crate::schema::queries::{GeneQuery, PaperQuery, TrialQuery};
use crate::schema::{NodeLabel, RelType};

/// Query language spoken by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    /// Embedded store: SQL over the node/edge tables, JSON1 for properties.
    Sql,
    /// Client-server graph engine speaking Cypher.
    Cypher,
}

impl Dialect {
    pub fn explain_prefix(&self) -> &'static str {
        match self {
            Dialect::Sql => "EXPLAIN QUERY PLAN ",
            Dialect::Cypher => "EXPLAIN ",
        }
    }

    fn null_literal(&self) -> &'static str {
        match self {
            Dialect::Sql => "NULL",
            Dialect::Cypher => "null",
        }
    }
}

/// One statement plus its parameters, not yet rendered.
#[derive(Clone, Debug)]
pub struct Statement {
    pub text: String,
    pub params: BTreeMap<String, Value>,
}

impl Statement {
    pub fn new<T: Into<String>>(text: T) -> Statement {
        Statement {
            text: text.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn bind<N: Into<String>, V: Into<Value>>(mut self, name: N, value: V) -> Statement {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn render(&self, dialect: Dialect) -> String {
        render_statement(&self.text, &self.params, dialect)
    }
}

/// Embed `params` into `text`, replacing each `$name` occurrence with an
/// escaped literal. Single forward scan: output is never re-inspected, so a
/// parameter containing `$other` stays inert text. Placeholders with no
/// matching parameter are left for the backend to reject.
pub fn render_statement(text: &str, params: &BTreeMap<String, Value>, dialect: Dialect) -> String {
    let mut out = String::with_capacity(text.len() + 32);
    let mut chars = text.char_indices().peekable();
    while let Some((pos, ch)) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        let start = pos + 1;
        let mut end = start;
        while let Some(&(next_pos, next_ch)) = chars.peek() {
            if next_ch.is_ascii_alphanumeric() || next_ch == '_' {
                end = next_pos + next_ch.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        match params.get(&text[start..end]) {
            Some(value) if end > start => out.push_str(&render_value(value, dialect)),
            _ => out.push_str(&text[pos..end]),
        }
    }
    out
}

fn render_value(value: &Value, dialect: Dialect) -> String {
    match value {
        Value::Null => dialect.null_literal().to_string(),
        Value::Bool(b) => match dialect {
            Dialect::Sql => if *b { "1" } else { "0" }.to_string(),
            Dialect::Cypher => b.to_string(),
        },
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_str(s, dialect),
        // Compound values: the embedded store keeps JSON text columns, the
        // Cypher dialect has native list/map literals.
        Value::Array(items) => match dialect {
            Dialect::Sql => quote_str(&value.to_string(), dialect),
            Dialect::Cypher => {
                let rendered: Vec<String> =
                    items.iter().map(|v| render_value(v, dialect)).collect();
                format!("[{}]", rendered.join(", "))
            }
        },
        Value::Object(map) => match dialect {
            Dialect::Sql => quote_str(&value.to_string(), dialect),
            Dialect::Cypher => {
                let rendered: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quote_cypher_key(k), render_value(v, dialect)))
                    .collect();
                format!("{{{}}}", rendered.join(", "))
            }
        },
    }
}

fn quote_str(s: &str, dialect: Dialect) -> String {
    match dialect {
        // SQL strings know exactly one escape: the doubled quote.
        Dialect::Sql => format!("'{}'", s.replace('\'', "''")),
        Dialect::Cypher => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
    }
}

fn quote_cypher_key(key: &str) -> String {
    if is_property_name(key) {
        key.to_string()
    } else {
        format!("`{}`", key.replace('`', "``"))
    }
}

/// Escape LIKE wildcards in a user term and wrap it for substring matching.
/// The statement must carry `ESCAPE '\'` for this to hold.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    for ch in term.chars() {
        if ch == '\\' || ch == '%' || ch == '_' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    format!("%{escaped}%")
}

fn is_property_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .enumerate()
            .all(|(i, c)| c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit()))
}

/// Property names are spliced into statement text (JSON paths, index
/// definitions), so they are restricted to identifiers. Values never need
/// this check; they go through `render`.
pub fn ensure_property_name(name: &str) -> Result<(), GraphError> {
    if is_property_name(name) {
        Ok(())
    } else {
        Err(GraphError::single_violation(
            name,
            "property names must be identifiers (letters, digits, underscore)",
        ))
    }
}

const NODE_PROJECTION: &str = r#"{a}.id AS "{a}.id", {a}.label AS "{a}.label", {a}.properties AS "{a}.properties""#;

fn sql_projection(alias: &str) -> String {
    NODE_PROJECTION.replace("{a}", alias)
}

fn sql_prop(alias: &str, property: &str) -> String {
    format!("json_extract({alias}.properties, '$.{property}')")
}

// --- read builders ------------------------------------------------------

pub fn search_genes(dialect: Dialect, query: &GeneQuery) -> Statement {
    let page = query.page();
    match dialect {
        Dialect::Sql => {
            let mut conds = vec!["g.label = 'Gene'".to_string()];
            let mut stmt = Statement::new(String::new());
            if let Some(symbol) = &query.symbol {
                conds.push(format!("{} = $symbol", sql_prop("g", "symbol")));
                stmt = stmt.bind("symbol", symbol.as_str());
            }
            if let Some(chromosome) = &query.chromosome {
                conds.push(format!("{} = $chromosome", sql_prop("g", "chromosome")));
                stmt = stmt.bind("chromosome", chromosome.as_str());
            }
            if let Some(keyword) = &query.keyword {
                conds.push(format!(
                    "({sym} LIKE $kw ESCAPE '\\' OR {name} LIKE $kw ESCAPE '\\' OR {desc} LIKE $kw ESCAPE '\\')",
                    sym = sql_prop("g", "symbol"),
                    name = sql_prop("g", "name"),
                    desc = sql_prop("g", "description"),
                ));
                stmt = stmt.bind("kw", like_pattern(keyword));
            }
            if let Some(disease) = &query.associated_disease {
                conds.push(format!(
                    "EXISTS (SELECT 1 FROM graph_edges e JOIN graph_nodes t ON t.id = e.from_id \
                     WHERE e.to_id = g.id AND e.rel_type = 'INVESTIGATES' \
                     AND {} LIKE $disease ESCAPE '\\')",
                    sql_prop("t", "name"),
                ));
                stmt = stmt.bind("disease", like_pattern(disease));
            }
            if let Some(has_trials) = query.has_clinical_trials {
                let exists = "EXISTS (SELECT 1 FROM graph_edges e2 \
                              WHERE e2.to_id = g.id AND e2.rel_type = 'INVESTIGATES')";
                conds.push(if has_trials {
                    exists.to_string()
                } else {
                    format!("NOT {exists}")
                });
            }
            stmt.text = format!(
                "SELECT {proj} FROM graph_nodes g WHERE {conds} \
                 ORDER BY {sym} LIMIT $limit OFFSET $offset",
                proj = sql_projection("g"),
                conds = conds.join(" AND "),
                sym = sql_prop("g", "symbol"),
            );
            stmt.bind("limit", page.limit).bind("offset", page.offset)
        }
        Dialect::Cypher => {
            let mut conds = Vec::new();
            let mut stmt = Statement::new(String::new());
            if let Some(symbol) = &query.symbol {
                conds.push("g.symbol = $symbol".to_string());
                stmt = stmt.bind("symbol", symbol.as_str());
            }
            if let Some(chromosome) = &query.chromosome {
                conds.push("g.chromosome = $chromosome".to_string());
                stmt = stmt.bind("chromosome", chromosome.as_str());
            }
            if let Some(keyword) = &query.keyword {
                conds.push(
                    "(toLower(g.symbol) CONTAINS toLower($kw) \
                     OR toLower(g.name) CONTAINS toLower($kw) \
                     OR toLower(g.description) CONTAINS toLower($kw))"
                        .to_string(),
                );
                stmt = stmt.bind("kw", keyword.as_str());
            }
            if let Some(disease) = &query.associated_disease {
                conds.push(
                    "EXISTS { MATCH (t:ClinicalTrial)-[:INVESTIGATES]->(g) \
                     WHERE toLower(t.name) CONTAINS toLower($disease) }"
                        .to_string(),
                );
                stmt = stmt.bind("disease", disease.as_str());
            }
            if let Some(has_trials) = query.has_clinical_trials {
                let exists = "EXISTS { MATCH (:ClinicalTrial)-[:INVESTIGATES]->(g) }";
                conds.push(if has_trials {
                    exists.to_string()
                } else {
                    format!("NOT {exists}")
                });
            }
            stmt.text = format!(
                "MATCH (g:Gene){} RETURN g ORDER BY g.symbol SKIP $offset LIMIT $limit",
                where_clause(&conds),
            );
            stmt.bind("limit", page.limit).bind("offset", page.offset)
        }
    }
}

pub fn gene_by_id(dialect: Dialect, id: &str) -> Statement {
    match dialect {
        Dialect::Sql => Statement::new(format!(
            "SELECT {} FROM graph_nodes g WHERE g.label = 'Gene' AND g.id = $id",
            sql_projection("g"),
        )),
        Dialect::Cypher => Statement::new("MATCH (g:Gene {id: $id}) RETURN g LIMIT 1"),
    }
    .bind("id", id)
}

/// Variants owned by a gene, via HAS_VARIANT.
pub fn gene_variants(dialect: Dialect, gene_id: &str) -> Statement {
    match dialect {
        Dialect::Sql => Statement::new(format!(
            "SELECT {} FROM graph_edges e JOIN graph_nodes v ON v.id = e.to_id \
             WHERE e.rel_type = 'HAS_VARIANT' AND e.from_id = $gene_id ORDER BY v.id",
            sql_projection("v"),
        )),
        Dialect::Cypher => Statement::new(
            "MATCH (:Gene {id: $gene_id})-[:HAS_VARIANT]->(v:Variant) RETURN v ORDER BY v.id",
        ),
    }
    .bind("gene_id", gene_id)
}

/// Treatments targeting a gene, via TARGETS (edge points at the gene).
pub fn gene_treatments(dialect: Dialect, gene_id: &str) -> Statement {
    match dialect {
        Dialect::Sql => Statement::new(format!(
            "SELECT {} FROM graph_edges e JOIN graph_nodes t ON t.id = e.from_id \
             WHERE e.rel_type = 'TARGETS' AND e.to_id = $gene_id ORDER BY t.id",
            sql_projection("t"),
        )),
        Dialect::Cypher => Statement::new(
            "MATCH (t:Treatment)-[:TARGETS]->(:Gene {id: $gene_id}) RETURN t ORDER BY t.id",
        ),
    }
    .bind("gene_id", gene_id)
}

/// Papers mentioning a gene, via MENTIONS (edge points at the gene).
pub fn gene_papers(dialect: Dialect, gene_id: &str) -> Statement {
    match dialect {
        Dialect::Sql => Statement::new(format!(
            "SELECT {} FROM graph_edges e JOIN graph_nodes p ON p.id = e.from_id \
             WHERE e.rel_type = 'MENTIONS' AND e.to_id = $gene_id \
             ORDER BY {} DESC",
            sql_projection("p"),
            sql_prop("p", "publication_date"),
        )),
        Dialect::Cypher => Statement::new(
            "MATCH (p:ResearchPaper)-[:MENTIONS]->(:Gene {id: $gene_id}) \
             RETURN p ORDER BY p.publication_date DESC",
        ),
    }
    .bind("gene_id", gene_id)
}

/// Trials reachable from a variant through its owning gene. An empty
/// `variant_id` drops the variant constraint. A trial matches a region when
/// one of its locations contains it or the trial is multicentric.
pub fn trials_for_variant(dialect: Dialect, variant_id: &str, region: Option<&str>) -> Statement {
    match dialect {
        Dialect::Sql => {
            let mut conds = vec!["c.label = 'ClinicalTrial'".to_string()];
            let mut stmt = Statement::new(String::new());
            if !variant_id.is_empty() {
                conds.push(
                    "EXISTS (SELECT 1 FROM graph_edges inv \
                     JOIN graph_edges hv ON hv.from_id = inv.to_id \
                     WHERE inv.from_id = c.id AND inv.rel_type = 'INVESTIGATES' \
                     AND hv.rel_type = 'HAS_VARIANT' AND hv.to_id = $variant_id)"
                        .to_string(),
                );
                stmt = stmt.bind("variant_id", variant_id);
            }
            if let Some(region) = region {
                conds.push(format!(
                    "(EXISTS (SELECT 1 FROM json_each(c.properties, '$.locations') loc \
                     WHERE loc.value LIKE $region ESCAPE '\\') OR {} = 1)",
                    sql_prop("c", "multicentric"),
                ));
                stmt = stmt.bind("region", like_pattern(region));
            }
            stmt.text = format!(
                "SELECT {proj} FROM graph_nodes c WHERE {conds} \
                 ORDER BY {start} DESC LIMIT 100",
                proj = sql_projection("c"),
                conds = conds.join(" AND "),
                start = sql_prop("c", "start_date"),
            );
            stmt
        }
        Dialect::Cypher => {
            let mut conds = Vec::new();
            let mut stmt = Statement::new(String::new());
            if !variant_id.is_empty() {
                conds.push(
                    "EXISTS { MATCH (c)-[:INVESTIGATES]->(:Gene)-[:HAS_VARIANT]->\
                     (:Variant {id: $variant_id}) }"
                        .to_string(),
                );
                stmt = stmt.bind("variant_id", variant_id);
            }
            if let Some(region) = region {
                conds.push(
                    "(any(loc IN c.locations WHERE toLower(loc) CONTAINS toLower($region)) \
                     OR c.multicentric = true)"
                        .to_string(),
                );
                stmt = stmt.bind("region", region);
            }
            stmt.text = format!(
                "MATCH (c:ClinicalTrial){} RETURN c ORDER BY c.start_date DESC LIMIT 100",
                where_clause(&conds),
            );
            stmt
        }
    }
}

pub fn search_papers(dialect: Dialect, query: &PaperQuery) -> Statement {
    let page = query.page();
    match dialect {
        Dialect::Sql => {
            let mut conds = vec!["p.label = 'ResearchPaper'".to_string()];
            let mut stmt = Statement::new(String::new());
            if let Some(keyword) = &query.keyword {
                conds.push(format!(
                    "({title} LIKE $kw ESCAPE '\\' OR {abs} LIKE $kw ESCAPE '\\' \
                     OR EXISTS (SELECT 1 FROM json_each(p.properties, '$.keywords') k \
                     WHERE k.value LIKE $kw ESCAPE '\\'))",
                    title = sql_prop("p", "title"),
                    abs = sql_prop("p", "abstract"),
                ));
                stmt = stmt.bind("kw", like_pattern(keyword));
            }
            if let Some(journal) = &query.journal {
                conds.push(format!("{} = $journal", sql_prop("p", "journal")));
                stmt = stmt.bind("journal", journal.as_str());
            }
            if let Some(author) = &query.author {
                conds.push(
                    "EXISTS (SELECT 1 FROM json_each(p.properties, '$.authors') a \
                     WHERE a.value = $author)"
                        .to_string(),
                );
                stmt = stmt.bind("author", author.as_str());
            }
            if let Some(symbol) = &query.gene_symbol {
                conds.push(format!(
                    "EXISTS (SELECT 1 FROM graph_edges m JOIN graph_nodes g ON g.id = m.to_id \
                     WHERE m.from_id = p.id AND m.rel_type = 'MENTIONS' \
                     AND {} = $gene_symbol)",
                    sql_prop("g", "symbol"),
                ));
                stmt = stmt.bind("gene_symbol", symbol.as_str());
            }
            // Date bounds are inclusive; ISO dates compare lexicographically.
            if let Some(after) = &query.published_after {
                conds.push(format!("{} >= $after", sql_prop("p", "publication_date")));
                stmt = stmt.bind("after", after.to_string());
            }
            if let Some(before) = &query.published_before {
                conds.push(format!("{} <= $before", sql_prop("p", "publication_date")));
                stmt = stmt.bind("before", before.to_string());
            }
            stmt.text = format!(
                "SELECT {proj} FROM graph_nodes p WHERE {conds} \
                 ORDER BY {date} DESC LIMIT $limit OFFSET $offset",
                proj = sql_projection("p"),
                conds = conds.join(" AND "),
                date = sql_prop("p", "publication_date"),
            );
            stmt.bind("limit", page.limit).bind("offset", page.offset)
        }
        Dialect::Cypher => {
            let mut conds = Vec::new();
            let mut stmt = Statement::new(String::new());
            if let Some(keyword) = &query.keyword {
                conds.push(
                    "(toLower(p.title) CONTAINS toLower($kw) \
                     OR (p.abstract IS NOT NULL AND toLower(p.abstract) CONTAINS toLower($kw)) \
                     OR any(k IN p.keywords WHERE toLower(k) CONTAINS toLower($kw)))"
                        .to_string(),
                );
                stmt = stmt.bind("kw", keyword.as_str());
            }
            if let Some(journal) = &query.journal {
                conds.push("p.journal = $journal".to_string());
                stmt = stmt.bind("journal", journal.as_str());
            }
            if let Some(author) = &query.author {
                conds.push("$author IN p.authors".to_string());
                stmt = stmt.bind("author", author.as_str());
            }
            if let Some(symbol) = &query.gene_symbol {
                conds.push(
                    "EXISTS { MATCH (p)-[:MENTIONS]->(g:Gene) WHERE g.symbol = $gene_symbol }"
                        .to_string(),
                );
                stmt = stmt.bind("gene_symbol", symbol.as_str());
            }
            if let Some(after) = &query.published_after {
                conds.push("p.publication_date >= $after".to_string());
                stmt = stmt.bind("after", after.to_string());
            }
            if let Some(before) = &query.published_before {
                conds.push("p.publication_date <= $before".to_string());
                stmt = stmt.bind("before", before.to_string());
            }
            stmt.text = format!(
                "MATCH (p:ResearchPaper){} RETURN p \
                 ORDER BY p.publication_date DESC SKIP $offset LIMIT $limit",
                where_clause(&conds),
            );
            stmt.bind("limit", page.limit).bind("offset", page.offset)
        }
    }
}

pub fn search_trials(dialect: Dialect, query: &TrialQuery) -> Statement {
    let page = query.page();
    match dialect {
        Dialect::Sql => {
            let mut conds = vec!["c.label = 'ClinicalTrial'".to_string()];
            let mut stmt = Statement::new(String::new());
            if let Some(status) = query.status {
                conds.push(format!("{} = $status", sql_prop("c", "status")));
                stmt = stmt.bind("status", status.as_str());
            }
            if let Some(phase) = query.phase {
                conds.push(format!("{} = $phase", sql_prop("c", "phase")));
                stmt = stmt.bind("phase", phase.as_str());
            }
            if let Some(region) = &query.region {
                conds.push(format!(
                    "(EXISTS (SELECT 1 FROM json_each(c.properties, '$.locations') loc \
                     WHERE loc.value LIKE $region ESCAPE '\\') OR {} = 1)",
                    sql_prop("c", "multicentric"),
                ));
                stmt = stmt.bind("region", like_pattern(region));
            }
            if let Some(symbol) = &query.gene_symbol {
                conds.push(format!(
                    "EXISTS (SELECT 1 FROM graph_edges e JOIN graph_nodes g ON g.id = e.to_id \
                     WHERE e.from_id = c.id AND e.rel_type = 'INVESTIGATES' \
                     AND {} = $gene_symbol)",
                    sql_prop("g", "symbol"),
                ));
                stmt = stmt.bind("gene_symbol", symbol.as_str());
            }
            stmt.text = format!(
                "SELECT {proj} FROM graph_nodes c WHERE {conds} \
                 ORDER BY {start} DESC LIMIT $limit OFFSET $offset",
                proj = sql_projection("c"),
                conds = conds.join(" AND "),
                start = sql_prop("c", "start_date"),
            );
            stmt.bind("limit", page.limit).bind("offset", page.offset)
        }
        Dialect::Cypher => {
            let mut conds = Vec::new();
            let mut stmt = Statement::new(String::new());
            if let Some(status) = query.status {
                conds.push("c.status = $status".to_string());
                stmt = stmt.bind("status", status.as_str());
            }
            if let Some(phase) = query.phase {
                conds.push("c.phase = $phase".to_string());
                stmt = stmt.bind("phase", phase.as_str());
            }
            if let Some(region) = &query.region {
                conds.push(
                    "(any(loc IN c.locations WHERE toLower(loc) CONTAINS toLower($region)) \
                     OR c.multicentric = true)"
                        .to_string(),
                );
                stmt = stmt.bind("region", region.as_str());
            }
            if let Some(symbol) = &query.gene_symbol {
                conds.push(
                    "EXISTS { MATCH (c)-[:INVESTIGATES]->(g:Gene) WHERE g.symbol = $gene_symbol }"
                        .to_string(),
                );
                stmt = stmt.bind("gene_symbol", symbol.as_str());
            }
            stmt.text = format!(
                "MATCH (c:ClinicalTrial){} RETURN c \
                 ORDER BY c.start_date DESC SKIP $offset LIMIT $limit",
                where_clause(&conds),
            );
            stmt.bind("limit", page.limit).bind("offset", page.offset)
        }
    }
}

/// Count nodes of a label, optionally filtered on property equality. Filter
/// keys splice into the statement, so they must be identifiers.
pub fn count_nodes(
    dialect: Dialect,
    label: NodeLabel,
    filters: &BTreeMap<String, Value>,
) -> Result<Statement, GraphError> {
    for key in filters.keys() {
        ensure_property_name(key)?;
    }
    let mut stmt = Statement::new(String::new());
    let mut conds = Vec::new();
    for (i, (key, value)) in filters.iter().enumerate() {
        let param = format!("f{i}");
        conds.push(match dialect {
            Dialect::Sql => format!("{} = ${param}", sql_prop("n", key)),
            Dialect::Cypher => format!("n.{key} = ${param}"),
        });
        stmt = stmt.bind(param, value.clone());
    }
    stmt.text = match dialect {
        Dialect::Sql => {
            let mut all = vec![format!("n.label = '{}'", label.as_str())];
            all.extend(conds);
            format!(
                "SELECT COUNT(*) AS count FROM graph_nodes n WHERE {}",
                all.join(" AND "),
            )
        }
        Dialect::Cypher => format!(
            "MATCH (n:{}){} RETURN count(n) AS count",
            label.as_str(),
            where_clause(&conds),
        ),
    };
    Ok(stmt)
}

fn where_clause(conds: &[String]) -> String {
    if conds.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conds.join(" AND "))
    }
}

// --- write builders -----------------------------------------------------

/// Merge a node by id, replacing its properties when it already exists.
pub fn upsert_node(dialect: Dialect, label: NodeLabel, id: &str, properties: Value) -> Statement {
    match dialect {
        Dialect::Sql => Statement::new(
            "INSERT INTO graph_nodes (id, label, properties) VALUES ($id, $label, $props) \
             ON CONFLICT(id) DO UPDATE SET label = excluded.label, \
             properties = excluded.properties",
        ),
        Dialect::Cypher => Statement::new(format!(
            "MERGE (n:{} {{id: $id}}) SET n = $props",
            label.as_str(),
        )),
    }
    .bind("id", id)
    .bind("label", label.as_str())
    .bind("props", properties)
}

/// Merge a node by id without touching an existing one. Used for stub
/// endpoints referenced by symbol before their full record arrives.
pub fn upsert_node_if_absent(
    dialect: Dialect,
    label: NodeLabel,
    id: &str,
    properties: Value,
) -> Statement {
    match dialect {
        Dialect::Sql => Statement::new(
            "INSERT INTO graph_nodes (id, label, properties) VALUES ($id, $label, $props) \
             ON CONFLICT(id) DO NOTHING",
        ),
        Dialect::Cypher => Statement::new(format!(
            "MERGE (n:{} {{id: $id}}) ON CREATE SET n = $props",
            label.as_str(),
        )),
    }
    .bind("id", id)
    .bind("label", label.as_str())
    .bind("props", properties)
}

/// Merge an edge on its (from, type, to) identity, replacing edge properties.
/// Both endpoints must already exist.
pub fn upsert_edge(
    dialect: Dialect,
    rel: RelType,
    from_id: &str,
    to_id: &str,
    properties: Value,
) -> Statement {
    match dialect {
        Dialect::Sql => Statement::new(
            "INSERT INTO graph_edges (from_id, to_id, rel_type, properties) \
             VALUES ($from_id, $to_id, $rel_type, $props) \
             ON CONFLICT(from_id, rel_type, to_id) DO UPDATE SET \
             properties = excluded.properties",
        ),
        Dialect::Cypher => Statement::new(format!(
            "MATCH (a {{id: $from_id}}), (b {{id: $to_id}}) \
             MERGE (a)-[r:{}]->(b) SET r = $props",
            rel.as_str(),
        )),
    }
    .bind("from_id", from_id)
    .bind("to_id", to_id)
    .bind("rel_type", rel.as_str())
    .bind("props", properties)
}

// --- index builders -----------------------------------------------------

pub fn index_name(label: NodeLabel, property: &str, unique: bool) -> String {
    let prefix = if unique { "uniq" } else { "idx" };
    format!(
        "{prefix}_{}_{property}",
        label.as_str().to_ascii_lowercase(),
    )
}

pub fn create_index(
    dialect: Dialect,
    label: NodeLabel,
    property: &str,
    unique: bool,
) -> Result<Statement, GraphError> {
    ensure_property_name(property)?;
    let name = index_name(label, property, unique);
    let text = match dialect {
        Dialect::Sql => format!(
            "CREATE {u}INDEX IF NOT EXISTS {name} ON graph_nodes \
             (json_extract(properties, '$.{property}')) WHERE label = '{label}'",
            u = if unique { "UNIQUE " } else { "" },
            label = label.as_str(),
        ),
        Dialect::Cypher if unique => format!(
            "CREATE CONSTRAINT {name} IF NOT EXISTS FOR (n:{label}) \
             REQUIRE n.{property} IS UNIQUE",
            label = label.as_str(),
        ),
        Dialect::Cypher => format!(
            "CREATE INDEX {name} IF NOT EXISTS FOR (n:{label}) ON (n.{property})",
            label = label.as_str(),
        ),
    };
    Ok(Statement::new(text))
}

pub fn drop_index(
    dialect: Dialect,
    label: NodeLabel,
    property: &str,
    unique: bool,
) -> Result<Statement, GraphError> {
    ensure_property_name(property)?;
    let name = index_name(label, property, unique);
    let text = match dialect {
        Dialect::Sql => format!("DROP INDEX IF EXISTS {name}"),
        Dialect::Cypher if unique => format!("DROP CONSTRAINT {name} IF EXISTS"),
        Dialect::Cypher => format!("DROP INDEX {name} IF EXISTS"),
    };
    Ok(Statement::new(text))
}

/// Planner statistics refresh after bulk writes. The Cypher side has no
/// portable equivalent; the server maintains its own statistics.
pub fn refresh_statistics(dialect: Dialect) -> Option<Statement> {
    match dialect {
        Dialect::Sql => Some(Statement::new("ANALYZE")),
        Dialect::Cypher => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quoted_injection_stays_a_literal() {
        let stmt = Statement::new("SELECT * FROM t WHERE name = $name")
            .bind("name", r#"x" OR "1"="1"#);
        let sql = stmt.render(Dialect::Sql);
        assert_eq!(sql, r#"SELECT * FROM t WHERE name = 'x" OR "1"="1'"#);

        let stmt = Statement::new("MATCH (n) WHERE n.name = $name RETURN n")
            .bind("name", "x' OR '1'='1");
        let cypher = stmt.render(Dialect::Cypher);
        assert_eq!(cypher, r#"MATCH (n) WHERE n.name = 'x\' OR \'1\'=\'1' RETURN n"#);
    }

    #[test]
    fn sql_quotes_double_up() {
        let stmt = Statement::new("$v").bind("v", "O'Brien; DROP TABLE graph_nodes;--");
        assert_eq!(
            stmt.render(Dialect::Sql),
            "'O''Brien; DROP TABLE graph_nodes;--'",
        );
    }

    #[test]
    fn rendered_values_are_not_rescanned() {
        let stmt = Statement::new("$a + $b").bind("a", "$b").bind("b", 1);
        assert_eq!(stmt.render(Dialect::Sql), "'$b' + 1");
    }

    #[test]
    fn placeholder_names_do_not_collide_on_prefix() {
        let stmt = Statement::new("$gene_id $gene").bind("gene", "A").bind("gene_id", "B");
        assert_eq!(stmt.render(Dialect::Sql), "'B' 'A'");
    }

    #[test]
    fn unbound_placeholders_pass_through() {
        let stmt = Statement::new("SELECT $missing");
        assert_eq!(stmt.render(Dialect::Sql), "SELECT $missing");
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(like_pattern("50%_done"), "%50\\%\\_done%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn keyword_search_binds_pattern_not_raw_text() {
        let query = GeneQuery {
            keyword: Some("100%".to_string()),
            ..GeneQuery::default()
        };
        let stmt = search_genes(Dialect::Sql, &query);
        assert_eq!(stmt.params["kw"], json!("%100\\%%"));
        assert!(stmt.text.contains("ESCAPE '\\'"));
    }

    #[test]
    fn cypher_compound_values_render_as_literals() {
        let stmt = Statement::new("SET n = $props").bind(
            "props",
            json!({"name": "it's", "tags": ["a", "b"], "n": 3, "ok": true}),
        );
        assert_eq!(
            stmt.render(Dialect::Cypher),
            r#"SET n = {n: 3, name: 'it\'s', ok: true, tags: ['a', 'b']}"#,
        );
    }

    #[test]
    fn sql_compound_values_render_as_json_text() {
        let stmt = Statement::new("VALUES ($props)").bind("props", json!({"k": "v'"}));
        assert_eq!(stmt.render(Dialect::Sql), r#"VALUES ('{"k":"v''"}')"#);
    }

    #[test]
    fn count_rejects_non_identifier_filter_keys() {
        let mut filters = BTreeMap::new();
        filters.insert("symbol) OR (1=1".to_string(), json!("HBB"));
        let err = count_nodes(Dialect::Sql, NodeLabel::Gene, &filters)
            .expect_err("key with syntax must be rejected");
        assert!(matches!(err, GraphError::Validation(_)));
    }

    #[test]
    fn empty_variant_id_drops_the_variant_constraint() {
        let stmt = trials_for_variant(Dialect::Sql, "", Some("Africa"));
        assert!(!stmt.text.contains("HAS_VARIANT"));
        assert!(stmt.text.contains("json_each"));

        let stmt = trials_for_variant(Dialect::Sql, "variant:1", Some("Africa"));
        assert!(stmt.text.contains("HAS_VARIANT"));
    }

    #[test]
    fn null_renders_per_dialect() {
        let stmt = Statement::new("$v").bind("v", Value::Null);
        assert_eq!(stmt.render(Dialect::Sql), "NULL");
        assert_eq!(stmt.render(Dialect::Cypher), "null");
    }
}
