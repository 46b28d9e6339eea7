//! The adapter is the sole owner of a backend session: it renders and
//! executes every statement, coerces results, and maintains the query cache
//! and the index registry. Callers never see dialect text unless they use
//! `execute_query` directly.

use std::collections::BTreeMap;
use std::time::Instant;

use ahash::AHashSet;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::backend::{GraphBackend, open_backend};
use crate::cache::{CacheStats, QueryCache, cache_key};
use crate::coerce::coerce_row;
use crate::config::GraphConfig;
use crate::errors::GraphError;
use crate::import::{ImportReport, parse_gene_bulk};
use crate::schema::entities::{
    ClinicalTrial, Gene, GeneDetail, ResearchPaper, Treatment, Variant,
};
use crate::schema::queries::{GeneQuery, PaperQuery, TrialQuery};
use crate::schema::{NodeLabel, RelType, STANDARD_INDEXES, gene_id_from_symbol};
use crate::statements::{self, Dialect, Statement};
use crate::value::ResultSet;

/// Session lifecycle. `Closed` is terminal; a new adapter must be built to
/// reconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdapterState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// Per-call execution switches. Caching is opt-in: most domain queries are
/// parameterized by live user input and must not be served stale.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryOptions {
    pub use_cache: bool,
    /// Overrides the adapter-wide TTL for this entry.
    pub cache_ttl: Option<std::time::Duration>,
    /// Prepend the dialect's explain keyword; bypasses the cache entirely.
    pub explain: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryMetadata {
    pub query_time_ms: u64,
    pub result_count: usize,
    pub source: &'static str,
    pub cached: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryOutcome {
    pub data: Vec<Value>,
    pub metadata: QueryMetadata,
}

pub struct GraphAdapter {
    backend: Box<dyn GraphBackend>,
    config: GraphConfig,
    state: Mutex<AdapterState>,
    cache: QueryCache<QueryOutcome>,
    index_registry: Mutex<AHashSet<String>>,
    import_lock: tokio::sync::Mutex<()>,
}

impl GraphAdapter {
    /// Build an adapter over the backend selected by `config`. The session
    /// is not opened until `initialize()`.
    pub fn new(config: GraphConfig) -> Result<GraphAdapter, GraphError> {
        let backend = open_backend(&config)?;
        Ok(GraphAdapter::with_backend(backend, config))
    }

    pub fn with_backend(backend: Box<dyn GraphBackend>, config: GraphConfig) -> GraphAdapter {
        GraphAdapter {
            backend,
            cache: QueryCache::new(config.cache_ttl()),
            config,
            state: Mutex::new(AdapterState::Uninitialized),
            index_registry: Mutex::new(AHashSet::new()),
            import_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> AdapterState {
        *self.state.lock()
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn dialect(&self) -> Dialect {
        self.backend.dialect()
    }

    fn ensure_ready(&self) -> Result<(), GraphError> {
        match *self.state.lock() {
            AdapterState::Ready => Ok(()),
            AdapterState::Uninitialized => {
                Err(GraphError::not_initialized("call initialize() first"))
            }
            AdapterState::Initializing => {
                Err(GraphError::not_initialized("initialization in progress"))
            }
            AdapterState::Closed => Err(GraphError::not_initialized("adapter is closed")),
        }
    }

    /// Open the backend session and verify reachability. Idempotent once
    /// Ready; a failed attempt reverts to Uninitialized so the caller may
    /// retry.
    pub async fn initialize(&self) -> Result<(), GraphError> {
        {
            let mut state = self.state.lock();
            match *state {
                AdapterState::Ready => return Ok(()),
                AdapterState::Initializing => {
                    return Err(GraphError::not_initialized(
                        "initialization already in progress",
                    ));
                }
                AdapterState::Closed => {
                    return Err(GraphError::not_initialized(
                        "adapter is closed; construct a new one",
                    ));
                }
                AdapterState::Uninitialized => *state = AdapterState::Initializing,
            }
        }
        let connected =
            tokio::time::timeout(self.config.connect_timeout(), self.backend.connect()).await;
        match connected {
            Ok(Ok(())) => {
                let reverted = {
                    let mut state = self.state.lock();
                    if *state == AdapterState::Initializing {
                        *state = AdapterState::Ready;
                        false
                    } else {
                        true
                    }
                };
                if reverted {
                    // close() aborted the initialization; release the session.
                    let _ = self.backend.close().await;
                    return Err(GraphError::not_initialized(
                        "adapter closed during initialization",
                    ));
                }
                info!(source = self.backend.source(), "graph adapter ready");
                Ok(())
            }
            Ok(Err(e)) => {
                self.revert_initializing();
                Err(e)
            }
            Err(_) => {
                self.revert_initializing();
                Err(GraphError::connection(format!(
                    "connect timed out after {}s",
                    self.config.connect_timeout_secs
                )))
            }
        }
    }

    fn revert_initializing(&self) {
        let mut state = self.state.lock();
        if *state == AdapterState::Initializing {
            *state = AdapterState::Uninitialized;
        }
    }

    /// Close the session. Valid from any state; repeat calls are no-ops.
    pub async fn close(&self) -> Result<(), GraphError> {
        {
            let mut state = self.state.lock();
            if *state == AdapterState::Closed {
                return Ok(());
            }
            *state = AdapterState::Closed;
        }
        self.cache.invalidate(None);
        self.backend.close().await?;
        info!("graph adapter closed");
        Ok(())
    }

    /// Execute caller-supplied statement text with `$name` parameters.
    pub async fn execute_query(
        &self,
        text: &str,
        params: &BTreeMap<String, Value>,
        options: &QueryOptions,
    ) -> Result<QueryOutcome, GraphError> {
        self.ensure_ready()?;
        let dialect = self.dialect();
        let statement_text = if options.explain {
            format!("{}{text}", dialect.explain_prefix())
        } else {
            text.to_string()
        };

        let key = if options.use_cache && !options.explain {
            Some(cache_key(&statement_text, params))
        } else {
            None
        };
        if let Some(key) = &key {
            if let Some(mut hit) = self.cache.get(key) {
                hit.metadata.cached = true;
                debug!(rows = hit.metadata.result_count, "query served from cache");
                return Ok(hit);
            }
        }

        let rendered = statements::render_statement(&statement_text, params, dialect);
        let started = Instant::now();
        let result_set = self.run_with_timeout(&rendered).await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let ResultSet {
            columns,
            rows,
            server_time_ms,
        } = result_set;
        let data: Vec<Value> = rows
            .into_iter()
            .map(|row| coerce_row(&columns, row))
            .collect();
        let outcome = QueryOutcome {
            metadata: QueryMetadata {
                query_time_ms: server_time_ms.unwrap_or(elapsed_ms),
                result_count: data.len(),
                source: self.backend.source(),
                cached: false,
            },
            data,
        };
        debug!(
            ?dialect,
            statement = %preview(&rendered),
            rows = outcome.metadata.result_count,
            elapsed_ms,
            "statement executed"
        );

        if let Some(key) = key {
            match options.cache_ttl {
                Some(ttl) => self.cache.put_with_ttl(key, outcome.clone(), ttl),
                None => self.cache.put(key, outcome.clone()),
            }
        }
        Ok(outcome)
    }

    async fn run_with_timeout(&self, rendered: &str) -> Result<ResultSet, GraphError> {
        match tokio::time::timeout(self.config.request_timeout(), self.backend.execute(rendered))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(GraphError::timeout(
                preview(rendered),
                self.config.request_timeout_secs * 1000,
            )),
        }
    }

    async fn query_entities<T: DeserializeOwned>(
        &self,
        statement: Statement,
        column: &str,
    ) -> Result<Vec<T>, GraphError> {
        let outcome = self
            .execute_query(&statement.text, &statement.params, &QueryOptions::default())
            .await?;
        let mut entities = Vec::with_capacity(outcome.data.len());
        for row in &outcome.data {
            let Some(value) = row.get(column) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let entity = serde_json::from_value(value.clone()).map_err(|e| {
                GraphError::invalid_input(format!("stored {column} row did not deserialize: {e}"))
            })?;
            entities.push(entity);
        }
        Ok(entities)
    }

    // --- typed reads ----------------------------------------------------

    pub async fn search_genes(&self, query: &GeneQuery) -> Result<Vec<Gene>, GraphError> {
        let stmt = statements::search_genes(self.dialect(), query);
        self.query_entities(stmt, "g").await
    }

    /// A gene with its variants, treatments and papers; the three relation
    /// queries run concurrently. `None` when the id is unknown.
    pub async fn gene_by_id(&self, id: &str) -> Result<Option<GeneDetail>, GraphError> {
        let genes: Vec<Gene> = self
            .query_entities(statements::gene_by_id(self.dialect(), id), "g")
            .await?;
        let Some(gene) = genes.into_iter().next() else {
            return Ok(None);
        };
        let (variants, treatments, papers) = tokio::try_join!(
            self.query_entities::<Variant>(statements::gene_variants(self.dialect(), id), "v"),
            self.query_entities::<Treatment>(statements::gene_treatments(self.dialect(), id), "t"),
            self.query_entities::<ResearchPaper>(statements::gene_papers(self.dialect(), id), "p"),
        )?;
        Ok(Some(GeneDetail {
            gene,
            variants,
            treatments,
            papers,
        }))
    }

    /// Trials connected to a variant's gene. Empty `variant_id` lifts the
    /// variant constraint; `region` matches trial locations or multicentric
    /// trials.
    pub async fn trials_for_variant(
        &self,
        variant_id: &str,
        region: Option<&str>,
    ) -> Result<Vec<ClinicalTrial>, GraphError> {
        let stmt = statements::trials_for_variant(self.dialect(), variant_id, region);
        self.query_entities(stmt, "c").await
    }

    pub async fn search_papers(&self, query: &PaperQuery) -> Result<Vec<ResearchPaper>, GraphError> {
        let stmt = statements::search_papers(self.dialect(), query);
        self.query_entities(stmt, "p").await
    }

    pub async fn search_trials(&self, query: &TrialQuery) -> Result<Vec<ClinicalTrial>, GraphError> {
        let stmt = statements::search_trials(self.dialect(), query);
        self.query_entities(stmt, "c").await
    }

    pub async fn count_nodes(
        &self,
        label: NodeLabel,
        filters: &BTreeMap<String, Value>,
    ) -> Result<u64, GraphError> {
        let stmt = statements::count_nodes(self.dialect(), label, filters)?;
        let outcome = self
            .execute_query(&stmt.text, &stmt.params, &QueryOptions::default())
            .await?;
        Ok(outcome
            .data
            .first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }

    // --- typed writes -----------------------------------------------------
    //
    // Every write goes through `apply_writes`, which ends by dropping the
    // whole query cache: cached statement text cannot be correlated with the
    // labels a write touched, so a full clear is the invariant.

    pub async fn upsert_gene(&self, gene: &Gene) -> Result<(), GraphError> {
        ensure_entity_id("gene", &gene.id)?;
        let stmt = statements::upsert_node(
            self.dialect(),
            NodeLabel::Gene,
            &gene.id,
            entity_props(gene)?,
        );
        self.apply_writes(vec![stmt]).await
    }

    /// Merge a variant node and its HAS_VARIANT edge from the owning gene.
    /// `frequency` and `clinical_impact` land on the edge.
    pub async fn upsert_variant(
        &self,
        gene_id: &str,
        variant: &Variant,
        frequency: Option<f64>,
        clinical_impact: Option<&str>,
    ) -> Result<(), GraphError> {
        ensure_entity_id("gene", gene_id)?;
        ensure_entity_id("variant", &variant.id)?;
        let dialect = self.dialect();
        let mut props = entity_props(variant)?;
        props["gene_id"] = json!(gene_id);

        let mut edge = Map::new();
        if let Some(frequency) = frequency {
            edge.insert("frequency".to_string(), json!(frequency));
        }
        if let Some(impact) = clinical_impact {
            edge.insert("clinical_impact".to_string(), json!(impact));
        }

        self.apply_writes(vec![
            statements::upsert_node_if_absent(
                dialect,
                NodeLabel::Gene,
                gene_id,
                stub_gene(gene_id, None),
            ),
            statements::upsert_node(dialect, NodeLabel::Variant, &variant.id, props),
            statements::upsert_edge(
                dialect,
                RelType::HasVariant,
                gene_id,
                &variant.id,
                Value::Object(edge),
            ),
        ])
        .await
    }

    /// Merge a trial node plus an INVESTIGATES edge per target gene symbol.
    /// Unknown symbols get stub gene nodes so the edges can attach.
    pub async fn upsert_trial(&self, trial: &ClinicalTrial) -> Result<(), GraphError> {
        ensure_entity_id("trial", &trial.id)?;
        let dialect = self.dialect();
        let mut stmts = vec![statements::upsert_node(
            dialect,
            NodeLabel::ClinicalTrial,
            &trial.id,
            entity_props(trial)?,
        )];
        for symbol in &trial.target_genes {
            push_gene_edge(&mut stmts, dialect, RelType::Investigates, &trial.id, symbol);
        }
        self.apply_writes(stmts).await
    }

    /// Merge a paper node plus a MENTIONS edge per mentioned gene symbol.
    pub async fn upsert_paper(
        &self,
        paper: &ResearchPaper,
        mentioned_genes: &[String],
    ) -> Result<(), GraphError> {
        ensure_entity_id("paper", &paper.id)?;
        let dialect = self.dialect();
        let mut stmts = vec![statements::upsert_node(
            dialect,
            NodeLabel::ResearchPaper,
            &paper.id,
            entity_props(paper)?,
        )];
        for symbol in mentioned_genes {
            push_gene_edge(&mut stmts, dialect, RelType::Mentions, &paper.id, symbol);
        }
        self.apply_writes(stmts).await
    }

    pub async fn upsert_treatment(
        &self,
        treatment: &Treatment,
        target_gene_id: &str,
    ) -> Result<(), GraphError> {
        ensure_entity_id("treatment", &treatment.id)?;
        ensure_entity_id("gene", target_gene_id)?;
        let dialect = self.dialect();
        self.apply_writes(vec![
            statements::upsert_node(
                dialect,
                NodeLabel::Treatment,
                &treatment.id,
                entity_props(treatment)?,
            ),
            statements::upsert_node_if_absent(
                dialect,
                NodeLabel::Gene,
                target_gene_id,
                stub_gene(target_gene_id, None),
            ),
            statements::upsert_edge(
                dialect,
                RelType::Targets,
                &treatment.id,
                target_gene_id,
                json!({}),
            ),
        ])
        .await
    }

    async fn apply_writes(&self, statements: Vec<Statement>) -> Result<(), GraphError> {
        self.ensure_ready()?;
        let dialect = self.dialect();
        let rendered: Vec<String> = statements.iter().map(|s| s.render(dialect)).collect();
        let result = match tokio::time::timeout(
            self.config.request_timeout(),
            self.backend.execute_batch(&rendered),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GraphError::timeout(
                "write batch",
                self.config.request_timeout_secs * 1000,
            )),
        };
        // Post-condition of every mutation, success or not: no cached read
        // survives a write attempt.
        self.cache.invalidate(None);
        result
    }

    // --- schema management ------------------------------------------------

    pub async fn create_index(&self, label: NodeLabel, property: &str) -> Result<(), GraphError> {
        self.create_index_inner(label, property, false).await
    }

    pub async fn create_unique_constraint(
        &self,
        label: NodeLabel,
        property: &str,
    ) -> Result<(), GraphError> {
        self.create_index_inner(label, property, true).await
    }

    async fn create_index_inner(
        &self,
        label: NodeLabel,
        property: &str,
        unique: bool,
    ) -> Result<(), GraphError> {
        self.ensure_ready()?;
        let name = statements::index_name(label, property, unique);
        if self.index_registry.lock().contains(&name) {
            debug!(index = %name, "index already registered");
            return Ok(());
        }
        let stmt = statements::create_index(self.dialect(), label, property, unique)?;
        let rendered = stmt.render(self.dialect());
        self.run_with_timeout(&rendered).await?;
        self.index_registry.lock().insert(name);
        Ok(())
    }

    pub async fn drop_index(&self, label: NodeLabel, property: &str) -> Result<(), GraphError> {
        self.ensure_ready()?;
        let stmt = statements::drop_index(self.dialect(), label, property, false)?;
        let rendered = stmt.render(self.dialect());
        self.run_with_timeout(&rendered).await?;
        self.index_registry
            .lock()
            .remove(&statements::index_name(label, property, false));
        Ok(())
    }

    /// Create the unique id constraints and the standard index set. Safe to
    /// call repeatedly; both the registry and the statements are idempotent.
    pub async fn initialize_schema(&self) -> Result<(), GraphError> {
        for label in NodeLabel::ALL {
            self.create_index_inner(label, "id", true).await?;
        }
        for spec in &STANDARD_INDEXES {
            self.create_index_inner(spec.label, spec.property, spec.unique)
                .await?;
        }
        info!("standard graph schema initialized");
        Ok(())
    }

    // --- bulk import --------------------------------------------------------

    /// Validate and ingest a gene bulk payload. All rows land in one atomic
    /// batch; imports serialize behind an in-process guard. The planner
    /// statistics refresh afterwards is best-effort.
    pub async fn import_gene_data(&self, bulk: &str) -> Result<ImportReport, GraphError> {
        self.ensure_ready()?;
        let _guard = self.import_lock.lock().await;
        let genes = parse_gene_bulk(bulk)?;
        let dialect = self.dialect();
        let mut stmts = Vec::with_capacity(genes.len());
        for gene in &genes {
            stmts.push(statements::upsert_node(
                dialect,
                NodeLabel::Gene,
                &gene.id,
                entity_props(gene)?,
            ));
        }
        self.apply_writes(stmts).await?;

        if let Some(stmt) = statements::refresh_statistics(dialect) {
            let rendered = stmt.render(dialect);
            if let Err(e) = self.run_with_timeout(&rendered).await {
                warn!(error = %e, "planner statistics refresh failed after import");
            }
        }
        info!(imported = genes.len(), "gene import complete");
        Ok(ImportReport {
            imported: genes.len(),
        })
    }
}

fn ensure_entity_id(kind: &str, id: &str) -> Result<(), GraphError> {
    if id.trim().is_empty() {
        Err(GraphError::single_violation(
            format!("{kind}.id"),
            "must not be empty",
        ))
    } else {
        Ok(())
    }
}

fn entity_props<T: serde::Serialize>(entity: &T) -> Result<Value, GraphError> {
    serde_json::to_value(entity)
        .map_err(|e| GraphError::invalid_input(format!("entity serialization failed: {e}")))
}

/// Placeholder gene node carrying the full required field shape, so reads
/// that hit it still deserialize. A later real upsert replaces it.
fn stub_gene(id: &str, symbol: Option<&str>) -> Value {
    let symbol = symbol.unwrap_or("");
    json!({
        "id": id,
        "symbol": symbol,
        "name": symbol,
        "description": "",
        "chromosome": "",
    })
}

fn push_gene_edge(
    stmts: &mut Vec<Statement>,
    dialect: Dialect,
    rel: RelType,
    from_id: &str,
    symbol: &str,
) {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return;
    }
    let gene_id = gene_id_from_symbol(symbol);
    stmts.push(statements::upsert_node_if_absent(
        dialect,
        NodeLabel::Gene,
        &gene_id,
        stub_gene(&gene_id, Some(symbol)),
    ));
    stmts.push(statements::upsert_edge(
        dialect,
        rel,
        from_id,
        &gene_id,
        json!({}),
    ));
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    let mut out: String = text.chars().take(MAX).collect();
    if text.chars().nth(MAX).is_some() {
        out.push_str("...");
    }
    out
}
