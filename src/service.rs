//! Domain facade over a shared [`GraphAdapter`]. Methods speak in entities
//! and plain arguments; statement text never crosses this boundary.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::adapter::GraphAdapter;
use crate::concurrency::QueryPool;
use crate::errors::GraphError;
use crate::import::ImportReport;
use crate::schema::NodeLabel;
use crate::schema::entities::{ClinicalTrial, Gene, GeneDetail, ResearchPaper};
use crate::schema::queries::{GeneQuery, PaperQuery, TrialQuery};

/// Region filter applied when a trial lookup does not name one.
pub const DEFAULT_TRIAL_REGION: &str = "Africa";

/// Result of a cross-entity search: one term matched against genes, papers
/// and trials.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CrossSearch {
    pub genes: Vec<Gene>,
    pub papers: Vec<ResearchPaper>,
    pub trials: Vec<ClinicalTrial>,
}

#[derive(Clone)]
pub struct BioGraphService {
    adapter: Arc<GraphAdapter>,
    pool: QueryPool,
}

impl BioGraphService {
    pub fn new(adapter: Arc<GraphAdapter>) -> BioGraphService {
        let pool = QueryPool::new(adapter.config().max_concurrent_queries);
        BioGraphService { adapter, pool }
    }

    pub fn adapter(&self) -> &Arc<GraphAdapter> {
        &self.adapter
    }

    /// Genes whose symbol, name or description contains `text`.
    pub async fn search_genes(&self, text: &str, limit: u32) -> Result<Vec<Gene>, GraphError> {
        let query = GeneQuery {
            keyword: some_trimmed(text),
            limit,
            ..GeneQuery::default()
        };
        self.adapter.search_genes(&query).await
    }

    pub async fn get_gene(&self, id: &str) -> Result<Option<GeneDetail>, GraphError> {
        self.adapter.gene_by_id(id.trim()).await
    }

    /// Trials reachable from a variant, filtered to a region (or to
    /// multicentric trials). An empty `variant_id` searches all trials;
    /// a missing region falls back to [`DEFAULT_TRIAL_REGION`].
    pub async fn find_trials_for_variant(
        &self,
        variant_id: &str,
        region: Option<&str>,
    ) -> Result<Vec<ClinicalTrial>, GraphError> {
        let region = region
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_TRIAL_REGION);
        self.adapter
            .trials_for_variant(variant_id.trim(), Some(region))
            .await
    }

    /// Papers whose title, abstract or keywords contain `text`.
    pub async fn search_papers(
        &self,
        text: &str,
        limit: u32,
    ) -> Result<Vec<ResearchPaper>, GraphError> {
        let query = PaperQuery {
            keyword: some_trimmed(text),
            limit,
            ..PaperQuery::default()
        };
        self.adapter.search_papers(&query).await
    }

    pub async fn search_genes_advanced(&self, query: &GeneQuery) -> Result<Vec<Gene>, GraphError> {
        self.adapter.search_genes(query).await
    }

    pub async fn search_papers_advanced(
        &self,
        query: &PaperQuery,
    ) -> Result<Vec<ResearchPaper>, GraphError> {
        self.adapter.search_papers(query).await
    }

    pub async fn search_trials_advanced(
        &self,
        query: &TrialQuery,
    ) -> Result<Vec<ClinicalTrial>, GraphError> {
        self.adapter.search_trials(query).await
    }

    pub async fn get_entity_count(
        &self,
        label: NodeLabel,
        filters: &BTreeMap<String, Value>,
    ) -> Result<u64, GraphError> {
        self.adapter.count_nodes(label, filters).await
    }

    pub async fn import_gene_data(&self, bulk: &str) -> Result<ImportReport, GraphError> {
        self.adapter.import_gene_data(bulk).await
    }

    /// One term fanned out over genes, papers and trials; the trial leg
    /// reads the term as a gene symbol. The legs run concurrently, each
    /// holding a pool permit, and the first error wins.
    pub async fn search_all(&self, text: &str, limit: u32) -> Result<CrossSearch, GraphError> {
        let genes = async {
            let _permit = self.pool.acquire().await?;
            self.search_genes(text, limit).await
        };
        let papers = async {
            let _permit = self.pool.acquire().await?;
            self.search_papers(text, limit).await
        };
        let trials = async {
            let _permit = self.pool.acquire().await?;
            let query = TrialQuery {
                gene_symbol: some_trimmed(text),
                limit,
                ..TrialQuery::default()
            };
            self.adapter.search_trials(&query).await
        };
        let (genes, papers, trials) = futures::future::try_join3(genes, papers, trials).await?;
        debug!(
            genes = genes.len(),
            papers = papers.len(),
            trials = trials.len(),
            "cross-entity search complete"
        );
        Ok(CrossSearch {
            genes,
            papers,
            trials,
        })
    }
}

fn some_trimmed(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
