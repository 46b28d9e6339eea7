use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;

use biograph::schema::gene_id_from_symbol;
use biograph::{
    AdapterState, ClinicalSignificance, ClinicalTrial, Gene, GraphAdapter, GraphConfig,
    GraphError, NodeLabel, QueryOptions, ResearchPaper, Treatment, TrialPhase, TrialStatus,
    Variant,
};

fn sample_gene(symbol: &str, chromosome: &str) -> Gene {
    Gene {
        id: gene_id_from_symbol(symbol),
        symbol: symbol.to_string(),
        name: format!("{symbol} gene"),
        description: format!("{symbol} encodes a protein"),
        chromosome: chromosome.to_string(),
        xref_id: None,
        location: None,
    }
}

fn sample_variant(id: &str, notation: &str) -> Variant {
    Variant {
        id: id.to_string(),
        notation: notation.to_string(),
        clinical_significance: ClinicalSignificance::Pathogenic,
        population_frequency: Some(0.004),
        variant_type: Some("SNV".to_string()),
        gene_id: String::new(),
    }
}

fn sample_trial(id: &str, locations: &[&str], multicentric: bool, genes: &[&str]) -> ClinicalTrial {
    ClinicalTrial {
        id: id.to_string(),
        name: format!("Trial {id}"),
        status: TrialStatus::Recruiting,
        phase: TrialPhase::II,
        start_date: NaiveDate::from_ymd_opt(2024, 3, 1).expect("date"),
        end_date: None,
        locations: locations.iter().map(|l| l.to_string()).collect(),
        target_genes: genes.iter().map(|g| g.to_string()).collect(),
        multicentric,
    }
}

fn sample_paper(id: &str, title: &str) -> ResearchPaper {
    ResearchPaper {
        id: id.to_string(),
        title: title.to_string(),
        authors: vec!["Okafor A".to_string()],
        journal: "Blood".to_string(),
        publication_date: NaiveDate::from_ymd_opt(2023, 11, 2).expect("date"),
        abstract_text: Some("Gene therapy outcomes.".to_string()),
        pmid: None,
        doi: None,
        keywords: vec!["gene therapy".to_string()],
    }
}

async fn ready_adapter() -> GraphAdapter {
    let adapter = GraphAdapter::new(GraphConfig::embedded()).expect("adapter");
    adapter.initialize().await.expect("initialize");
    adapter
}

fn count_statement() -> (String, BTreeMap<String, serde_json::Value>) {
    let mut params = BTreeMap::new();
    params.insert("label".to_string(), json!("Gene"));
    (
        "SELECT COUNT(*) AS count FROM graph_nodes WHERE label = $label".to_string(),
        params,
    )
}

#[tokio::test]
async fn test_initialize_transitions_to_ready_and_is_idempotent() {
    let adapter = GraphAdapter::new(GraphConfig::embedded()).expect("adapter");
    assert_eq!(adapter.state(), AdapterState::Uninitialized);
    adapter.initialize().await.expect("first initialize");
    assert_eq!(adapter.state(), AdapterState::Ready);
    adapter.initialize().await.expect("second initialize");
    assert_eq!(adapter.state(), AdapterState::Ready);
}

#[tokio::test]
async fn test_query_before_initialize_is_rejected() {
    let adapter = GraphAdapter::new(GraphConfig::embedded()).expect("adapter");
    let err = adapter
        .execute_query("SELECT 1", &BTreeMap::new(), &QueryOptions::default())
        .await
        .expect_err("must reject");
    match err {
        GraphError::NotInitialized(_) => {}
        other => panic!("expected NotInitialized, got {other:?}"),
    }
}

#[tokio::test]
async fn test_close_is_terminal() {
    let adapter = ready_adapter().await;
    adapter.close().await.expect("close");
    adapter.close().await.expect("repeat close is a no-op");
    assert_eq!(adapter.state(), AdapterState::Closed);

    let err = adapter
        .execute_query("SELECT 1", &BTreeMap::new(), &QueryOptions::default())
        .await
        .expect_err("closed adapter must reject queries");
    match err {
        GraphError::NotInitialized(_) => {}
        other => panic!("expected NotInitialized, got {other:?}"),
    }

    let err = adapter
        .initialize()
        .await
        .expect_err("closed adapter must not reopen");
    match err {
        GraphError::NotInitialized(_) => {}
        other => panic!("expected NotInitialized, got {other:?}"),
    }
}

#[tokio::test]
async fn test_upsert_gene_twice_keeps_one_node() {
    let adapter = ready_adapter().await;
    let gene = sample_gene("HBB", "11");
    adapter.upsert_gene(&gene).await.expect("first upsert");
    adapter.upsert_gene(&gene).await.expect("second upsert");
    let count = adapter
        .count_nodes(NodeLabel::Gene, &BTreeMap::new())
        .await
        .expect("count");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_upsert_rejects_empty_id() {
    let adapter = ready_adapter().await;
    let mut gene = sample_gene("HBB", "11");
    gene.id = "  ".to_string();
    let err = adapter.upsert_gene(&gene).await.expect_err("must reject");
    assert_eq!(err.violations().len(), 1);
    assert_eq!(err.violations()[0].field, "gene.id");
}

#[tokio::test]
async fn test_search_genes_finds_exact_symbol() {
    let adapter = ready_adapter().await;
    adapter
        .upsert_gene(&sample_gene("HBB", "11"))
        .await
        .expect("seed HBB");
    adapter
        .upsert_gene(&sample_gene("TP53", "17"))
        .await
        .expect("seed TP53");

    let query = biograph::GeneQuery {
        symbol: Some("HBB".to_string()),
        ..biograph::GeneQuery::default()
    };
    let genes = adapter.search_genes(&query).await.expect("search");
    assert_eq!(genes.len(), 1);
    assert_eq!(genes[0].symbol, "HBB");
    assert_eq!(genes[0].chromosome, "11");
}

#[tokio::test]
async fn test_injection_strings_never_widen_results() {
    let adapter = ready_adapter().await;
    adapter
        .upsert_gene(&sample_gene("HBB", "11"))
        .await
        .expect("seed HBB");
    adapter
        .upsert_gene(&sample_gene("TP53", "17"))
        .await
        .expect("seed TP53");

    for planted in [
        "x\" OR \"1\"=\"1",
        "x' OR '1'='1",
        "'; DROP TABLE graph_nodes; --",
        "%",
        "_",
    ] {
        let query = biograph::GeneQuery {
            keyword: Some(planted.to_string()),
            ..biograph::GeneQuery::default()
        };
        let genes = adapter.search_genes(&query).await.expect("search");
        assert!(genes.is_empty(), "planted {planted:?} matched {genes:?}");
    }

    let count = adapter
        .count_nodes(NodeLabel::Gene, &BTreeMap::new())
        .await
        .expect("store intact");
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_cached_read_then_write_then_read_is_coherent() {
    let adapter = ready_adapter().await;
    adapter
        .upsert_gene(&sample_gene("HBB", "11"))
        .await
        .expect("seed");

    let (text, params) = count_statement();
    let cached = QueryOptions {
        use_cache: true,
        ..QueryOptions::default()
    };

    let first = adapter
        .execute_query(&text, &params, &cached)
        .await
        .expect("first read");
    assert!(!first.metadata.cached);
    assert_eq!(first.data[0]["count"], json!(1));

    let second = adapter
        .execute_query(&text, &params, &cached)
        .await
        .expect("second read");
    assert!(second.metadata.cached);
    assert_eq!(second.data, first.data);

    adapter
        .upsert_gene(&sample_gene("TP53", "17"))
        .await
        .expect("write");

    let third = adapter
        .execute_query(&text, &params, &cached)
        .await
        .expect("read after write");
    assert!(!third.metadata.cached, "write must drop cached reads");
    assert_eq!(third.data[0]["count"], json!(2));
}

#[tokio::test]
async fn test_cache_entry_expires_after_ttl() {
    let adapter = ready_adapter().await;
    let (text, params) = count_statement();
    let options = QueryOptions {
        use_cache: true,
        cache_ttl: Some(Duration::from_millis(20)),
        ..QueryOptions::default()
    };

    let first = adapter
        .execute_query(&text, &params, &options)
        .await
        .expect("first");
    assert!(!first.metadata.cached);

    tokio::time::sleep(Duration::from_millis(40)).await;
    let second = adapter
        .execute_query(&text, &params, &options)
        .await
        .expect("after expiry");
    assert!(!second.metadata.cached);
}

#[tokio::test]
async fn test_gene_detail_joins_variants_treatments_and_papers() {
    let adapter = ready_adapter().await;
    let gene = sample_gene("HBB", "11");
    adapter.upsert_gene(&gene).await.expect("gene");
    adapter
        .upsert_variant(
            &gene.id,
            &sample_variant("var-hbb-1", "c.20A>T"),
            Some(0.04),
            Some("severe"),
        )
        .await
        .expect("variant");
    adapter
        .upsert_treatment(
            &Treatment {
                id: "rx-1".to_string(),
                name: "Hydroxyurea".to_string(),
                modality: Some("small molecule".to_string()),
            },
            &gene.id,
        )
        .await
        .expect("treatment");
    adapter
        .upsert_paper(
            &sample_paper("pmid-1", "HBB gene therapy"),
            &["HBB".to_string()],
        )
        .await
        .expect("paper");

    let detail = adapter
        .gene_by_id(&gene.id)
        .await
        .expect("lookup")
        .expect("gene exists");
    assert_eq!(detail.gene.symbol, "HBB");
    assert_eq!(detail.variants.len(), 1);
    assert_eq!(detail.variants[0].notation, "c.20A>T");
    assert_eq!(
        detail.variants[0].clinical_significance,
        ClinicalSignificance::Pathogenic
    );
    assert_eq!(detail.treatments.len(), 1);
    assert_eq!(detail.treatments[0].name, "Hydroxyurea");
    assert_eq!(detail.papers.len(), 1);
    assert_eq!(detail.papers[0].title, "HBB gene therapy");
}

#[tokio::test]
async fn test_gene_by_id_unknown_is_none() {
    let adapter = ready_adapter().await;
    let detail = adapter.gene_by_id("nonexistent-id").await.expect("lookup");
    assert!(detail.is_none());
}

#[tokio::test]
async fn test_trials_for_variant_filters_by_region_or_multicentric() {
    let adapter = ready_adapter().await;
    let gene = sample_gene("HBB", "11");
    adapter.upsert_gene(&gene).await.expect("gene");
    adapter
        .upsert_variant(&gene.id, &sample_variant("var-1", "c.20A>T"), None, None)
        .await
        .expect("variant");
    adapter
        .upsert_trial(&sample_trial(
            "nct-1",
            &["Nairobi, Kenya"],
            false,
            &["HBB"],
        ))
        .await
        .expect("regional trial");
    adapter
        .upsert_trial(&sample_trial("nct-2", &["London, UK"], true, &["HBB"]))
        .await
        .expect("multicentric trial");
    adapter
        .upsert_trial(&sample_trial("nct-3", &["Berlin, Germany"], false, &["HBB"]))
        .await
        .expect("out-of-region trial");

    let trials = adapter
        .trials_for_variant("var-1", Some("Kenya"))
        .await
        .expect("trials");
    let ids: Vec<&str> = trials.iter().map(|t| t.id.as_str()).collect();
    assert!(ids.contains(&"nct-1"), "regional trial missing: {ids:?}");
    assert!(ids.contains(&"nct-2"), "multicentric trial missing: {ids:?}");
    assert!(!ids.contains(&"nct-3"), "out-of-region trial leaked: {ids:?}");

    // Empty variant id widens to every trial matching the region rule.
    let all = adapter
        .trials_for_variant("", Some("Kenya"))
        .await
        .expect("unconstrained");
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_count_nodes_with_property_filter() {
    let adapter = ready_adapter().await;
    adapter
        .upsert_gene(&sample_gene("HBB", "11"))
        .await
        .expect("seed");
    adapter
        .upsert_gene(&sample_gene("TP53", "17"))
        .await
        .expect("seed");

    let mut filters = BTreeMap::new();
    filters.insert("chromosome".to_string(), json!("11"));
    let count = adapter
        .count_nodes(NodeLabel::Gene, &filters)
        .await
        .expect("count");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_count_nodes_rejects_bad_filter_key() {
    let adapter = ready_adapter().await;
    let mut filters = BTreeMap::new();
    filters.insert("chromosome') OR ('1'='1".to_string(), json!("11"));
    let err = adapter
        .count_nodes(NodeLabel::Gene, &filters)
        .await
        .expect_err("must reject");
    match err {
        GraphError::Validation(_) => {}
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[tokio::test]
async fn test_initialize_schema_is_idempotent_and_creates_indexes() {
    let adapter = ready_adapter().await;
    adapter.initialize_schema().await.expect("first pass");
    adapter.initialize_schema().await.expect("second pass");

    let mut params = BTreeMap::new();
    params.insert("name".to_string(), json!("uniq_gene_symbol"));
    let outcome = adapter
        .execute_query(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND name = $name",
            &params,
            &QueryOptions::default(),
        )
        .await
        .expect("inspect indexes");
    assert_eq!(outcome.metadata.result_count, 1);
}

#[tokio::test]
async fn test_import_gene_data_upserts_rows() {
    let adapter = ready_adapter().await;
    let bulk = "symbol,name,chromosome,description\n\
                HBB,hemoglobin subunit beta,11,beta globin chain\n\
                TP53,tumor protein p53,17,genome guardian\n";
    let report = adapter.import_gene_data(bulk).await.expect("import");
    assert_eq!(report.imported, 2);

    let count = adapter
        .count_nodes(NodeLabel::Gene, &BTreeMap::new())
        .await
        .expect("count");
    assert_eq!(count, 2);

    // Re-importing the same payload merges onto the same nodes.
    adapter.import_gene_data(bulk).await.expect("re-import");
    let count = adapter
        .count_nodes(NodeLabel::Gene, &BTreeMap::new())
        .await
        .expect("count after re-import");
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_import_missing_required_column_writes_nothing() {
    let adapter = ready_adapter().await;
    let bulk = "symbol,name\nHBB,hemoglobin subunit beta\n";
    let err = adapter
        .import_gene_data(bulk)
        .await
        .expect_err("must reject");
    let fields: Vec<&str> = err.violations().iter().map(|v| v.field.as_str()).collect();
    assert_eq!(fields, vec!["chromosome"]);

    let count = adapter
        .count_nodes(NodeLabel::Gene, &BTreeMap::new())
        .await
        .expect("count");
    assert_eq!(count, 0, "no partial write may survive a rejected import");
}

#[tokio::test]
async fn test_explain_runs_without_touching_cache() {
    let adapter = ready_adapter().await;
    let (text, params) = count_statement();
    let options = QueryOptions {
        use_cache: true,
        explain: true,
        ..QueryOptions::default()
    };
    let outcome = adapter
        .execute_query(&text, &params, &options)
        .await
        .expect("explain");
    assert!(outcome.metadata.result_count >= 1, "plan rows expected");
    assert_eq!(adapter.cache_stats().entries, 0);
}

#[tokio::test]
async fn test_file_backed_store_persists_across_adapters() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("biograph.db");

    let adapter = GraphAdapter::new(GraphConfig::embedded_at(&path)).expect("adapter");
    adapter.initialize().await.expect("initialize");
    adapter
        .upsert_gene(&sample_gene("HBB", "11"))
        .await
        .expect("seed");
    adapter.close().await.expect("close");

    let reopened = GraphAdapter::new(GraphConfig::embedded_at(&path)).expect("reopen");
    reopened.initialize().await.expect("initialize again");
    let count = reopened
        .count_nodes(NodeLabel::Gene, &BTreeMap::new())
        .await
        .expect("count");
    assert_eq!(count, 1);
}
