use chrono::NaiveDate;
use serde_json::json;

use biograph::{
    ClinicalSignificance, ClinicalTrial, ResearchPaper, TrialPhase, TrialStatus, Variant,
};

#[test]
fn test_clinical_significance_normalizes_free_text() {
    assert_eq!(
        ClinicalSignificance::normalize("Likely Pathogenic"),
        ClinicalSignificance::LikelyPathogenic
    );
    assert_eq!(
        ClinicalSignificance::normalize("  likely-benign "),
        ClinicalSignificance::LikelyBenign
    );
    assert_eq!(
        ClinicalSignificance::normalize("VUS"),
        ClinicalSignificance::UncertainSignificance
    );
    assert_eq!(
        ClinicalSignificance::normalize("uncertain"),
        ClinicalSignificance::UncertainSignificance
    );
    assert_eq!(
        ClinicalSignificance::normalize(""),
        ClinicalSignificance::Unknown
    );
    assert_eq!(
        ClinicalSignificance::normalize("conflicting interpretations"),
        ClinicalSignificance::Unknown
    );
}

#[test]
fn test_strict_parse_accepts_canonical_names_only() {
    assert_eq!(
        ClinicalSignificance::parse_strict("pathogenic"),
        Some(ClinicalSignificance::Pathogenic)
    );
    assert_eq!(ClinicalSignificance::parse_strict("Pathogenic"), None);
    assert_eq!(ClinicalSignificance::parse_strict("vus"), None);

    assert_eq!(
        TrialStatus::parse_strict("recruiting"),
        Some(TrialStatus::Recruiting)
    );
    assert_eq!(TrialStatus::parse_strict("Recruiting"), None);

    assert_eq!(TrialPhase::parse_strict("II"), Some(TrialPhase::II));
    assert_eq!(TrialPhase::parse_strict("2"), None);
}

#[test]
fn test_variant_ingestion_accepts_free_text_significance() {
    let variant: Variant = serde_json::from_value(json!({
        "id": "var-1",
        "notation": "c.20A>T",
        "clinical_significance": "Likely Pathogenic"
    }))
    .expect("variant");
    assert_eq!(
        variant.clinical_significance,
        ClinicalSignificance::LikelyPathogenic
    );

    let sentinel: Variant = serde_json::from_value(json!({
        "id": "var-2",
        "notation": "c.9C>G",
        "clinical_significance": "reported by submitter"
    }))
    .expect("variant");
    assert_eq!(
        sentinel.clinical_significance,
        ClinicalSignificance::Unknown
    );
}

#[test]
fn test_trial_status_and_phase_normalization() {
    assert_eq!(
        TrialStatus::normalize("Active, not recruiting"),
        TrialStatus::Active
    );
    assert_eq!(TrialStatus::normalize("COMPLETED"), TrialStatus::Completed);
    assert_eq!(TrialStatus::normalize("withdrawn"), TrialStatus::Unknown);

    assert_eq!(TrialPhase::normalize("Phase 2"), TrialPhase::II);
    assert_eq!(TrialPhase::normalize("phase iii"), TrialPhase::III);
    assert_eq!(TrialPhase::normalize("4"), TrialPhase::IV);
    assert_eq!(TrialPhase::normalize("early feasibility"), TrialPhase::Na);
}

#[test]
fn test_trial_round_trips_with_iso_dates() {
    let trial = ClinicalTrial {
        id: "nct-1".to_string(),
        name: "Sickle cell gene therapy".to_string(),
        status: TrialStatus::Recruiting,
        phase: TrialPhase::III,
        start_date: NaiveDate::from_ymd_opt(2024, 6, 1).expect("date"),
        end_date: Some(NaiveDate::from_ymd_opt(2026, 6, 1).expect("date")),
        locations: vec!["Accra, Ghana".to_string()],
        target_genes: vec!["HBB".to_string()],
        multicentric: false,
    };
    let value = serde_json::to_value(&trial).expect("serialize");
    assert_eq!(value["status"], json!("recruiting"));
    assert_eq!(value["phase"], json!("III"));
    assert_eq!(value["start_date"], json!("2024-06-01"));

    let back: ClinicalTrial = serde_json::from_value(value).expect("deserialize");
    assert_eq!(back, trial);
}

#[test]
fn test_paper_abstract_maps_to_reserved_field_name() {
    let paper: ResearchPaper = serde_json::from_value(json!({
        "id": "pmid-1",
        "title": "HBB editing",
        "journal": "Blood",
        "publication_date": "2023-11-02",
        "abstract": "Outcomes in hemoglobinopathies."
    }))
    .expect("paper");
    assert_eq!(
        paper.abstract_text.as_deref(),
        Some("Outcomes in hemoglobinopathies.")
    );

    let value = serde_json::to_value(&paper).expect("serialize");
    assert!(value.get("abstract").is_some());
    assert!(value.get("abstract_text").is_none());
}
