//! Domain entities stored as graph nodes. Enumerated fields deserialize
//! through a single normalization path so free-text backend values can never
//! leak into an enum-typed field.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Clinical significance of a variant. `Unknown` is the sentinel for any
/// value the normalizer does not recognize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalSignificance {
    Pathogenic,
    LikelyPathogenic,
    UncertainSignificance,
    LikelyBenign,
    Benign,
    Unknown,
}

impl ClinicalSignificance {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClinicalSignificance::Pathogenic => "pathogenic",
            ClinicalSignificance::LikelyPathogenic => "likely_pathogenic",
            ClinicalSignificance::UncertainSignificance => "uncertain_significance",
            ClinicalSignificance::LikelyBenign => "likely_benign",
            ClinicalSignificance::Benign => "benign",
            ClinicalSignificance::Unknown => "unknown",
        }
    }

    /// Map free text from an ingestion boundary onto the enumeration. This
    /// is the only place that interprets non-canonical significance strings.
    pub fn normalize(raw: &str) -> ClinicalSignificance {
        let folded: String = raw
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        match folded.as_str() {
            "pathogenic" => ClinicalSignificance::Pathogenic,
            "likely_pathogenic" => ClinicalSignificance::LikelyPathogenic,
            "uncertain_significance" | "uncertain" | "vus" => {
                ClinicalSignificance::UncertainSignificance
            }
            "likely_benign" => ClinicalSignificance::LikelyBenign,
            "benign" => ClinicalSignificance::Benign,
            "unknown" | "" => ClinicalSignificance::Unknown,
            other => {
                warn!(raw = other, "unrecognized clinical significance, storing sentinel");
                ClinicalSignificance::Unknown
            }
        }
    }

    /// Exact-match parse for query filters: canonical names only. Filters
    /// are strict where ingestion is lenient.
    pub fn parse_strict(raw: &str) -> Option<ClinicalSignificance> {
        [
            ClinicalSignificance::Pathogenic,
            ClinicalSignificance::LikelyPathogenic,
            ClinicalSignificance::UncertainSignificance,
            ClinicalSignificance::LikelyBenign,
            ClinicalSignificance::Benign,
            ClinicalSignificance::Unknown,
        ]
        .into_iter()
        .find(|s| s.as_str() == raw)
    }
}

impl<'de> Deserialize<'de> for ClinicalSignificance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ClinicalSignificance::normalize(&raw))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    Recruiting,
    Active,
    Completed,
    Unknown,
}

impl TrialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrialStatus::Recruiting => "recruiting",
            TrialStatus::Active => "active",
            TrialStatus::Completed => "completed",
            TrialStatus::Unknown => "unknown",
        }
    }

    pub fn normalize(raw: &str) -> TrialStatus {
        match raw.trim().to_ascii_lowercase().as_str() {
            "recruiting" => TrialStatus::Recruiting,
            "active" | "active, not recruiting" => TrialStatus::Active,
            "completed" => TrialStatus::Completed,
            _ => TrialStatus::Unknown,
        }
    }

    pub fn parse_strict(raw: &str) -> Option<TrialStatus> {
        [
            TrialStatus::Recruiting,
            TrialStatus::Active,
            TrialStatus::Completed,
            TrialStatus::Unknown,
        ]
        .into_iter()
        .find(|s| s.as_str() == raw)
    }
}

impl<'de> Deserialize<'de> for TrialStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TrialStatus::normalize(&raw))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TrialPhase {
    I,
    II,
    III,
    IV,
    #[serde(rename = "NA")]
    Na,
}

impl TrialPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrialPhase::I => "I",
            TrialPhase::II => "II",
            TrialPhase::III => "III",
            TrialPhase::IV => "IV",
            TrialPhase::Na => "NA",
        }
    }

    pub fn normalize(raw: &str) -> TrialPhase {
        let folded = raw.trim().to_ascii_uppercase();
        let folded = folded.strip_prefix("PHASE").map_or(folded.as_str(), str::trim_start);
        match folded {
            "I" | "1" => TrialPhase::I,
            "II" | "2" => TrialPhase::II,
            "III" | "3" => TrialPhase::III,
            "IV" | "4" => TrialPhase::IV,
            _ => TrialPhase::Na,
        }
    }

    pub fn parse_strict(raw: &str) -> Option<TrialPhase> {
        [
            TrialPhase::I,
            TrialPhase::II,
            TrialPhase::III,
            TrialPhase::IV,
            TrialPhase::Na,
        ]
        .into_iter()
        .find(|p| p.as_str() == raw)
    }
}

impl<'de> Deserialize<'de> for TrialPhase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TrialPhase::normalize(&raw))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub chromosome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xref_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: String,
    /// HGVS-style notation.
    pub notation: String,
    pub clinical_significance: ClinicalSignificance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_frequency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_type: Option<String>,
    /// Owning gene id, maintained by the HAS_VARIANT upsert.
    #[serde(default)]
    pub gene_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClinicalTrial {
    pub id: String,
    pub name: String,
    pub status: TrialStatus,
    pub phase: TrialPhase,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub target_genes: Vec<String>,
    #[serde(default)]
    pub multicentric: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResearchPaper {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    pub journal: String,
    pub publication_date: NaiveDate,
    #[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modality: Option<String>,
}

/// A gene together with its relations, as returned by `gene_by_id`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GeneDetail {
    #[serde(flatten)]
    pub gene: Gene,
    pub variants: Vec<Variant>,
    pub treatments: Vec<Treatment>,
    pub papers: Vec<ResearchPaper>,
}
