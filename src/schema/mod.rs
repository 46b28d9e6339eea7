//! Domain schema: node labels, relationship types, required import columns,
//! and the standard index set installed by `initialize_schema`.

pub mod entities;
pub mod queries;

use std::fmt;

pub use entities::{
    ClinicalSignificance, ClinicalTrial, Gene, GeneDetail, ResearchPaper, Treatment, TrialPhase,
    TrialStatus, Variant,
};
pub use queries::{GeneQuery, Pagination, PaperQuery, TrialQuery};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeLabel {
    Gene,
    Variant,
    ClinicalTrial,
    ResearchPaper,
    Treatment,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 5] = [
        NodeLabel::Gene,
        NodeLabel::Variant,
        NodeLabel::ClinicalTrial,
        NodeLabel::ResearchPaper,
        NodeLabel::Treatment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Gene => "Gene",
            NodeLabel::Variant => "Variant",
            NodeLabel::ClinicalTrial => "ClinicalTrial",
            NodeLabel::ResearchPaper => "ResearchPaper",
            NodeLabel::Treatment => "Treatment",
        }
    }

    pub fn parse(raw: &str) -> Option<NodeLabel> {
        NodeLabel::ALL.iter().copied().find(|l| l.as_str() == raw)
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RelType {
    /// Gene -> Variant, carries `frequency` and `clinical_impact`.
    HasVariant,
    /// Treatment -> Gene.
    Targets,
    /// ResearchPaper -> Gene.
    Mentions,
    /// ClinicalTrial -> Gene.
    Investigates,
}

impl RelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelType::HasVariant => "HAS_VARIANT",
            RelType::Targets => "TARGETS",
            RelType::Mentions => "MENTIONS",
            RelType::Investigates => "INVESTIGATES",
        }
    }
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical gene node id for a symbol. Imports and symbol-keyed edge
/// merges both derive ids this way, so re-ingesting a record lands on the
/// same node.
pub fn gene_id_from_symbol(symbol: &str) -> String {
    format!("gene:{}", symbol.trim().to_ascii_lowercase())
}

/// Columns a gene bulk import must provide. Missing ones are reported
/// together, before any write happens.
pub const REQUIRED_GENE_COLUMNS: [&str; 3] = ["symbol", "name", "chromosome"];

/// Columns a gene bulk import may provide.
pub const OPTIONAL_GENE_COLUMNS: [&str; 3] = ["description", "xref_id", "location"];

/// One secondary index over a node property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexSpec {
    pub label: NodeLabel,
    pub property: &'static str,
    pub unique: bool,
}

/// The index set every deployment gets. Entity `id` uniqueness is handled
/// separately per label by `initialize_schema`.
pub const STANDARD_INDEXES: [IndexSpec; 8] = [
    IndexSpec {
        label: NodeLabel::Gene,
        property: "symbol",
        unique: true,
    },
    IndexSpec {
        label: NodeLabel::Gene,
        property: "chromosome",
        unique: false,
    },
    IndexSpec {
        label: NodeLabel::Variant,
        property: "notation",
        unique: true,
    },
    IndexSpec {
        label: NodeLabel::Variant,
        property: "clinical_significance",
        unique: false,
    },
    IndexSpec {
        label: NodeLabel::ClinicalTrial,
        property: "status",
        unique: false,
    },
    IndexSpec {
        label: NodeLabel::ClinicalTrial,
        property: "phase",
        unique: false,
    },
    IndexSpec {
        label: NodeLabel::ResearchPaper,
        property: "journal",
        unique: false,
    },
    IndexSpec {
        label: NodeLabel::ResearchPaper,
        property: "publication_date",
        unique: false,
    },
];
