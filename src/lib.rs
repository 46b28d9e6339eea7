//! Typed access layer for a biomedical knowledge graph.
//! One adapter contract, two interchangeable backends: an embedded SQLite
//! store and a client-server graph database spoken to over HTTP.

pub mod adapter;
pub mod backend;
pub mod cache;
pub mod coerce;
pub mod concurrency;
pub mod config;
pub mod errors;
pub mod import;
pub mod schema;
pub mod service;
pub mod statements;
pub mod value;

pub use crate::adapter::{AdapterState, GraphAdapter, QueryMetadata, QueryOptions, QueryOutcome};
pub use crate::backend::{GraphBackend, open_backend};
pub use crate::cache::{CacheStats, QueryCache};
pub use crate::concurrency::{QueryPermit, QueryPool};
pub use crate::config::{BackendKind, EmbeddedConfig, GraphConfig, HttpConfig};
pub use crate::errors::{FieldViolation, GraphError};
pub use crate::import::ImportReport;
pub use crate::schema::entities::{
    ClinicalSignificance, ClinicalTrial, Gene, GeneDetail, ResearchPaper, Treatment, TrialPhase,
    TrialStatus, Variant,
};
pub use crate::schema::queries::{GeneQuery, PaperQuery, Pagination, TrialQuery};
pub use crate::schema::{IndexSpec, NodeLabel, RelType, STANDARD_INDEXES};
pub use crate::service::{BioGraphService, CrossSearch, DEFAULT_TRIAL_REGION};
pub use crate::statements::{Dialect, Statement};
pub use crate::value::{BackendValue, NodeValue, PathValue, RelationshipValue, ResultSet};
