//! Backend contract and variant selection. Two stores speak the same
//! interface: an embedded SQLite-backed graph and a client-server engine
//! reached over HTTP. Everything above this module is dialect-aware but
//! transport-agnostic.

pub mod embedded;
pub mod http;

use async_trait::async_trait;

use crate::config::{BackendKind, GraphConfig};
use crate::errors::GraphError;
use crate::statements::Dialect;
use crate::value::ResultSet;

pub use embedded::EmbeddedBackend;
pub use http::HttpBackend;

/// One backend session. A session is owned by exactly one adapter; it is
/// never shared between adapters.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    /// Query language this backend executes.
    fn dialect(&self) -> Dialect;

    /// Short identifier used in result metadata and logs.
    fn source(&self) -> &'static str;

    /// Verify the store is reachable and ready for statements.
    async fn connect(&self) -> Result<(), GraphError>;

    /// Run one rendered statement.
    async fn execute(&self, statement: &str) -> Result<ResultSet, GraphError>;

    /// Run several rendered statements as one atomic unit: either all apply
    /// or none do.
    async fn execute_batch(&self, statements: &[String]) -> Result<(), GraphError>;

    /// Release the session. Safe to call more than once.
    async fn close(&self) -> Result<(), GraphError>;
}

/// Build the backend variant selected by `config`. Validates the
/// configuration first so a misconfigured backend fails here, not on first
/// use.
pub fn open_backend(config: &GraphConfig) -> Result<Box<dyn GraphBackend>, GraphError> {
    config.validate()?;
    match config.backend {
        BackendKind::Embedded => Ok(Box::new(EmbeddedBackend::new(config))),
        BackendKind::Http => Ok(Box::new(HttpBackend::new(config)?)),
    }
}
