use std::fmt;

use thiserror::Error;

/// One field that failed validation, with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum GraphError {
    /// Caller input violated the schema. Carries every violation found in one
    /// pass, not just the first.
    #[error("validation failed: {}", join_violations(.0))]
    Validation(Vec<FieldViolation>),
    #[error("adapter not initialized: {0}")]
    NotInitialized(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("query execution failed: {message} (query: {query})")]
    QueryExecution { query: String, message: String },
    #[error("{operation} timed out after {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },
    #[error("upstream service error: {0}")]
    Upstream(String),
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl GraphError {
    pub fn validation(violations: Vec<FieldViolation>) -> Self {
        GraphError::Validation(violations)
    }

    pub fn single_violation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        GraphError::Validation(vec![FieldViolation::new(field, message)])
    }

    pub fn not_initialized<T: Into<String>>(msg: T) -> Self {
        GraphError::NotInitialized(msg.into())
    }

    pub fn connection<T: Into<String>>(msg: T) -> Self {
        GraphError::Connection(msg.into())
    }

    pub fn query_execution<Q: Into<String>, M: Into<String>>(query: Q, message: M) -> Self {
        GraphError::QueryExecution {
            query: query.into(),
            message: message.into(),
        }
    }

    pub fn timeout<T: Into<String>>(operation: T, elapsed_ms: u64) -> Self {
        GraphError::Timeout {
            operation: operation.into(),
            elapsed_ms,
        }
    }

    pub fn upstream<T: Into<String>>(msg: T) -> Self {
        GraphError::Upstream(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        GraphError::NotFound(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        GraphError::InvalidInput(msg.into())
    }

    /// The violations carried by a `Validation` error, if any.
    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            GraphError::Validation(violations) => violations,
            _ => &[],
        }
    }
}
