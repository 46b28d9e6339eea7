//! Backend selection and tuning knobs. Configuration is explicit: callers
//! build a `GraphConfig` and hand it to `open_backend` / `GraphAdapter::new`;
//! nothing here reads the environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{FieldViolation, GraphError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Embedded,
    Http,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedConfig {
    /// Database file path; `None` opens an in-memory store.
    pub path: Option<PathBuf>,
    pub create_if_missing: bool,
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        EmbeddedConfig {
            path: None,
            create_if_missing: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub base_url: String,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub backend: BackendKind,
    pub embedded: EmbeddedConfig,
    pub http: HttpConfig,
    pub cache_ttl_secs: u64,
    /// Time allowed for reachability verification at `initialize()`.
    pub connect_timeout_secs: u64,
    /// Per-statement execution timeout.
    pub request_timeout_secs: u64,
    /// Permits for concurrent fan-out queries.
    pub max_concurrent_queries: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            backend: BackendKind::Embedded,
            embedded: EmbeddedConfig::default(),
            http: HttpConfig::default(),
            cache_ttl_secs: 60,
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            max_concurrent_queries: 4,
        }
    }
}

impl GraphConfig {
    /// In-memory embedded store, the default for tests and local runs.
    pub fn embedded() -> GraphConfig {
        GraphConfig::default()
    }

    pub fn embedded_at<P: Into<PathBuf>>(path: P) -> GraphConfig {
        GraphConfig {
            embedded: EmbeddedConfig {
                path: Some(path.into()),
                create_if_missing: true,
            },
            ..GraphConfig::default()
        }
    }

    pub fn http<U: Into<String>>(base_url: U) -> GraphConfig {
        GraphConfig {
            backend: BackendKind::Http,
            http: HttpConfig {
                base_url: base_url.into(),
                ..HttpConfig::default()
            },
            ..GraphConfig::default()
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check every field and report all problems at once. A zero cache TTL is
    /// allowed (it disables caching); zero timeouts and zero permits are not.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut violations = Vec::new();
        if self.backend == BackendKind::Http {
            if self.http.base_url.trim().is_empty() {
                violations.push(FieldViolation::new(
                    "http.base_url",
                    "required for the http backend",
                ));
            } else if !self.http.base_url.starts_with("http://")
                && !self.http.base_url.starts_with("https://")
            {
                violations.push(FieldViolation::new(
                    "http.base_url",
                    "must start with http:// or https://",
                ));
            }
            if self.http.username.is_some() && self.http.password.is_none() {
                violations.push(FieldViolation::new(
                    "http.password",
                    "required when http.username is set",
                ));
            }
            if self.http.password.is_some() && self.http.username.is_none() {
                violations.push(FieldViolation::new(
                    "http.username",
                    "required when http.password is set",
                ));
            }
        }
        if let Some(path) = &self.embedded.path {
            if path.as_os_str().is_empty() {
                violations.push(FieldViolation::new(
                    "embedded.path",
                    "must not be empty; omit it for an in-memory store",
                ));
            }
        }
        if self.connect_timeout_secs == 0 {
            violations.push(FieldViolation::new(
                "connect_timeout_secs",
                "must be at least 1",
            ));
        }
        if self.request_timeout_secs == 0 {
            violations.push(FieldViolation::new(
                "request_timeout_secs",
                "must be at least 1",
            ));
        }
        if self.max_concurrent_queries == 0 {
            violations.push(FieldViolation::new(
                "max_concurrent_queries",
                "must be at least 1",
            ));
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(GraphError::Validation(violations))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        GraphConfig::default().validate().expect("defaults are valid");
        GraphConfig::http("http://localhost:7474")
            .validate()
            .expect("http constructor is valid");
    }

    #[test]
    fn http_violations_aggregate() {
        let mut config = GraphConfig::http("");
        config.http.password = Some("secret".to_string());
        config.request_timeout_secs = 0;
        let err = config.validate().expect_err("three violations");
        let fields: Vec<&str> = err.violations().iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields.len(), 3);
        assert!(fields.contains(&"http.base_url"));
        assert!(fields.contains(&"http.username"));
        assert!(fields.contains(&"request_timeout_secs"));
    }

    #[test]
    fn base_url_scheme_is_checked() {
        let config = GraphConfig::http("localhost:7474");
        let err = config.validate().expect_err("missing scheme");
        assert_eq!(err.violations()[0].field, "http.base_url");
    }

    #[test]
    fn zero_cache_ttl_is_allowed() {
        let mut config = GraphConfig::embedded();
        config.cache_ttl_secs = 0;
        config.validate().expect("ttl 0 disables caching, not an error");
    }
}
