//! Per-entity filter and pagination structs. `from_json` validates untrusted
//! input in one pass and reports every violation together, not just the
//! first. Filter enums parse strictly: a typo in a filter is an error, never
//! a silent empty result.

use chrono::NaiveDate;
use serde_json::Value;

use crate::errors::{FieldViolation, GraphError};
use crate::schema::entities::{TrialPhase, TrialStatus};

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Validated page window. `limit` is always within [1, 100].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeneQuery {
    pub symbol: Option<String>,
    pub chromosome: Option<String>,
    /// Matches symbol, name or description.
    pub keyword: Option<String>,
    pub associated_disease: Option<String>,
    pub has_clinical_trials: Option<bool>,
    pub limit: u32,
    pub offset: u64,
}

impl Default for GeneQuery {
    fn default() -> Self {
        GeneQuery {
            symbol: None,
            chromosome: None,
            keyword: None,
            associated_disease: None,
            has_clinical_trials: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl GeneQuery {
    pub fn from_json(input: &Value) -> Result<GeneQuery, GraphError> {
        let mut reader = FieldReader::new(input);
        let query = GeneQuery {
            symbol: reader.opt_string("symbol"),
            chromosome: reader.opt_string("chromosome"),
            keyword: reader.opt_string("keyword"),
            associated_disease: reader.opt_string("associated_disease"),
            has_clinical_trials: reader.opt_bool("has_clinical_trials"),
            limit: reader.limit(),
            offset: reader.offset(),
        };
        reader.finish()?;
        Ok(query)
    }

    pub fn page(&self) -> Pagination {
        clamp_page(self.limit, self.offset)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PaperQuery {
    /// Matches title, abstract or keyword list.
    pub keyword: Option<String>,
    pub journal: Option<String>,
    pub author: Option<String>,
    /// Restrict to papers mentioning this gene symbol.
    pub gene_symbol: Option<String>,
    pub published_after: Option<NaiveDate>,
    pub published_before: Option<NaiveDate>,
    pub limit: u32,
    pub offset: u64,
}

impl Default for PaperQuery {
    fn default() -> Self {
        PaperQuery {
            keyword: None,
            journal: None,
            author: None,
            gene_symbol: None,
            published_after: None,
            published_before: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl PaperQuery {
    pub fn from_json(input: &Value) -> Result<PaperQuery, GraphError> {
        let mut reader = FieldReader::new(input);
        let query = PaperQuery {
            keyword: reader.opt_string("keyword"),
            journal: reader.opt_string("journal"),
            author: reader.opt_string("author"),
            gene_symbol: reader.opt_string("gene_symbol"),
            published_after: reader.opt_date("published_after"),
            published_before: reader.opt_date("published_before"),
            limit: reader.limit(),
            offset: reader.offset(),
        };
        reader.finish()?;
        Ok(query)
    }

    pub fn page(&self) -> Pagination {
        clamp_page(self.limit, self.offset)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrialQuery {
    pub status: Option<TrialStatus>,
    pub phase: Option<TrialPhase>,
    /// Substring match against trial locations; multicentric trials match
    /// any region.
    pub region: Option<String>,
    pub gene_symbol: Option<String>,
    pub limit: u32,
    pub offset: u64,
}

impl Default for TrialQuery {
    fn default() -> Self {
        TrialQuery {
            status: None,
            phase: None,
            region: None,
            gene_symbol: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl TrialQuery {
    pub fn from_json(input: &Value) -> Result<TrialQuery, GraphError> {
        let mut reader = FieldReader::new(input);
        let query = TrialQuery {
            status: reader.opt_filter("status", TrialStatus::parse_strict),
            phase: reader.opt_filter("phase", TrialPhase::parse_strict),
            region: reader.opt_string("region"),
            gene_symbol: reader.opt_string("gene_symbol"),
            limit: reader.limit(),
            offset: reader.offset(),
        };
        reader.finish()?;
        Ok(query)
    }

    pub fn page(&self) -> Pagination {
        clamp_page(self.limit, self.offset)
    }
}

fn clamp_page(limit: u32, offset: u64) -> Pagination {
    Pagination {
        limit: limit.clamp(1, MAX_LIMIT),
        offset,
    }
}

/// Pulls typed fields out of an arbitrary JSON object, collecting violations
/// instead of bailing on the first one. `null` counts as absent.
struct FieldReader<'a> {
    object: Option<&'a serde_json::Map<String, Value>>,
    violations: Vec<FieldViolation>,
}

impl<'a> FieldReader<'a> {
    fn new(input: &'a Value) -> FieldReader<'a> {
        match input.as_object() {
            Some(object) => FieldReader {
                object: Some(object),
                violations: Vec::new(),
            },
            None => FieldReader {
                object: None,
                violations: vec![FieldViolation::new("query", "must be a JSON object")],
            },
        }
    }

    fn get(&self, field: &str) -> Option<&'a Value> {
        let value = self.object?.get(field)?;
        if value.is_null() { None } else { Some(value) }
    }

    fn violation(&mut self, field: &str, message: impl Into<String>) {
        self.violations.push(FieldViolation::new(field, message));
    }

    fn opt_string(&mut self, field: &str) -> Option<String> {
        let value = self.get(field)?;
        match value.as_str() {
            Some(s) => Some(s.to_owned()),
            None => {
                self.violation(field, "must be a string");
                None
            }
        }
    }

    fn opt_bool(&mut self, field: &str) -> Option<bool> {
        let value = self.get(field)?;
        match value.as_bool() {
            Some(b) => Some(b),
            None => {
                self.violation(field, "must be a boolean");
                None
            }
        }
    }

    fn opt_date(&mut self, field: &str) -> Option<NaiveDate> {
        let raw = self.opt_string(field)?;
        match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                self.violation(field, "must be a YYYY-MM-DD date");
                None
            }
        }
    }

    fn opt_filter<T>(&mut self, field: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
        let raw = self.opt_string(field)?;
        match parse(&raw) {
            Some(parsed) => Some(parsed),
            None => {
                self.violation(field, format!("unknown value '{raw}'"));
                None
            }
        }
    }

    /// Out-of-range limits clamp instead of failing; only type errors are
    /// violations.
    fn limit(&mut self) -> u32 {
        match self.get("limit") {
            None => DEFAULT_LIMIT,
            Some(value) => match value.as_i64() {
                Some(n) => n.clamp(1, MAX_LIMIT as i64) as u32,
                None => {
                    self.violation("limit", "must be an integer");
                    DEFAULT_LIMIT
                }
            },
        }
    }

    fn offset(&mut self) -> u64 {
        match self.get("offset") {
            None => 0,
            Some(value) => match value.as_i64() {
                Some(n) if n >= 0 => n as u64,
                Some(_) => {
                    self.violation("offset", "must be zero or greater");
                    0
                }
                None => {
                    self.violation("offset", "must be an integer");
                    0
                }
            },
        }
    }

    fn finish(self) -> Result<(), GraphError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(GraphError::Validation(self.violations))
        }
    }
}
