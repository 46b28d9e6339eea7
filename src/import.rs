//! Bulk gene ingestion. Input is header-first comma-separated text with
//! double-quote escaping; quoted cells may contain commas, quotes and
//! newlines. Parsing and validation finish before the first write, and every
//! problem is reported in one pass.

use serde::Serialize;
use tracing::warn;

use crate::errors::{FieldViolation, GraphError};
use crate::schema::entities::Gene;
use crate::schema::{OPTIONAL_GENE_COLUMNS, REQUIRED_GENE_COLUMNS, gene_id_from_symbol};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
}

/// Parse a gene bulk payload into upsert-ready records. Ids derive from the
/// symbol, so re-importing the same payload merges onto the same nodes.
pub fn parse_gene_bulk(bulk: &str) -> Result<Vec<Gene>, GraphError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bulk.as_bytes());

    let header: Vec<String> = match reader.headers() {
        Ok(row) => row.iter().map(|c| c.trim().to_ascii_lowercase()).collect(),
        Err(e) => {
            return Err(GraphError::single_violation(
                "bulk",
                format!("unreadable header row: {e}"),
            ));
        }
    };
    if header.iter().all(|h| h.is_empty()) {
        return Err(GraphError::single_violation(
            "bulk",
            "payload must contain a header row",
        ));
    }
    let mut violations = Vec::new();
    for column in REQUIRED_GENE_COLUMNS {
        if !header.iter().any(|h| h == column) {
            violations.push(FieldViolation::new(
                column,
                "required column missing from header",
            ));
        }
    }
    for (i, name) in header.iter().enumerate() {
        if !name.is_empty() && header[..i].contains(name) {
            violations.push(FieldViolation::new(name.clone(), "duplicate column"));
        }
    }
    if !violations.is_empty() {
        return Err(GraphError::Validation(violations));
    }
    for name in &header {
        let known = REQUIRED_GENE_COLUMNS.contains(&name.as_str())
            || OPTIONAL_GENE_COLUMNS.contains(&name.as_str());
        if !known {
            warn!(column = %name, "ignoring unrecognized gene import column");
        }
    }

    let column = |name: &str| header.iter().position(|h| h == name);

    let mut genes = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                violations.push(FieldViolation::new("bulk", format!("unreadable row: {e}")));
                continue;
            }
        };
        // Quoted cells may span lines, so the reader's position beats any
        // record counter.
        let line = record.position().map_or(index as u64 + 2, |p| p.line());
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        if record.len() != header.len() {
            violations.push(FieldViolation::new(
                format!("line {line}"),
                format!("expected {} columns, found {}", header.len(), record.len()),
            ));
            continue;
        }
        let cell = |name: &str| -> String {
            column(name)
                .and_then(|i| record.get(i))
                .map(|c| c.trim().to_string())
                .unwrap_or_default()
        };
        let mut row_ok = true;
        for required in REQUIRED_GENE_COLUMNS {
            if cell(required).is_empty() {
                violations.push(FieldViolation::new(
                    format!("line {line}"),
                    format!("{required} must not be empty"),
                ));
                row_ok = false;
            }
        }
        if !row_ok {
            continue;
        }
        let symbol = cell("symbol");
        let optional = |name: &str| -> Option<String> {
            let value = cell(name);
            if value.is_empty() { None } else { Some(value) }
        };
        genes.push(Gene {
            id: gene_id_from_symbol(&symbol),
            symbol,
            name: cell("name"),
            description: cell("description"),
            chromosome: cell("chromosome"),
            xref_id: optional("xref_id"),
            location: optional("location"),
        });
    }

    if violations.is_empty() {
        Ok(genes)
    } else {
        Err(GraphError::Validation(violations))
    }
}
