// src/table.rs
//! Batch CSV in/out.
//!
//! Input: header row + one employee per row; every cell is kept verbatim so
//! unknown columns round-trip. Output: input columns in input order, then the
//! result columns (overwritten in place when the input already has them).

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::pipeline::{ScoredRecord, Verdict};
use crate::record::{EmployeeRecord, IDENTITY_FIELDS};

pub const COL_RISK: &str = "Attrition Risk";
pub const COL_CONFIDENCE: &str = "Confidence";
pub const COL_PREDICTION: &str = "Prediction";
pub const RESULT_COLUMNS: [&str; 3] = [COL_RISK, COL_CONFIDENCE, COL_PREDICTION];

pub const DOWNLOAD_FILE_NAME: &str = "attrition_predictions.csv";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("cannot parse CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV has no header row")]
    NoHeader,
    #[error("CSV has no data rows")]
    Empty,
    #[error("duplicate column '{0}' in CSV header")]
    DuplicateColumn(String),
    #[error("row {row}: expected {expected} cells, found {found}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Parsed upload: header order plus one record per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<EmployeeRecord>,
}

/// Parse a CSV document. Header names are trimmed; a UTF-8 BOM is ignored.
pub fn parse_csv(bytes: &[u8]) -> Result<Table, TableError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let columns: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if columns.iter().all(|c| c.is_empty()) {
        return Err(TableError::NoHeader);
    }
    {
        let mut seen = std::collections::HashSet::new();
        for c in &columns {
            if !seen.insert(c.as_str()) {
                return Err(TableError::DuplicateColumn(c.clone()));
            }
        }
    }

    let mut rows = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let rec = result?;
        if rec.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        if rec.len() > columns.len() {
            return Err(TableError::RaggedRow {
                row,
                expected: columns.len(),
                found: rec.len(),
            });
        }
        // short rows are padded with blank (missing) cells
        rows.push(
            columns
                .iter()
                .enumerate()
                .map(|(i, k)| (k.clone(), Value::String(rec.get(i).unwrap_or("").to_string())))
                .collect::<EmployeeRecord>(),
        );
    }
    if rows.is_empty() {
        return Err(TableError::Empty);
    }
    Ok(Table { columns, rows })
}

/// Output column order for the CSV download.
pub fn output_columns(input_columns: &[String]) -> Vec<String> {
    let mut cols = input_columns.to_vec();
    for c in RESULT_COLUMNS {
        if !cols.iter().any(|x| x == c) {
            cols.push(c.to_string());
        }
    }
    cols
}

/// Display order: identity fields present, then verdict and confidence, then
/// the remaining input columns in input order. The raw label column is
/// left out of the display.
pub fn display_columns(input_columns: &[String]) -> Vec<String> {
    let mut out: Vec<String> = IDENTITY_FIELDS
        .iter()
        .filter(|f| input_columns.iter().any(|c| c == *f))
        .map(|f| f.to_string())
        .collect();
    out.push(COL_PREDICTION.to_string());
    out.push(COL_CONFIDENCE.to_string());
    for c in input_columns {
        if !out.contains(c) && c != COL_RISK {
            out.push(c.clone());
        }
    }
    out
}

/// Confidence as shown and exported: two decimals.
pub fn format_confidence(c: f64) -> String {
    format!("{:.2}", c)
}

/// Result cells for a scored row, keyed by result column.
fn result_cells(s: &ScoredRecord) -> [(&'static str, String); 3] {
    [
        (COL_RISK, s.result.label.to_string()),
        (COL_CONFIDENCE, format_confidence(s.result.confidence())),
        (COL_PREDICTION, s.result.verdict().label().to_string()),
    ]
}

/// One output row as a record, result columns merged in.
pub fn output_record(s: &ScoredRecord) -> EmployeeRecord {
    let mut rec = s.record.clone();
    for (k, v) in result_cells(s) {
        rec.insert(k, v);
    }
    rec
}

/// Write scored rows to CSV (UTF-8).
pub fn export_csv(input_columns: &[String], scored: &[ScoredRecord]) -> Result<Vec<u8>, TableError> {
    let cols = output_columns(input_columns);
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(&cols)?;
    for s in scored {
        let rec = output_record(s);
        wtr.write_record(cols.iter().map(|c| rec.cell(c)))?;
    }
    wtr.into_inner()
        .map_err(|e| TableError::Csv(csv::Error::from(e.into_error())))
}

/// Label/confidence read back from an exported CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedResult {
    pub label: u8,
    pub confidence: f64,
    pub verdict: Option<Verdict>,
}

/// Re-read the result columns from an exported CSV.
pub fn read_results(bytes: &[u8]) -> Result<Vec<Option<ExportedResult>>, TableError> {
    let table = parse_csv(bytes)?;
    Ok(table
        .rows
        .iter()
        .map(|r| {
            let label = r.cell(COL_RISK).trim().parse::<u8>().ok()?;
            let confidence = r.cell(COL_CONFIDENCE).trim().parse::<f64>().ok()?;
            Some(ExportedResult {
                label,
                confidence,
                verdict: Verdict::from_text(&r.cell(COL_PREDICTION)),
            })
        })
        .collect())
}
