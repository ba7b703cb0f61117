//! # Categorical Encoder
//! Fixed string → integer tables for the categorical employee fields, plus
//! selection/ordering of the feature set the predictor expects.
//!
//! Policy: any value outside a table is an error, never a silent default.
//! Fields without a table must be numeric (JSON number or numeric text).

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::record::{display_value, EmployeeRecord};

/// Per-field lookup table. Entries are listed in code order.
#[derive(Debug, Clone, Copy)]
pub struct CategoryMapping {
    pub field: &'static str,
    pub entries: &'static [(&'static str, u32)],
}

impl CategoryMapping {
    pub fn code(&self, value: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(k, _)| *k == value)
            .map(|(_, c)| *c)
    }

    pub fn values(&self) -> impl Iterator<Item = &'static str> {
        let entries: &'static [(&'static str, u32)] = self.entries;
        entries.iter().map(|(k, _)| *k)
    }
}

pub static CATEGORY_MAPPINGS: [CategoryMapping; 7] = [
    CategoryMapping {
        field: "BusinessTravel",
        entries: &[("Non-Travel", 0), ("Travel_Rarely", 1), ("Travel_Frequently", 2)],
    },
    CategoryMapping {
        field: "Department",
        entries: &[
            ("Human Resources", 0),
            ("Research & Development", 1),
            ("Sales", 2),
        ],
    },
    CategoryMapping {
        field: "EducationField",
        entries: &[
            ("Marketing", 0),
            ("Life Sciences", 1),
            ("Medical", 2),
            ("Other", 3),
            ("Technical Degree", 4),
        ],
    },
    CategoryMapping {
        field: "Gender",
        entries: &[("Female", 0), ("Male", 1)],
    },
    CategoryMapping {
        field: "JobRole",
        entries: &[
            ("Manager", 2),
            ("Laboratory Technician", 3),
            ("Research Scientist", 4),
            ("Sales Executive", 6),
        ],
    },
    CategoryMapping {
        field: "MaritalStatus",
        entries: &[("Divorced", 0), ("Married", 1), ("Single", 2)],
    },
    CategoryMapping {
        field: "OverTime",
        entries: &[("No", 0), ("Yes", 1)],
    },
];

/// One encoded row, ordered like the predictor's feature schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Encoding failures. `row` is the 0-based position in the input batch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EncodeError {
    #[error("row {row}: unknown value '{value}' for categorical field '{field}'")]
    UnknownCategoryValue {
        row: usize,
        field: String,
        value: String,
    },
    #[error("row {row}: missing required field '{field}'")]
    MissingField { row: usize, field: String },
    #[error("row {row}: field '{field}' must be numeric, got '{value}'")]
    NonNumericValue {
        row: usize,
        field: String,
        value: String,
    },
}

impl EncodeError {
    /// Stable machine-readable kind, used in API bodies and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            EncodeError::UnknownCategoryValue { .. } => "unknown_category_value",
            EncodeError::MissingField { .. } => "missing_field",
            EncodeError::NonNumericValue { .. } => "non_numeric_value",
        }
    }
}

/// A (field, value) pair found in sample data that the tables do not cover.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct UncoveredValue {
    pub field: String,
    pub value: String,
}

/// Stateless encoder over a set of category tables (the fixed table by default).
#[derive(Debug, Clone)]
pub struct CategoricalEncoder {
    mappings: &'static [CategoryMapping],
}

impl Default for CategoricalEncoder {
    fn default() -> Self {
        Self {
            mappings: &CATEGORY_MAPPINGS,
        }
    }
}

impl CategoricalEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mapping(&self, field: &str) -> Option<&CategoryMapping> {
        self.mappings.iter().find(|m| m.field == field)
    }

    pub fn is_categorical(&self, field: &str) -> bool {
        self.mapping(field).is_some()
    }

    /// Known values of a categorical field (form select options).
    pub fn choices(&self, field: &str) -> Option<Vec<&'static str>> {
        self.mapping(field).map(|m| m.values().collect())
    }

    pub fn mappings(&self) -> &'static [CategoryMapping] {
        self.mappings
    }

    /// Encode every record into a vector ordered by `feature_order`.
    /// Fails on the first bad record; no partial output.
    pub fn encode(
        &self,
        records: &[EmployeeRecord],
        feature_order: &[String],
    ) -> Result<Vec<FeatureVector>, EncodeError> {
        records
            .iter()
            .enumerate()
            .map(|(row, rec)| self.encode_record(row, rec, feature_order))
            .collect()
    }

    fn encode_record(
        &self,
        row: usize,
        rec: &EmployeeRecord,
        feature_order: &[String],
    ) -> Result<FeatureVector, EncodeError> {
        let mut values = Vec::with_capacity(feature_order.len());
        for field in feature_order {
            let raw = rec.present(field).ok_or_else(|| EncodeError::MissingField {
                row,
                field: field.clone(),
            })?;
            let v = match self.mapping(field) {
                Some(m) => encode_category(m, row, raw)?,
                None => parse_numeric(row, field, raw)?,
            };
            values.push(v);
        }
        Ok(FeatureVector::new(values))
    }

    /// Every categorical value in `records` that no table covers, sorted and
    /// de-duplicated. Blank cells are ignored.
    pub fn check_coverage(&self, records: &[EmployeeRecord]) -> Vec<UncoveredValue> {
        use std::collections::BTreeSet;
        let mut out = BTreeSet::new();
        for rec in records {
            for m in self.mappings {
                if let Some(raw) = rec.present(m.field) {
                    let known = matches!(raw, Value::String(s) if m.code(s.trim()).is_some());
                    if !known {
                        out.insert(UncoveredValue {
                            field: m.field.to_string(),
                            value: display_value(raw),
                        });
                    }
                }
            }
        }
        out.into_iter().collect()
    }
}

fn encode_category(m: &CategoryMapping, row: usize, raw: &Value) -> Result<f64, EncodeError> {
    let code = match raw {
        // CSV cells may carry stray padding; the table itself is exact.
        Value::String(s) => m.code(s.trim()),
        _ => None,
    };
    code.map(f64::from)
        .ok_or_else(|| EncodeError::UnknownCategoryValue {
            row,
            field: m.field.to_string(),
            value: display_value(raw),
        })
}

fn parse_numeric(row: usize, field: &str, raw: &Value) -> Result<f64, EncodeError> {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| EncodeError::NonNumericValue {
            row,
            field: field.to_string(),
            value: display_value(raw),
        })
}
