//! # Scoring Pipeline
//! Pure orchestration: records → encoder → predictor → shaped results.
//!
//! Policy: the label is always derived from the positive-class probability
//! at the pipeline threshold. The predictor's own `predict` label is kept
//! alongside for diagnostics; a disagreement is logged and counted but never
//! overrides the derived label.

use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::encoder::{CategoricalEncoder, EncodeError};
use crate::predictor::{DynPredictor, PredictorError};
use crate::record::EmployeeRecord;

pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Label and positive-class probability for one record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    pub label: u8,
    pub probability: f64,
}

impl PredictionResult {
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        Self {
            label: u8::from(probability >= threshold),
            probability,
        }
    }

    /// Probability mass of the predicted class.
    pub fn confidence(&self) -> f64 {
        if self.label == 1 {
            self.probability
        } else {
            1.0 - self.probability
        }
    }

    pub fn verdict(&self) -> Verdict {
        Verdict::from_label(self.label)
    }
}

/// Human-readable outcome derived purely from the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    LikelyToLeave,
    LikelyToStay,
}

impl Verdict {
    pub fn from_label(label: u8) -> Self {
        if label == 1 {
            Verdict::LikelyToLeave
        } else {
            Verdict::LikelyToStay
        }
    }

    /// Short form used in tables and charts.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::LikelyToLeave => "Likely to Leave",
            Verdict::LikelyToStay => "Likely to Stay",
        }
    }

    /// Long form used for the single-record view.
    pub fn message(&self) -> &'static str {
        match self {
            Verdict::LikelyToLeave => "High Risk: This employee may leave.",
            Verdict::LikelyToStay => "Low Risk: This employee is likely to stay.",
        }
    }

    pub fn from_text(s: &str) -> Option<Self> {
        match s.trim() {
            "Likely to Leave" => Some(Verdict::LikelyToLeave),
            "Likely to Stay" => Some(Verdict::LikelyToStay),
            _ => None,
        }
    }
}

/// Gauge data for the single-record view (0..100 scale).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaugeReading {
    pub value_pct: f64,
    pub band: GaugeBand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GaugeBand {
    Low,
    High,
}

/// A scored row: the input record, the result, and the raw predictor label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    pub record: EmployeeRecord,
    pub result: PredictionResult,
    pub predictor_label: u8,
}

impl ScoredRecord {
    pub fn disagrees(&self) -> bool {
        self.predictor_label != self.result.label
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScoringError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("predictor failure: {0}")]
    Predictor(#[from] PredictorError),
}

impl ScoringError {
    pub fn kind(&self) -> &'static str {
        match self {
            ScoringError::Encode(e) => e.kind(),
            ScoringError::Predictor(_) => "predictor_failure",
        }
    }
}

/// Encoder + injected predictor + decision threshold. Immutable after build.
#[derive(Clone)]
pub struct ScoringPipeline {
    encoder: CategoricalEncoder,
    predictor: DynPredictor,
    threshold: f64,
}

impl std::fmt::Debug for ScoringPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringPipeline")
            .field("predictor", &self.predictor.name())
            .field("features", &self.predictor.feature_order())
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl ScoringPipeline {
    pub fn new(predictor: DynPredictor) -> Self {
        Self::with_threshold(predictor, DEFAULT_THRESHOLD)
    }

    pub fn with_threshold(predictor: DynPredictor, threshold: f64) -> Self {
        let threshold = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            DEFAULT_THRESHOLD
        };
        Self {
            encoder: CategoricalEncoder::new(),
            predictor,
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn encoder(&self) -> &CategoricalEncoder {
        &self.encoder
    }

    pub fn predictor(&self) -> &DynPredictor {
        &self.predictor
    }

    pub fn feature_order(&self) -> &[String] {
        self.predictor.feature_order()
    }

    /// Score a batch in one pass. Output order equals input order; the batch
    /// fails as a whole on the first bad record or any predictor error.
    pub fn score(&self, records: Vec<EmployeeRecord>) -> Result<Vec<ScoredRecord>, ScoringError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        let n = records.len();

        let features = self.encoder.encode(&records, self.feature_order())?;
        let probs = self.predictor.predict_probability(&features)?;
        let labels = self.predictor.predict(&features)?;
        check_outputs(n, &probs, &labels)?;

        let scored: Vec<ScoredRecord> = records
            .into_iter()
            .zip(probs.into_iter().zip(labels))
            .map(|(record, (p, predictor_label))| ScoredRecord {
                record,
                result: PredictionResult::from_probability(p, self.threshold),
                predictor_label,
            })
            .collect();

        let disagreements = scored.iter().filter(|s| s.disagrees()).count();
        if disagreements > 0 {
            warn!(
                target: "attrition",
                disagreements,
                rows = n,
                threshold = self.threshold,
                model = self.predictor.name(),
                "predictor label differs from threshold-derived label"
            );
        }
        crate::metrics::record_scored(&scored, disagreements, started.elapsed());
        debug!(target: "attrition", rows = n, elapsed_ms = started.elapsed().as_millis() as u64, "batch scored");
        Ok(scored)
    }

    /// Single-record convenience over `score`; identical results by construction.
    pub fn score_one(&self, record: EmployeeRecord) -> Result<ScoredRecord, ScoringError> {
        let mut out = self.score(vec![record])?;
        out.pop().ok_or(ScoringError::Predictor(PredictorError::OutputLength {
            expected: 1,
            got: 0,
        }))
    }

    pub fn gauge(&self, result: &PredictionResult) -> GaugeReading {
        GaugeReading {
            value_pct: result.probability * 100.0,
            band: if result.probability >= self.threshold {
                GaugeBand::High
            } else {
                GaugeBand::Low
            },
        }
    }
}

fn check_outputs(n: usize, probs: &[f64], labels: &[u8]) -> Result<(), PredictorError> {
    if probs.len() != n {
        return Err(PredictorError::OutputLength {
            expected: n,
            got: probs.len(),
        });
    }
    if labels.len() != n {
        return Err(PredictorError::OutputLength {
            expected: n,
            got: labels.len(),
        });
    }
    if let Some((row, &value)) = probs
        .iter()
        .enumerate()
        .find(|(_, p)| !p.is_finite() || !(0.0..=1.0).contains(*p))
    {
        return Err(PredictorError::InvalidProbability { row, value });
    }
    if let Some((row, &value)) = labels.iter().enumerate().find(|(_, l)| **l > 1) {
        return Err(PredictorError::InvalidLabel { row, value });
    }
    Ok(())
}
