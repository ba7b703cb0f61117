//! Predictor capability and the on-disk model artifact.
//!
//! The scoring pipeline only sees `dyn Predictor`: a declared feature order
//! plus batch `predict` / `predict_probability`. The bundled artifact format
//! is a tagged JSON document; `kind = "logistic"` is the one we ship.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::encoder::FeatureVector;

/// Errors raised by a predictor at call time.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PredictorError {
    #[error("feature vector {row} has {got} values, model expects {expected}")]
    SchemaMismatch {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("predictor returned {got} outputs for {expected} rows")]
    OutputLength { expected: usize, got: usize },
    #[error("predictor returned invalid probability {value} for row {row}")]
    InvalidProbability { row: usize, value: f64 },
    #[error("predictor returned label {value} for row {row}, expected 0 or 1")]
    InvalidLabel { row: usize, value: u8 },
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Opaque binary classifier. Label 1 is the positive ("will leave") class.
pub trait Predictor: Send + Sync {
    /// Feature names in the order `FeatureVector`s must follow.
    fn feature_order(&self) -> &[String];

    /// Class label per row, using the predictor's own internal threshold.
    fn predict(&self, batch: &[FeatureVector]) -> Result<Vec<u8>, PredictorError>;

    /// Positive-class probability per row.
    fn predict_probability(&self, batch: &[FeatureVector]) -> Result<Vec<f64>, PredictorError>;

    /// Provider name for diagnostics.
    fn name(&self) -> &str {
        "predictor"
    }
}

pub type DynPredictor = Arc<dyn Predictor>;

/* ----------------------------
Artifact schema (JSON)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Logistic(LogisticModel),
}

/// Standardization applied before the linear term: `(x - mean) / scale`.
#[derive(Debug, Clone, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

fn default_model_threshold() -> f64 {
    0.5
}

/// Logistic regression over standardized features.
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticModel {
    pub features: Vec<String>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub scaler: Option<Scaler>,
    /// Threshold used by this model's own `predict`.
    #[serde(default = "default_model_threshold")]
    pub threshold: f64,
}

impl LogisticModel {
    /// Check internal consistency; called once at load.
    pub fn validate(&self) -> anyhow::Result<()> {
        let n = self.features.len();
        if n == 0 {
            anyhow::bail!("logistic model declares no features");
        }
        if self.coefficients.len() != n {
            anyhow::bail!(
                "logistic model has {} coefficients for {} features",
                self.coefficients.len(),
                n
            );
        }
        if let Some(s) = &self.scaler {
            if s.mean.len() != n || s.scale.len() != n {
                anyhow::bail!("scaler length does not match {} features", n);
            }
            if s.scale.iter().any(|v| *v == 0.0) {
                anyhow::bail!("scaler contains a zero scale entry");
            }
        }
        let mut params = self
            .coefficients
            .iter()
            .chain([&self.intercept, &self.threshold]);
        if params.any(|v| !v.is_finite()) {
            anyhow::bail!("logistic model contains non-finite parameters");
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            anyhow::bail!("logistic model threshold {} outside [0,1]", self.threshold);
        }
        Ok(())
    }

    fn margin(&self, x: &[f64]) -> f64 {
        let mut z = self.intercept;
        for (i, (xi, wi)) in x.iter().zip(&self.coefficients).enumerate() {
            let v = match &self.scaler {
                Some(s) => (xi - s.mean[i]) / s.scale[i],
                None => *xi,
            };
            z += v * wi;
        }
        z
    }

    fn check_schema(&self, batch: &[FeatureVector]) -> Result<(), PredictorError> {
        let expected = self.features.len();
        for (row, fv) in batch.iter().enumerate() {
            if fv.len() != expected {
                return Err(PredictorError::SchemaMismatch {
                    row,
                    expected,
                    got: fv.len(),
                });
            }
        }
        Ok(())
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Predictor for LogisticModel {
    fn feature_order(&self) -> &[String] {
        &self.features
    }

    fn predict(&self, batch: &[FeatureVector]) -> Result<Vec<u8>, PredictorError> {
        let probs = self.predict_probability(batch)?;
        Ok(probs
            .into_iter()
            .map(|p| u8::from(p >= self.threshold))
            .collect())
    }

    fn predict_probability(&self, batch: &[FeatureVector]) -> Result<Vec<f64>, PredictorError> {
        self.check_schema(batch)?;
        Ok(batch
            .iter()
            .map(|fv| sigmoid(self.margin(fv.as_slice())))
            .collect())
    }

    fn name(&self) -> &str {
        "logistic"
    }
}

/// Parse an artifact from JSON text and validate it.
pub fn predictor_from_json(json: &str) -> anyhow::Result<DynPredictor> {
    let artifact: ModelArtifact =
        serde_json::from_str(json).context("parsing model artifact JSON")?;
    match artifact {
        ModelArtifact::Logistic(m) => {
            m.validate()?;
            Ok(Arc::new(m))
        }
    }
}

/// Load the model artifact once at startup.
pub fn load_predictor(path: &Path) -> anyhow::Result<DynPredictor> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading model artifact from {}", path.display()))?;
    let predictor = predictor_from_json(&content)
        .with_context(|| format!("loading model artifact {}", path.display()))?;
    info!(
        target: "attrition",
        model = predictor.name(),
        features = predictor.feature_order().len(),
        path = %path.display(),
        "model artifact loaded"
    );
    Ok(predictor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TINY: &str = r#"{
        "kind": "logistic",
        "features": ["Age", "OverTime"],
        "intercept": 0.0,
        "coefficients": [0.0, 2.0],
        "threshold": 0.7
    }"#;

    fn fv(v: &[f64]) -> FeatureVector {
        FeatureVector::new(v.to_vec())
    }

    #[test]
    fn loads_and_scores_logistic_artifact() {
        let p = predictor_from_json(TINY).unwrap();
        assert_eq!(p.feature_order(), &["Age".to_string(), "OverTime".to_string()]);
        let probs = p
            .predict_probability(&[fv(&[30.0, 0.0]), fv(&[30.0, 1.0])])
            .unwrap();
        assert!((probs[0] - 0.5).abs() < 1e-12);
        assert!((probs[1] - sigmoid(2.0)).abs() < 1e-12);
    }

    #[test]
    fn own_threshold_drives_predict() {
        let p = predictor_from_json(TINY).unwrap();
        // p = 0.5 sits below this artifact's 0.7 threshold
        let labels = p.predict(&[fv(&[30.0, 0.0]), fv(&[30.0, 1.0])]).unwrap();
        assert_eq!(labels, vec![0, 1]);
    }

    #[test]
    fn rejects_wrong_vector_length() {
        let p = predictor_from_json(TINY).unwrap();
        let err = p.predict_probability(&[fv(&[1.0])]).unwrap_err();
        assert_eq!(
            err,
            PredictorError::SchemaMismatch {
                row: 0,
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn scaler_standardizes_inputs() {
        let json = r#"{
            "kind": "logistic",
            "features": ["MonthlyIncome"],
            "intercept": 0.0,
            "coefficients": [1.0],
            "scaler": { "mean": [5000.0], "scale": [1000.0] }
        }"#;
        let p = predictor_from_json(json).unwrap();
        let probs = p.predict_probability(&[fv(&[6000.0])]).unwrap();
        assert!((probs[0] - sigmoid(1.0)).abs() < 1e-12);
    }

    #[test]
    fn invalid_artifacts_fail_to_load() {
        let mismatched = r#"{"kind":"logistic","features":["A","B"],"intercept":0,"coefficients":[1]}"#;
        assert!(predictor_from_json(mismatched).is_err());

        let zero_scale = r#"{"kind":"logistic","features":["A"],"intercept":0,"coefficients":[1],
            "scaler":{"mean":[0],"scale":[0]}}"#;
        assert!(predictor_from_json(zero_scale).is_err());

        let unknown_kind = r#"{"kind":"forest","features":["A"]}"#;
        assert!(predictor_from_json(unknown_kind).is_err());
    }

    #[serial_test::serial]
    #[test]
    fn bundled_artifact_loads() {
        let p = load_predictor(Path::new("models/attrition_model.json")).unwrap();
        assert!(p.feature_order().iter().any(|f| f == "OverTime"));
    }
}
