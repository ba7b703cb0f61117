// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod encoder;
pub mod form;
pub mod metrics;
pub mod pipeline;
pub mod predictor;
pub mod record;
pub mod table;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{summarize, BatchSummary};
pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::encoder::{CategoricalEncoder, EncodeError, FeatureVector};
pub use crate::pipeline::{PredictionResult, ScoredRecord, ScoringError, ScoringPipeline, Verdict};
pub use crate::predictor::{load_predictor, DynPredictor, Predictor, PredictorError};
pub use crate::record::EmployeeRecord;

use axum::Router;
use tracing::{info, warn};

/// Build the full router from config on disk (`AppConfig::load`).
pub fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::load()?;
    build_app(cfg)
}

/// Build the router from an explicit config: load the model once, check the
/// optional sample data against the category tables, wire state + metrics.
pub fn build_app(cfg: AppConfig) -> anyhow::Result<Router> {
    let predictor = load_predictor(&cfg.model_path)?;
    let pipeline = ScoringPipeline::with_threshold(predictor, cfg.threshold);
    check_sample_data(&pipeline, &cfg);

    let metrics = if cfg.metrics_enabled {
        Some(metrics::Metrics::init()?)
    } else {
        None
    };
    info!(target: "attrition", pipeline = ?pipeline, "scoring pipeline ready");
    Ok(api::router(AppState::new(pipeline, cfg), metrics))
}

/// Warn about sample-data category values the fixed tables cannot encode.
/// Never fails startup.
pub fn check_sample_data(pipeline: &ScoringPipeline, cfg: &AppConfig) {
    let Some(path) = cfg.sample_data_path.as_ref() else {
        return;
    };
    let parsed = std::fs::read(path)
        .map_err(anyhow::Error::from)
        .and_then(|b| table::parse_csv(&b).map_err(anyhow::Error::from));
    match parsed {
        Ok(t) => {
            let gaps = pipeline.encoder().check_coverage(&t.rows);
            if gaps.is_empty() {
                info!(target: "attrition", rows = t.rows.len(), "sample data fully covered by category tables");
            }
            for g in gaps {
                warn!(target: "attrition", field = %g.field, value = %g.value, "sample value not covered by category table");
            }
        }
        Err(e) => {
            warn!(target: "attrition", path = %path.display(), error = %e, "sample data not readable; coverage check skipped");
        }
    }
}
