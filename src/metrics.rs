use std::time::Duration;

use axum::{routing::get, Router};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::pipeline::ScoredRecord;

// One global recorder per process; repeated init returns the same handle.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once) and return a handle to it.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                // default buckets
                PrometheusBuilder::new()
                    .install_recorder()
                    .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))
            })?
            .clone();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

pub fn record_request(route: &'static str) {
    counter!("attrition_requests_total", "route" => route).increment(1);
}

pub fn record_error(kind: &'static str) {
    counter!("attrition_scoring_errors_total", "kind" => kind).increment(1);
}

/// Per-batch counters; no-ops when no recorder is installed.
pub fn record_scored(scored: &[ScoredRecord], disagreements: usize, elapsed: Duration) {
    counter!("attrition_rows_scored_total").increment(scored.len() as u64);
    let positives = scored.iter().filter(|s| s.result.label == 1).count() as u64;
    counter!("attrition_predictions_total", "label" => "1").increment(positives);
    counter!("attrition_predictions_total", "label" => "0")
        .increment(scored.len() as u64 - positives);
    if disagreements > 0 {
        counter!("attrition_predictor_disagreements_total").increment(disagreements as u64);
    }
    histogram!("attrition_scoring_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
}
