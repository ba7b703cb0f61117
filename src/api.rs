//! HTTP surface: single-record form scoring, batch CSV scoring/download,
//! form options and model info. Static UI served from `ui/`.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{BytesRejection, JsonRejection},
        DefaultBodyLimit, Multipart, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{info, warn};

use crate::aggregate::{summarize, BatchSummary, ChartSlice};
use crate::config::AppConfig;
use crate::form::{form_options, FormError, FormOptions, SingleRecordForm};
use crate::metrics::{self, Metrics};
use crate::pipeline::{GaugeReading, ScoringError, ScoringPipeline, Verdict};
use crate::record::EmployeeRecord;
use crate::table::{self, TableError};

/// Shared, read-only state: built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ScoringPipeline>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pipeline: ScoringPipeline, config: AppConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState, metrics: Option<Metrics>) -> Router {
    let body_limit = state.config.max_upload_bytes;

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/model", get(model_info))
        .route("/form/options", get(options))
        .route("/predict", post(predict_single))
        .route("/predict/records", post(predict_records))
        .route("/predict/batch", post(predict_batch_csv))
        .route("/predict/upload", post(predict_upload))
        .fallback_service(ServeDir::new("ui"))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::very_permissive())
        .with_state(state);

    match metrics {
        Some(m) => app.merge(m.router()),
        None => app,
    }
}

/* ----------------------------
Errors
---------------------------- */

#[derive(Debug)]
pub enum ApiError {
    Scoring(ScoringError),
    Table(TableError),
    Form(FormError),
    BadRequest(String),
    /// Request body rejected before it reached a handler.
    Rejected {
        status: StatusCode,
        kind: &'static str,
        message: String,
    },
    Internal(String),
}

impl ApiError {
    /// Keep the extractor's status; only the kind and body shape are ours.
    fn rejected(status: StatusCode, message: String) -> Self {
        let kind = match status {
            StatusCode::PAYLOAD_TOO_LARGE => "payload_too_large",
            StatusCode::UNSUPPORTED_MEDIA_TYPE => "unsupported_media_type",
            StatusCode::UNPROCESSABLE_ENTITY => "invalid_form",
            _ => "malformed_batch_input",
        };
        ApiError::Rejected {
            status,
            kind,
            message,
        }
    }

    fn multipart(e: MultipartError, context: &str) -> Self {
        Self::rejected(e.status(), format!("{context}: {}", e.body_text()))
    }
}

impl From<ScoringError> for ApiError {
    fn from(e: ScoringError) -> Self {
        ApiError::Scoring(e)
    }
}

impl From<TableError> for ApiError {
    fn from(e: TableError) -> Self {
        ApiError::Table(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        match r {
            JsonRejection::JsonSyntaxError(e) => ApiError::Rejected {
                status: StatusCode::BAD_REQUEST,
                kind: "invalid_json",
                message: e.body_text(),
            },
            other => Self::rejected(other.status(), other.body_text()),
        }
    }
}

impl From<BytesRejection> for ApiError {
    fn from(r: BytesRejection) -> Self {
        Self::rejected(r.status(), r.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(r: MultipartRejection) -> Self {
        Self::rejected(r.status(), r.body_text())
    }
}

impl From<FormError> for ApiError {
    fn from(e: FormError) -> Self {
        ApiError::Form(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Scoring(e @ ScoringError::Encode(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, e.kind(), e.to_string())
            }
            ApiError::Scoring(e @ ScoringError::Predictor(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.kind(), e.to_string())
            }
            ApiError::Table(e) => (StatusCode::BAD_REQUEST, "malformed_batch_input", e.to_string()),
            ApiError::Form(e) => (StatusCode::UNPROCESSABLE_ENTITY, "out_of_range", e.to_string()),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, "malformed_batch_input", m.clone()),
            ApiError::Rejected {
                status,
                kind,
                message,
            } => (*status, *kind, message.clone()),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", m.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = self.parts();
        metrics::record_error(kind);
        warn!(target: "attrition", status = status.as_u16(), kind, %message, "request failed");
        (
            status,
            Json(ErrorBody {
                error: kind,
                message,
            }),
        )
            .into_response()
    }
}

/* ----------------------------
Info + options
---------------------------- */

#[derive(Serialize)]
struct ModelInfo {
    model: String,
    features: Vec<String>,
    threshold: f64,
}

async fn model_info(State(state): State<AppState>) -> Json<ModelInfo> {
    let p = &state.pipeline;
    Json(ModelInfo {
        model: p.predictor().name().to_string(),
        features: p.feature_order().to_vec(),
        threshold: p.threshold(),
    })
}

async fn options(State(state): State<AppState>) -> Json<FormOptions> {
    Json(form_options(state.pipeline.encoder(), state.config.bounds))
}

/* ----------------------------
Single record
---------------------------- */

#[derive(Serialize)]
struct Employee {
    name: String,
    surname: String,
    id_number: String,
}

#[derive(Serialize)]
struct SingleResponse {
    employee: Employee,
    label: u8,
    probability: f64,
    confidence: f64,
    verdict: Verdict,
    verdict_label: &'static str,
    message: String,
    gauge: GaugeReading,
    predictor_label: u8,
}

async fn predict_single(
    State(state): State<AppState>,
    payload: Result<Json<SingleRecordForm>, JsonRejection>,
) -> Result<Json<SingleResponse>, ApiError> {
    metrics::record_request("predict");
    let Json(form) = payload?;
    form.validate(&state.config.bounds)?;

    let record = form.into_record();
    let anon = record.anon_id();
    let scored = state.pipeline.score_one(record)?;
    let r = scored.result;
    let verdict = r.verdict();
    info!(target: "attrition", employee = %anon, label = r.label, probability = r.probability, "single prediction");

    Ok(Json(SingleResponse {
        employee: Employee {
            name: scored.record.cell("Name"),
            surname: scored.record.cell("Surname"),
            id_number: scored.record.cell("IDNumber"),
        },
        label: r.label,
        probability: r.probability,
        confidence: r.confidence(),
        verdict,
        verdict_label: verdict.label(),
        message: format!("{} (Confidence: {})", verdict.message(), table::format_confidence(r.confidence())),
        gauge: state.pipeline.gauge(&r),
        predictor_label: scored.predictor_label,
    }))
}

/* ----------------------------
Batch
---------------------------- */

#[derive(Debug, Default, Deserialize)]
pub struct BatchQuery {
    /// `csv` for a file download; JSON otherwise.
    #[serde(default)]
    pub format: Option<String>,
}

impl BatchQuery {
    fn wants_csv(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("csv"))
    }
}

#[derive(Serialize)]
struct GroupChart {
    group: String,
    slices: Vec<ChartSlice>,
}

#[derive(Serialize)]
struct BatchResponse {
    rows: usize,
    display_columns: Vec<String>,
    columns: Vec<String>,
    records: Vec<EmployeeRecord>,
    summary: BatchSummary,
    overall_chart: Vec<ChartSlice>,
    group_charts: Vec<GroupChart>,
    predictor_disagreements: usize,
}

async fn predict_records(
    State(state): State<AppState>,
    Query(q): Query<BatchQuery>,
    payload: Result<Json<Vec<EmployeeRecord>>, JsonRejection>,
) -> Result<Response, ApiError> {
    metrics::record_request("predict_records");
    let Json(records) = payload?;
    if records.is_empty() {
        return Err(ApiError::BadRequest("no records supplied".into()));
    }
    // column order = first appearance across records
    let mut columns: Vec<String> = Vec::new();
    for r in &records {
        for f in r.field_names() {
            if !columns.iter().any(|c| c == f) {
                columns.push(f.to_string());
            }
        }
    }
    run_batch(state, table::Table { columns, rows: records }, &q).await
}

async fn predict_batch_csv(
    State(state): State<AppState>,
    Query(q): Query<BatchQuery>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    metrics::record_request("predict_batch");
    let parsed = table::parse_csv(&body?)?;
    run_batch(state, parsed, &q).await
}

async fn predict_upload(
    State(state): State<AppState>,
    Query(q): Query<BatchQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    metrics::record_request("predict_upload");
    let mut multipart = multipart?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::multipart(e, "invalid multipart body"))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::multipart(e, "cannot read uploaded file"))?;
            let parsed = table::parse_csv(&bytes)?;
            return run_batch(state, parsed, &q).await;
        }
    }
    Err(ApiError::BadRequest("multipart body has no 'file' field".into()))
}

async fn run_batch(state: AppState, input: table::Table, q: &BatchQuery) -> Result<Response, ApiError> {
    let table::Table { columns, rows } = input;
    let n = rows.len();

    // scoring is CPU-bound; keep it off the async workers
    let pipeline = state.pipeline.clone();
    let scored = tokio::task::spawn_blocking(move || pipeline.score(rows))
        .await
        .map_err(|e| ApiError::Internal(format!("scoring task failed: {e}")))??;
    info!(target: "attrition", rows = n, "batch prediction");

    if q.wants_csv() {
        let bytes = table::export_csv(&columns, &scored)?;
        return Ok((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", table::DOWNLOAD_FILE_NAME),
                ),
            ],
            bytes,
        )
            .into_response());
    }

    let summary = summarize(&scored, state.config.group_field.as_deref());
    let group_charts = summary
        .group_slices()
        .into_iter()
        .map(|(group, slices)| GroupChart { group, slices })
        .collect();
    let resp = BatchResponse {
        rows: n,
        display_columns: table::display_columns(&columns),
        columns: table::output_columns(&columns),
        records: scored.iter().map(table::output_record).collect(),
        overall_chart: summary.overall_slices(),
        group_charts,
        predictor_disagreements: scored.iter().filter(|s| s.disagrees()).count(),
        summary,
    };
    Ok(Json(resp).into_response())
}
