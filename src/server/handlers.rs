//! HTTP request handlers

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    response::{Html, IntoResponse},
    Json,
};
use serde_json::json;
use tracing::info;

use crate::error::{ClassifierError, Result};
use crate::metrics::MetricsSnapshot;
use crate::models::classify;
use crate::types::{Prediction, PredictionResponse, UploadedImage};

use super::state::AppState;

/// Multipart field carrying the image
pub const FILE_FIELD: &str = "file";

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Serve the upload page
pub async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Classify an uploaded image
pub async fn predict(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>> {
    let started = Instant::now();
    state.metrics.record_request();

    match run_prediction(&state, multipart).await {
        Ok(prediction) => {
            let latency = started.elapsed();
            state
                .metrics
                .record_prediction(prediction.label, prediction.score, latency);
            info!(
                prediction = %prediction.label,
                score = prediction.score,
                latency_us = latency.as_micros() as u64,
                "Prediction served"
            );
            Ok(Json(prediction.into()))
        }
        Err(e) => {
            state.metrics.record_failure(e.kind());
            Err(e)
        }
    }
}

async fn run_prediction(
    state: &Arc<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Prediction> {
    let mut multipart = multipart?;
    let upload = read_upload(&mut multipart).await?;
    let scratch_file = state.scratch.persist(&upload).await?;

    // Decoding and inference are CPU-bound. The scratch file moves into the
    // blocking task so it is cleaned up even if this request is dropped.
    let worker = Arc::clone(state);
    tokio::task::spawn_blocking(move || {
        let tensor = worker.preprocessor.preprocess_file(scratch_file.path())?;
        classify(worker.predictor.as_ref(), &tensor, worker.threshold)
    })
    .await
    .map_err(|e| ClassifierError::Inference(format!("inference task failed: {}", e)))?
}

/// Pull the `file` field out of the form, skipping any other fields
async fn read_upload(multipart: &mut Multipart) -> Result<UploadedImage> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;

        info!(
            file_name = file_name.as_deref().unwrap_or(""),
            bytes = bytes.len(),
            "Received upload"
        );
        return Ok(UploadedImage::new(file_name, bytes));
    }

    Err(ClassifierError::MissingFile(FILE_FIELD))
}

/// Liveness check
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "model": state.predictor.name(),
        "uptime_secs": state.metrics.uptime().as_secs(),
    }))
}

/// Current request metrics
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
