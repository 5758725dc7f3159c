//! HTTP request handlers

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::pipeline::PredictError;
use crate::schema::{self, SchemaMetadata};
use crate::types::prediction::{PredictionResult, SinglePredictionResponse};
use crate::types::record::{HeartInput, RawRecord};

use super::error::{Result, ServerError};
use super::state::AppState;
use super::upload::{parse_upload, FileFormat};

/// Health check
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Cardiovascular Disease Predictor API is running",
        "model_loaded": state.artifacts.is_ready(),
        "uptime_secs": state.uptime_secs(),
    }))
}

/// Field metadata for client dropdowns
pub async fn get_metadata() -> Json<SchemaMetadata> {
    Json(schema::metadata())
}

/// Predict risk for a single patient
pub async fn predict_single(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<HeartInput>, JsonRejection>,
) -> Result<Json<SinglePredictionResponse>> {
    let Json(input) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let start = Instant::now();

    let (_, results) = predict_records(state, vec![RawRecord::from(input)]).await?;
    let result = results
        .first()
        .ok_or_else(|| ServerError::Internal("Model returned no prediction".to_string()))?;
    let response = result.to_response();

    info!(
        probability = response.probability,
        prediction = response.prediction,
        risk = ?response.risk,
        latency_us = start.elapsed().as_micros() as u64,
        "Single prediction served"
    );

    Ok(Json(response))
}

/// Predict risk for every row of an uploaded CSV or Excel file
pub async fn predict_batch(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        FileFormat::from_file_name(&file_name)?;

        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(e.to_string()))?;
        info!(file = %file_name, bytes = data.len(), "Received batch file");

        let start = Instant::now();
        let records = parse_upload(&file_name, &data)?;
        let (records, results) = predict_records(state, records).await?;

        let rows: Vec<Value> = records
            .iter()
            .zip(&results)
            .map(|(record, result)| batch_row(record, result))
            .collect();

        info!(
            file = %file_name,
            rows = rows.len(),
            high_risk = results.iter().filter(|r| r.predicted_class == 1).count(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Batch prediction served"
        );

        return Ok(Json(json!({ "results": rows })));
    }

    Err(ServerError::BadRequest("No file uploaded".to_string()))
}

/// Run the pipeline on the blocking pool; inference is CPU bound.
async fn predict_records(
    state: Arc<AppState>,
    records: Vec<RawRecord>,
) -> Result<(Vec<RawRecord>, Vec<PredictionResult>)> {
    let outcome = tokio::task::spawn_blocking(move || {
        let results = state.artifacts.predict(&records)?;
        Ok::<_, PredictError>((records, results))
    })
    .await
    .map_err(|e| ServerError::Internal(format!("Prediction task failed: {}", e)))?;

    let (records, results) = outcome?;
    debug!(rows = results.len(), "Pipeline complete");
    Ok((records, results))
}

/// Original columns with the prediction appended.
fn batch_row(record: &RawRecord, result: &PredictionResult) -> Value {
    let mut row = record.to_json_map();
    row.insert("probability".to_string(), json!(result.probability));
    row.insert("prediction".to_string(), json!(result.predicted_class));
    row.insert("risk".to_string(), json!(result.risk_label));
    Value::Object(row)
}
