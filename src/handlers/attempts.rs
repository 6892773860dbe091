//! Attempt handlers

use axum::{extract::{State, Path}, http::StatusCode, Json};
use uuid::Uuid;

use crate::{AppState, AppResult};
use crate::models::{
    Attempt, FraudSignalOutcome, FraudSignalRequest, Signature, StartAttemptRequest,
    StartAttemptResponse, StartStatus, SubmissionReceipt, TelemetryBatch,
};

/// Start or resume an attempt
pub async fn start(
    State(state): State<AppState>,
    Json(req): Json<StartAttemptRequest>,
) -> AppResult<(StatusCode, Json<StartAttemptResponse>)> {
    let response = state.engine.start_attempt(req).await?;
    let status = match response.status {
        StartStatus::Started => StatusCode::CREATED,
        StartStatus::Resumed => StatusCode::OK,
    };

    Ok((status, Json(response)))
}

/// Get single attempt
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Attempt>> {
    let attempt = state.engine.get_attempt(id).await?;
    Ok(Json(attempt))
}

/// Report a proctoring violation
pub async fn fraud_signal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<FraudSignalRequest>,
) -> AppResult<Json<FraudSignalOutcome>> {
    let outcome = state.engine.record_fraud_signal(id, req).await?;
    Ok(Json(outcome))
}

/// Submit answers and telemetry
pub async fn submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(telemetry): Json<TelemetryBatch>,
) -> AppResult<(StatusCode, Json<SubmissionReceipt>)> {
    let receipt = state.engine.submit_attempt(id, telemetry).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn signature(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Signature>> {
    let signature = state.engine.get_signature(id).await?;
    Ok(Json(signature))
}
