//! Assessment handlers

use axum::{extract::{State, Path}, Json};

use crate::{AppState, AppResult};
use crate::models::AssessmentDeletion;

/// Delete an assessment and its attempts
pub async fn delete(
    State(state): State<AppState>,
    Path(assessment_id): Path<String>,
) -> AppResult<Json<AssessmentDeletion>> {
    let deletion = state.engine.delete_assessment(&assessment_id).await?;
    Ok(Json(deletion))
}
