//! Student handlers

use axum::{extract::{State, Path}, Json};

use crate::{AppState, AppResult};
use crate::models::{Signature, StudentAnalytics};

/// Signatures for a student, newest first
pub async fn signatures(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> AppResult<Json<Vec<Signature>>> {
    let signatures = state.engine.signatures_for_student(&student_id).await?;
    Ok(Json(signatures))
}

pub async fn analytics(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> AppResult<Json<StudentAnalytics>> {
    let analytics = state.engine.student_analytics(&student_id).await?;
    Ok(Json(analytics))
}
