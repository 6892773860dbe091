//! Telemetry submitted with an attempt
//!
//! Validation rejects malformed batches before scoring sees them:
//! negative counts or times, consistency scores outside [0, 1],
//! negative focus metrics and empty answer sets.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TelemetryBatch {
    #[validate(
        length(min = 1, message = "at least one answer is required"),
        custom(function = "distinct_indexes"),
        nested
    )]
    pub answers: Vec<QuestionAnswer>,
    #[serde(default)]
    #[validate(nested)]
    pub cognitive: CognitiveSignals,
    #[serde(default)]
    #[validate(nested)]
    pub surveillance: SurveillanceMetrics,
    #[serde(default)]
    #[validate(nested)]
    pub alerts: Vec<AlertEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct QuestionAnswer {
    #[validate(range(min = 0))]
    pub index: i64,
    pub chosen_value: String,
    #[validate(range(min = 0))]
    pub response_time_ms: i64,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct CognitiveSignals {
    #[serde(default)]
    pub response_patterns: Vec<i64>,
    #[serde(default)]
    #[validate(custom(function = "non_negative_ints"))]
    pub hesitation_times_ms: Vec<i64>,
    #[serde(default)]
    #[validate(custom(function = "unit_interval"))]
    pub consistency_scores: Vec<f64>,
    #[serde(default)]
    #[validate(custom(function = "non_negative_reals"))]
    pub focus_metrics: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct SurveillanceMetrics {
    #[serde(default)]
    #[validate(range(min = 0))]
    pub face_detections: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub position_violations: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub speech_detections: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub multiple_persons_detected: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub total_checks: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AlertEvent {
    #[validate(length(max = 1000))]
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[validate(range(min = 0))]
    pub timestamp_ms: i64,
}

/// Each question may be answered once per batch
#[allow(clippy::ptr_arg)]
fn distinct_indexes(answers: &Vec<QuestionAnswer>) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(answers.len());
    if answers.iter().any(|a| !seen.insert(a.index)) {
        return Err(ValidationError::new("duplicate_question_index"));
    }
    Ok(())
}

#[allow(clippy::ptr_arg)]
fn non_negative_ints(values: &Vec<i64>) -> Result<(), ValidationError> {
    if values.iter().any(|v| *v < 0) {
        return Err(ValidationError::new("negative_value"));
    }
    Ok(())
}

#[allow(clippy::ptr_arg)]
fn unit_interval(values: &Vec<f64>) -> Result<(), ValidationError> {
    if values.iter().any(|v| !v.is_finite() || *v < 0.0 || *v > 1.0) {
        return Err(ValidationError::new("outside_unit_interval"));
    }
    Ok(())
}

#[allow(clippy::ptr_arg)]
fn non_negative_reals(values: &Vec<f64>) -> Result<(), ValidationError> {
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(ValidationError::new("negative_value"));
    }
    Ok(())
}
