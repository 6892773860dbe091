//! Fraud report model
//!
//! Append-only audit records. One per recorded fraud signal, plus one
//! per submission whose telemetry carries surveillance violations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attempt::Attempt;
use super::telemetry::SurveillanceMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    PositionViolation,
    SpeechDetected,
    MultiplePersons,
    FaceNotVisible,
    /// Violations found in telemetry uploaded at submission
    SurveillanceSummary,
    Other,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::PositionViolation => "position_violation",
            ViolationKind::SpeechDetected => "speech_detected",
            ViolationKind::MultiplePersons => "multiple_persons",
            ViolationKind::FaceNotVisible => "face_not_visible",
            ViolationKind::SurveillanceSummary => "surveillance_summary",
            ViolationKind::Other => "other",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-kind violation counts from submitted telemetry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationBreakdown {
    pub position_violations: i64,
    pub speech_detections: i64,
    pub multiple_persons_detected: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudReport {
    pub report_id: Uuid,
    pub attempt_id: Uuid,
    pub student_id: String,
    pub assessment_id: String,
    pub violation_kind: ViolationKind,
    pub count: u64,
    pub detail: Option<String>,
    pub breakdown: Option<ViolationBreakdown>,
    pub created_at: DateTime<Utc>,
}

impl FraudReport {
    /// Audit record for one in-flight fraud signal
    pub fn for_signal(
        attempt: &Attempt,
        kind: ViolationKind,
        detail: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            report_id: Uuid::new_v4(),
            attempt_id: attempt.attempt_id,
            student_id: attempt.student_id.clone(),
            assessment_id: attempt.assessment_id.clone(),
            violation_kind: kind,
            count: u64::from(attempt.fraud_count),
            detail,
            breakdown: None,
            created_at: now,
        }
    }

    /// Audit record for violations found at submission time
    pub fn for_submission(
        attempt: &Attempt,
        surveillance: &SurveillanceMetrics,
        violation_total: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            report_id: Uuid::new_v4(),
            attempt_id: attempt.attempt_id,
            student_id: attempt.student_id.clone(),
            assessment_id: attempt.assessment_id.clone(),
            violation_kind: ViolationKind::SurveillanceSummary,
            count: violation_total,
            detail: None,
            breakdown: Some(ViolationBreakdown {
                position_violations: surveillance.position_violations,
                speech_detections: surveillance.speech_detections,
                multiple_persons_detected: surveillance.multiple_persons_detected,
            }),
            created_at: now,
        }
    }
}
