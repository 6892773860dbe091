//! Signature model
//!
//! Durable behavioral profile derived from one submitted attempt.
//! Stored under the attempt id, so a second submission cannot create
//! another one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::assessment::StudentProfile;
use super::attempt::Attempt;
use super::fraud_report::FraudReport;
use super::telemetry::TelemetryBatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CognitiveType {
    Analytical,
    Auditory,
    Kinesthetic,
    Visual,
}

impl CognitiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CognitiveType::Analytical => "ANALYTICAL",
            CognitiveType::Auditory => "AUDITORY",
            CognitiveType::Kinesthetic => "KINESTHETIC",
            CognitiveType::Visual => "VISUAL",
        }
    }
}

impl std::fmt::Display for CognitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationSeverity {
    Low,
    Medium,
    High,
}

impl ViolationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationSeverity::Low => "LOW",
            ViolationSeverity::Medium => "MEDIUM",
            ViolationSeverity::High => "HIGH",
        }
    }
}

/// How strongly one response pattern dominates the sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternStability {
    Serious,
    Strategic,
    Random,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub signature_id: String,
    pub attempt_id: Uuid,
    pub student_id: String,
    pub assessment_id: String,
    pub accuracy: f64,
    pub mean_response_time_ms: f64,
    pub consistency: f64,
    pub focus: f64,
    pub cognitive_type: CognitiveType,
    pub dominant_pattern: Option<i64>,
    pub pattern_stability: PatternStability,
    pub violation_total: u64,
    pub integrity_score: f64,
    pub violation_severity: ViolationSeverity,
    /// Raw telemetry kept for audit
    pub telemetry: TelemetryBatch,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionReceipt {
    pub attempt: Attempt,
    pub signature: Signature,
    pub fraud_report_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct StudentAnalytics {
    pub profile: StudentProfile,
    pub signatures: Vec<Signature>,
    pub fraud_reports: Vec<FraudReport>,
    pub fraud_count: usize,
}
