//! Assessment and student profile models
//!
//! Authored elsewhere; the engine only reads assessments (for the owner
//! to notify) and updates the completion fields of student profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signature::{CognitiveType, Signature};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentKind {
    Exam,
    Quiz,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub assessment_id: String,
    /// Teacher who owns the assessment and receives fraud alerts
    pub owner_id: String,
    pub title: String,
    pub kind: AssessmentKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student_id: String,
    pub name: String,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub has_completed_test: bool,
    #[serde(default)]
    pub last_test_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_accuracy: Option<f64>,
    #[serde(default)]
    pub last_cognitive_type: Option<CognitiveType>,
}

impl StudentProfile {
    pub fn record_completion(&mut self, signature: &Signature, now: DateTime<Utc>) {
        self.has_completed_test = true;
        self.last_test_date = Some(now);
        self.last_accuracy = Some(signature.accuracy);
        self.last_cognitive_type = Some(signature.cognitive_type);
    }
}

/// Result of an administrative cascade delete
#[derive(Debug, Serialize)]
pub struct AssessmentDeletion {
    pub assessment_id: String,
    pub attempts_removed: usize,
}
