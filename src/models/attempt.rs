//! Attempt model
//!
//! One student's engagement with one assessment. The transition methods
//! here are pure; persistence and locking live in `engine::attempts`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::fraud_report::ViolationKind;
use crate::error::{AppError, AppResult};

/// Termination reason recorded when the escalation policy ends an attempt
pub const TERMINATION_FRAUD: &str = "fraud_detected";

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    NotStarted,
    InProgress,
    Completed,
    Terminated,
}

impl AttemptState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptState::NotStarted => "not_started",
            AttemptState::InProgress => "in_progress",
            AttemptState::Completed => "completed",
            AttemptState::Terminated => "terminated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::Completed | AttemptState::Terminated)
    }

    pub fn can_transition_to(&self, next: AttemptState) -> bool {
        matches!(
            (self, next),
            (AttemptState::NotStarted, AttemptState::InProgress)
                | (AttemptState::InProgress, AttemptState::Completed)
                | (AttemptState::InProgress, AttemptState::Terminated)
        )
    }
}

impl std::fmt::Display for AttemptState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// ATTEMPT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub attempt_id: Uuid,
    pub assessment_id: String,
    pub student_id: String,
    /// `assessment_id` + `student_id`, indexed for lookups on start
    pub pair_key: String,
    pub state: AttemptState,
    pub fraud_count: u32,
    pub started_at: DateTime<Utc>,
    pub last_fraud_at: Option<DateTime<Utc>>,
    pub terminated_at: Option<DateTime<Utc>>,
    pub termination_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
}

impl Attempt {
    pub fn pair_key(assessment_id: &str, student_id: &str) -> String {
        format!("{}/{}", assessment_id, student_id)
    }

    /// New attempt, already in progress
    pub fn begin(assessment_id: &str, student_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            assessment_id: assessment_id.to_string(),
            student_id: student_id.to_string(),
            pair_key: Self::pair_key(assessment_id, student_id),
            state: AttemptState::InProgress,
            fraud_count: 0,
            started_at: now,
            last_fraud_at: None,
            terminated_at: None,
            termination_reason: None,
            completed_at: None,
            answers: BTreeMap::new(),
        }
    }

    pub fn ensure_in_progress(&self, operation: &str) -> AppResult<()> {
        if self.state != AttemptState::InProgress {
            return Err(AppError::InvalidState(format!(
                "cannot {} attempt {} in state {}",
                operation, self.attempt_id, self.state
            )));
        }
        Ok(())
    }

    /// Count one more fraud signal; returns the new count
    pub fn register_fraud(&mut self, now: DateTime<Utc>) -> AppResult<u32> {
        self.ensure_in_progress("flag")?;
        self.fraud_count = self.fraud_count.saturating_add(1);
        self.last_fraud_at = Some(now);
        Ok(self.fraud_count)
    }

    pub fn terminate(&mut self, reason: &str, now: DateTime<Utc>) -> AppResult<()> {
        self.transition(AttemptState::Terminated)?;
        self.terminated_at = Some(now);
        self.termination_reason = Some(reason.to_string());
        Ok(())
    }

    pub fn complete(&mut self, answers: BTreeMap<String, String>, now: DateTime<Utc>) -> AppResult<()> {
        self.transition(AttemptState::Completed)?;
        self.answers = answers;
        self.completed_at = Some(now);
        Ok(())
    }

    fn transition(&mut self, next: AttemptState) -> AppResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(AppError::InvalidState(format!(
                "attempt {} cannot move from {} to {}",
                self.attempt_id, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }
}

// ============================================================================
// REQUESTS / RESPONSES
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct StartAttemptRequest {
    #[validate(length(min = 1, max = 128))]
    pub assessment_id: String,
    #[validate(length(min = 1, max = 128))]
    pub student_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartStatus {
    Started,
    Resumed,
}

#[derive(Debug, Serialize)]
pub struct StartAttemptResponse {
    pub attempt: Attempt,
    pub status: StartStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FraudSignalRequest {
    pub violation: ViolationKind,
    #[validate(length(max = 500))]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudStatus {
    Warning,
    Terminated,
}

#[derive(Debug, Serialize)]
pub struct FraudSignalOutcome {
    pub attempt_id: Uuid,
    pub fraud_count: u32,
    pub status: FraudStatus,
    pub message: String,
}
