//! Fraud Escalation Policy
//!
//! Monotone threshold over the running fraud count: the same sequence
//! of signals always yields the same decisions, whatever the timing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Attempt, Notification, NotificationKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationDecision {
    Warn,
    Terminate,
}

/// What the owner of the assessment should be told
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub owner_id: String,
    pub student_id: String,
    pub assessment_id: String,
    pub attempt_id: Uuid,
    pub reason: String,
}

impl NotificationRequest {
    /// Outbox record, committed together with the termination
    pub fn into_notification(self, now: DateTime<Utc>) -> Notification {
        Notification {
            notification_id: Uuid::new_v4(),
            kind: NotificationKind::FraudAlert,
            teacher_id: self.owner_id,
            student_id: self.student_id,
            assessment_id: self.assessment_id,
            attempt_id: self.attempt_id,
            message: self.reason,
            read: false,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EscalationPolicy {
    threshold: u32,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self { threshold: 2 }
    }
}

impl EscalationPolicy {
    /// A threshold of 0 would terminate before any signal; clamp to 1
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn decide(&self, fraud_count: u32) -> EscalationDecision {
        if fraud_count >= self.threshold {
            EscalationDecision::Terminate
        } else {
            EscalationDecision::Warn
        }
    }

    pub fn notification_for(&self, attempt: &Attempt, owner_id: &str) -> NotificationRequest {
        NotificationRequest {
            owner_id: owner_id.to_string(),
            student_id: attempt.student_id.clone(),
            assessment_id: attempt.assessment_id.clone(),
            attempt_id: attempt.attempt_id,
            reason: format!(
                "Fraud detected - assessment {} terminated for student {} after {} fraud signals",
                attempt.assessment_id, attempt.student_id, attempt.fraud_count
            ),
        }
    }
}
