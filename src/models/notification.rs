//! Teacher notification (outbox record)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FraudAlert,
}

/// Written in the same commit as the transition that caused it,
/// delivered through the notifier afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: Uuid,
    pub kind: NotificationKind,
    pub teacher_id: String,
    pub student_id: String,
    pub assessment_id: String,
    pub attempt_id: Uuid,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
