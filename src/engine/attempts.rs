//! Attempt engine
//!
//! Orchestrates the attempt lifecycle over the document store. Every
//! mutation of one attempt runs inside that attempt's critical section
//! and lands as a single [`WriteBatch`]: the attempt write, its audit
//! records, the signature and the notification outbox entry commit
//! together or not at all.
//!
//! Lock keys: attempt id, `assessment:<id>` (start vs. cascade delete)
//! and `student:<id>` (profile update on submit, always taken after the
//! attempt lock). Locks are process-local; across processes the
//! version-checked updates turn a lost race into `Conflict`, but two
//! processes may still both create an attempt for the same pair.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use super::locks::KeyedLocks;
use super::policy::{EscalationDecision, EscalationPolicy};
use crate::config::EngineConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    Assessment, AssessmentDeletion, Attempt, AttemptState, FraudReport, FraudSignalOutcome,
    FraudSignalRequest, FraudStatus, Notification, Signature, StartAttemptRequest,
    StartAttemptResponse, StartStatus, StudentAnalytics, StudentProfile, SubmissionReceipt,
    TelemetryBatch, TERMINATION_FRAUD,
};
use crate::notify::Notifier;
use crate::scoring::{self, IntegrityScorer};
use crate::store::{self, collections, DocumentStore, Versioned, WriteBatch, WriteOp};

fn assessment_lock(assessment_id: &str) -> String {
    format!("assessment:{}", assessment_id)
}

fn student_lock(student_id: &str) -> String {
    format!("student:{}", student_id)
}

pub struct AttemptEngine {
    store: Arc<dyn DocumentStore>,
    notifier: Arc<dyn Notifier>,
    policy: EscalationPolicy,
    scorer: IntegrityScorer,
    locks: KeyedLocks,
    config: EngineConfig,
}

impl AttemptEngine {
    pub fn new(store: Arc<dyn DocumentStore>, notifier: Arc<dyn Notifier>, config: EngineConfig) -> Self {
        Self {
            store,
            notifier,
            policy: EscalationPolicy::new(config.fraud_threshold),
            scorer: IntegrityScorer::new(config.integrity_penalty),
            locks: KeyedLocks::new(),
            config,
        }
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    // ========================================================================
    // START
    // ========================================================================

    /// Start a new attempt, or resume the one already in progress
    pub async fn start_attempt(&self, req: StartAttemptRequest) -> AppResult<StartAttemptResponse> {
        req.validate()?;

        // Held across the existence check and the insert so a cascade
        // delete cannot slip in between
        let _guard = self
            .locks
            .acquire(&assessment_lock(&req.assessment_id), self.config.lock_timeout)
            .await?;

        self.require::<Assessment>(collections::ASSESSMENTS, &req.assessment_id, "assessment")
            .await?;

        let pair_key = Attempt::pair_key(&req.assessment_id, &req.student_id);
        let existing: Vec<Attempt> = self
            .find(collections::ATTEMPTS, "pair_key", &pair_key)
            .await?;

        if existing.iter().any(|a| a.state == AttemptState::Terminated) {
            tracing::warn!(
                "Blocked restart of {} for student {} after fraud termination",
                req.assessment_id, req.student_id
            );
            return Err(AppError::AttemptBlocked(format!(
                "student {} was terminated on assessment {} and may not restart",
                req.student_id, req.assessment_id
            )));
        }

        if let Some(attempt) = existing.into_iter().find(|a| a.state == AttemptState::InProgress) {
            tracing::debug!("Resumed attempt {}", attempt.attempt_id);
            return Ok(StartAttemptResponse {
                attempt,
                status: StartStatus::Resumed,
            });
        }

        let attempt = Attempt::begin(&req.assessment_id, &req.student_id, Utc::now());
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::insert(
            collections::ATTEMPTS,
            attempt.attempt_id.to_string(),
            &attempt,
        )?);
        self.commit(batch).await?;

        tracing::info!(
            "Started attempt {} ({} / {})",
            attempt.attempt_id, attempt.assessment_id, attempt.student_id
        );

        Ok(StartAttemptResponse {
            attempt,
            status: StartStatus::Started,
        })
    }

    // ========================================================================
    // FRAUD SIGNALS
    // ========================================================================

    pub async fn record_fraud_signal(
        &self,
        attempt_id: Uuid,
        req: FraudSignalRequest,
    ) -> AppResult<FraudSignalOutcome> {
        req.validate()?;

        let key = attempt_id.to_string();
        let guard = self.locks.acquire(&key, self.config.lock_timeout).await?;

        let Versioned { value: mut attempt, version } = self
            .require::<Attempt>(collections::ATTEMPTS, &key, "attempt")
            .await?;

        let now = Utc::now();
        let fraud_count = attempt.register_fraud(now)?;
        let decision = self.policy.decide(fraud_count);

        let report = FraudReport::for_signal(&attempt, req.violation, req.detail, now);

        let mut outbox: Option<Notification> = None;
        if decision == EscalationDecision::Terminate {
            attempt.terminate(TERMINATION_FRAUD, now)?;

            match self
                .fetch::<Assessment>(collections::ASSESSMENTS, &attempt.assessment_id)
                .await?
            {
                Some(assessment) => {
                    let request = self.policy.notification_for(&attempt, &assessment.value.owner_id);
                    outbox = Some(request.into_notification(now));
                }
                None => tracing::warn!(
                    "Assessment {} missing, no owner to notify for attempt {}",
                    attempt.assessment_id, attempt_id
                ),
            }
        }

        let mut batch = WriteBatch::new();
        batch
            .push(WriteOp::update(collections::ATTEMPTS, key.as_str(), &attempt, version)?)
            .push(WriteOp::insert(
                collections::FRAUD_REPORTS,
                report.report_id.to_string(),
                &report,
            )?);
        if let Some(notification) = &outbox {
            batch.push(WriteOp::insert(
                collections::NOTIFICATIONS,
                notification.notification_id.to_string(),
                notification,
            )?);
        }
        self.commit(batch).await?;
        drop(guard);

        let outcome = match decision {
            EscalationDecision::Warn => {
                tracing::warn!(
                    "Fraud warning {}/{} on attempt {} ({})",
                    fraud_count, self.policy.threshold(), attempt_id, req.violation
                );
                FraudSignalOutcome {
                    attempt_id,
                    fraud_count,
                    status: FraudStatus::Warning,
                    message: format!(
                        "Warning {} of {}: further violations will end the attempt",
                        fraud_count,
                        self.policy.threshold()
                    ),
                }
            }
            EscalationDecision::Terminate => {
                tracing::warn!(
                    "Attempt {} terminated after {} fraud signals",
                    attempt_id, fraud_count
                );
                FraudSignalOutcome {
                    attempt_id,
                    fraud_count,
                    status: FraudStatus::Terminated,
                    message: "Attempt terminated: fraud detected".to_string(),
                }
            }
        };

        if let Some(notification) = outbox {
            self.deliver(&notification).await;
        }

        Ok(outcome)
    }

    // ========================================================================
    // SUBMISSION
    // ========================================================================

    pub async fn submit_attempt(
        &self,
        attempt_id: Uuid,
        telemetry: TelemetryBatch,
    ) -> AppResult<SubmissionReceipt> {
        telemetry.validate()?;

        let key = attempt_id.to_string();
        let _guard = self.locks.acquire(&key, self.config.lock_timeout).await?;

        let Versioned { value: mut attempt, version } = self
            .require::<Attempt>(collections::ATTEMPTS, &key, "attempt")
            .await?;
        attempt.ensure_in_progress("submit")?;

        // Attempts of one student share the profile document
        let _student_guard = self
            .locks
            .acquire(&student_lock(&attempt.student_id), self.config.lock_timeout)
            .await?;

        let Versioned { value: mut profile, version: profile_version } = self
            .require::<StudentProfile>(collections::STUDENTS, &attempt.student_id, "student")
            .await?;

        let now = Utc::now();
        let evaluation = scoring::evaluate(&telemetry, &self.scorer);
        let violation_total = evaluation.metrics.violation_total;

        let answers: BTreeMap<String, String> = telemetry
            .answers
            .iter()
            .map(|a| (a.index.to_string(), a.chosen_value.clone()))
            .collect();

        let report = (violation_total > 0)
            .then(|| FraudReport::for_submission(&attempt, &telemetry.surveillance, violation_total, now));

        let signature = evaluation.into_signature(&attempt, telemetry, now);
        attempt.complete(answers, now)?;
        profile.record_completion(&signature, now);

        let mut batch = WriteBatch::new();
        batch
            .push(WriteOp::update(collections::ATTEMPTS, key.as_str(), &attempt, version)?)
            .push(WriteOp::insert(collections::SIGNATURES, key.as_str(), &signature)?)
            .push(WriteOp::update(
                collections::STUDENTS,
                profile.student_id.as_str(),
                &profile,
                profile_version,
            )?);
        if let Some(report) = &report {
            batch.push(WriteOp::insert(
                collections::FRAUD_REPORTS,
                report.report_id.to_string(),
                report,
            )?);
        }
        self.commit(batch).await?;

        tracing::info!(
            "Attempt {} completed: {} {} integrity {:.2} ({})",
            attempt_id,
            signature.signature_id,
            signature.cognitive_type,
            signature.integrity_score,
            signature.violation_severity.as_str()
        );

        Ok(SubmissionReceipt {
            attempt,
            signature,
            fraud_report_id: report.map(|r| r.report_id),
        })
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub async fn get_attempt(&self, attempt_id: Uuid) -> AppResult<Attempt> {
        let attempt = self
            .require::<Attempt>(collections::ATTEMPTS, &attempt_id.to_string(), "attempt")
            .await?;
        Ok(attempt.value)
    }

    pub async fn get_signature(&self, attempt_id: Uuid) -> AppResult<Signature> {
        let signature = self
            .require::<Signature>(collections::SIGNATURES, &attempt_id.to_string(), "signature")
            .await?;
        Ok(signature.value)
    }

    /// All signatures of one student, newest first
    pub async fn signatures_for_student(&self, student_id: &str) -> AppResult<Vec<Signature>> {
        let mut signatures: Vec<Signature> = self
            .find(collections::SIGNATURES, "student_id", student_id)
            .await?;
        signatures.reverse();
        Ok(signatures)
    }

    pub async fn student_analytics(&self, student_id: &str) -> AppResult<StudentAnalytics> {
        let profile = self
            .require::<StudentProfile>(collections::STUDENTS, student_id, "student")
            .await?
            .value;
        let signatures = self.signatures_for_student(student_id).await?;
        let fraud_reports: Vec<FraudReport> = self
            .find(collections::FRAUD_REPORTS, "student_id", student_id)
            .await?;

        Ok(StudentAnalytics {
            profile,
            signatures,
            fraud_count: fraud_reports.len(),
            fraud_reports,
        })
    }

    // ========================================================================
    // ADMIN
    // ========================================================================

    /// Remove an assessment together with its attempts.
    /// Signatures and fraud reports stay as audit records.
    pub async fn delete_assessment(&self, assessment_id: &str) -> AppResult<AssessmentDeletion> {
        let _guard = self
            .locks
            .acquire(&assessment_lock(assessment_id), self.config.lock_timeout)
            .await?;

        self.require::<Assessment>(collections::ASSESSMENTS, assessment_id, "assessment")
            .await?;

        let attempts: Vec<Attempt> = self
            .find(collections::ATTEMPTS, "assessment_id", assessment_id)
            .await?;

        let mut batch = WriteBatch::new();
        for attempt in &attempts {
            batch.push(WriteOp::delete(collections::ATTEMPTS, attempt.attempt_id.to_string()));
        }
        batch.push(WriteOp::delete(collections::ASSESSMENTS, assessment_id));
        self.commit(batch).await?;

        tracing::info!(
            "Deleted assessment {} and {} attempts",
            assessment_id,
            attempts.len()
        );

        Ok(AssessmentDeletion {
            assessment_id: assessment_id.to_string(),
            attempts_removed: attempts.len(),
        })
    }

    // ========================================================================
    // STORE ACCESS
    // ========================================================================

    async fn fetch<T: DeserializeOwned>(
        &self,
        collection: &str,
        key: &str,
    ) -> AppResult<Option<Versioned<T>>> {
        let doc = store::bounded(self.config.store_timeout, self.store.get(collection, key)).await?;
        Ok(doc.as_ref().map(Versioned::<T>::from_document).transpose()?)
    }

    async fn require<T: DeserializeOwned>(
        &self,
        collection: &str,
        key: &str,
        what: &str,
    ) -> AppResult<Versioned<T>> {
        self.fetch(collection, key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} '{}' not found", what, key)))
    }

    async fn find<T: DeserializeOwned>(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> AppResult<Vec<T>> {
        let value = Value::String(value.to_string());
        let docs = store::bounded(
            self.config.store_timeout,
            self.store.query_by_field(collection, field, &value),
        )
        .await?;

        docs.iter()
            .map(|doc| doc.decode().map_err(AppError::from))
            .collect()
    }

    async fn commit(&self, batch: WriteBatch) -> AppResult<()> {
        store::bounded(self.config.store_timeout, self.store.commit(batch)).await?;
        Ok(())
    }

    /// Best-effort delivery; failures are logged, never returned
    async fn deliver(&self, notification: &Notification) {
        let send = self
            .notifier
            .send(&notification.teacher_id, &notification.message);

        match tokio::time::timeout(self.config.store_timeout, send).await {
            Ok(Ok(())) => tracing::info!(
                "Notified {} about attempt {}",
                notification.teacher_id, notification.attempt_id
            ),
            Ok(Err(e)) => tracing::warn!(
                "Notification {} not delivered: {}",
                notification.notification_id, e
            ),
            Err(_) => tracing::warn!(
                "Notification {} timed out",
                notification.notification_id
            ),
        }
    }
}
