use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use uuid::Uuid;

use super::AttemptEngine;
use crate::config::EngineConfig;
use crate::error::AppError;
use crate::models::telemetry::fixtures::batch;
use crate::models::{
    AttemptState, CognitiveType, FraudSignalRequest, FraudStatus, StartAttemptRequest,
    StartStatus, StudentProfile, ViolationKind, ViolationSeverity,
};
use crate::notify::{Notifier, NotifyError};
use crate::store::{
    collections, Document, DocumentStore, MemoryStore, StoreError, StoreResult, WriteBatch,
};

// ============================================================================
// FIXTURES
// ============================================================================

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, target_id: &str, message: &str) -> Result<(), NotifyError> {
        self.sent.lock().push((target_id.to_string(), message.to_string()));
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _target_id: &str, _message: &str) -> Result<(), NotifyError> {
        Err(NotifyError::Network("connection refused".to_string()))
    }
}

/// Reads pass through; commits fail while `fail_commits` is set
struct CommitFailingStore {
    inner: Arc<MemoryStore>,
    fail_commits: AtomicBool,
}

#[async_trait]
impl DocumentStore for CommitFailingStore {
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Document>> {
        self.inner.get(collection, key).await
    }

    async fn put(&self, collection: &str, key: &str, body: Value) -> StoreResult<Document> {
        self.inner.put(collection, key, body).await
    }

    async fn update(&self, collection: &str, key: &str, body: Value, expected_version: i64) -> StoreResult<Document> {
        self.inner.update(collection, key, body, expected_version).await
    }

    async fn query_by_field(&self, collection: &str, field: &str, value: &Value) -> StoreResult<Vec<Document>> {
        self.inner.query_by_field(collection, field, value).await
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.commit(batch).await
    }
}

/// Yields after every read, so interleavings a networked backend
/// produces also show up against the in-memory store
struct YieldingStore {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl DocumentStore for YieldingStore {
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Document>> {
        let doc = self.inner.get(collection, key).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        doc
    }

    async fn put(&self, collection: &str, key: &str, body: Value) -> StoreResult<Document> {
        self.inner.put(collection, key, body).await
    }

    async fn update(&self, collection: &str, key: &str, body: Value, expected_version: i64) -> StoreResult<Document> {
        self.inner.update(collection, key, body, expected_version).await
    }

    async fn query_by_field(&self, collection: &str, field: &str, value: &Value) -> StoreResult<Vec<Document>> {
        let docs = self.inner.query_by_field(collection, field, value).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        docs
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.inner.commit(batch).await
    }
}

async fn yielding_setup() -> (Arc<AttemptEngine>, Arc<MemoryStore>) {
    let inner = Arc::new(MemoryStore::new());
    seed(&inner).await;
    let store = Arc::new(YieldingStore { inner: inner.clone() });
    let engine = AttemptEngine::new(store, Arc::new(RecordingNotifier::default()), EngineConfig::default());
    (Arc::new(engine), inner)
}

async fn seed(store: &MemoryStore) {
    for (id, owner) in [("exam-1", "teacher-1"), ("quiz-2", "teacher-2")] {
        store
            .put(
                collections::ASSESSMENTS,
                id,
                json!({"assessment_id": id, "owner_id": owner, "title": id, "kind": "exam"}),
            )
            .await
            .unwrap();
    }
    for student in ["stu-1", "stu-2"] {
        store
            .put(
                collections::STUDENTS,
                student,
                json!({"student_id": student, "name": student.to_uppercase()}),
            )
            .await
            .unwrap();
    }
}

async fn setup_with(config: EngineConfig) -> (Arc<AttemptEngine>, Arc<MemoryStore>, Arc<RecordingNotifier>) {
    let store = Arc::new(MemoryStore::new());
    seed(&store).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = AttemptEngine::new(store.clone(), notifier.clone(), config);
    (Arc::new(engine), store, notifier)
}

async fn setup() -> (Arc<AttemptEngine>, Arc<MemoryStore>, Arc<RecordingNotifier>) {
    setup_with(EngineConfig::default()).await
}

fn start_req(assessment_id: &str, student_id: &str) -> StartAttemptRequest {
    StartAttemptRequest {
        assessment_id: assessment_id.to_string(),
        student_id: student_id.to_string(),
    }
}

fn signal(kind: ViolationKind) -> FraudSignalRequest {
    FraudSignalRequest {
        violation: kind,
        detail: None,
    }
}

async fn started(engine: &AttemptEngine, assessment_id: &str, student_id: &str) -> Uuid {
    engine
        .start_attempt(start_req(assessment_id, student_id))
        .await
        .unwrap()
        .attempt
        .attempt_id
}

// ============================================================================
// START
// ============================================================================

#[tokio::test]
async fn test_start_is_idempotent_while_in_progress() {
    let (engine, store, _) = setup().await;

    let first = engine.start_attempt(start_req("exam-1", "stu-1")).await.unwrap();
    let second = engine.start_attempt(start_req("exam-1", "stu-1")).await.unwrap();

    assert_eq!(first.status, StartStatus::Started);
    assert_eq!(second.status, StartStatus::Resumed);
    assert_eq!(first.attempt, second.attempt);
    assert_eq!(second.attempt.fraud_count, 0);
    assert_eq!(store.count(collections::ATTEMPTS), 1);
}

#[tokio::test]
async fn test_start_unknown_assessment() {
    let (engine, _, _) = setup().await;
    let result = engine.start_attempt(start_req("missing", "stu-1")).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_start_rejects_blank_ids() {
    let (engine, _, _) = setup().await;
    let result = engine.start_attempt(start_req("exam-1", "")).await;
    assert!(matches!(result, Err(AppError::ValidationError(_))));
}

#[tokio::test]
async fn test_start_blocked_after_termination() {
    let (engine, _, _) = setup().await;
    let attempt_id = started(&engine, "exam-1", "stu-1").await;

    for _ in 0..2 {
        engine.record_fraud_signal(attempt_id, signal(ViolationKind::SpeechDetected)).await.unwrap();
    }

    let result = engine.start_attempt(start_req("exam-1", "stu-1")).await;
    assert!(matches!(result, Err(AppError::AttemptBlocked(_))));

    // Other assessments are unaffected
    let other = engine.start_attempt(start_req("quiz-2", "stu-1")).await.unwrap();
    assert_eq!(other.status, StartStatus::Started);
}

#[tokio::test]
async fn test_start_after_completion_creates_new_attempt() {
    let (engine, _, _) = setup().await;
    let first = started(&engine, "exam-1", "stu-1").await;
    engine.submit_attempt(first, batch(4, 3, 1800)).await.unwrap();

    let next = engine.start_attempt(start_req("exam-1", "stu-1")).await.unwrap();
    assert_eq!(next.status, StartStatus::Started);
    assert_ne!(next.attempt.attempt_id, first);
}

// ============================================================================
// FRAUD ESCALATION
// ============================================================================

#[tokio::test]
async fn test_second_signal_terminates() {
    let (engine, store, notifier) = setup().await;
    let attempt_id = started(&engine, "exam-1", "stu-1").await;

    let first = engine
        .record_fraud_signal(attempt_id, signal(ViolationKind::PositionViolation))
        .await
        .unwrap();
    assert_eq!(first.status, FraudStatus::Warning);
    assert_eq!(first.fraud_count, 1);
    assert!(notifier.sent().is_empty());

    let second = engine
        .record_fraud_signal(attempt_id, signal(ViolationKind::MultiplePersons))
        .await
        .unwrap();
    assert_eq!(second.status, FraudStatus::Terminated);
    assert_eq!(second.fraud_count, 2);

    let attempt = engine.get_attempt(attempt_id).await.unwrap();
    assert_eq!(attempt.state, AttemptState::Terminated);
    assert_eq!(attempt.termination_reason.as_deref(), Some("fraud_detected"));
    assert!(attempt.terminated_at.is_some());

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "teacher-1");
    assert!(sent[0].1.contains("stu-1"));

    assert_eq!(store.count(collections::FRAUD_REPORTS), 2);
    assert_eq!(store.count(collections::NOTIFICATIONS), 1);
}

#[tokio::test]
async fn test_configured_threshold() {
    let (engine, _, notifier) = setup_with(EngineConfig {
        fraud_threshold: 3,
        ..EngineConfig::default()
    })
    .await;
    let attempt_id = started(&engine, "exam-1", "stu-1").await;

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let outcome = engine
            .record_fraud_signal(attempt_id, signal(ViolationKind::FaceNotVisible))
            .await
            .unwrap();
        statuses.push(outcome.status);
    }

    assert_eq!(statuses, vec![FraudStatus::Warning, FraudStatus::Warning, FraudStatus::Terminated]);
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_signal_after_termination_is_rejected() {
    let (engine, store, notifier) = setup().await;
    let attempt_id = started(&engine, "exam-1", "stu-1").await;
    for _ in 0..2 {
        engine.record_fraud_signal(attempt_id, signal(ViolationKind::Other)).await.unwrap();
    }

    let late = engine.record_fraud_signal(attempt_id, signal(ViolationKind::Other)).await;
    assert!(matches!(late, Err(AppError::InvalidState(_))));

    let attempt = engine.get_attempt(attempt_id).await.unwrap();
    assert_eq!(attempt.fraud_count, 2);
    assert_eq!(store.count(collections::FRAUD_REPORTS), 2);
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_signal_for_unknown_attempt() {
    let (engine, _, _) = setup().await;
    let result = engine.record_fraud_signal(Uuid::new_v4(), signal(ViolationKind::Other)).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_signals() {
    let (engine, store, notifier) = setup().await;
    let attempt_id = started(&engine, "exam-1", "stu-1").await;

    let (a, b) = tokio::join!(
        engine.record_fraud_signal(attempt_id, signal(ViolationKind::SpeechDetected)),
        engine.record_fraud_signal(attempt_id, signal(ViolationKind::SpeechDetected)),
    );
    let mut statuses = vec![a.unwrap().status, b.unwrap().status];
    statuses.sort_by_key(|s| *s == FraudStatus::Terminated);

    assert_eq!(statuses, vec![FraudStatus::Warning, FraudStatus::Terminated]);

    let attempt = engine.get_attempt(attempt_id).await.unwrap();
    assert_eq!(attempt.fraud_count, 2);
    assert_eq!(attempt.state, AttemptState::Terminated);
    assert_eq!(notifier.sent().len(), 1);
    assert_eq!(store.count(collections::NOTIFICATIONS), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_lost_increments_under_contention() {
    let (engine, _, notifier) = setup_with(EngineConfig {
        fraud_threshold: 8,
        ..EngineConfig::default()
    })
    .await;
    let attempt_id = started(&engine, "exam-1", "stu-1").await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .record_fraud_signal(attempt_id, signal(ViolationKind::PositionViolation))
                    .await
            })
        })
        .collect();

    let mut counts = Vec::new();
    for handle in handles {
        counts.push(handle.await.unwrap().unwrap().fraud_count);
    }
    counts.sort_unstable();

    assert_eq!(counts, (1..=8).collect::<Vec<u32>>());
    let attempt = engine.get_attempt(attempt_id).await.unwrap();
    assert_eq!(attempt.fraud_count, 8);
    assert_eq!(attempt.state, AttemptState::Terminated);
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_notifier_failure_does_not_abort_termination() {
    let store = Arc::new(MemoryStore::new());
    seed(&store).await;
    let engine = AttemptEngine::new(store.clone(), Arc::new(FailingNotifier), EngineConfig::default());
    let attempt_id = started(&engine, "exam-1", "stu-1").await;

    engine.record_fraud_signal(attempt_id, signal(ViolationKind::Other)).await.unwrap();
    let outcome = engine.record_fraud_signal(attempt_id, signal(ViolationKind::Other)).await;

    tokio_test::assert_ok!(outcome);
    assert_eq!(engine.get_attempt(attempt_id).await.unwrap().state, AttemptState::Terminated);
    assert_eq!(store.count(collections::NOTIFICATIONS), 1);
}

// ============================================================================
// SUBMISSION
// ============================================================================

#[tokio::test]
async fn test_submit_scores_and_completes() {
    let (engine, store, _) = setup().await;
    let attempt_id = started(&engine, "exam-1", "stu-1").await;

    let mut telemetry = batch(10, 7, 3200);
    telemetry.cognitive.focus_metrics = vec![0.75];
    telemetry.surveillance.position_violations = 3;
    telemetry.surveillance.speech_detections = 1;

    let receipt = engine.submit_attempt(attempt_id, telemetry).await.unwrap();

    assert_eq!(receipt.attempt.state, AttemptState::Completed);
    assert_eq!(receipt.attempt.answers.len(), 10);
    assert_eq!(receipt.signature.accuracy, 0.7);
    assert_eq!(receipt.signature.cognitive_type, CognitiveType::Auditory);
    assert_eq!(receipt.signature.violation_total, 4);
    assert_eq!(receipt.signature.integrity_score, 80.0);
    assert_eq!(receipt.signature.violation_severity, ViolationSeverity::Low);
    assert!(receipt.signature.signature_id.starts_with("TWIN-"));
    assert!(receipt.fraud_report_id.is_some());

    let stored = engine.get_signature(attempt_id).await.unwrap();
    assert_eq!(stored.signature_id, receipt.signature.signature_id);

    let profile: StudentProfile = store
        .get(collections::STUDENTS, "stu-1")
        .await
        .unwrap()
        .unwrap()
        .decode()
        .unwrap();
    assert!(profile.has_completed_test);
    assert_eq!(profile.last_accuracy, Some(0.7));
    assert_eq!(profile.last_cognitive_type, Some(CognitiveType::Auditory));
    assert_eq!(store.count(collections::FRAUD_REPORTS), 1);
}

#[tokio::test]
async fn test_clean_submission_has_no_report() {
    let (engine, store, _) = setup().await;
    let attempt_id = started(&engine, "exam-1", "stu-1").await;

    let receipt = engine.submit_attempt(attempt_id, batch(5, 5, 1200)).await.unwrap();
    assert!(receipt.fraud_report_id.is_none());
    assert_eq!(receipt.signature.integrity_score, 100.0);
    assert_eq!(store.count(collections::FRAUD_REPORTS), 0);
}

#[tokio::test]
async fn test_resubmission_is_rejected() {
    let (engine, store, _) = setup().await;
    let attempt_id = started(&engine, "exam-1", "stu-1").await;

    engine.submit_attempt(attempt_id, batch(4, 2, 2500)).await.unwrap();
    let again = engine.submit_attempt(attempt_id, batch(4, 4, 900)).await;

    assert!(matches!(again, Err(AppError::InvalidState(_))));
    assert_eq!(store.count(collections::SIGNATURES), 1);
    assert_eq!(engine.get_signature(attempt_id).await.unwrap().accuracy, 0.5);
}

#[tokio::test]
async fn test_submit_after_termination_is_rejected() {
    let (engine, store, _) = setup().await;
    let attempt_id = started(&engine, "exam-1", "stu-1").await;
    for _ in 0..2 {
        engine.record_fraud_signal(attempt_id, signal(ViolationKind::Other)).await.unwrap();
    }

    let result = engine.submit_attempt(attempt_id, batch(3, 3, 1000)).await;
    assert!(matches!(result, Err(AppError::InvalidState(_))));
    assert_eq!(store.count(collections::SIGNATURES), 0);
}

#[tokio::test]
async fn test_malformed_telemetry_is_rejected() {
    let (engine, _, _) = setup().await;
    let attempt_id = started(&engine, "exam-1", "stu-1").await;

    let empty = engine.submit_attempt(attempt_id, batch(0, 0, 0)).await;
    assert!(matches!(empty, Err(AppError::ValidationError(_))));

    let mut negative = batch(2, 1, 1000);
    negative.surveillance.speech_detections = -1;
    let negative = engine.submit_attempt(attempt_id, negative).await;
    assert!(matches!(negative, Err(AppError::ValidationError(_))));

    assert_eq!(engine.get_attempt(attempt_id).await.unwrap().state, AttemptState::InProgress);
}

#[tokio::test]
async fn test_submit_without_profile() {
    let (engine, store, _) = setup().await;
    store
        .put(collections::ASSESSMENTS, "exam-3", json!({
            "assessment_id": "exam-3", "owner_id": "teacher-1", "title": "t", "kind": "quiz"
        }))
        .await
        .unwrap();
    let attempt_id = started(&engine, "exam-3", "ghost").await;

    let result = engine.submit_attempt(attempt_id, batch(2, 1, 1000)).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_eq!(engine.get_attempt(attempt_id).await.unwrap().state, AttemptState::InProgress);
}

#[tokio::test]
async fn test_failed_commit_leaves_nothing_behind() {
    let inner = Arc::new(MemoryStore::new());
    seed(&inner).await;
    let store = Arc::new(CommitFailingStore {
        inner: inner.clone(),
        fail_commits: AtomicBool::new(false),
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = AttemptEngine::new(store.clone(), notifier.clone(), EngineConfig::default());
    let attempt_id = started(&engine, "exam-1", "stu-1").await;
    engine.record_fraud_signal(attempt_id, signal(ViolationKind::Other)).await.unwrap();

    store.fail_commits.store(true, Ordering::SeqCst);

    let mut telemetry = batch(3, 2, 1500);
    telemetry.surveillance.multiple_persons_detected = 2;
    let submit = engine.submit_attempt(attempt_id, telemetry).await;
    assert!(matches!(submit, Err(AppError::StoreUnavailable(_))));

    let flag = engine.record_fraud_signal(attempt_id, signal(ViolationKind::Other)).await;
    assert!(matches!(flag, Err(AppError::StoreUnavailable(_))));

    let attempt = engine.get_attempt(attempt_id).await.unwrap();
    assert_eq!(attempt.state, AttemptState::InProgress);
    assert_eq!(attempt.fraud_count, 1);
    assert_eq!(inner.count(collections::SIGNATURES), 0);
    assert_eq!(inner.count(collections::FRAUD_REPORTS), 1);
    assert_eq!(inner.count(collections::NOTIFICATIONS), 0);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_signature_key_collision_rolls_back() {
    let (engine, store, _) = setup().await;
    let attempt_id = started(&engine, "exam-1", "stu-1").await;
    store
        .put(collections::SIGNATURES, &attempt_id.to_string(), json!({"stale": true}))
        .await
        .unwrap();

    let result = engine.submit_attempt(attempt_id, batch(3, 3, 1000)).await;
    assert!(matches!(result, Err(AppError::InvalidState(_))));
    assert_eq!(engine.get_attempt(attempt_id).await.unwrap().state, AttemptState::InProgress);
}

#[tokio::test]
async fn test_store_outage_surfaces() {
    let (engine, store, _) = setup().await;
    let attempt_id = started(&engine, "exam-1", "stu-1").await;

    store.set_offline(true);
    let result = engine.submit_attempt(attempt_id, batch(3, 3, 1000)).await;
    assert!(matches!(result, Err(AppError::StoreUnavailable(_))));

    store.set_offline(false);
    assert_eq!(engine.get_attempt(attempt_id).await.unwrap().state, AttemptState::InProgress);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fraud_racing_submission_resolves_to_one_terminal_state() {
    let (engine, store, _) = setup().await;
    let attempt_id = started(&engine, "exam-1", "stu-1").await;
    engine.record_fraud_signal(attempt_id, signal(ViolationKind::Other)).await.unwrap();

    let (flag, submit) = tokio::join!(
        engine.record_fraud_signal(attempt_id, signal(ViolationKind::Other)),
        engine.submit_attempt(attempt_id, batch(3, 2, 1500)),
    );

    assert!(flag.is_ok() != submit.is_ok());
    let attempt = engine.get_attempt(attempt_id).await.unwrap();
    if flag.is_ok() {
        assert_eq!(attempt.state, AttemptState::Terminated);
        assert_eq!(store.count(collections::SIGNATURES), 0);
    } else {
        assert!(matches!(flag, Err(AppError::InvalidState(_))));
        assert_eq!(attempt.state, AttemptState::Completed);
        assert_eq!(store.count(collections::SIGNATURES), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_student_submits_two_assessments_at_once() {
    let (engine, inner) = yielding_setup().await;
    let exam = started(&engine, "exam-1", "stu-1").await;
    let quiz = started(&engine, "quiz-2", "stu-1").await;

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.submit_attempt(exam, batch(3, 3, 1200)).await })
    };
    let second = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.submit_attempt(quiz, batch(4, 1, 2600)).await })
    };

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert_eq!(first.attempt.state, AttemptState::Completed);
    assert_eq!(second.attempt.state, AttemptState::Completed);
    assert_eq!(inner.count(collections::SIGNATURES), 2);

    let profile: StudentProfile = inner
        .get(collections::STUDENTS, "stu-1")
        .await
        .unwrap()
        .unwrap()
        .decode()
        .unwrap();
    assert!(profile.has_completed_test);
}

#[tokio::test]
async fn test_repeated_question_index_is_rejected() {
    let (engine, store, _) = setup().await;
    let attempt_id = started(&engine, "exam-1", "stu-1").await;

    let mut telemetry = batch(2, 1, 1000);
    telemetry.answers[1].index = 0;

    let result = engine.submit_attempt(attempt_id, telemetry).await;
    assert!(matches!(result, Err(AppError::ValidationError(_))));
    assert_eq!(store.count(collections::SIGNATURES), 0);
}

// ============================================================================
// READS AND ADMIN
// ============================================================================

#[tokio::test]
async fn test_missing_signature() {
    let (engine, _, _) = setup().await;
    let attempt_id = started(&engine, "exam-1", "stu-1").await;
    let result = engine.get_signature(attempt_id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_student_signatures_newest_first() {
    let (engine, _, _) = setup().await;
    let first = started(&engine, "exam-1", "stu-1").await;
    engine.submit_attempt(first, batch(2, 2, 1000)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = started(&engine, "quiz-2", "stu-1").await;
    engine.submit_attempt(second, batch(2, 1, 1000)).await.unwrap();

    let signatures = engine.signatures_for_student("stu-1").await.unwrap();
    assert_eq!(signatures.len(), 2);
    assert_eq!(signatures[0].attempt_id, second);
    assert_eq!(signatures[1].attempt_id, first);

    assert!(engine.signatures_for_student("stu-2").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_student_analytics() {
    let (engine, _, _) = setup().await;
    let attempt_id = started(&engine, "exam-1", "stu-2").await;
    engine.record_fraud_signal(attempt_id, signal(ViolationKind::SpeechDetected)).await.unwrap();

    let mut telemetry = batch(4, 3, 2000);
    telemetry.surveillance.position_violations = 2;
    engine.submit_attempt(attempt_id, telemetry).await.unwrap();

    let analytics = engine.student_analytics("stu-2").await.unwrap();
    assert!(analytics.profile.has_completed_test);
    assert_eq!(analytics.signatures.len(), 1);
    assert_eq!(analytics.fraud_count, 2);
    assert_eq!(analytics.fraud_reports[0].violation_kind, ViolationKind::SpeechDetected);
    assert_eq!(analytics.fraud_reports[1].violation_kind, ViolationKind::SurveillanceSummary);

    let missing = engine.student_analytics("nobody").await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_delete_assessment_cascades_to_attempts() {
    let (engine, store, _) = setup().await;
    let done = started(&engine, "exam-1", "stu-1").await;
    engine.submit_attempt(done, batch(2, 1, 1000)).await.unwrap();
    let open = started(&engine, "exam-1", "stu-2").await;
    let other = started(&engine, "quiz-2", "stu-1").await;

    let deletion = engine.delete_assessment("exam-1").await.unwrap();
    assert_eq!(deletion.attempts_removed, 2);

    assert!(matches!(engine.get_attempt(open).await, Err(AppError::NotFound(_))));
    assert!(engine.get_attempt(other).await.is_ok());
    assert_eq!(store.count(collections::SIGNATURES), 1);
    assert!(store.get(collections::ASSESSMENTS, "exam-1").await.unwrap().is_none());

    let again = engine.delete_assessment("exam-1").await;
    assert!(matches!(again, Err(AppError::NotFound(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_start_racing_delete_leaves_no_orphan_attempt() {
    let (engine, inner) = yielding_setup().await;

    let start = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.start_attempt(start_req("exam-1", "stu-1")).await })
    };
    let delete = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.delete_assessment("exam-1").await })
    };

    let start = start.await.unwrap();
    let deletion = delete.await.unwrap().unwrap();

    match start {
        Ok(_) => assert_eq!(deletion.attempts_removed, 1),
        Err(e) => {
            assert!(matches!(e, AppError::NotFound(_)));
            assert_eq!(deletion.attempts_removed, 0);
        }
    }
    assert_eq!(inner.count(collections::ATTEMPTS), 0);
}
