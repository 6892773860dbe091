//! Scoring Module
//!
//! Pure signal-to-signature transformation run at submission time.
//!
//! ## Structure
//! - `aggregate`: telemetry -> scalar metrics
//! - `classifier`: metrics -> cognitive type + signature id
//! - `integrity`: violation count -> integrity score + severity
//!
//! None of these touch the store or the attempt; the engine persists
//! whatever [`evaluate`] returns.

pub mod aggregate;
pub mod classifier;
pub mod integrity;

use chrono::{DateTime, Utc};

use crate::models::{Attempt, CognitiveType, PatternStability, Signature, TelemetryBatch};

pub use aggregate::{aggregate, round2, AggregatedMetrics};
pub use classifier::{classify, signature_id};
pub use integrity::{IntegrityAssessment, IntegrityScorer};

/// Full result of scoring one telemetry batch
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub metrics: AggregatedMetrics,
    pub cognitive_type: CognitiveType,
    pub pattern_stability: PatternStability,
    pub signature_id: String,
    pub integrity: IntegrityAssessment,
}

pub fn evaluate(telemetry: &TelemetryBatch, scorer: &IntegrityScorer) -> Evaluation {
    let metrics = aggregate(telemetry);
    let cognitive_type = classify(metrics.mean_response_time_ms, metrics.accuracy, metrics.focus);
    let pattern_stability = classifier::pattern_stability(&metrics);
    let signature_id = signature_id(&metrics, &telemetry.cognitive.response_patterns);
    let integrity = scorer.assess(metrics.violation_total);

    Evaluation {
        metrics,
        cognitive_type,
        pattern_stability,
        signature_id,
        integrity,
    }
}

impl Evaluation {
    /// Persistable signature; the only place values get rounded
    pub fn into_signature(self, attempt: &Attempt, telemetry: TelemetryBatch, now: DateTime<Utc>) -> Signature {
        Signature {
            signature_id: self.signature_id,
            attempt_id: attempt.attempt_id,
            student_id: attempt.student_id.clone(),
            assessment_id: attempt.assessment_id.clone(),
            accuracy: round2(self.metrics.accuracy),
            mean_response_time_ms: round2(self.metrics.mean_response_time_ms),
            consistency: round2(self.metrics.consistency),
            focus: round2(self.metrics.focus),
            cognitive_type: self.cognitive_type,
            dominant_pattern: self.metrics.dominant_pattern,
            pattern_stability: self.pattern_stability,
            violation_total: self.metrics.violation_total,
            integrity_score: round2(self.integrity.score),
            violation_severity: self.integrity.severity,
            telemetry,
            created_at: now,
        }
    }
}
