//! Integrity Scorer
//!
//! Violation count -> integrity score on [0, 100] plus a severity tier.
//! Counts the same discrete violations the escalation policy counts.

use serde::{Deserialize, Serialize};

use crate::models::ViolationSeverity;

pub const MAX_INTEGRITY: u64 = 100;

/// Totals above this are HIGH
pub const HIGH_SEVERITY_ABOVE: u64 = 10;

/// Totals above this are MEDIUM
pub const MEDIUM_SEVERITY_ABOVE: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegrityAssessment {
    pub score: f64,
    pub severity: ViolationSeverity,
}

#[derive(Debug, Clone, Copy)]
pub struct IntegrityScorer {
    penalty: u32,
}

impl Default for IntegrityScorer {
    fn default() -> Self {
        Self { penalty: 5 }
    }
}

impl IntegrityScorer {
    pub fn new(penalty: u32) -> Self {
        Self { penalty }
    }

    pub fn penalty(&self) -> u32 {
        self.penalty
    }

    /// max(0, 100 - total * penalty)
    pub fn score(&self, violation_total: u64) -> f64 {
        let deduction = violation_total.saturating_mul(u64::from(self.penalty));
        MAX_INTEGRITY.saturating_sub(deduction) as f64
    }

    pub fn severity(&self, violation_total: u64) -> ViolationSeverity {
        if violation_total > HIGH_SEVERITY_ABOVE {
            ViolationSeverity::High
        } else if violation_total > MEDIUM_SEVERITY_ABOVE {
            ViolationSeverity::Medium
        } else {
            ViolationSeverity::Low
        }
    }

    pub fn assess(&self, violation_total: u64) -> IntegrityAssessment {
        IntegrityAssessment {
            score: self.score(violation_total),
            severity: self.severity(violation_total),
        }
    }
}
