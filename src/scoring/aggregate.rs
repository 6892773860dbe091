//! Signal Aggregator
//!
//! Turns a telemetry batch into scalar metrics. Pure and total over
//! validated input; empty inputs yield 0 instead of dividing by zero.
//! Values stay at full precision here, rounding happens when the
//! signature is built.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{SurveillanceMetrics, TelemetryBatch};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    /// correct / total, in [0, 1]
    pub accuracy: f64,
    pub mean_response_time_ms: f64,
    /// mean consistency score, in [0, 1]
    pub consistency: f64,
    /// mean focus metric, in [0, 1] for well-formed sensors
    pub focus: f64,
    pub violation_total: u64,
    pub dominant_pattern: Option<i64>,
    /// Share of the sequence taken by the dominant pattern
    pub dominant_share: f64,
}

pub fn aggregate(batch: &TelemetryBatch) -> AggregatedMetrics {
    let total = batch.answers.len();
    let correct = batch.answers.iter().filter(|a| a.is_correct).count();

    let accuracy = if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    };

    let mean_response_time_ms = mean(batch.answers.iter().map(|a| a.response_time_ms as f64));
    let consistency = mean(batch.cognitive.consistency_scores.iter().copied());
    let focus = mean(batch.cognitive.focus_metrics.iter().copied());

    let patterns = &batch.cognitive.response_patterns;
    let (dominant_pattern, dominant_share) = match dominant_pattern(patterns) {
        Some((value, count)) => (Some(value), count as f64 / patterns.len() as f64),
        None => (None, 0.0),
    };

    AggregatedMetrics {
        accuracy,
        mean_response_time_ms,
        consistency,
        focus,
        violation_total: violation_total(&batch.surveillance),
        dominant_pattern,
        dominant_share,
    }
}

/// Arithmetic mean, 0 for an empty sequence
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, n) = values
        .into_iter()
        .fold((0.0f64, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Position + speech + multiple persons. Face detections and total
/// checks are informational only.
pub fn violation_total(s: &SurveillanceMetrics) -> u64 {
    [s.position_violations, s.speech_detections, s.multiple_persons_detected]
        .iter()
        .map(|v| (*v).max(0) as u64)
        .fold(0u64, |acc, v| acc.saturating_add(v))
}

/// Most frequent value with its count; ties go to the value seen first
pub fn dominant_pattern(patterns: &[i64]) -> Option<(i64, usize)> {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for p in patterns {
        *counts.entry(*p).or_insert(0) += 1;
    }

    let mut best: Option<(i64, usize)> = None;
    for p in patterns {
        let count = counts[p];
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((*p, count));
        }
    }
    best
}

/// Round half away from zero to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
