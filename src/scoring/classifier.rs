//! Signature Classifier
//!
//! Maps aggregated metrics to a cognitive type and a content-addressed
//! signature id. Accuracy and focus are both fractions in [0, 1].

use sha2::{Digest, Sha256};

use super::aggregate::AggregatedMetrics;
use crate::models::{CognitiveType, PatternStability};

// ============================================================================
// THRESHOLDS
// ============================================================================

pub const ANALYTICAL_MIN_ACCURACY: f64 = 0.80;
pub const ANALYTICAL_MAX_RESPONSE_MS: f64 = 3000.0;
pub const ANALYTICAL_MIN_FOCUS: f64 = 0.7;

pub const AUDITORY_MIN_ACCURACY: f64 = 0.70;
pub const AUDITORY_MAX_RESPONSE_MS: f64 = 4000.0;

pub const KINESTHETIC_MIN_ACCURACY: f64 = 0.60;
pub const KINESTHETIC_MIN_RESPONSE_MS: f64 = 4000.0;

pub const VISUAL_MAX_RESPONSE_MS: f64 = 2000.0;

pub const LOW_FOCUS: f64 = 0.3;

/// Dominant-pattern share above which answering is "serious"
pub const SERIOUS_SHARE: f64 = 0.7;
/// Dominant-pattern share above which answering is "strategic"
pub const STRATEGIC_SHARE: f64 = 0.4;

// ============================================================================
// SIGNATURE ID
// ============================================================================

/// Canonicalization scheme tag, part of the hashed string
pub const SIGNATURE_SCHEME: &str = "v1";
pub const SIGNATURE_PREFIX: &str = "TWIN-";
pub const SIGNATURE_HEX_LEN: usize = 8;

/// Ordered rules, first match wins
pub fn classify(mean_response_time_ms: f64, accuracy: f64, focus: f64) -> CognitiveType {
    if accuracy >= ANALYTICAL_MIN_ACCURACY
        && mean_response_time_ms <= ANALYTICAL_MAX_RESPONSE_MS
        && focus >= ANALYTICAL_MIN_FOCUS
    {
        CognitiveType::Analytical
    } else if accuracy >= AUDITORY_MIN_ACCURACY && mean_response_time_ms <= AUDITORY_MAX_RESPONSE_MS {
        CognitiveType::Auditory
    } else if accuracy >= KINESTHETIC_MIN_ACCURACY && mean_response_time_ms > KINESTHETIC_MIN_RESPONSE_MS {
        CognitiveType::Kinesthetic
    } else if mean_response_time_ms <= VISUAL_MAX_RESPONSE_MS {
        CognitiveType::Visual
    } else if focus < LOW_FOCUS {
        CognitiveType::Auditory
    } else {
        CognitiveType::Visual
    }
}

pub fn pattern_stability(metrics: &AggregatedMetrics) -> PatternStability {
    if metrics.dominant_pattern.is_none() {
        return PatternStability::Random;
    }
    if metrics.dominant_share > SERIOUS_SHARE {
        PatternStability::Serious
    } else if metrics.dominant_share > STRATEGIC_SHARE {
        PatternStability::Strategic
    } else {
        PatternStability::Random
    }
}

/// Fixed-point rendering from integer hundredths, so the text never
/// depends on float formatting.
fn hundredths(value: f64) -> String {
    let scaled = (value * 100.0).round() as i64;
    let sign = if scaled < 0 { "-" } else { "" };
    let abs = scaled.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// String fed to the digest
pub fn canonical_form(metrics: &AggregatedMetrics, response_patterns: &[i64]) -> String {
    let patterns = response_patterns
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "{}|rt={}|consistency={}|focus={}|accuracy={}|patterns={}",
        SIGNATURE_SCHEME,
        hundredths(metrics.mean_response_time_ms),
        hundredths(metrics.consistency),
        hundredths(metrics.focus),
        hundredths(metrics.accuracy),
        patterns,
    )
}

/// `TWIN-` + first 8 uppercase hex chars of SHA-256(canonical form)
pub fn signature_id(metrics: &AggregatedMetrics, response_patterns: &[i64]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_form(metrics, response_patterns).as_bytes());
    let digest = hex::encode_upper(hasher.finalize());
    format!("{}{}", SIGNATURE_PREFIX, &digest[..SIGNATURE_HEX_LEN])
}
