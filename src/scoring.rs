//! Confidence scoring and field status classification
//!
//! The scorer folds per-field confidences into one record-level score
//! using the configured importance weights. The classifier assigns the
//! three-way FOUND / NOT_FOUND / NOT_APPLICABLE status; the distinction
//! between the latter two matters for completeness reporting and must
//! survive all the way to the catalog record.

use std::collections::BTreeMap;

use crate::config::ReconConfig;
use crate::conflict::normalize_text;
use crate::types::{ConsensusResult, Field, FieldStatus, FieldValue};

// ============================================================================
// Confidence Scorer
// ============================================================================

pub struct ConfidenceScorer;

impl ConfidenceScorer {
    /// Weighted mean of per-field confidences. Zero-weight fields are
    /// excluded from the denominator so they cannot drag the score.
    pub fn overall(
        results: &BTreeMap<Field, ConsensusResult>,
        config: &ReconConfig,
    ) -> f64 {
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for field in Field::ALL {
            let weight = config.weights.get(&field).copied().unwrap_or(0.0);
            if weight <= 0.0 {
                continue;
            }
            let confidence = results.get(&field).map(|r| r.confidence).unwrap_or(0.0);
            numerator += confidence * weight;
            denominator += weight;
        }
        if denominator <= 0.0 {
            0.0
        } else {
            numerator / denominator
        }
    }
}

// ============================================================================
// Field Status Classifier
// ============================================================================

pub struct StatusClassifier;

impl StatusClassifier {
    /// Classify every schema field given the resolved value map.
    ///
    /// A resolved field is FOUND regardless of applicability rules. For
    /// unresolved fields, NOT_APPLICABLE takes precedence over NOT_FOUND:
    /// a voltage that does not apply to a door gasket is not "missing"
    /// even though nobody reported it. Applicability is judged on the
    /// *resolved* values, so the `part_type` the consensus engine settled
    /// on is what gates `voltage`.
    pub fn classify(
        results: &BTreeMap<Field, ConsensusResult>,
        config: &ReconConfig,
    ) -> BTreeMap<Field, FieldStatus> {
        let mut statuses = BTreeMap::new();
        for field in Field::ALL {
            let resolved = results
                .get(&field)
                .map(|r| r.final_value.is_some())
                .unwrap_or(false);
            let status = if resolved {
                FieldStatus::Found
            } else if Self::is_inapplicable(field, results, config) {
                FieldStatus::NotApplicable
            } else {
                FieldStatus::NotFound
            };
            statuses.insert(field, status);
        }
        statuses
    }

    fn is_inapplicable(
        field: Field,
        results: &BTreeMap<Field, ConsensusResult>,
        config: &ReconConfig,
    ) -> bool {
        for rule in config.applicability.iter().filter(|r| r.field == field) {
            let resolved = results
                .get(&rule.depends_on)
                .and_then(|r| r.final_value.as_ref());
            // An unresolved dependency cannot prove inapplicability
            let Some(FieldValue::Text(text)) = resolved else {
                continue;
            };
            let normalized = normalize_text(text);
            let applicable = rule
                .applicable_when
                .iter()
                .any(|allowed| normalize_text(allowed) == normalized);
            if !applicable {
                return true;
            }
        }
        false
    }
}

// ============================================================================
// Tests
// ============================================================================
