//! Conflict analyzer
//!
//! Detects and classifies disagreements between normalized source records,
//! field by field. Runs on raw normalized values only — validator opinions
//! never feed into conflict classification, and the analyzer never picks a
//! winner. Its output annotates consensus results and review queues.
//!
//! The equivalence predicates here (`values_equivalent` and friends) are
//! the single definition of "the same value" for the whole pipeline; the
//! consensus engine reuses them for validator agreement.

use std::collections::BTreeMap;
use tracing::debug;

use crate::types::{ConflictSeverity, Field, FieldConflict, FieldValue, SourceRecord};

// ============================================================================
// Shared equivalence predicates
// ============================================================================

/// Lowercase and collapse internal whitespace.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalized Levenshtein similarity on normalized text, in [0.0, 1.0].
pub fn text_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&normalize_text(a), &normalize_text(b))
}

/// Case-insensitive Jaccard index of two string lists.
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    let set_a: std::collections::BTreeSet<String> =
        a.iter().map(|s| normalize_text(s)).collect();
    let set_b: std::collections::BTreeSet<String> =
        b.iter().map(|s| normalize_text(s)).collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count() as f64;
    let union = set_a.union(&set_b).count() as f64;
    intersection / union
}

/// Whether two values are close enough to count as the same answer.
///
/// Text agrees at similarity >= 0.8, lists at Jaccard > 0.7. Numbers agree
/// only when exactly equal: two prices that differ by pennies are still
/// different answers.
pub fn values_equivalent(a: &FieldValue, b: &FieldValue) -> bool {
    match (a, b) {
        (FieldValue::Text(x), FieldValue::Text(y)) => text_similarity(x, y) >= 0.8,
        (FieldValue::Number(x), FieldValue::Number(y)) => (x - y).abs() <= 1e-9,
        (FieldValue::List(x), FieldValue::List(y)) => jaccard(x, y) > 0.7,
        _ => false,
    }
}

// ============================================================================
// Analyzer
// ============================================================================

#[derive(Debug, Clone)]
pub struct ConflictAnalyzer {
    /// Numeric spread below this fraction of the mean is Minor.
    pub minor_spread: f64,
    /// Numeric spread below this fraction of the mean is Moderate; at or
    /// above it, Major.
    pub major_spread: f64,
    /// Text pairs below this similarity are Major.
    pub text_major_similarity: f64,
    /// Text pairs at or above this similarity agree outright.
    pub text_agree_similarity: f64,
    /// List Jaccard above this agrees outright.
    pub list_agree_jaccard: f64,
    /// List Jaccard above this (but not agreeing) is Moderate.
    pub list_moderate_jaccard: f64,
}

impl Default for ConflictAnalyzer {
    fn default() -> Self {
        Self {
            minor_spread: 0.10,
            major_spread: 0.30,
            text_major_similarity: 0.5,
            text_agree_similarity: 0.8,
            list_agree_jaccard: 0.7,
            list_moderate_jaccard: 0.4,
        }
    }
}

impl ConflictAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detect all field-level conflicts across the normalized records.
    ///
    /// A field with fewer than two sources reporting cannot conflict, and a
    /// field where all reported values are pairwise equivalent does not
    /// conflict either.
    pub fn analyze(&self, sources: &[SourceRecord]) -> Vec<FieldConflict> {
        let mut conflicts = Vec::new();

        for field in Field::ALL {
            let values: BTreeMap<String, FieldValue> = sources
                .iter()
                .filter_map(|s| s.get(field).map(|v| (s.source_id.clone(), v.clone())))
                .collect();
            if values.len() < 2 {
                continue;
            }

            let list: Vec<&FieldValue> = values.values().collect();
            if pairwise_equivalent(&list) {
                continue;
            }

            let severity = self.classify(&list);
            debug!(field = %field, sources = values.len(), severity = %severity, "field conflict");
            conflicts.push(FieldConflict {
                field,
                values_by_source: values,
                severity,
            });
        }

        conflicts
    }

    fn classify(&self, values: &[&FieldValue]) -> ConflictSeverity {
        // Mixed variants across sources trump everything
        let first_type = values[0].field_type();
        if values.iter().any(|v| v.field_type() != first_type) {
            return ConflictSeverity::Incompatible;
        }

        match values[0] {
            FieldValue::Number(_) => self.classify_numbers(values),
            FieldValue::Text(_) => self.classify_text(values),
            FieldValue::List(_) => self.classify_lists(values),
        }
    }

    /// Relative spread of the numeric values: (max - mean) / mean.
    fn classify_numbers(&self, values: &[&FieldValue]) -> ConflictSeverity {
        let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_number()).collect();
        let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
        let max = numbers.iter().cloned().fold(f64::MIN, f64::max);
        if mean.abs() <= 1e-9 {
            // Distinct values around zero have no meaningful relative spread
            return ConflictSeverity::Major;
        }
        let spread = (max - mean) / mean;
        if spread < self.minor_spread {
            ConflictSeverity::Minor
        } else if spread < self.major_spread {
            ConflictSeverity::Moderate
        } else {
            ConflictSeverity::Major
        }
    }

    /// Worst pairwise similarity decides.
    fn classify_text(&self, values: &[&FieldValue]) -> ConflictSeverity {
        let mut worst = 1.0_f64;
        for (i, a) in values.iter().enumerate() {
            for b in values.iter().skip(i + 1) {
                if let (Some(x), Some(y)) = (a.as_text(), b.as_text()) {
                    worst = worst.min(text_similarity(x, y));
                }
            }
        }
        if worst < self.text_major_similarity {
            ConflictSeverity::Major
        } else if worst < self.text_agree_similarity {
            ConflictSeverity::Moderate
        } else {
            ConflictSeverity::Minor
        }
    }

    fn classify_lists(&self, values: &[&FieldValue]) -> ConflictSeverity {
        let mut worst = 1.0_f64;
        for (i, a) in values.iter().enumerate() {
            for b in values.iter().skip(i + 1) {
                if let (Some(x), Some(y)) = (a.as_list(), b.as_list()) {
                    worst = worst.min(jaccard(x, y));
                }
            }
        }
        if worst > self.list_agree_jaccard {
            ConflictSeverity::Minor
        } else if worst > self.list_moderate_jaccard {
            ConflictSeverity::Moderate
        } else {
            ConflictSeverity::Major
        }
    }
}

fn pairwise_equivalent(values: &[&FieldValue]) -> bool {
    for (i, a) in values.iter().enumerate() {
        for b in values.iter().skip(i + 1) {
            if !values_equivalent(a, b) {
                return false;
            }
        }
    }
    true
}

// ============================================================================
// Tests
// ============================================================================
