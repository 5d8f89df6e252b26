//! Consensus engine
//!
//! Produces the single authoritative value per field by combining validator
//! opinions with the configured source-priority fallback. Resolution is
//! per-field and strictly ordered:
//!
//! 1. Two or more validators selecting equivalent values → that value,
//!    confidence = minimum among the agreeing validators.
//! 2. Validators disagree but one opinion clearly dominates (confidence gap
//!    over `DOMINANCE_GAP`) → dominant value, confidence discounted.
//! 3. Validators disagree closely → fall back to source priority with the
//!    source's static base confidence.
//! 4. Exactly one usable validator → its value, confidence discounted.
//! 5. No usable opinions → source priority; if no source reported either,
//!    the field resolves to nothing at confidence zero.
//!
//! Ties are broken deterministically (confidence descending, validator id
//! ascending), so the same inputs always produce the same record.

use std::collections::BTreeMap;
use tracing::debug;

use crate::collector::CollectedOpinions;
use crate::config::ReconConfig;
use crate::conflict::values_equivalent;
use crate::types::{ConsensusResult, Field, FieldConflict, Resolution, SourceRecord};

/// Minimum confidence lead for one opinion to override disagreement.
const DOMINANCE_GAP: f64 = 0.15;
/// Discount applied when a dominant opinion wins over disagreement.
const DOMINANT_DISCOUNT: f64 = 0.9;
/// Discount applied when only a single validator weighed in.
const SINGLE_DISCOUNT: f64 = 0.85;

pub struct ConsensusEngine;

impl ConsensusEngine {
    pub fn new() -> Self {
        Self
    }

    /// Resolve every schema field independently.
    pub fn resolve(
        &self,
        sources: &[SourceRecord],
        collected: &CollectedOpinions,
        conflicts: &[FieldConflict],
        config: &ReconConfig,
    ) -> BTreeMap<Field, ConsensusResult> {
        let severity_by_field: BTreeMap<Field, _> =
            conflicts.iter().map(|c| (c.field, c.severity)).collect();

        let mut results = BTreeMap::new();
        for field in Field::ALL {
            let mut result = self.resolve_field(field, sources, collected, config);
            if let Some(severity) = severity_by_field.get(&field) {
                result
                    .notes
                    .push(format!("sources conflict on this field ({severity})"));
            }
            debug!(
                field = %field,
                resolution = %result.resolution,
                confidence = result.confidence,
                agreement = result.agreement,
                "field resolved"
            );
            results.insert(field, result);
        }
        results
    }

    fn resolve_field(
        &self,
        field: Field,
        sources: &[SourceRecord],
        collected: &CollectedOpinions,
        config: &ReconConfig,
    ) -> ConsensusResult {
        // Deterministic order: confidence descending, then validator id
        let opinions = collected.for_field(field);

        if opinions.len() >= 2 {
            if pairwise_agree(&opinions) {
                let min_confidence = opinions
                    .iter()
                    .map(|o| o.confidence)
                    .fold(f64::INFINITY, f64::min);
                let top = opinions[0];
                return ConsensusResult {
                    field,
                    final_value: Some(top.selected_value.clone()),
                    confidence: min_confidence,
                    resolution: Resolution::ValidatorConsensus,
                    source_id: Some(top.selected_source_id.clone()),
                    agreement: true,
                    notes: vec![format!("{} validators agreed", opinions.len())],
                };
            }

            let gap = opinions[0].confidence - opinions[1].confidence;
            if gap > DOMINANCE_GAP {
                let top = opinions[0];
                return ConsensusResult {
                    field,
                    final_value: Some(top.selected_value.clone()),
                    confidence: top.confidence * DOMINANT_DISCOUNT,
                    resolution: Resolution::ValidatorSingle,
                    source_id: Some(top.selected_source_id.clone()),
                    agreement: false,
                    notes: vec![format!(
                        "validators disagreed; '{}' dominated by {:.2} confidence",
                        top.validator_id, gap
                    )],
                };
            }

            // Close disagreement: neither opinion is trustworthy enough
            let mut result = self.source_priority(field, sources, config);
            result.notes.insert(
                0,
                "validators disagreed with no dominant opinion".to_string(),
            );
            return result;
        }

        if let [only] = opinions.as_slice() {
            return ConsensusResult {
                field,
                final_value: Some(only.selected_value.clone()),
                confidence: only.confidence * SINGLE_DISCOUNT,
                resolution: Resolution::ValidatorSingle,
                source_id: Some(only.selected_source_id.clone()),
                agreement: false,
                notes: vec![format!("single validator '{}'", only.validator_id)],
            };
        }

        self.source_priority(field, sources, config)
    }

    /// Walk the category's priority order and take the first source that
    /// reported the field.
    fn source_priority(
        &self,
        field: Field,
        sources: &[SourceRecord],
        config: &ReconConfig,
    ) -> ConsensusResult {
        let category = field.category();
        let by_id: BTreeMap<&str, &SourceRecord> =
            sources.iter().map(|s| (s.source_id.as_str(), s)).collect();

        for source_id in config.priority.for_category(category) {
            if let Some(value) = by_id.get(source_id.as_str()).and_then(|s| s.get(field)) {
                return ConsensusResult {
                    field,
                    final_value: Some(value.clone()),
                    confidence: config.base_confidence_for(source_id, category),
                    resolution: Resolution::SourcePriority,
                    source_id: Some(source_id.clone()),
                    agreement: false,
                    notes: vec![format!("priority fallback to '{source_id}'")],
                };
            }
        }

        ConsensusResult {
            field,
            final_value: None,
            confidence: 0.0,
            resolution: Resolution::None,
            source_id: None,
            agreement: false,
            notes: Vec::new(),
        }
    }
}

impl Default for ConsensusEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn pairwise_agree(opinions: &[&crate::types::ValidatorOpinion]) -> bool {
    for (i, a) in opinions.iter().enumerate() {
        for b in opinions.iter().skip(i + 1) {
            if !values_equivalent(&a.selected_value, &b.selected_value) {
                return false;
            }
        }
    }
    true
}

// ============================================================================
// Tests
// ============================================================================
