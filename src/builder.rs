//! Record builder and validation gate
//!
//! Assembles the final `CatalogRecord` from the consensus results and
//! decides its gate status. A record is always produced, whatever the
//! quality of the inputs: the gate grades, it never blocks.
//!
//! Records are immutable. Rebuilding a part goes through `next_version`,
//! which stamps the new record with the prior record's id.

use chrono::Utc;
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

use crate::config::ReconConfig;
use crate::types::{
    CatalogFieldEntry, CatalogRecord, ConsensusResult, Field, FieldStatus, Provenance,
    Resolution, ValidationStatus,
};

pub struct RecordBuilder;

impl RecordBuilder {
    /// Assemble a first-version record.
    pub fn build(
        part_number: &str,
        results: &BTreeMap<Field, ConsensusResult>,
        statuses: &BTreeMap<Field, FieldStatus>,
        overall_confidence: f64,
        provenance: Provenance,
        config: &ReconConfig,
    ) -> CatalogRecord {
        Self::assemble(
            part_number,
            results,
            statuses,
            overall_confidence,
            provenance,
            config,
            None,
        )
    }

    /// Assemble a rebuild of an existing record. The new record gets a
    /// fresh id and points back at the one it supersedes.
    pub fn next_version(
        previous: &CatalogRecord,
        results: &BTreeMap<Field, ConsensusResult>,
        statuses: &BTreeMap<Field, FieldStatus>,
        overall_confidence: f64,
        provenance: Provenance,
        config: &ReconConfig,
    ) -> CatalogRecord {
        Self::assemble(
            &previous.part_number,
            results,
            statuses,
            overall_confidence,
            provenance,
            config,
            Some(previous.record_id),
        )
    }

    fn assemble(
        part_number: &str,
        results: &BTreeMap<Field, ConsensusResult>,
        statuses: &BTreeMap<Field, FieldStatus>,
        overall_confidence: f64,
        provenance: Provenance,
        config: &ReconConfig,
        previous_version: Option<Uuid>,
    ) -> CatalogRecord {
        let mut fields = BTreeMap::new();
        for field in Field::ALL {
            let status = statuses
                .get(&field)
                .copied()
                .unwrap_or(FieldStatus::NotFound);
            let (value, confidence, source) = match results.get(&field) {
                Some(r) => (r.final_value.clone(), r.confidence, r.source_id.clone()),
                None => (None, 0.0, None),
            };
            fields.insert(
                field,
                CatalogFieldEntry {
                    value,
                    status,
                    confidence,
                    source,
                },
            );
        }

        let validation_status = Self::gate(results, overall_confidence, config);
        let record = CatalogRecord {
            record_id: Uuid::new_v4(),
            part_number: part_number.to_string(),
            fields,
            overall_confidence,
            validation_status,
            provenance,
            created_at: Utc::now(),
            previous_version,
        };
        info!(
            part_number = %record.part_number,
            record_id = %record.record_id,
            status = ?record.validation_status,
            overall_confidence = record.overall_confidence,
            "catalog record built"
        );
        record
    }

    /// ACCEPTED requires every critical field to be confidently resolved:
    /// either validators agreed on it, or the priority fallback supplied it
    /// at or above the configured floor. Anything less is graded by
    /// overall confidence.
    fn gate(
        results: &BTreeMap<Field, ConsensusResult>,
        overall_confidence: f64,
        config: &ReconConfig,
    ) -> ValidationStatus {
        let all_critical_confident = config.gate.critical_fields.iter().all(|field| {
            match results.get(field) {
                Some(r) if r.final_value.is_some() => {
                    r.agreement
                        || (r.resolution == Resolution::SourcePriority
                            && r.confidence >= config.gate.priority_confidence_floor)
                }
                _ => false,
            }
        });

        if all_critical_confident {
            ValidationStatus::Accepted
        } else if overall_confidence > config.gate.review_confidence_floor {
            ValidationStatus::NeedsReview
        } else {
            ValidationStatus::Rejected
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
