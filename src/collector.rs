//! Validator opinion collector
//!
//! Fans out to every registered validator concurrently, applies a
//! per-validator timeout, and validates each returned opinion set against
//! the schema. One slow or broken validator never delays or poisons the
//! others: its entire set is discarded and recorded as a fault, and the
//! pipeline proceeds with whatever usable sets remain (possibly none).

use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ReconConfig;
use crate::error::ValidatorFault;
use crate::types::{Field, SourceRecord, Validator, ValidatorOpinion};

/// Outcome of one collection round: usable opinion sets keyed by validator
/// id, plus a fault per discarded validator.
#[derive(Debug, Default)]
pub struct CollectedOpinions {
    pub opinions: BTreeMap<String, Vec<ValidatorOpinion>>,
    pub faults: BTreeMap<String, ValidatorFault>,
}

impl CollectedOpinions {
    /// All usable opinions for one field, deterministically ordered
    /// (confidence descending, then validator id).
    pub fn for_field(&self, field: Field) -> Vec<&ValidatorOpinion> {
        let mut out: Vec<&ValidatorOpinion> = self
            .opinions
            .values()
            .flatten()
            .filter(|o| o.field == field)
            .collect();
        out.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.validator_id.cmp(&b.validator_id))
        });
        out
    }
}

pub struct OpinionCollector {
    validators: Vec<Arc<dyn Validator>>,
    timeout: Duration,
}

impl OpinionCollector {
    pub fn new(validators: Vec<Arc<dyn Validator>>, config: &ReconConfig) -> Self {
        Self {
            validators,
            timeout: Duration::from_secs(config.validators.timeout_secs),
        }
    }

    /// Run every validator concurrently against the same immutable inputs.
    ///
    /// Cancellation is cooperative: validators still in flight when the
    /// token fires are dropped and recorded as `Cancelled`.
    pub async fn collect(
        &self,
        part_number: &str,
        sources: &[SourceRecord],
        cancel: &CancellationToken,
    ) -> CollectedOpinions {
        let futures = self.validators.iter().map(|validator| {
            let validator = Arc::clone(validator);
            async move {
                let id = validator.id().to_string();
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => Err(ValidatorFault::Cancelled),
                    result = tokio::time::timeout(
                        self.timeout,
                        validator.evaluate(part_number, sources),
                    ) => match result {
                        Err(_) => Err(ValidatorFault::TimedOut),
                        Ok(Err(e)) => Err(ValidatorFault::Failed(e.to_string())),
                        Ok(Ok(opinions)) => Ok(opinions),
                    },
                };
                (id, outcome)
            }
        });

        let mut collected = CollectedOpinions::default();
        for (id, outcome) in join_all(futures).await {
            match outcome {
                Ok(opinions) => match validate_opinion_set(&id, &opinions, sources) {
                    Ok(()) => {
                        debug!(validator = %id, opinions = opinions.len(), "validator opinions accepted");
                        collected.opinions.insert(id, opinions);
                    }
                    Err(fault) => {
                        warn!(validator = %id, fault = %fault, "discarding validator opinion set");
                        collected.faults.insert(id, fault);
                    }
                },
                Err(fault) => {
                    warn!(validator = %id, fault = %fault, "validator fault");
                    collected.faults.insert(id, fault);
                }
            }
        }
        collected
    }
}

/// Schema validation for one opinion set. Any violation discards the whole
/// set: a validator that hallucinates a source cannot be trusted on its
/// other opinions either.
///
/// The source check is against the records actually supplied to this
/// lookup, not the configured universe: attributing a value to a source
/// that returned nothing this time is just as much a fabrication as
/// naming a source that does not exist at all.
fn validate_opinion_set(
    validator_id: &str,
    opinions: &[ValidatorOpinion],
    sources: &[SourceRecord],
) -> Result<(), ValidatorFault> {
    let mut seen_fields = BTreeSet::new();
    for opinion in opinions {
        if opinion.validator_id != validator_id {
            return Err(ValidatorFault::InvalidOpinion(format!(
                "opinion claims validator '{}'",
                opinion.validator_id
            )));
        }
        if !sources
            .iter()
            .any(|s| s.source_id == opinion.selected_source_id)
        {
            return Err(ValidatorFault::InvalidOpinion(format!(
                "source '{}' is not among the records supplied",
                opinion.selected_source_id
            )));
        }
        if !seen_fields.insert(opinion.field) {
            return Err(ValidatorFault::InvalidOpinion(format!(
                "duplicate opinion for field '{}'",
                opinion.field
            )));
        }
        if !opinion.confidence.is_finite() || !(0.0..=1.0).contains(&opinion.confidence) {
            return Err(ValidatorFault::InvalidOpinion(format!(
                "confidence {} out of range for field '{}'",
                opinion.confidence, opinion.field
            )));
        }
        if opinion.selected_value.field_type() != opinion.field.field_type() {
            return Err(ValidatorFault::InvalidOpinion(format!(
                "value type mismatch for field '{}'",
                opinion.field
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Mock validators for tests
// ============================================================================


// ============================================================================
// Tests
// ============================================================================
