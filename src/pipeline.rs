//! End-to-end reconciliation pipeline
//!
//! Orchestrates the stages for one part lookup:
//!
//! 1. Normalize raw source payloads (Stage 1)
//! 2. Conflict analysis and validator opinion collection, concurrently
//!    over the same immutable normalized set (Stage 2)
//! 3. Per-field consensus resolution (Stage 3)
//! 4. Scoring, status classification, and record assembly (Stage 4)
//!
//! `run` always produces a record. The only fatal error in the whole crate
//! is invalid configuration, caught at construction; every data-quality
//! problem after that degrades confidence instead of failing the lookup.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::builder::RecordBuilder;
use crate::collector::OpinionCollector;
use crate::config::ReconConfig;
use crate::conflict::ConflictAnalyzer;
use crate::consensus::ConsensusEngine;
use crate::normalizer::Normalizer;
use crate::scoring::{ConfidenceScorer, StatusClassifier};
use crate::types::{CatalogRecord, Provenance, RawSourceRecord, SourceRecord, Validator};

pub struct ReconPipeline {
    config: Arc<ReconConfig>,
    analyzer: ConflictAnalyzer,
    collector: OpinionCollector,
    consensus: ConsensusEngine,
}

impl ReconPipeline {
    pub fn new(config: Arc<ReconConfig>, validators: Vec<Arc<dyn Validator>>) -> Self {
        let collector = OpinionCollector::new(validators, &config);
        Self {
            config,
            analyzer: ConflictAnalyzer::new(),
            collector,
            consensus: ConsensusEngine::new(),
        }
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    /// Reconcile one part from its raw source payloads.
    pub async fn run(
        &self,
        part_number: &str,
        raw_sources: &[RawSourceRecord],
        cancel: &CancellationToken,
    ) -> CatalogRecord {
        self.run_inner(part_number, raw_sources, cancel, None).await
    }

    /// Reconcile a part again, producing the next version of an existing
    /// record.
    pub async fn run_next_version(
        &self,
        previous: &CatalogRecord,
        raw_sources: &[RawSourceRecord],
        cancel: &CancellationToken,
    ) -> CatalogRecord {
        self.run_inner(&previous.part_number, raw_sources, cancel, Some(previous))
            .await
    }

    async fn run_inner(
        &self,
        part_number: &str,
        raw_sources: &[RawSourceRecord],
        cancel: &CancellationToken,
        previous: Option<&CatalogRecord>,
    ) -> CatalogRecord {
        info!(part_number, raw_sources = raw_sources.len(), "reconciliation started");

        // Stage 1: normalize
        let normalizer = Normalizer::new(&self.config);
        let mut sources: Vec<SourceRecord> = Vec::with_capacity(raw_sources.len());
        let mut dropped_fields: u32 = 0;
        for raw in raw_sources {
            match normalizer.normalize(raw) {
                Some((record, dropped)) => {
                    dropped_fields += dropped;
                    sources.push(record);
                }
                // Unconfigured source: the whole payload is unusable
                None => dropped_fields += 1,
            }
        }
        debug!(
            part_number,
            sources = sources.len(),
            dropped_fields,
            "sources normalized"
        );

        // Stage 2: conflicts and opinions over the same immutable set
        let (conflicts, collected) = tokio::join!(
            async { self.analyzer.analyze(&sources) },
            self.collector.collect(part_number, &sources, cancel),
        );
        debug!(
            part_number,
            conflicts = conflicts.len(),
            usable_validators = collected.opinions.len(),
            failed_validators = collected.faults.len(),
            "analysis complete"
        );

        // Stage 3: per-field consensus
        let results = self
            .consensus
            .resolve(&sources, &collected, &conflicts, &self.config);

        // Stage 4: score, classify, assemble
        let overall = ConfidenceScorer::overall(&results, &self.config);
        let statuses = StatusClassifier::classify(&results, &self.config);
        let provenance = Provenance {
            sources: sources.iter().map(|s| s.source_id.clone()).collect(),
            validators: collected.opinions.keys().cloned().collect(),
            failed_validators: collected.faults.keys().cloned().collect(),
            dropped_fields,
        };

        let record = match previous {
            Some(previous) => RecordBuilder::next_version(
                previous,
                &results,
                &statuses,
                overall,
                provenance,
                &self.config,
            ),
            None => RecordBuilder::build(
                part_number,
                &results,
                &statuses,
                overall,
                provenance,
                &self.config,
            ),
        };

        info!(
            part_number,
            record_id = %record.record_id,
            status = ?record.validation_status,
            overall_confidence = record.overall_confidence,
            sources = record.provenance.sources.len(),
            validators = record.provenance.validators.len(),
            failed_validators = record.provenance.failed_validators.len(),
            dropped_fields = record.provenance.dropped_fields,
            "reconciliation finished"
        );
        record
    }
}
