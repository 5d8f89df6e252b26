//! Parts catalog reconciliation core
//!
//! Reconciles replacement-part attributes gathered from multiple
//! unreliable supplier sources, cross-checked by independent validators,
//! into a single versioned catalog record with per-field confidence and
//! provenance.
//!
//! The pipeline never fails a lookup over bad data: malformed fields are
//! dropped and counted, broken validators are discarded and recorded, and
//! the output record's confidence and gate status carry the consequences.
//! Only invalid configuration is fatal.

pub mod builder;
pub mod collector;
pub mod config;
pub mod conflict;
pub mod consensus;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod scoring;
pub mod types;

pub use crate::builder::RecordBuilder;
pub use crate::collector::{CollectedOpinions, OpinionCollector};
pub use crate::config::ReconConfig;
pub use crate::conflict::ConflictAnalyzer;
pub use crate::consensus::ConsensusEngine;
pub use crate::error::{ReconError, ValidatorError, ValidatorFault};
pub use crate::normalizer::Normalizer;
pub use crate::pipeline::ReconPipeline;
pub use crate::scoring::{ConfidenceScorer, StatusClassifier};
pub use crate::types::{
    CatalogFieldEntry, CatalogRecord, ConflictSeverity, ConsensusResult, Field,
    FieldCategory, FieldConflict, FieldStatus, FieldType, FieldValue, Provenance,
    RawSourceRecord, Resolution, SourceRecord, Unit, ValidationStatus, Validator,
    ValidatorOpinion,
};
