//! Error taxonomy for the reconciliation pipeline
//!
//! Three distinct failure classes with different blast radii:
//! - `ReconError::Config*` — fatal, surfaced before any pipeline run
//! - `ValidatorFault` — one validator's entire opinion set is discarded,
//!   the run continues with the remaining validators
//! - malformed source data — logged and dropped at the normalizer, never
//!   an error at all (tracked only as a drop count in provenance)

use thiserror::Error;

/// Fatal configuration-level errors. These abort construction; nothing
/// else in the pipeline aborts a run.
#[derive(Debug, Error)]
pub enum ReconError {
    /// Invalid or inconsistent configuration (missing weight entries,
    /// weights not summing to 1.0, unknown sources in a priority list, ...)
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file failed to parse as TOML
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Error returned by a `Validator` implementation from `evaluate()`.
///
/// Validators map their provider-specific failures onto these variants;
/// the collector treats them all the same way (whole-set discard).
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("network error: {0}")]
    Network(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Why a validator's opinion set was discarded for one run.
///
/// Recorded per validator in provenance; a faulted validator is absent
/// from consensus, never present with zeroed confidence.
#[derive(Debug, Clone, Error)]
pub enum ValidatorFault {
    #[error("timed out")]
    TimedOut,

    #[error("failed: {0}")]
    Failed(String),

    #[error("invalid opinion: {0}")]
    InvalidOpinion(String),

    #[error("cancelled")]
    Cancelled,
}
