//! Core types and trait definitions for the reconciliation pipeline
//!
//! Defines the data model flowing through the stages:
//! - **Stage 1:** `RawSourceRecord` → `SourceRecord` (normalizer)
//! - **Stage 2:** `FieldConflict` + `ValidatorOpinion` (analyzer / collector)
//! - **Stage 3:** `ConsensusResult` (consensus engine)
//! - **Stage 4:** `CatalogRecord` (builder / gate)
//!
//! All stage outputs are immutable once produced; concurrent stages only
//! share read-only references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::ValidatorError;

// ============================================================================
// Field Schema
// ============================================================================

/// Canonical catalog field.
///
/// The schema is closed: every stage indexes by this enum, never by raw
/// source-specific key strings. Source keys are mapped onto these fields by
/// the normalizer using the static per-source tables in `ReconConfig`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    PartNumber,
    PartName,
    Manufacturer,
    Description,
    PartType,
    Msrp,
    Cost,
    Weight,
    Length,
    Width,
    Height,
    Voltage,
    ModelCompatibility,
    ImageUrls,
}

impl Field {
    /// Every schema field, in canonical order.
    pub const ALL: [Field; 14] = [
        Field::PartNumber,
        Field::PartName,
        Field::Manufacturer,
        Field::Description,
        Field::PartType,
        Field::Msrp,
        Field::Cost,
        Field::Weight,
        Field::Length,
        Field::Width,
        Field::Height,
        Field::Voltage,
        Field::ModelCompatibility,
        Field::ImageUrls,
    ];

    /// Declared value type for this field.
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::PartNumber
            | Field::PartName
            | Field::Manufacturer
            | Field::Description
            | Field::PartType => FieldType::Text,
            Field::Msrp
            | Field::Cost
            | Field::Weight
            | Field::Length
            | Field::Width
            | Field::Height
            | Field::Voltage => FieldType::Number,
            Field::ModelCompatibility | Field::ImageUrls => FieldType::List,
        }
    }

    /// Canonical unit for numeric fields that carry one.
    ///
    /// Weights normalize to pounds, linear dimensions to inches. Currency
    /// and voltage fields have no configurable unit.
    pub fn canonical_unit(&self) -> Option<Unit> {
        match self {
            Field::Weight => Some(Unit::Pounds),
            Field::Length | Field::Width | Field::Height => Some(Unit::Inches),
            _ => None,
        }
    }

    /// Field category driving source priority, base confidence, and
    /// applicability rules.
    pub fn category(&self) -> FieldCategory {
        match self {
            Field::PartNumber | Field::PartName | Field::Manufacturer => FieldCategory::Identity,
            Field::Description
            | Field::PartType
            | Field::Weight
            | Field::Length
            | Field::Width
            | Field::Height => FieldCategory::Descriptive,
            Field::Msrp | Field::Cost => FieldCategory::Pricing,
            Field::Voltage => FieldCategory::Electrical,
            Field::ModelCompatibility => FieldCategory::Compatibility,
            Field::ImageUrls => FieldCategory::Media,
        }
    }

    /// Canonical (serde) name for this field.
    pub fn name(&self) -> &'static str {
        match self {
            Field::PartNumber => "part_number",
            Field::PartName => "part_name",
            Field::Manufacturer => "manufacturer",
            Field::Description => "description",
            Field::PartType => "part_type",
            Field::Msrp => "msrp",
            Field::Cost => "cost",
            Field::Weight => "weight",
            Field::Length => "length",
            Field::Width => "width",
            Field::Height => "height",
            Field::Voltage => "voltage",
            Field::ModelCompatibility => "model_compatibility",
            Field::ImageUrls => "image_urls",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    List,
}

/// Field category for priority / base-confidence / applicability tables.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
    Identity,
    Descriptive,
    Pricing,
    Electrical,
    Compatibility,
    Media,
}

impl std::fmt::Display for FieldCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldCategory::Identity => "identity",
            FieldCategory::Descriptive => "descriptive",
            FieldCategory::Pricing => "pricing",
            FieldCategory::Electrical => "electrical",
            FieldCategory::Compatibility => "compatibility",
            FieldCategory::Media => "media",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Units
// ============================================================================

/// Measurement unit a source reports a numeric field in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "lb")]
    Pounds,
    #[serde(rename = "kg")]
    Kilograms,
    #[serde(rename = "g")]
    Grams,
    #[serde(rename = "oz")]
    Ounces,
    #[serde(rename = "in")]
    Inches,
    #[serde(rename = "cm")]
    Centimeters,
    #[serde(rename = "mm")]
    Millimeters,
    #[serde(rename = "m")]
    Meters,
}

/// Unit family, used to reject a mass unit configured on a length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitFamily {
    Mass,
    Length,
}

impl Unit {
    pub fn family(&self) -> UnitFamily {
        match self {
            Unit::Pounds | Unit::Kilograms | Unit::Grams | Unit::Ounces => UnitFamily::Mass,
            Unit::Inches | Unit::Centimeters | Unit::Millimeters | Unit::Meters => {
                UnitFamily::Length
            }
        }
    }

    /// Multiplier converting a value in this unit to the family's canonical
    /// unit (pounds for mass, inches for length).
    pub fn canonical_factor(&self) -> f64 {
        match self {
            Unit::Pounds => 1.0,
            Unit::Kilograms => 2.204_622_6,
            Unit::Grams => 0.002_204_622_6,
            Unit::Ounces => 0.0625,
            Unit::Inches => 1.0,
            Unit::Centimeters => 0.393_700_8,
            Unit::Millimeters => 0.039_370_08,
            Unit::Meters => 39.370_08,
        }
    }
}

// ============================================================================
// Field Values
// ============================================================================

/// Typed, normalized field value. Absence is expressed as `Option::None`
/// around this type, never as a null variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Text(_) => FieldType::Text,
            FieldValue::Number(_) => FieldType::Number,
            FieldValue::List(_) => FieldType::List,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::List(v) => write!(f, "[{}]", v.join(", ")),
        }
    }
}

// ============================================================================
// Source Records
// ============================================================================

/// Raw per-source payload as handed over by a source connector.
///
/// Keys and value shapes are source-specific; only the normalizer looks
/// inside `fields`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSourceRecord {
    pub source_id: String,
    pub queried_at: DateTime<Utc>,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Normalized per-source record: canonical field keys, canonical units,
/// coerced types. Immutable once produced.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRecord {
    pub source_id: String,
    pub queried_at: DateTime<Utc>,
    pub fields: BTreeMap<Field, FieldValue>,
}

impl SourceRecord {
    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.fields.get(&field)
    }
}

// ============================================================================
// Validator Capability
// ============================================================================

/// One validator's per-field verdict: which source got this field right.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorOpinion {
    pub validator_id: String,
    pub field: Field,
    pub selected_value: FieldValue,
    pub selected_source_id: String,
    /// Confidence in [0.0, 1.0]; out-of-range values fail schema validation.
    pub confidence: f64,
    pub rationale: String,
}

/// Independent opinion generator (AI-backed or rule-based).
///
/// Implementations are registered with the `OpinionCollector` and invoked
/// concurrently; they must not mutate their inputs. A new validator is added
/// by implementing this trait — downstream consensus logic never branches on
/// validator identity.
#[async_trait::async_trait]
pub trait Validator: Send + Sync {
    /// Stable identifier used for provenance and fault reporting.
    fn id(&self) -> &str;

    /// Inspect all normalized source records for one part and propose a best
    /// value per field.
    async fn evaluate(
        &self,
        part_number: &str,
        sources: &[SourceRecord],
    ) -> Result<Vec<ValidatorOpinion>, ValidatorError>;
}

// ============================================================================
// Conflicts
// ============================================================================

/// Conflict severity, classified from raw normalized values only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Minor,
    Moderate,
    Major,
    Incompatible,
}

impl std::fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConflictSeverity::Minor => "minor",
            ConflictSeverity::Moderate => "moderate",
            ConflictSeverity::Major => "major",
            ConflictSeverity::Incompatible => "incompatible",
        };
        f.write_str(name)
    }
}

/// Disagreement between sources on one field.
#[derive(Debug, Clone, Serialize)]
pub struct FieldConflict {
    pub field: Field,
    pub values_by_source: BTreeMap<String, FieldValue>,
    pub severity: ConflictSeverity,
}

// ============================================================================
// Consensus
// ============================================================================

/// How a field's final value was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    ValidatorConsensus,
    ValidatorSingle,
    SourcePriority,
    None,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Resolution::ValidatorConsensus => "validator_consensus",
            Resolution::ValidatorSingle => "validator_single",
            Resolution::SourcePriority => "source_priority",
            Resolution::None => "none",
        };
        f.write_str(name)
    }
}

/// Authoritative per-field output of the consensus engine.
///
/// Invariant: `agreement == true` only when at least two validators
/// independently selected equivalent values.
#[derive(Debug, Clone, Serialize)]
pub struct ConsensusResult {
    pub field: Field,
    pub final_value: Option<FieldValue>,
    pub confidence: f64,
    pub resolution: Resolution,
    /// Source the final value is attributed to (absent for unresolved fields).
    pub source_id: Option<String>,
    pub agreement: bool,
    pub notes: Vec<String>,
}

// ============================================================================
// Catalog Record
// ============================================================================

/// Three-way field status. NOT_FOUND ("nobody had it") and NOT_APPLICABLE
/// ("does not apply to this part") are distinct for completeness scoring and
/// must never be collapsed into a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Found,
    NotFound,
    NotApplicable,
}

/// Record-level gate decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Accepted,
    NeedsReview,
    Rejected,
}

/// Final per-field entry exposed on the catalog record.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogFieldEntry {
    pub value: Option<FieldValue>,
    pub status: FieldStatus,
    pub confidence: f64,
    pub source: Option<String>,
}

/// Which sources and validators contributed to a record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Provenance {
    /// Source ids that supplied a normalized record (even an empty one).
    pub sources: Vec<String>,
    /// Validators whose opinion sets passed schema validation.
    pub validators: Vec<String>,
    /// Validators discarded for timeout, error, or invalid opinions.
    pub failed_validators: Vec<String>,
    /// Raw fields dropped by the normalizer as malformed.
    pub dropped_fields: u32,
}

/// The single durable output of a lookup. Immutable after creation: a
/// rebuild produces a new record pointing back at the prior one via
/// `previous_version`.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogRecord {
    pub record_id: Uuid,
    pub part_number: String,
    pub fields: BTreeMap<Field, CatalogFieldEntry>,
    pub overall_confidence: f64,
    pub validation_status: ValidationStatus,
    pub provenance: Provenance,
    pub created_at: DateTime<Utc>,
    pub previous_version: Option<Uuid>,
}

// ============================================================================
// Tests
// ============================================================================
