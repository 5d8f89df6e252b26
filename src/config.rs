//! Reconciliation configuration
//!
//! All reconciliation inputs that are policy rather than data live here:
//! per-source field maps and reporting units, validator timeout, per-field
//! importance weights, per-category source priority, per-source base
//! confidence, NOT_APPLICABLE rules, and the validation-gate thresholds.
//!
//! Configuration is immutable for the lifetime of a pipeline and fully
//! validated at load; nothing downstream re-checks it. Any inconsistency
//! is a fatal `ReconError::Config`, never a silent default.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::ReconError;
use crate::types::{Field, FieldCategory, FieldType, Unit};

// ============================================================================
// Sections
// ============================================================================

/// Static mapping from one source's payload keys onto the canonical schema.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Source payload key → canonical field. Keys absent from this map are
    /// ignored by the normalizer.
    pub field_map: BTreeMap<String, Field>,
    /// Reporting unit per source payload key, for numeric fields whose
    /// canonical unit differs from what the source sends.
    #[serde(default)]
    pub units: BTreeMap<String, Unit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    /// Per-validator wall-clock budget; a validator that exceeds it has its
    /// entire opinion set discarded for the run.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Per-category source priority order, most trusted first.
#[derive(Debug, Clone, Deserialize)]
pub struct PriorityConfig {
    /// Used for any category without an explicit list.
    pub default: Vec<String>,
    pub identity: Option<Vec<String>>,
    pub descriptive: Option<Vec<String>>,
    pub pricing: Option<Vec<String>>,
    pub electrical: Option<Vec<String>>,
    pub compatibility: Option<Vec<String>>,
    pub media: Option<Vec<String>>,
}

impl PriorityConfig {
    pub fn for_category(&self, category: FieldCategory) -> &[String] {
        let explicit = match category {
            FieldCategory::Identity => &self.identity,
            FieldCategory::Descriptive => &self.descriptive,
            FieldCategory::Pricing => &self.pricing,
            FieldCategory::Electrical => &self.electrical,
            FieldCategory::Compatibility => &self.compatibility,
            FieldCategory::Media => &self.media,
        };
        explicit.as_deref().unwrap_or(&self.default)
    }

    fn all_lists(&self) -> Vec<&Vec<String>> {
        let mut lists = vec![&self.default];
        for opt in [
            &self.identity,
            &self.descriptive,
            &self.pricing,
            &self.electrical,
            &self.compatibility,
            &self.media,
        ] {
            if let Some(list) = opt {
                lists.push(list);
            }
        }
        lists
    }
}

/// Static trust score for one source, optionally refined per category.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceBaseConfidence {
    pub default: f64,
    pub identity: Option<f64>,
    pub descriptive: Option<f64>,
    pub pricing: Option<f64>,
    pub electrical: Option<f64>,
    pub compatibility: Option<f64>,
    pub media: Option<f64>,
}

impl SourceBaseConfidence {
    pub fn for_category(&self, category: FieldCategory) -> f64 {
        let explicit = match category {
            FieldCategory::Identity => self.identity,
            FieldCategory::Descriptive => self.descriptive,
            FieldCategory::Pricing => self.pricing,
            FieldCategory::Electrical => self.electrical,
            FieldCategory::Compatibility => self.compatibility,
            FieldCategory::Media => self.media,
        };
        explicit.unwrap_or(self.default)
    }

    fn all_values(&self) -> Vec<f64> {
        let mut values = vec![self.default];
        for opt in [
            self.identity,
            self.descriptive,
            self.pricing,
            self.electrical,
            self.compatibility,
            self.media,
        ]
        .into_iter()
        .flatten()
        {
            values.push(opt);
        }
        values
    }
}

/// NOT_APPLICABLE rule: `field` does not apply when `depends_on` resolved
/// to a text value outside `applicable_when` (case-insensitive).
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicabilityRule {
    pub field: Field,
    pub depends_on: Field,
    pub applicable_when: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    /// Fields that must be confidently resolved for a record to be accepted.
    pub critical_fields: Vec<Field>,
    /// Minimum confidence for a priority-fallback critical field to count
    /// as confidently resolved.
    #[serde(default = "default_priority_floor")]
    pub priority_confidence_floor: f64,
    /// Overall-confidence threshold separating NEEDS_REVIEW from REJECTED.
    #[serde(default = "default_review_floor")]
    pub review_confidence_floor: f64,
}

fn default_priority_floor() -> f64 {
    0.65
}

fn default_review_floor() -> f64 {
    0.35
}

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub sources: BTreeMap<String, SourceConfig>,
    #[serde(default)]
    pub validators: ValidatorConfig,
    pub weights: BTreeMap<Field, f64>,
    pub priority: PriorityConfig,
    pub base_confidence: BTreeMap<String, SourceBaseConfidence>,
    #[serde(default)]
    pub applicability: Vec<ApplicabilityRule>,
    pub gate: GateConfig,
}

impl ReconConfig {
    /// Parse and validate a TOML configuration document.
    pub fn from_toml(text: &str) -> Result<Self, ReconError> {
        let config: ReconConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Baseline configuration for the four production sources and the
    /// standard two-validator setup.
    pub fn default_config() -> Result<Self, ReconError> {
        Self::from_toml(DEFAULT_TOML)
    }

    /// Base confidence for one (source, category) pair.
    pub fn base_confidence_for(&self, source_id: &str, category: FieldCategory) -> f64 {
        self.base_confidence
            .get(source_id)
            .map(|entry| entry.for_category(category))
            .unwrap_or(0.0)
    }

    pub fn is_known_source(&self, source_id: &str) -> bool {
        self.sources.contains_key(source_id)
    }

    /// Cross-section consistency checks. Runs once at load.
    pub fn validate(&self) -> Result<(), ReconError> {
        if self.sources.is_empty() {
            return Err(ReconError::Config("at least one source is required".into()));
        }
        if self.validators.timeout_secs == 0 {
            return Err(ReconError::Config(
                "validators.timeout_secs must be at least 1".into(),
            ));
        }

        self.validate_weights()?;
        self.validate_priority()?;
        self.validate_base_confidence()?;
        self.validate_units()?;
        self.validate_applicability()?;
        self.validate_gate()?;
        Ok(())
    }

    fn validate_weights(&self) -> Result<(), ReconError> {
        for field in Field::ALL {
            match self.weights.get(&field) {
                None => {
                    return Err(ReconError::Config(format!(
                        "weights: missing entry for field '{field}'"
                    )))
                }
                Some(w) if !(0.0..=1.0).contains(w) => {
                    return Err(ReconError::Config(format!(
                        "weights: weight for '{field}' must be in [0.0, 1.0], got {w}"
                    )))
                }
                Some(_) => {}
            }
        }
        let sum: f64 = self.weights.values().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ReconError::Config(format!(
                "weights: must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }

    fn validate_priority(&self) -> Result<(), ReconError> {
        for list in self.priority.all_lists() {
            let mut seen = std::collections::BTreeSet::new();
            for source_id in list {
                if !self.sources.contains_key(source_id) {
                    return Err(ReconError::Config(format!(
                        "priority: unknown source '{source_id}'"
                    )));
                }
                if !seen.insert(source_id) {
                    return Err(ReconError::Config(format!(
                        "priority: source '{source_id}' listed more than once"
                    )));
                }
            }
            if seen.len() != self.sources.len() {
                return Err(ReconError::Config(
                    "priority: every configured source must appear in each list".into(),
                ));
            }
        }
        Ok(())
    }

    fn validate_base_confidence(&self) -> Result<(), ReconError> {
        for source_id in self.sources.keys() {
            let entry = self.base_confidence.get(source_id).ok_or_else(|| {
                ReconError::Config(format!(
                    "base_confidence: missing entry for source '{source_id}'"
                ))
            })?;
            for value in entry.all_values() {
                if !(0.0..=1.0).contains(&value) {
                    return Err(ReconError::Config(format!(
                        "base_confidence: value for source '{source_id}' must be in [0.0, 1.0], got {value}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_units(&self) -> Result<(), ReconError> {
        for (source_id, source) in &self.sources {
            for (key, unit) in &source.units {
                let field = source.field_map.get(key).ok_or_else(|| {
                    ReconError::Config(format!(
                        "sources.{source_id}: units key '{key}' is not in field_map"
                    ))
                })?;
                let canonical = field.canonical_unit().ok_or_else(|| {
                    ReconError::Config(format!(
                        "sources.{source_id}: field '{field}' does not take a unit"
                    ))
                })?;
                if canonical.family() != unit.family() {
                    return Err(ReconError::Config(format!(
                        "sources.{source_id}: unit for '{key}' is the wrong kind of measure for field '{field}'"
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_applicability(&self) -> Result<(), ReconError> {
        for rule in &self.applicability {
            if rule.depends_on.field_type() != FieldType::Text {
                return Err(ReconError::Config(format!(
                    "applicability: depends_on field '{}' must be a text field",
                    rule.depends_on
                )));
            }
            if rule.field == rule.depends_on {
                return Err(ReconError::Config(format!(
                    "applicability: field '{}' cannot depend on itself",
                    rule.field
                )));
            }
            if rule.applicable_when.is_empty() {
                return Err(ReconError::Config(format!(
                    "applicability: rule for '{}' has an empty applicable_when list",
                    rule.field
                )));
            }
        }
        Ok(())
    }

    fn validate_gate(&self) -> Result<(), ReconError> {
        for floor in [
            self.gate.priority_confidence_floor,
            self.gate.review_confidence_floor,
        ] {
            if !(0.0..=1.0).contains(&floor) {
                return Err(ReconError::Config(format!(
                    "gate: confidence floors must be in [0.0, 1.0], got {floor}"
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Default configuration
// ============================================================================

/// Baseline tables for the four production sources. Field maps mirror each
/// connector's actual payload shape.
const DEFAULT_TOML: &str = r#"
[validators]
timeout_secs = 15

[sources.encompass.field_map]
partNumber = "part_number"
description = "part_name"
longDescription = "description"
manufacturer = "manufacturer"
partType = "part_type"
retailPrice = "msrp"
itemPrice = "cost"
weight = "weight"
length = "length"
width = "width"
height = "height"
voltage = "voltage"
modelNumbers = "model_compatibility"
imageUrl = "image_urls"

[sources.marcone.field_map]
PartNumber = "part_number"
PartDescription = "part_name"
Make = "manufacturer"
CustomerPrice = "msrp"
Cost = "cost"
Weight = "weight"

[sources.marcone.units]
Weight = "lb"

[sources.reliable.field_map]
part_number = "part_number"
name = "part_name"
brand = "manufacturer"
description = "description"
category = "part_type"
list_price = "msrp"
dealer_price = "cost"
weight = "weight"
models = "model_compatibility"
images = "image_urls"

[sources.reliable.units]
weight = "kg"

[sources.amazon.field_map]
title = "part_name"
brand = "manufacturer"
description = "description"
price = "msrp"
item_weight = "weight"
compatible_models = "model_compatibility"
images = "image_urls"

[sources.amazon.units]
item_weight = "lb"

[weights]
part_number = 0.15
part_name = 0.10
manufacturer = 0.10
description = 0.05
part_type = 0.05
msrp = 0.12
cost = 0.03
weight = 0.05
length = 0.02
width = 0.02
height = 0.02
voltage = 0.04
model_compatibility = 0.15
image_urls = 0.10

[priority]
default = ["encompass", "marcone", "reliable", "amazon"]
pricing = ["encompass", "reliable", "marcone", "amazon"]
media = ["amazon", "encompass", "reliable", "marcone"]

[base_confidence.encompass]
default = 0.70
pricing = 0.75

[base_confidence.marcone]
default = 0.65

[base_confidence.reliable]
default = 0.60

[base_confidence.amazon]
default = 0.50
media = 0.70

[[applicability]]
field = "voltage"
depends_on = "part_type"
applicable_when = [
    "motor",
    "pump",
    "compressor",
    "control board",
    "heating element",
    "fan",
    "valve",
    "switch",
    "thermostat",
]

[gate]
critical_fields = ["part_number", "manufacturer", "msrp"]
priority_confidence_floor = 0.65
review_confidence_floor = 0.35
"#;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses_and_validates() {
        let config = ReconConfig::default_config().unwrap();
        assert_eq!(config.sources.len(), 4);
        assert_eq!(config.validators.timeout_secs, 15);
        assert!(config.is_known_source("encompass"));
        assert!(!config.is_known_source("wikipedia"));
    }

    #[test]
    fn default_priority_falls_back_per_category() {
        let config = ReconConfig::default_config().unwrap();
        // media has an explicit list, electrical falls back to default
        assert_eq!(config.priority.for_category(FieldCategory::Media)[0], "amazon");
        assert_eq!(
            config.priority.for_category(FieldCategory::Electrical)[0],
            "encompass"
        );
    }

    #[test]
    fn base_confidence_category_override() {
        let config = ReconConfig::default_config().unwrap();
        assert_eq!(config.base_confidence_for("amazon", FieldCategory::Media), 0.70);
        assert_eq!(
            config.base_confidence_for("amazon", FieldCategory::Identity),
            0.50
        );
        assert_eq!(config.base_confidence_for("nonexistent", FieldCategory::Media), 0.0);
    }

    #[test]
    fn missing_weight_entry_is_rejected() {
        let doc = DEFAULT_TOML.replace("voltage = 0.04\n", "");
        let err = ReconConfig::from_toml(&doc).unwrap_err();
        assert!(err.to_string().contains("missing entry for field 'voltage'"));
    }

    #[test]
    fn weight_sum_must_be_one() {
        let doc = DEFAULT_TOML.replace("msrp = 0.12", "msrp = 0.50");
        let err = ReconConfig::from_toml(&doc).unwrap_err();
        assert!(err.to_string().contains("must sum to 1.0"));
    }

    #[test]
    fn unknown_priority_source_is_rejected() {
        let doc = DEFAULT_TOML.replace(
            "pricing = [\"encompass\", \"reliable\", \"marcone\", \"amazon\"]",
            "pricing = [\"encompass\", \"reliable\", \"marcone\", \"ebay\"]",
        );
        let err = ReconConfig::from_toml(&doc).unwrap_err();
        assert!(err.to_string().contains("unknown source 'ebay'"));
    }

    #[test]
    fn incomplete_priority_list_is_rejected() {
        let doc = DEFAULT_TOML.replace(
            "media = [\"amazon\", \"encompass\", \"reliable\", \"marcone\"]",
            "media = [\"amazon\", \"encompass\"]",
        );
        let err = ReconConfig::from_toml(&doc).unwrap_err();
        assert!(err.to_string().contains("every configured source"));
    }

    #[test]
    fn missing_base_confidence_is_rejected() {
        let doc = DEFAULT_TOML.replace("[base_confidence.reliable]\ndefault = 0.60\n", "");
        let err = ReconConfig::from_toml(&doc).unwrap_err();
        assert!(err.to_string().contains("missing entry for source 'reliable'"));
    }

    #[test]
    fn unit_family_mismatch_is_rejected() {
        let doc = DEFAULT_TOML.replace("weight = \"kg\"", "weight = \"cm\"");
        let err = ReconConfig::from_toml(&doc).unwrap_err();
        assert!(err.to_string().contains("wrong kind of measure"));
    }

    #[test]
    fn unit_on_unmapped_key_is_rejected() {
        let doc = DEFAULT_TOML.replace(
            "[sources.reliable.units]\nweight = \"kg\"",
            "[sources.reliable.units]\ngirth = \"kg\"",
        );
        let err = ReconConfig::from_toml(&doc).unwrap_err();
        assert!(err.to_string().contains("not in field_map"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let doc = DEFAULT_TOML.replace("timeout_secs = 15", "timeout_secs = 0");
        let err = ReconConfig::from_toml(&doc).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }
}
