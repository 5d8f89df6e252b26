//! End-to-end pipeline tests with mock validators
//!
//! Exercises whole lookups: raw payloads in, catalog record out, covering
//! validator agreement, close disagreement, validator faults, empty
//! inputs, applicability, and record versioning.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use parts_recon::{
    CatalogRecord, Field, FieldStatus, FieldValue, RawSourceRecord, ReconConfig,
    ReconPipeline, SourceRecord, ValidationStatus, Validator, ValidatorError,
    ValidatorOpinion,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Fixtures
// ============================================================================

struct ScriptedValidator {
    id: String,
    opinions: Vec<ValidatorOpinion>,
    delay: Option<Duration>,
    fail: bool,
}

impl ScriptedValidator {
    fn new(id: &str, opinions: Vec<ValidatorOpinion>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            opinions,
            delay: None,
            fail: false,
        })
    }

    fn hanging(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            opinions: Vec::new(),
            delay: Some(Duration::from_secs(120)),
            fail: false,
        })
    }

    fn broken(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            opinions: Vec::new(),
            delay: None,
            fail: true,
        })
    }
}

#[async_trait]
impl Validator for ScriptedValidator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn evaluate(
        &self,
        _part_number: &str,
        _sources: &[SourceRecord],
    ) -> Result<Vec<ValidatorOpinion>, ValidatorError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ValidatorError::Provider("upstream 500".into()));
        }
        Ok(self.opinions.clone())
    }
}

fn opinion(
    validator_id: &str,
    field: Field,
    value: FieldValue,
    source_id: &str,
    confidence: f64,
) -> ValidatorOpinion {
    ValidatorOpinion {
        validator_id: validator_id.to_string(),
        field,
        selected_value: value,
        selected_source_id: source_id.to_string(),
        confidence,
        rationale: "scripted".to_string(),
    }
}

fn raw(source_id: &str, fields: serde_json::Value) -> RawSourceRecord {
    let map = match fields {
        serde_json::Value::Object(map) => map,
        _ => panic!("fixture must be an object"),
    };
    RawSourceRecord {
        source_id: source_id.to_string(),
        queried_at: Utc::now(),
        fields: map,
    }
}

/// Three healthy sources agreeing on the critical fields.
fn healthy_sources() -> Vec<RawSourceRecord> {
    vec![
        raw(
            "encompass",
            json!({
                "partNumber": "WPW10730972",
                "description": "Ice Maker Assembly",
                "manufacturer": "Whirlpool",
                "partType": "Motor",
                "retailPrice": "$48.99",
                "weight": 2.5,
                "modelNumbers": "WRF535SWHZ, WRF535SMHZ"
            }),
        ),
        raw(
            "marcone",
            json!({
                "PartNumber": "WPW10730972",
                "PartDescription": "Icemaker Assembly",
                "Make": "Whirlpool",
                "CustomerPrice": 48.99,
                "Weight": 2.4
            }),
        ),
        raw(
            "amazon",
            json!({
                "title": "Whirlpool Ice Maker Assembly WPW10730972",
                "brand": "Whirlpool",
                "price": 52.99,
                "images": ["https://img/1.jpg", "https://img/2.jpg"]
            }),
        ),
    ]
}

/// Opinions where both validators agree on all critical fields.
fn agreeing_opinions(validator_id: &str) -> Vec<ValidatorOpinion> {
    vec![
        opinion(
            validator_id,
            Field::PartNumber,
            FieldValue::Text("WPW10730972".into()),
            "encompass",
            0.95,
        ),
        opinion(
            validator_id,
            Field::Manufacturer,
            FieldValue::Text("Whirlpool".into()),
            "encompass",
            0.9,
        ),
        opinion(
            validator_id,
            Field::Msrp,
            FieldValue::Number(48.99),
            "encompass",
            0.85,
        ),
    ]
}

fn pipeline(validators: Vec<Arc<dyn Validator>>) -> ReconPipeline {
    let config = ReconConfig::default_config().unwrap();
    ReconPipeline::new(Arc::new(config), validators)
}

// ============================================================================
// Scenario: full agreement
// ============================================================================

#[tokio::test]
async fn agreeing_validators_produce_an_accepted_record() {
    init_tracing();
    let pipeline = pipeline(vec![
        ScriptedValidator::new("openai", agreeing_opinions("openai")),
        ScriptedValidator::new("grok", agreeing_opinions("grok")),
    ]);
    let record = pipeline
        .run("WPW10730972", &healthy_sources(), &CancellationToken::new())
        .await;

    assert_eq!(record.validation_status, ValidationStatus::Accepted);
    let msrp = &record.fields[&Field::Msrp];
    assert_eq!(msrp.value, Some(FieldValue::Number(48.99)));
    assert_eq!(msrp.status, FieldStatus::Found);
    // Agreement confidence is the minimum among agreeing validators
    assert!((msrp.confidence - 0.85).abs() < 1e-9);
    assert_eq!(record.provenance.validators, vec!["grok", "openai"]);
    assert!(record.provenance.failed_validators.is_empty());
}

// ============================================================================
// Scenario: close disagreement falls back to source priority
// ============================================================================

#[tokio::test]
async fn close_disagreement_falls_back_to_source_priority() {
    init_tracing();
    let v1 = ScriptedValidator::new(
        "openai",
        vec![opinion(
            "openai",
            Field::Msrp,
            FieldValue::Number(48.99),
            "encompass",
            0.70,
        )],
    );
    let v2 = ScriptedValidator::new(
        "grok",
        vec![opinion(
            "grok",
            Field::Msrp,
            FieldValue::Number(52.99),
            "amazon",
            0.68,
        )],
    );
    let pipeline = pipeline(vec![v1, v2]);
    let record = pipeline
        .run("WPW10730972", &healthy_sources(), &CancellationToken::new())
        .await;

    let msrp = &record.fields[&Field::Msrp];
    // Pricing priority puts encompass first; its pricing base confidence is 0.75
    assert_eq!(msrp.source.as_deref(), Some("encompass"));
    assert_eq!(msrp.value, Some(FieldValue::Number(48.99)));
    assert!((msrp.confidence - 0.75).abs() < 1e-9);
}

// ============================================================================
// Scenario: validator faults are isolated
// ============================================================================

#[tokio::test(start_paused = true)]
async fn hanging_validator_is_discarded_and_recorded() {
    init_tracing();
    let healthy = ScriptedValidator::new("openai", agreeing_opinions("openai"));
    let hanging = ScriptedValidator::hanging("grok");
    let pipeline = pipeline(vec![healthy, hanging]);
    let record = pipeline
        .run("WPW10730972", &healthy_sources(), &CancellationToken::new())
        .await;

    assert_eq!(record.provenance.validators, vec!["openai"]);
    assert_eq!(record.provenance.failed_validators, vec!["grok"]);
    // The surviving single validator still resolved the field
    let msrp = &record.fields[&Field::Msrp];
    assert_eq!(msrp.value, Some(FieldValue::Number(48.99)));
    assert!((msrp.confidence - 0.85 * 0.85).abs() < 1e-9);
}

#[tokio::test]
async fn broken_validator_degrades_to_priority_fallback() {
    init_tracing();
    let pipeline = pipeline(vec![
        ScriptedValidator::broken("openai") as Arc<dyn Validator>,
        ScriptedValidator::broken("grok") as Arc<dyn Validator>,
    ]);
    let record = pipeline
        .run("WPW10730972", &healthy_sources(), &CancellationToken::new())
        .await;

    assert!(record.provenance.validators.is_empty());
    assert_eq!(record.provenance.failed_validators.len(), 2);
    // Every populated field fell back to source priority
    let part_number = &record.fields[&Field::PartNumber];
    assert_eq!(part_number.value, Some(FieldValue::Text("WPW10730972".into())));
    assert_eq!(part_number.source.as_deref(), Some("encompass"));
}

// ============================================================================
// Scenario: nothing to work with
// ============================================================================

#[tokio::test]
async fn empty_inputs_still_produce_a_record() {
    init_tracing();
    let pipeline = pipeline(vec![]);
    let record = pipeline.run("W999", &[], &CancellationToken::new()).await;

    assert_eq!(record.validation_status, ValidationStatus::Rejected);
    assert_eq!(record.overall_confidence, 0.0);
    assert_eq!(record.fields.len(), Field::ALL.len());
    for entry in record.fields.values() {
        assert!(entry.value.is_none());
        assert_eq!(entry.confidence, 0.0);
    }
    assert_eq!(record.fields[&Field::Msrp].status, FieldStatus::NotFound);
}

// ============================================================================
// Applicability end to end
// ============================================================================

#[tokio::test]
async fn voltage_is_not_applicable_for_a_gasket() {
    init_tracing();
    let sources = vec![raw(
        "encompass",
        json!({
            "partNumber": "W10195416",
            "partType": "Door Gasket",
            "manufacturer": "Whirlpool"
        }),
    )];
    let pipeline = pipeline(vec![]);
    let record = pipeline
        .run("W10195416", &sources, &CancellationToken::new())
        .await;

    assert_eq!(record.fields[&Field::Voltage].status, FieldStatus::NotApplicable);
    assert_eq!(record.fields[&Field::Weight].status, FieldStatus::NotFound);
}

// ============================================================================
// Malformed data and provenance
// ============================================================================

#[tokio::test]
async fn malformed_fields_are_counted_not_fatal() {
    init_tracing();
    let sources = vec![
        raw(
            "encompass",
            json!({
                "partNumber": "W123",
                "retailPrice": "call for price",
                "weight": -1.0
            }),
        ),
        raw("ebay", json!({ "title": "mystery part" })),
    ];
    let pipeline = pipeline(vec![]);
    let record = pipeline.run("W123", &sources, &CancellationToken::new()).await;

    // 2 malformed fields + 1 unconfigured source payload
    assert_eq!(record.provenance.dropped_fields, 3);
    assert_eq!(record.provenance.sources, vec!["encompass"]);
    assert_eq!(
        record.fields[&Field::PartNumber].value,
        Some(FieldValue::Text("W123".into()))
    );
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn cancellation_skips_validators_but_still_builds() {
    init_tracing();
    let hanging = ScriptedValidator::hanging("openai");
    let pipeline = pipeline(vec![hanging]);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let record = pipeline
        .run("WPW10730972", &healthy_sources(), &cancel)
        .await;

    assert_eq!(record.provenance.failed_validators, vec!["openai"]);
    // Source-priority resolution still happened
    assert_eq!(
        record.fields[&Field::PartNumber].value,
        Some(FieldValue::Text("WPW10730972".into()))
    );
}

// ============================================================================
// Versioning
// ============================================================================

#[tokio::test]
async fn rerun_chains_record_versions() {
    init_tracing();
    let pipeline = pipeline(vec![
        ScriptedValidator::new("openai", agreeing_opinions("openai")),
        ScriptedValidator::new("grok", agreeing_opinions("grok")),
    ]);
    let first: CatalogRecord = pipeline
        .run("WPW10730972", &healthy_sources(), &CancellationToken::new())
        .await;
    let second = pipeline
        .run_next_version(&first, &healthy_sources(), &CancellationToken::new())
        .await;

    assert_eq!(second.previous_version, Some(first.record_id));
    assert_ne!(second.record_id, first.record_id);
    assert_eq!(second.part_number, first.part_number);
    assert!(first.previous_version.is_none());
}

// ============================================================================
// Determinism
// ============================================================================

#[tokio::test]
async fn same_inputs_resolve_identically() {
    init_tracing();
    let build = || {
        pipeline(vec![
            ScriptedValidator::new("openai", agreeing_opinions("openai")),
            ScriptedValidator::new("grok", agreeing_opinions("grok")),
        ])
    };
    let a = build()
        .run("WPW10730972", &healthy_sources(), &CancellationToken::new())
        .await;
    let b = build()
        .run("WPW10730972", &healthy_sources(), &CancellationToken::new())
        .await;

    assert_eq!(a.validation_status, b.validation_status);
    assert_eq!(a.overall_confidence, b.overall_confidence);
    for field in Field::ALL {
        assert_eq!(a.fields[&field].value, b.fields[&field].value);
        assert_eq!(a.fields[&field].confidence, b.fields[&field].confidence);
        assert_eq!(a.fields[&field].source, b.fields[&field].source);
    }
}

// ============================================================================
// Resolution provenance on the record
// ============================================================================

#[tokio::test]
async fn priority_fallback_uses_category_order() {
    init_tracing();
    // Only amazon and reliable have images; media priority puts amazon first
    let sources = vec![
        raw("amazon", json!({ "images": ["https://a/1.jpg"] })),
        raw("reliable", json!({ "images": ["https://r/1.jpg"] })),
    ];
    let pipeline = pipeline(vec![]);
    let record = pipeline.run("W123", &sources, &CancellationToken::new()).await;

    let images = &record.fields[&Field::ImageUrls];
    assert_eq!(images.source.as_deref(), Some("amazon"));
    assert_eq!(
        images.value,
        Some(FieldValue::List(vec!["https://a/1.jpg".into()]))
    );
    // Media base confidence for amazon is the category override
    assert!((images.confidence - 0.70).abs() < 1e-9);
}
