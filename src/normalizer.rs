//! Source record normalizer
//!
//! Turns raw, source-specific payloads into canonical `SourceRecord`s:
//! keys mapped through the source's static field map, values coerced to
//! the field's declared type, numeric values converted to canonical units.
//!
//! Malformed values are a logged degradation, never an error: the bad
//! field is dropped (with a `warn!`), the rest of the record survives, and
//! the drop count flows into provenance. A payload with zero recognizable
//! fields still yields a valid, empty record.

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ReconConfig, SourceConfig};
use crate::types::{Field, FieldType, FieldValue, RawSourceRecord, SourceRecord};

pub struct Normalizer<'a> {
    config: &'a ReconConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a ReconConfig) -> Self {
        Self { config }
    }

    /// Normalize one raw payload. Returns the record plus the number of
    /// mapped-but-malformed fields that were dropped.
    ///
    /// A raw record whose `source_id` is not configured yields `None`
    /// (the whole payload is unusable; counted as one drop by the caller).
    pub fn normalize(&self, raw: &RawSourceRecord) -> Option<(SourceRecord, u32)> {
        let source = match self.config.sources.get(&raw.source_id) {
            Some(source) => source,
            None => {
                warn!(
                    source_id = %raw.source_id,
                    "dropping record from unconfigured source"
                );
                return None;
            }
        };

        let mut fields = std::collections::BTreeMap::new();
        let mut dropped: u32 = 0;

        for (key, value) in &raw.fields {
            let field = match source.field_map.get(key) {
                Some(field) => *field,
                // Unmapped keys are simply not part of the schema
                None => continue,
            };
            if is_absent(value) {
                continue;
            }
            match coerce(value, field, source, key) {
                Some(coerced) => {
                    fields.insert(field, coerced);
                }
                None => {
                    warn!(
                        source_id = %raw.source_id,
                        field = %field,
                        key = %key,
                        raw = %value,
                        "dropping malformed field value"
                    );
                    dropped += 1;
                }
            }
        }

        debug!(
            source_id = %raw.source_id,
            fields = fields.len(),
            dropped,
            "normalized source record"
        );

        Some((
            SourceRecord {
                source_id: raw.source_id.clone(),
                queried_at: raw.queried_at,
                fields,
            },
            dropped,
        ))
    }
}

/// JSON null, blank strings, and arrays with no usable members mean the
/// source had nothing to say; they are absent, not malformed.
fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.iter().all(|item| match item {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }),
        _ => false,
    }
}

/// Coerce one raw JSON value to the field's declared type, or `None` if it
/// cannot be represented.
fn coerce(value: &Value, field: Field, source: &SourceConfig, key: &str) -> Option<FieldValue> {
    match field.field_type() {
        FieldType::Text => coerce_text(value),
        FieldType::Number => {
            let n = coerce_number(value)?;
            if !n.is_finite() || n < 0.0 {
                return None;
            }
            let n = match source.units.get(key) {
                Some(unit) => n * unit.canonical_factor(),
                None => n,
            };
            Some(FieldValue::Number(n))
        }
        FieldType::List => coerce_list(value),
    }
}

fn coerce_text(value: &Value) -> Option<FieldValue> {
    match value {
        Value::String(s) => Some(FieldValue::Text(s.trim().to_string())),
        Value::Number(n) => Some(FieldValue::Text(n.to_string())),
        _ => None,
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number_string(s),
        _ => None,
    }
}

/// Parse a numeric string as sources actually send them: plain numbers,
/// currency strings ("$48.99", "1,299.00"), and numbers with a trailing
/// unit word ("2.5 pounds").
fn parse_number_string(s: &str) -> Option<f64> {
    let trimmed = s.trim().trim_start_matches('$').trim();
    let cleaned: String = trimmed.replace(',', "");
    if let Ok(n) = cleaned.parse::<f64>() {
        return Some(n);
    }
    // "2.5 pounds" — take the leading token if it parses
    let first = cleaned.split_whitespace().next()?;
    first.parse::<f64>().ok()
}

fn coerce_list(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    // Blank members are padding, not content
                    Value::String(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
                    Value::String(_) | Value::Null => {}
                    Value::Number(n) => out.push(n.to_string()),
                    // A list with a non-scalar member is malformed as a whole
                    _ => return None,
                }
            }
            // A list must carry at least one usable member
            if out.is_empty() {
                None
            } else {
                Some(FieldValue::List(out))
            }
        }
        // Scalar → single-element list
        Value::String(s) => {
            let parts: Vec<String> = s
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(FieldValue::List(parts))
            }
        }
        Value::Number(n) => Some(FieldValue::List(vec![n.to_string()])),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
