use crate::errors::{Error, FieldError, Result, ValidationErrors};
use crate::model::{round2, NewTelemetryRecord};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Fields a telemetry payload may carry. `id` and `created_at` are
/// store-assigned and ignored on input; anything else unknown is rejected.
const KNOWN_FIELDS: &[&str] = &[
    "round_count",
    "slim_count",
    "round_void_count",
    "slim_void_count",
    "enqueued_at",
    "azure_device_id",
    "device_id",
    "raw_payload",
    "id",
    "created_at",
];

/// Validates an untyped JSON payload into a normalized record. Reports
/// every violated field in one pass.
pub fn validate_record(input: &Value) -> Result<NewTelemetryRecord> {
    let Some(body) = input.as_object() else {
        return Err(Error::Validation(ValidationErrors {
            errors: vec![FieldError::new("body", "must be a JSON object")],
        }));
    };

    let mut errors = Vec::new();

    for key in body.keys() {
        if !KNOWN_FIELDS.contains(&key.as_str()) {
            errors.push(FieldError::new(key.clone(), "unknown field"));
        }
    }

    let round_count = non_negative_int(body, "round_count", &mut errors);
    let slim_count = non_negative_int(body, "slim_count", &mut errors);
    let round_void_count = decimal2(body, "round_void_count", &mut errors);
    let slim_void_count = decimal2(body, "slim_void_count", &mut errors);
    let enqueued_at = timestamp(body, "enqueued_at", &mut errors);
    let azure_device_id = device_name(body, &mut errors);

    // Callers may echo the resolved foreign key back on updates; it only
    // has to be well-formed, the repository re-resolves it anyway.
    if let Some(value) = body.get("device_id") {
        if value.as_i64().map_or(true, |id| id <= 0) {
            errors.push(FieldError::new("device_id", "must be a positive integer"));
        }
    }

    let raw_payload = match body.get("raw_payload") {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.clone()),
    };

    if !errors.is_empty() {
        return Err(Error::Validation(ValidationErrors { errors }));
    }

    // All extractors succeeded; the Options are only None when an error
    // was recorded above.
    match (
        round_count,
        slim_count,
        round_void_count,
        slim_void_count,
        enqueued_at,
        azure_device_id,
    ) {
        (Some(rc), Some(sc), Some(rv), Some(sv), Some(ts), Some(name)) => {
            Ok(NewTelemetryRecord {
                azure_device_id: name,
                round_count: rc,
                slim_count: sc,
                round_void_count: rv,
                slim_void_count: sv,
                enqueued_at: ts,
                raw_payload,
            })
        }
        _ => Err(Error::Validation(ValidationErrors {
            errors: vec![FieldError::new("body", "validation incomplete")],
        })),
    }
}

fn non_negative_int(body: &Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) -> Option<i64> {
    let Some(value) = body.get(field) else {
        errors.push(FieldError::new(field, "required field is missing"));
        return None;
    };
    match value.as_i64() {
        Some(n) if n >= 0 => Some(n),
        _ => {
            errors.push(FieldError::new(field, "must be a non-negative integer"));
            None
        }
    }
}

/// Decimal in mL, accepted as a JSON number or a decimal-as-string, and
/// rounded to exactly 2 fractional places.
fn decimal2(body: &Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) -> Option<f64> {
    let Some(value) = body.get(field) else {
        errors.push(FieldError::new(field, "required field is missing"));
        return None;
    };
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Some(round2(v)),
        _ => {
            errors.push(FieldError::new(field, "must be a decimal number"));
            None
        }
    }
}

fn timestamp(
    body: &Map<String, Value>,
    field: &str,
    errors: &mut Vec<FieldError>,
) -> Option<DateTime<Utc>> {
    let Some(value) = body.get(field) else {
        errors.push(FieldError::new(field, "required field is missing"));
        return None;
    };
    match value.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()) {
        Some(ts) => Some(ts.with_timezone(&Utc)),
        None => {
            errors.push(FieldError::new(
                field,
                "must be an ISO 8601 timestamp with explicit offset",
            ));
            None
        }
    }
}

fn device_name(body: &Map<String, Value>, errors: &mut Vec<FieldError>) -> Option<String> {
    let Some(value) = body.get("azure_device_id") else {
        errors.push(FieldError::new("azure_device_id", "required field is missing"));
        return None;
    };
    match value.as_str() {
        Some(s) if !s.is_empty() => Some(s.to_string()),
        _ => {
            errors.push(FieldError::new(
                "azure_device_id",
                "must be a non-empty string",
            ));
            None
        }
    }
}
