// Lax JSON-to-Value coercion.
//
// Integers accept integral floats and numeric strings, floats accept integers
// and numeric strings, booleans accept the usual textual spellings and 0/1.

use super::FieldKind;
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;

pub(crate) fn coerce(kind: FieldKind, json: &JsonValue) -> Result<Value, String> {
    if json.is_null() {
        return Ok(Value::Null);
    }

    match kind {
        FieldKind::Utf8 => match json {
            JsonValue::String(s) => Ok(Value::Str(s.clone())),
            other => Err(format!("expected a string, got {}", json_type(other))),
        },
        FieldKind::Int64 => coerce_int(json).map(Value::Int),
        FieldKind::Float64 => coerce_float(json).map(Value::Float),
        FieldKind::Boolean => coerce_bool(json).map(Value::Bool),
        FieldKind::Timestamp => coerce_timestamp(json).map(Value::Timestamp),
    }
}

fn coerce_int(json: &JsonValue) -> Result<i64, String> {
    match json {
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
                _ => Err(format!("expected an integer, got {}", n)),
            }
        }
        JsonValue::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("expected an integer, got '{}'", s)),
        other => Err(format!("expected an integer, got {}", json_type(other))),
    }
}

fn coerce_float(json: &JsonValue) -> Result<f64, String> {
    match json {
        JsonValue::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("expected a number, got {}", n)),
        JsonValue::String(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(f),
            _ => Err(format!("expected a number, got '{}'", s)),
        },
        other => Err(format!("expected a number, got {}", json_type(other))),
    }
}

fn coerce_bool(json: &JsonValue) -> Result<bool, String> {
    match json {
        JsonValue::Bool(b) => Ok(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(format!("expected a boolean, got {}", n)),
        },
        JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" | "t" | "y" => Ok(true),
            "false" | "0" | "no" | "off" | "f" | "n" => Ok(false),
            _ => Err(format!("expected a boolean, got '{}'", s)),
        },
        other => Err(format!("expected a boolean, got {}", json_type(other))),
    }
}

fn coerce_timestamp(json: &JsonValue) -> Result<DateTime<Utc>, String> {
    match json {
        JsonValue::String(s) => parse_timestamp(s),
        JsonValue::Number(n) => {
            let parsed = match n.as_i64() {
                Some(secs) => DateTime::from_timestamp(secs, 0),
                None => n.as_f64().and_then(|f| {
                    let secs = f.floor();
                    let nanos = ((f - secs) * 1e9).round() as u32;
                    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
                }),
            };
            parsed.ok_or_else(|| format!("timestamp out of range: {}", n))
        }
        other => Err(format!("expected a datetime, got {}", json_type(other))),
    }
}

/// Parse an ISO-8601 timestamp into UTC.
///
/// Values with an offset (including `Z`) are converted to UTC; naive values
/// are taken to already be UTC. A bare date means midnight.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, String> {
    let s = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(format!("invalid datetime '{}'", input))
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
