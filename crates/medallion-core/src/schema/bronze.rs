//! Raw vehicle message schema for the Bronze layer.

use super::{FieldKind, FieldSpec, TableSchema};
use crate::field_names as f;
use crate::value::Value;
use std::sync::{Arc, OnceLock};

pub const VIN_LENGTH: usize = 17;

/// Shared validator for upstream vehicle messages. Unknown fields are rejected.
pub fn vehicle_message_raw() -> Arc<TableSchema> {
    static SCHEMA: OnceLock<Arc<TableSchema>> = OnceLock::new();
    Arc::clone(SCHEMA.get_or_init(|| Arc::new(build())))
}

fn build() -> TableSchema {
    use FieldKind::*;

    TableSchema::new(
        "vehicle_message_raw",
        vec![
            FieldSpec::required(f::VIN, Utf8).with_rule(normalize_vin),
            FieldSpec::required(f::MANUFACTURER, Utf8).with_rule(trim),
            FieldSpec::optional(f::YEAR, Int64),
            FieldSpec::optional(f::MODEL, Utf8),
            FieldSpec::optional(f::GEAR_POSITION, Utf8).with_rule(trim_upper),
            FieldSpec::optional(f::VELOCITY, Int64).with_rule(non_negative),
            FieldSpec::optional(f::FRONT_LEFT_DOOR_STATE, Utf8),
            FieldSpec::optional(f::WIPERS_STATE, Boolean),
            FieldSpec::optional(f::DRIVER_SEATBELT_STATE, Utf8),
            FieldSpec::non_null(f::TIMESTAMP, Timestamp),
            FieldSpec::optional(f::SPEED, Float64).with_rule(non_negative),
            FieldSpec::optional(f::RPM, Int64).with_rule(non_negative),
            FieldSpec::optional(f::FUEL_LEVEL, Float64).with_rule(non_negative),
            FieldSpec::optional(f::ENGINE_TEMP, Float64).with_rule(non_negative),
            FieldSpec::optional(f::LATITUDE, Float64),
            FieldSpec::optional(f::LONGITUDE, Float64),
            FieldSpec::optional(f::ALTITUDE, Float64),
        ],
    )
}

/// Trim and upper-case, then require 17 ASCII alphanumerics.
fn normalize_vin(value: Value) -> Result<Value, String> {
    let Value::Str(raw) = value else {
        return Ok(value);
    };
    let vin = raw.trim().to_uppercase();

    let len = vin.chars().count();
    if len != VIN_LENGTH {
        return Err(format!("VIN must be {} characters, got {}", VIN_LENGTH, len));
    }
    if !vin.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("VIN must be alphanumeric".to_string());
    }

    Ok(Value::Str(vin))
}

fn trim(value: Value) -> Result<Value, String> {
    match value {
        Value::Str(s) => Ok(Value::Str(s.trim().to_string())),
        other => Ok(other),
    }
}

fn trim_upper(value: Value) -> Result<Value, String> {
    match value {
        Value::Str(s) => Ok(Value::Str(s.trim().to_uppercase())),
        other => Ok(other),
    }
}

fn non_negative(value: Value) -> Result<Value, String> {
    let negative = match &value {
        Value::Int(i) => *i < 0,
        Value::Float(x) => *x < 0.0,
        _ => false,
    };
    if negative {
        Err(format!("must be greater than or equal to 0, got {}", value))
    } else {
        Ok(value)
    }
}
