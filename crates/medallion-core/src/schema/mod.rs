//! Record schemas and the validation capability consumed by the writer.
//!
//! A [`TableSchema`] is an ordered list of [`FieldSpec`]s. Validation coerces
//! each raw JSON scalar into the field's [`FieldKind`], enforces presence, then
//! runs the field's optional rule. Every problem in a record is collected so a
//! caller sees all of them at once.

pub mod bronze;
mod coerce;

use crate::value::{RawRecord, Row, Value};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use coerce::parse_timestamp;

/// Timezone tag written on every timestamp column.
pub const UTC: &str = "UTC";

/// Logical type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Utf8,
    Int64,
    Float64,
    Boolean,
    Timestamp,
}

impl FieldKind {
    pub fn data_type(&self) -> DataType {
        match self {
            FieldKind::Utf8 => DataType::Utf8,
            FieldKind::Int64 => DataType::Int64,
            FieldKind::Float64 => DataType::Float64,
            FieldKind::Boolean => DataType::Boolean,
            FieldKind::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, Some(UTC.into())),
        }
    }
}

/// Whether a field's key must appear and whether it may be null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Key may be absent; absent means null.
    Optional,
    /// Key must be present, value may be null.
    Required,
    /// Key must be present with a non-null value.
    NonNull,
}

/// Post-coercion check/normalization. Only called for non-null values.
pub type FieldRule = fn(Value) -> Result<Value, String>;

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub presence: Presence,
    pub rule: Option<FieldRule>,
}

impl FieldSpec {
    pub fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Optional,
            rule: None,
        }
    }

    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            presence: Presence::Required,
            ..Self::optional(name, kind)
        }
    }

    pub fn non_null(name: &'static str, kind: FieldKind) -> Self {
        Self {
            presence: Presence::NonNull,
            ..Self::optional(name, kind)
        }
    }

    pub fn with_rule(mut self, rule: FieldRule) -> Self {
        self.rule = Some(rule);
        self
    }

    fn validate(&self, raw: Option<&serde_json::Value>) -> Result<Value, String> {
        let value = match raw {
            None if self.presence == Presence::Optional => return Ok(Value::Null),
            None => return Err("field required".to_string()),
            Some(json) => coerce::coerce(self.kind, json)?,
        };

        if value.is_null() {
            if self.presence == Presence::NonNull {
                return Err("value must not be null".to_string());
            }
            return Ok(Value::Null);
        }

        match self.rule {
            Some(rule) => rule(value),
            None => Ok(value),
        }
    }
}

/// One field-level problem within a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Structured field-level errors for a single record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render_field_errors(.errors))]
pub struct RecordError {
    pub errors: Vec<FieldError>,
}

fn render_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|err| format!("{}: {}", err.field, err.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Schema validation capability: raw mapping in, validated row (or errors) out.
///
/// The returned [`Row`] is aligned with [`RecordValidator::arrow_schema`].
pub trait RecordValidator: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn arrow_schema(&self) -> SchemaRef;

    fn validate(&self, record: &RawRecord) -> Result<Row, RecordError>;
}

/// Field-list schema with an unknown-field policy.
#[derive(Debug, Clone)]
pub struct TableSchema {
    name: &'static str,
    fields: Vec<FieldSpec>,
    reject_unknown: bool,
    arrow: SchemaRef,
}

impl TableSchema {
    /// Build a schema that rejects fields it does not declare.
    pub fn new(name: &'static str, fields: Vec<FieldSpec>) -> Self {
        let arrow = Arc::new(Schema::new(
            fields
                .iter()
                .map(|f| Field::new(f.name, f.kind.data_type(), f.presence != Presence::NonNull))
                .collect::<Vec<_>>(),
        ));
        Self {
            name,
            fields,
            reject_unknown: true,
            arrow,
        }
    }

    pub fn allow_unknown(mut self) -> Self {
        self.reject_unknown = false;
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn is_declared(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f.name == key)
    }
}

impl RecordValidator for TableSchema {
    fn name(&self) -> &str {
        self.name
    }

    fn arrow_schema(&self) -> SchemaRef {
        Arc::clone(&self.arrow)
    }

    fn validate(&self, record: &RawRecord) -> Result<Row, RecordError> {
        let mut errors = Vec::new();

        if self.reject_unknown {
            for key in record.keys().filter(|k| !self.is_declared(k)) {
                errors.push(FieldError {
                    field: key.clone(),
                    message: "extra fields not permitted".to_string(),
                });
            }
        }

        let mut row = Vec::with_capacity(self.fields.len());
        for spec in &self.fields {
            match spec.validate(record.get(spec.name)) {
                Ok(value) => row.push(value),
                Err(message) => errors.push(FieldError {
                    field: spec.name.to_string(),
                    message,
                }),
            }
        }

        if errors.is_empty() {
            Ok(row)
        } else {
            Err(RecordError { errors })
        }
    }
}
