// Row-to-column conversion.
//
// Validated rows are pivoted into one Arrow RecordBatch. Column builders are
// chosen from the target schema, so any schema produced by a RecordValidator
// can be materialized here.

use crate::value::{Row, Value};
use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, RecordBatch, StringBuilder,
    TimestampMicrosecondBuilder,
};
use arrow::datatypes::{DataType, SchemaRef, TimeUnit};
use arrow::error::ArrowError;
use std::sync::Arc;

/// Build a RecordBatch from rows aligned with `schema`.
pub fn rows_to_record_batch(schema: SchemaRef, rows: &[Row]) -> Result<RecordBatch, ArrowError> {
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

    for (idx, field) in schema.fields().iter().enumerate() {
        let values = rows.iter().map(|row| row.get(idx).unwrap_or(&Value::Null));
        let column = build_column(field.name(), field.data_type(), values, rows.len())?;
        columns.push(column);
    }

    RecordBatch::try_new(schema, columns)
}

fn build_column<'a>(
    name: &str,
    data_type: &DataType,
    values: impl Iterator<Item = &'a Value>,
    capacity: usize,
) -> Result<ArrayRef, ArrowError> {
    let mismatch = |value: &Value| {
        ArrowError::InvalidArgumentError(format!(
            "column '{}' ({}) cannot hold value {:?}",
            name, data_type, value
        ))
    };

    let array: ArrayRef = match data_type {
        DataType::Utf8 => {
            let mut builder = StringBuilder::with_capacity(capacity, capacity * 16);
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Str(s) => builder.append_value(s),
                    other => return Err(mismatch(other)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Int64 => {
            let mut builder = Int64Builder::with_capacity(capacity);
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Int(i) => builder.append_value(*i),
                    other => return Err(mismatch(other)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Float64 => {
            let mut builder = Float64Builder::with_capacity(capacity);
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Float(x) => builder.append_value(*x),
                    Value::Int(i) => builder.append_value(*i as f64),
                    other => return Err(mismatch(other)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(capacity);
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Bool(b) => builder.append_value(*b),
                    other => return Err(mismatch(other)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Timestamp(TimeUnit::Microsecond, tz) => {
            let mut builder = TimestampMicrosecondBuilder::with_capacity(capacity);
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Timestamp(ts) => builder.append_value(ts.timestamp_micros()),
                    other => return Err(mismatch(other)),
                }
            }
            Arc::new(builder.finish().with_timezone_opt(tz.clone()))
        }
        other => {
            return Err(ArrowError::NotYetImplemented(format!(
                "column '{}' has unsupported type {}",
                name, other
            )))
        }
    };

    Ok(array)
}
