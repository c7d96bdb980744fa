// Batch validation
//
// Every record is checked, all failures are collected, and a single invalid
// record rejects the whole batch. Only a fully valid batch becomes a table.

use crate::error::{RecordFailure, Result, WriterError};
use arrow::array::RecordBatch;
use medallion_core::{rows_to_record_batch, RawRecord, RecordValidator};

pub fn validate_records(
    validator: &dyn RecordValidator,
    records: &[RawRecord],
) -> Result<RecordBatch> {
    let mut rows = Vec::with_capacity(records.len());
    let mut failures = Vec::new();

    for (index, record) in records.iter().enumerate() {
        match validator.validate(record) {
            Ok(row) => rows.push(row),
            Err(err) => failures.push(RecordFailure {
                index,
                message: err.to_string(),
            }),
        }
    }

    if !failures.is_empty() {
        return Err(WriterError::validation(failures, records.len()));
    }

    rows_to_record_batch(validator.arrow_schema(), &rows).map_err(|e| {
        WriterError::invalid_config(format!(
            "schema '{}' produced rows its Arrow schema cannot hold: {}",
            validator.name(),
            e
        ))
    })
}
