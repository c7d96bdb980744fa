//! Silver transform: cleaned Bronze, same partition layout.
//!
//! Rows without a VIN are dropped, `manufacturer` is trimmed, and
//! `gearPosition` becomes its Int64 code.

use super::elapsed_ms;
use crate::reader::read_parquet_dir;
use anyhow::{Context, Result};
use arrow::array::{Array, ArrayRef, AsArray, Int64Array, RecordBatch, StringArray};
use arrow::compute::{cast, filter_record_batch, is_not_null};
use arrow::datatypes::{DataType, Field, Schema};
use medallion_config::WriterSettings;
use medallion_core::field_names::{GEAR_POSITION, MANUFACTURER, VIN};
use medallion_core::map_gear_position;
use medallion_writer::{ParquetWriter, WriteTarget, WriterConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SilverSummary {
    pub input_rows: usize,
    pub filtered_rows: usize,
    pub output_rows: usize,
    pub files_written: usize,
    pub duration_ms: f64,
}

pub fn run_silver_transform(
    bronze_dir: &Path,
    target: &WriteTarget,
    settings: &WriterSettings,
) -> Result<SilverSummary> {
    let start = Instant::now();
    info!(
        step = "silver_transform",
        bronze_dir = %bronze_dir.display(),
        target = ?target,
        "Starting Silver transformation"
    );

    let Some(bronze) = read_parquet_dir(bronze_dir)
        .with_context(|| format!("Failed to read Bronze data from {}", bronze_dir.display()))?
    else {
        warn!(
            step = "silver_transform",
            bronze_dir = %bronze_dir.display(),
            "No Bronze data found to transform"
        );
        return Ok(SilverSummary {
            duration_ms: elapsed_ms(start),
            ..SilverSummary::default()
        });
    };

    let input_rows = bronze.num_rows();
    let cleaned = transform(&bronze)?;
    let output_rows = cleaned.num_rows();
    info!(
        step = "silver_transform",
        input_rows,
        filtered_rows = input_rows - output_rows,
        remaining_rows = output_rows,
        "Applied transformations"
    );

    // Table input: the writer does not re-validate
    let root = match target {
        WriteTarget::Directory(dir) => dir.clone(),
        WriteTarget::File(path) => path.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    let writer = ParquetWriter::new(WriterConfig::from_settings(settings, root))?;
    let stats = writer.write_to(cleaned, target)?;

    let summary = SilverSummary {
        input_rows,
        filtered_rows: input_rows - output_rows,
        output_rows,
        files_written: stats.files_written,
        duration_ms: elapsed_ms(start),
    };
    info!(
        step = "silver_transform",
        input_rows = summary.input_rows,
        filtered_rows = summary.filtered_rows,
        output_rows = summary.output_rows,
        files_written = summary.files_written,
        total_duration_ms = summary.duration_ms,
        "Silver transformation completed"
    );
    Ok(summary)
}

/// [`run_silver_transform`] on the blocking pool, for callers on the async runtime.
pub async fn spawn_silver_transform(
    bronze_dir: PathBuf,
    target: WriteTarget,
    settings: WriterSettings,
) -> Result<SilverSummary> {
    tokio::task::spawn_blocking(move || run_silver_transform(&bronze_dir, &target, &settings))
        .await
        .context("Silver transform task did not complete")?
}

/// Apply the Silver cleaning rules to a Bronze table.
pub fn transform(bronze: &RecordBatch) -> Result<RecordBatch> {
    let vin = bronze
        .column_by_name(VIN)
        .with_context(|| format!("Bronze data has no '{}' column", VIN))?;
    let keep = is_not_null(vin.as_ref())?;
    let filtered = filter_record_batch(bronze, &keep)?;

    let schema = filtered.schema();
    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

    for (field, column) in schema.fields().iter().zip(filtered.columns()) {
        match field.name().as_str() {
            MANUFACTURER => {
                fields.push(field.as_ref().clone().with_data_type(DataType::Utf8));
                columns.push(trim_strings(column)?);
            }
            GEAR_POSITION if column.data_type() != &DataType::Int64 => {
                fields.push(Field::new(GEAR_POSITION, DataType::Int64, true));
                columns.push(gear_codes(column)?);
            }
            _ => {
                fields.push(field.as_ref().clone());
                columns.push(Arc::clone(column));
            }
        }
    }

    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    Ok(RecordBatch::try_new(schema, columns)?)
}

fn trim_strings(column: &ArrayRef) -> Result<ArrayRef> {
    let strings = cast(column, &DataType::Utf8)?;
    let trimmed: StringArray = strings
        .as_string::<i32>()
        .iter()
        .map(|v| v.map(str::trim))
        .collect();
    Ok(Arc::new(trimmed))
}

fn gear_codes(column: &ArrayRef) -> Result<ArrayRef> {
    let strings = cast(column, &DataType::Utf8)?;
    let codes: Int64Array = strings
        .as_string::<i32>()
        .iter()
        .map(map_gear_position)
        .collect();
    Ok(Arc::new(codes))
}
