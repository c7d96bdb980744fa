// Read a layer directory back into one table
//
// Files are discovered recursively and read in path order so repeated reads
// of the same tree produce the same row order.

use anyhow::{Context, Result};
use arrow::array::RecordBatch;
use arrow::compute::concat_batches;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// All `*.parquet` files under `dir`, sorted. A missing directory has none.
pub fn parquet_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        let is_parquet = entry.path().extension().is_some_and(|ext| ext == "parquet");
        if entry.file_type().is_file() && is_parquet {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

pub fn read_parquet_file(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("Failed to read Parquet metadata from {}", path.display()))?
        .build()
        .with_context(|| format!("Failed to build reader for {}", path.display()))?;

    reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to decode {}", path.display()))
}

/// Read every Parquet file under `dir` into a single table.
///
/// Returns `None` when the directory is missing or holds no rows.
pub fn read_parquet_dir(dir: &Path) -> Result<Option<RecordBatch>> {
    let mut batches = Vec::new();
    for path in parquet_files(dir)? {
        batches.extend(read_parquet_file(&path)?);
    }
    batches.retain(|b| b.num_rows() > 0);

    let Some(first) = batches.first() else {
        return Ok(None);
    };
    let schema = first.schema();
    let table = concat_batches(&schema, &batches)
        .with_context(|| format!("Files under {} do not share one schema", dir.display()))?;
    Ok(Some(table))
}
