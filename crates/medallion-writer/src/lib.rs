//! Validated, partitioned Parquet writer
//!
//! This crate turns a batch of raw records (or an already-built Arrow table)
//! into Hive-style partitioned Parquet files with size-bounded chunking:
//!
//! ```text
//! {output_dir}/date=2025-01-27/hour=10/data.parquet
//! {output_dir}/date=2025-01-27/hour=11/part_000.parquet
//! {output_dir}/date=2025-01-27/hour=11/part_001.parquet
//! ```
//!
//! All I/O is blocking. Callers must not point two writers at the same
//! directory concurrently.

mod chunk;
mod encoding;
mod error;
mod partition;
mod validate;
mod write;

pub use chunk::{chunk_file_name, estimate_row_bytes, plan_chunks, PARQUET_SIZE_RATIO};
pub use error::{ErrorCode, RecordFailure, Result, WriterError, VALIDATION_SAMPLE_LIMIT};
pub use partition::{
    annotate, split_partitions, strip_partition_columns, PartitionColumn, PartitionKey,
    PartitionSlice, PartitionSource, PartitionSpec, NULL_PARTITION_VALUE,
};
pub use validate::validate_records;
pub use write::{
    Batch, ParquetWriter, WriteStatistics, WriteTarget, WriterConfig, WrittenFile,
    CANONICAL_FILE_NAME,
};

// Re-export commonly used types for convenience
pub use medallion_config::Compression;
