// Parquet encoding
//
// Writer properties are built once per writer instance from the configured
// codec and row group size; every file the instance writes shares them.

use crate::error::{Result, WriterError};
use arrow::array::RecordBatch;
use medallion_config::Compression;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression as ParquetCompression, GzipLevel, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub(crate) const CREATED_BY_KEY: &str = "medallion.writer_version";

fn compression_setting(codec: Compression) -> ParquetCompression {
    match codec {
        Compression::Zstd => ParquetCompression::ZSTD(ZstdLevel::default()),
        Compression::Snappy => ParquetCompression::SNAPPY,
        Compression::Gzip => ParquetCompression::GZIP(GzipLevel::default()),
        Compression::Lz4 => ParquetCompression::LZ4_RAW,
        Compression::Uncompressed => ParquetCompression::UNCOMPRESSED,
    }
}

pub(crate) fn writer_properties(codec: Compression, row_group_size: usize) -> WriterProperties {
    WriterProperties::builder()
        .set_dictionary_enabled(true)
        .set_statistics_enabled(EnabledStatistics::Page)
        .set_compression(compression_setting(codec))
        .set_data_page_size_limit(256 * 1024)
        .set_max_row_group_size(row_group_size.max(1))
        .set_key_value_metadata(Some(vec![KeyValue::new(
            CREATED_BY_KEY.to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        )]))
        .build()
}

/// Write a RecordBatch into an arbitrary `Write` sink.
pub(crate) fn write_parquet_into<W>(
    batch: &RecordBatch,
    writer: W,
    props: &WriterProperties,
) -> std::result::Result<(), parquet::errors::ParquetError>
where
    W: Write + Send,
{
    let mut arrow_writer = ArrowWriter::try_new(writer, batch.schema(), Some(props.clone()))?;
    arrow_writer.write(batch)?;
    arrow_writer.close()?;
    Ok(())
}

/// Create (or truncate) `path` and write `batch` into it.
pub(crate) fn write_parquet_file(
    path: &Path,
    batch: &RecordBatch,
    props: &WriterProperties,
) -> Result<()> {
    let file = File::create(path).map_err(|e| WriterError::write_failure(path, e))?;
    write_parquet_into(batch, file, props).map_err(|e| WriterError::write_failure(path, e))
}
