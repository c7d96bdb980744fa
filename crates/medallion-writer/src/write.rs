//! Write orchestration.
//!
//! One [`ParquetWriter::write_to`] call moves a batch through
//! validate -> (empty short-circuit) -> partition -> chunk -> encode, and
//! returns the [`WriteStatistics`] accumulated by that call alone. The writer
//! holds nothing but its immutable configuration between calls.

use crate::chunk::{chunk_file_name, estimate_row_bytes, plan_chunks};
use crate::encoding::{write_parquet_file, writer_properties};
use crate::error::{Result, WriterError};
use crate::partition::{split_partitions, strip_partition_columns, PartitionKey, PartitionSpec};
use crate::validate::validate_records;
use arrow::array::RecordBatch;
use medallion_config::{Compression, WriterSettings};
use medallion_core::{RawRecord, RecordValidator};
use parquet::file::properties::WriterProperties;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Fixed name a single-file write lands under before it is renamed.
pub const CANONICAL_FILE_NAME: &str = "data.parquet";

/// Input of one write call.
#[derive(Debug, Clone)]
pub enum Batch {
    /// Raw records; validated against the configured schema.
    Records(Vec<RawRecord>),
    /// Already-columnar data; assumed conformant and written as-is.
    Table(RecordBatch),
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        match self {
            Batch::Records(records) => records.is_empty(),
            Batch::Table(table) => table.num_rows() == 0,
        }
    }
}

impl From<Vec<RawRecord>> for Batch {
    fn from(records: Vec<RawRecord>) -> Self {
        Batch::Records(records)
    }
}

impl From<RecordBatch> for Batch {
    fn from(table: RecordBatch) -> Self {
        Batch::Table(table)
    }
}

/// Where a write call puts its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteTarget {
    /// Partitioned, size-bounded files under a root directory.
    Directory(PathBuf),
    /// Exactly one file at this path.
    File(PathBuf),
}

impl WriteTarget {
    /// Resolve caller overrides; exactly one of the two must be given.
    pub fn resolve(output_dir: Option<PathBuf>, output_path: Option<PathBuf>) -> Result<Self> {
        match (output_dir, output_path) {
            (Some(dir), None) => Ok(WriteTarget::Directory(dir)),
            (None, Some(path)) => Ok(WriteTarget::File(path)),
            (Some(_), Some(_)) => Err(WriterError::invalid_config(
                "output directory and output path are mutually exclusive",
            )),
            (None, None) => Err(WriterError::invalid_config(
                "either an output directory or an output path is required",
            )),
        }
    }
}

/// Per-instance writer configuration.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub output_dir: PathBuf,
    pub max_file_size_mb: f64,
    pub compression: Compression,
    pub partitioning_enabled: bool,
    pub partition_columns: Vec<String>,
    pub row_group_size: usize,
    /// Fixed per-row byte estimate; calibrated from each batch when unset.
    pub estimated_row_bytes: Option<f64>,
    /// Validation capability; required for [`Batch::Records`] input.
    pub schema: Option<Arc<dyn RecordValidator>>,
}

impl WriterConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self::from_settings(&WriterSettings::default(), output_dir)
    }

    pub fn from_settings(settings: &WriterSettings, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_file_size_mb: settings.max_file_size_mb,
            compression: settings.compression,
            partitioning_enabled: settings.partitioning_enabled,
            partition_columns: settings.partition_columns.clone(),
            row_group_size: settings.row_group_size,
            estimated_row_bytes: None,
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: Arc<dyn RecordValidator>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_max_file_size_mb(mut self, max_file_size_mb: f64) -> Self {
        self.max_file_size_mb = max_file_size_mb;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_partitioning(mut self, enabled: bool) -> Self {
        self.partitioning_enabled = enabled;
        self
    }

    pub fn with_partition_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_estimated_row_bytes(mut self, bytes: f64) -> Self {
        self.estimated_row_bytes = Some(bytes);
        self
    }
}

/// One file produced by a write call.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub partition: PartitionKey,
    pub rows: usize,
}

/// Outcome of a single write call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteStatistics {
    pub rows_written: usize,
    pub files_written: usize,
    pub partitions_written: usize,
    pub duration_ms: f64,
    pub files: Vec<WrittenFile>,
}

impl WriteStatistics {
    fn record_file(&mut self, path: PathBuf, partition: &PartitionKey, rows: usize) {
        self.rows_written += rows;
        self.files_written += 1;
        self.files.push(WrittenFile {
            path,
            partition: partition.clone(),
            rows,
        });
    }
}

/// Validated, partitioned, size-bounded Parquet writer.
#[derive(Debug)]
pub struct ParquetWriter {
    config: WriterConfig,
    partitioning: Option<PartitionSpec>,
    properties: WriterProperties,
}

impl ParquetWriter {
    pub fn new(config: WriterConfig) -> Result<Self> {
        if !config.max_file_size_mb.is_finite() || config.max_file_size_mb <= 0.0 {
            return Err(WriterError::invalid_config(format!(
                "max_file_size_mb must be a positive number, got {}",
                config.max_file_size_mb
            )));
        }
        if let Some(bytes) = config.estimated_row_bytes {
            if !bytes.is_finite() || bytes <= 0.0 {
                return Err(WriterError::invalid_config(format!(
                    "estimated_row_bytes must be a positive number, got {}",
                    bytes
                )));
            }
        }

        let partitioning = if config.partitioning_enabled {
            Some(PartitionSpec::new(&config.partition_columns)?)
        } else {
            None
        };
        let properties = writer_properties(config.compression, config.row_group_size);

        Ok(Self {
            config,
            partitioning,
            properties,
        })
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Write into the configured output directory.
    pub fn write(&self, batch: impl Into<Batch>) -> Result<WriteStatistics> {
        let target = WriteTarget::Directory(self.config.output_dir.clone());
        self.write_to(batch, &target)
    }

    pub fn write_to(
        &self,
        batch: impl Into<Batch>,
        target: &WriteTarget,
    ) -> Result<WriteStatistics> {
        let start = Instant::now();
        let mut stats = WriteStatistics::default();

        let result = self.run(batch.into(), target, &mut stats);
        stats.duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(()) => {
                if stats.rows_written > 0 {
                    info!(
                        step = "parquet_write",
                        rows = stats.rows_written,
                        files = stats.files_written,
                        partitions = stats.partitions_written,
                        duration_ms = stats.duration_ms,
                        "Wrote Parquet output"
                    );
                }
                Ok(stats)
            }
            Err(e) => {
                error!(
                    step = "parquet_write",
                    code = e.code().as_str(),
                    error = %e,
                    duration_ms = stats.duration_ms,
                    "Parquet write failed"
                );
                Err(e)
            }
        }
    }

    fn run(&self, batch: Batch, target: &WriteTarget, stats: &mut WriteStatistics) -> Result<()> {
        let Some(table) = self.resolve_table(batch)? else {
            debug!(step = "parquet_write", "Empty input; nothing to write");
            return Ok(());
        };

        match target {
            WriteTarget::Directory(root) => self.write_partitioned(&table, root, stats),
            WriteTarget::File(path) => self.write_single_file(&table, path, stats),
        }
    }

    /// Turn either input variant into one table; `None` means empty input.
    fn resolve_table(&self, batch: Batch) -> Result<Option<RecordBatch>> {
        if batch.is_empty() {
            return Ok(None);
        }

        match batch {
            Batch::Table(table) => Ok(Some(table)),
            Batch::Records(records) => {
                let schema = self.config.schema.as_ref().ok_or_else(|| {
                    WriterError::invalid_config("a schema is required to write raw records")
                })?;
                let table = validate_records(schema.as_ref(), &records)?;
                debug!(
                    step = "validation",
                    schema = schema.name(),
                    records = records.len(),
                    "Validated batch"
                );
                Ok(Some(table))
            }
        }
    }

    fn write_partitioned(
        &self,
        table: &RecordBatch,
        root: &Path,
        stats: &mut WriteStatistics,
    ) -> Result<()> {
        let slices = split_partitions(table, self.partitioning.as_ref())?;
        debug!(
            step = "partitioning",
            rows = table.num_rows(),
            partitions = slices.len(),
            "Partitioned table"
        );

        for slice in slices {
            let payload = match &self.partitioning {
                Some(spec) if !slice.key.is_root() => strip_partition_columns(&slice.batch, spec)?,
                _ => slice.batch,
            };
            self.write_partition(root, &slice.key, &payload, stats)?;
            stats.partitions_written += 1;
        }

        Ok(())
    }

    fn write_partition(
        &self,
        root: &Path,
        key: &PartitionKey,
        payload: &RecordBatch,
        stats: &mut WriteStatistics,
    ) -> Result<()> {
        let dir = key.directory(root);
        fs::create_dir_all(&dir).map_err(|e| WriterError::write_failure(&dir, e))?;

        let bytes_per_row = self
            .config
            .estimated_row_bytes
            .unwrap_or_else(|| estimate_row_bytes(payload));
        let chunks = plan_chunks(payload.num_rows(), bytes_per_row, self.config.max_file_size_mb);
        if chunks.len() > 1 {
            debug!(
                step = "size_splitting",
                partition = %key,
                rows = payload.num_rows(),
                chunks = chunks.len(),
                "Splitting partition to respect max file size"
            );
        }

        for (index, range) in chunks.iter().enumerate() {
            let path = dir.join(chunk_file_name(index, chunks.len()));
            let chunk = payload.slice(range.start, range.len());
            write_parquet_file(&path, &chunk, &self.properties)?;

            debug!(
                step = "parquet_write",
                partition = %key,
                rows = chunk.num_rows(),
                path = %path.display(),
                "Wrote file"
            );
            stats.record_file(path, key, chunk.num_rows());
        }

        Ok(())
    }

    fn write_single_file(
        &self,
        table: &RecordBatch,
        path: &Path,
        stats: &mut WriteStatistics,
    ) -> Result<()> {
        let staged = StagedFile::new(path)?;
        if let Some(dir) = staged.path().parent() {
            fs::create_dir_all(dir).map_err(|e| WriterError::write_failure(dir, e))?;
        }

        write_parquet_file(staged.path(), table, &self.properties)?;
        let final_path = staged.commit()?;

        stats.record_file(final_path, &PartitionKey::root(), table.num_rows());
        stats.partitions_written = 1;
        Ok(())
    }
}

/// A single-file write in progress: data goes to the canonical name in the
/// target's directory and is renamed to the requested name on commit.
/// Dropping an uncommitted stage removes the canonical file.
struct StagedFile {
    staged: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    fn new(target: &Path) -> Result<Self> {
        if target.file_name().is_none() {
            return Err(WriterError::invalid_config(format!(
                "output path '{}' does not name a file",
                target.display()
            )));
        }
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let staged = dir.join(CANONICAL_FILE_NAME);
        if staged.file_name() != target.file_name() && staged.exists() {
            return Err(WriterError::invalid_config(format!(
                "staging file '{}' already exists; refusing to overwrite it",
                staged.display()
            )));
        }

        Ok(Self {
            staged,
            target: target.to_path_buf(),
            committed: false,
        })
    }

    fn path(&self) -> &Path {
        &self.staged
    }

    fn needs_rename(&self) -> bool {
        self.staged.file_name() != self.target.file_name()
    }

    fn commit(mut self) -> Result<PathBuf> {
        if self.needs_rename() && self.staged.exists() {
            fs::rename(&self.staged, &self.target)
                .map_err(|e| WriterError::write_failure(&self.target, e))?;
        }
        self.committed = true;
        Ok(self.target.clone())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed && self.needs_rename() && self.staged.exists() {
            let _ = fs::remove_file(&self.staged);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target() {
        assert_eq!(
            WriteTarget::resolve(Some("out".into()), None).unwrap(),
            WriteTarget::Directory("out".into())
        );
        assert_eq!(
            WriteTarget::resolve(None, Some("out/r.parquet".into())).unwrap(),
            WriteTarget::File("out/r.parquet".into())
        );
    }

    #[test]
    fn test_resolve_target_requires_exactly_one() {
        let both = WriteTarget::resolve(Some("a".into()), Some("b.parquet".into())).unwrap_err();
        assert!(matches!(both, WriterError::InvalidConfig { .. }));

        let neither = WriteTarget::resolve(None, None).unwrap_err();
        assert!(matches!(neither, WriterError::InvalidConfig { .. }));
    }

    #[test]
    fn test_writer_rejects_bad_config() {
        assert!(ParquetWriter::new(WriterConfig::new("out").with_max_file_size_mb(0.0)).is_err());
        assert!(ParquetWriter::new(
            WriterConfig::new("out").with_partition_columns(Vec::<String>::new())
        )
        .is_err());
        assert!(ParquetWriter::new(
            WriterConfig::new("out")
                .with_partitioning(false)
                .with_partition_columns(Vec::<String>::new())
        )
        .is_ok());
    }

    #[test]
    fn test_staged_file_without_rename() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join(CANONICAL_FILE_NAME);
        let staged = StagedFile::new(&target).unwrap();
        assert!(!staged.needs_rename());
        fs::write(staged.path(), b"x").unwrap();
        assert_eq!(staged.commit().unwrap(), target);
        assert!(target.exists());
    }

    #[test]
    fn test_staged_file_commit_is_noop_when_nothing_was_written() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("report.parquet");
        let staged = StagedFile::new(&target).unwrap();
        staged.commit().unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn test_dropped_stage_is_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("report.parquet");
        let staged = StagedFile::new(&target).unwrap();
        fs::write(staged.path(), b"partial").unwrap();
        drop(staged);
        assert!(!dir.path().join(CANONICAL_FILE_NAME).exists());
        assert!(!target.exists());
    }

    #[test]
    fn test_existing_canonical_file_is_not_staged_over() {
        let dir = tempfile::tempdir().unwrap();
        let canonical = dir.path().join(CANONICAL_FILE_NAME);
        fs::write(&canonical, b"earlier output").unwrap();

        let err = StagedFile::new(&dir.path().join("report.parquet")).err().unwrap();
        assert!(matches!(err, WriterError::InvalidConfig { .. }));
        assert_eq!(fs::read(&canonical).unwrap(), b"earlier output");
        assert!(StagedFile::new(&canonical).is_ok());
    }

    #[test]
    fn test_path_without_file_name_is_rejected() {
        assert!(StagedFile::new(Path::new("/")).is_err());
    }
}
