//! Gold reports: SQL over Silver, exported as CSV.
//!
//! Each `<name>.sql` file in the queries directory is one report. Queries see
//! the whole Silver layer as a single table named [`VEHICLE_MESSAGES_TABLE`].

use super::elapsed_ms;
use crate::reader::read_parquet_dir;
use arrow::array::RecordBatch;
use arrow::csv::WriterBuilder;
use arrow::error::ArrowError;
use async_trait::async_trait;
use chrono::Local;
use datafusion::error::DataFusionError;
use datafusion::prelude::SessionContext;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

/// Logical table name every report query selects from.
pub const VEHICLE_MESSAGES_TABLE: &str = "vehicle_messages";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Unknown reports: {}. Available reports: {}", .unknown.join(", "), .available.join(", "))]
    UnknownReports {
        unknown: Vec<String>,
        available: Vec<String>,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No Silver data found in {}", .0.display())]
    NoData(PathBuf),

    #[error("Failed to read Silver data: {0}")]
    Read(String),

    #[error("SQL execution failed: {0}")]
    Sql(#[from] DataFusionError),

    #[error("Failed to write CSV {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: ArrowError,
    },
}

impl ReportError {
    fn io(path: &Path, source: io::Error) -> Self {
        ReportError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Reports discovered from `*.sql` files, keyed by file stem.
#[derive(Debug, Clone, Default)]
pub struct ReportCatalog {
    queries_dir: PathBuf,
    reports: BTreeMap<String, PathBuf>,
}

impl ReportCatalog {
    /// A missing directory yields an empty catalog.
    pub fn discover(queries_dir: impl Into<PathBuf>) -> Result<Self, ReportError> {
        let queries_dir = queries_dir.into();
        let mut reports = BTreeMap::new();

        if !queries_dir.is_dir() {
            warn!(
                step = "sql_report_runner",
                queries_dir = %queries_dir.display(),
                "Queries directory not found"
            );
            return Ok(Self {
                queries_dir,
                reports,
            });
        }

        let entries = fs::read_dir(&queries_dir).map_err(|e| ReportError::io(&queries_dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| ReportError::io(&queries_dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == "sql") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    reports.insert(stem.to_string(), path.clone());
                }
            }
        }

        Ok(Self {
            queries_dir,
            reports,
        })
    }

    pub fn queries_dir(&self) -> &Path {
        &self.queries_dir
    }

    /// Report names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.reports.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.reports.contains_key(name)
    }

    pub fn sql_path(&self, name: &str) -> Option<&Path> {
        self.reports.get(name).map(PathBuf::as_path)
    }

    /// Fail with every unknown name at once.
    pub fn check(&self, names: &[String]) -> Result<(), ReportError> {
        let unknown: Vec<String> = names
            .iter()
            .filter(|name| !self.contains(name))
            .cloned()
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(ReportError::UnknownReports {
                unknown,
                available: self.names(),
            })
        }
    }
}

/// SQL execution over one in-memory table.
#[async_trait]
pub trait SqlEngine: Send + Sync {
    async fn execute(&self, table: RecordBatch, sql: &str) -> Result<Vec<RecordBatch>, ReportError>;
}

/// In-process engine backed by DataFusion.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataFusionEngine;

#[async_trait]
impl SqlEngine for DataFusionEngine {
    async fn execute(
        &self,
        table: RecordBatch,
        sql: &str,
    ) -> Result<Vec<RecordBatch>, ReportError> {
        let ctx = SessionContext::new();
        ctx.register_batch(VEHICLE_MESSAGES_TABLE, table)?;
        let frame = ctx.sql(sql).await?;
        Ok(frame.collect().await?)
    }
}

#[derive(Debug, Clone)]
pub enum ReportOutcome {
    Completed {
        input_rows: usize,
        output_rows: usize,
        sql_file: PathBuf,
        batches: Vec<RecordBatch>,
    },
    Failed {
        error: String,
    },
}

impl ReportOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ReportOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ReportRun {
    pub name: String,
    pub outcome: ReportOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct GoldSummary {
    pub reports: Vec<ReportRun>,
    pub duration_ms: f64,
}

impl GoldSummary {
    pub fn successful(&self) -> Vec<&str> {
        self.names_where(true)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.names_where(false)
    }

    fn names_where(&self, completed: bool) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|run| run.outcome.is_completed() == completed)
            .map(|run| run.name.as_str())
            .collect()
    }
}

pub struct ReportRunner<E = DataFusionEngine> {
    catalog: ReportCatalog,
    engine: E,
}

impl<E: SqlEngine> ReportRunner<E> {
    pub fn new(catalog: ReportCatalog, engine: E) -> Self {
        Self { catalog, engine }
    }

    pub fn catalog(&self) -> &ReportCatalog {
        &self.catalog
    }

    /// Run one report against the Silver layer.
    pub async fn run_report(
        &self,
        name: &str,
        silver_dir: &Path,
    ) -> Result<ReportOutcome, ReportError> {
        let sql_file = self
            .catalog
            .sql_path(name)
            .ok_or_else(|| ReportError::UnknownReports {
                unknown: vec![name.to_string()],
                available: self.catalog.names(),
            })?
            .to_path_buf();
        let sql = fs::read_to_string(&sql_file).map_err(|e| ReportError::io(&sql_file, e))?;

        info!(
            step = "sql_report_runner",
            report = name,
            silver_dir = %silver_dir.display(),
            sql_file = %sql_file.display(),
            "Reading Silver data"
        );
        let table = read_parquet_dir(silver_dir)
            .map_err(|e| ReportError::Read(format!("{:#}", e)))?
            .ok_or_else(|| ReportError::NoData(silver_dir.to_path_buf()))?;
        let input_rows = table.num_rows();

        info!(step = "sql_report_runner", report = name, input_rows, "Executing SQL query");
        let batches = self.engine.execute(table, sql.trim()).await?;
        let output_rows = batches.iter().map(RecordBatch::num_rows).sum();

        info!(step = "sql_report_runner", report = name, output_rows, "Completed report");
        Ok(ReportOutcome::Completed {
            input_rows,
            output_rows,
            sql_file,
            batches,
        })
    }

    /// Run `names` in order. Unknown names fail before anything runs; a
    /// failing report is recorded and the rest still run.
    pub async fn run_reports(
        &self,
        names: &[String],
        silver_dir: &Path,
    ) -> Result<GoldSummary, ReportError> {
        self.catalog.check(names)?;

        let start = Instant::now();
        info!(
            step = "sql_report_runner",
            reports = ?names,
            silver_dir = %silver_dir.display(),
            "Running SQL reports"
        );

        let mut summary = GoldSummary::default();
        for name in names {
            let outcome = match self.run_report(name, silver_dir).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(step = "sql_report_runner", report = %name, error = %e, "Report failed");
                    ReportOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            summary.reports.push(ReportRun {
                name: name.clone(),
                outcome,
            });
        }
        summary.duration_ms = elapsed_ms(start);

        info!(
            step = "sql_report_runner",
            total_reports = names.len(),
            successful_reports = summary.successful().len(),
            failed_reports = summary.failed().len(),
            total_duration_ms = summary.duration_ms,
            "SQL reports completed"
        );
        Ok(summary)
    }

    pub async fn run_all(&self, silver_dir: &Path) -> Result<GoldSummary, ReportError> {
        self.run_reports(&self.catalog.names(), silver_dir).await
    }
}

/// Remove `*.csv` files directly under `gold_dir`; returns how many went.
pub fn cleanup_csv_files(gold_dir: &Path) -> Result<usize, ReportError> {
    if !gold_dir.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(gold_dir).map_err(|e| ReportError::io(gold_dir, e))? {
        let path = entry.map_err(|e| ReportError::io(gold_dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            fs::remove_file(&path).map_err(|e| ReportError::io(&path, e))?;
            removed += 1;
        }
    }
    if removed > 0 {
        info!(
            step = "gold_export",
            removed,
            gold_dir = %gold_dir.display(),
            "Removed stale CSV files"
        );
    }
    Ok(removed)
}

/// `YYYYmmdd_HHMMSS` in local time, shared by every CSV of one run.
pub fn report_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Write each completed report to `<name>_<stamp>.csv` under `gold_dir`.
pub fn write_csv_reports(
    summary: &GoldSummary,
    gold_dir: &Path,
    stamp: &str,
) -> Result<Vec<PathBuf>, ReportError> {
    fs::create_dir_all(gold_dir).map_err(|e| ReportError::io(gold_dir, e))?;

    let mut written = Vec::new();
    for run in &summary.reports {
        let ReportOutcome::Completed { batches, .. } = &run.outcome else {
            warn!(step = "gold_export", report = %run.name, "No CSV written for failed report");
            continue;
        };

        let path = gold_dir.join(format!("{}_{}.csv", run.name, stamp));
        let file = File::create(&path).map_err(|e| ReportError::io(&path, e))?;
        let mut writer = WriterBuilder::new().with_header(true).build(file);
        for batch in batches {
            writer.write(batch).map_err(|source| ReportError::Csv {
                path: path.clone(),
                source,
            })?;
        }

        info!(step = "gold_export", report = %run.name, path = %path.display(), "Wrote CSV report");
        written.push(path);
    }
    Ok(written)
}
