//! Injection pattern scanner over Parquet string columns.

use crate::reader::{parquet_files, read_parquet_file};
use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("columns to check cannot be empty")]
    NoColumns,

    #[error("injection patterns cannot be empty")]
    NoPatterns,

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("data directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("failed to read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub file_path: PathBuf,
    /// Row position within the file.
    pub row_index: usize,
    pub column_name: String,
    pub column_value: String,
    pub matched_pattern: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub total_files_scanned: usize,
    pub total_rows_scanned: usize,
    pub violations_found: usize,
    pub violations: Vec<Violation>,
    pub scan_duration_ms: f64,
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(80);
        writeln!(f, "{}", rule)?;
        writeln!(f, "INJECTION SCAN REPORT")?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "Files scanned: {}", self.total_files_scanned)?;
        writeln!(f, "Rows scanned: {}", self.total_rows_scanned)?;
        writeln!(f, "Violations found: {}", self.violations_found)?;
        writeln!(f, "Scan duration: {:.2} ms", self.scan_duration_ms)?;

        if self.violations.is_empty() {
            return writeln!(f, "\nNo injection patterns detected.");
        }

        writeln!(f, "\nVIOLATIONS DETECTED:")?;
        writeln!(f, "{}", "-".repeat(80))?;
        for (i, v) in self.violations.iter().enumerate() {
            writeln!(f, "{}. File: {}", i + 1, v.file_path.display())?;
            writeln!(f, "   Row: {}", v.row_index)?;
            writeln!(f, "   Column: {}", v.column_name)?;
            writeln!(f, "   Value: {}", v.column_value)?;
            writeln!(f, "   Regex: {}", v.matched_pattern)?;
        }
        Ok(())
    }
}

/// Scan every Parquet file under `data_dir` for values matching any pattern.
///
/// Columns missing from a file are skipped. Violations are ordered by file,
/// then column, then pattern, then row.
pub fn scan(
    data_dir: &Path,
    columns: &[String],
    patterns: &[String],
) -> Result<ScanReport, ScanError> {
    let start = Instant::now();

    if columns.is_empty() {
        return Err(ScanError::NoColumns);
    }
    if patterns.is_empty() {
        return Err(ScanError::NoPatterns);
    }
    let compiled = patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| ScanError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if !data_dir.exists() {
        return Err(ScanError::MissingDirectory(data_dir.to_path_buf()));
    }
    let files = parquet_files(data_dir).map_err(|e| ScanError::Read {
        path: data_dir.to_path_buf(),
        message: format!("{:#}", e),
    })?;

    let mut report = ScanReport::default();
    for path in &files {
        let batches = read_parquet_file(path).map_err(|e| ScanError::Read {
            path: path.clone(),
            message: format!("{:#}", e),
        })?;
        report.total_rows_scanned += batches.iter().map(|b| b.num_rows()).sum::<usize>();

        for column in columns {
            let mut values: Vec<Option<String>> = Vec::new();
            let mut present = true;
            for batch in &batches {
                let Some(array) = batch.column_by_name(column) else {
                    present = false;
                    break;
                };
                let Ok(strings) = cast(array, &DataType::Utf8) else {
                    warn!(
                        step = "injection_scan",
                        file = %path.display(),
                        column = %column,
                        data_type = %array.data_type(),
                        "Column cannot be read as text, skipping"
                    );
                    present = false;
                    break;
                };
                values.extend(strings.as_string::<i32>().iter().map(|v| v.map(str::to_string)));
            }
            if !present {
                warn!(
                    step = "injection_scan",
                    file = %path.display(),
                    column = %column,
                    "Column not scanned in file"
                );
                continue;
            }

            for (pattern, regex) in patterns.iter().zip(&compiled) {
                for (row_index, value) in values.iter().enumerate() {
                    let Some(value) = value else { continue };
                    if regex.is_match(value) {
                        report.violations.push(Violation {
                            file_path: path.clone(),
                            row_index,
                            column_name: column.clone(),
                            column_value: value.clone(),
                            matched_pattern: pattern.clone(),
                        });
                    }
                }
            }
        }
    }

    report.total_files_scanned = files.len();
    report.violations_found = report.violations.len();
    report.scan_duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    info!(
        step = "injection_scan",
        files = report.total_files_scanned,
        rows = report.total_rows_scanned,
        violations = report.violations_found,
        duration_ms = report.scan_duration_ms,
        "Injection scan completed"
    );
    Ok(report)
}
