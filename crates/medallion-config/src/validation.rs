// Configuration validation
//
// Rejects values the pipeline cannot run with; warns about values that are
// legal but probably unintended.

use crate::*;
use anyhow::{bail, Result};
use std::collections::HashSet;
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_api_config(&config.api)?;
    validate_storage_config(&config.storage)?;
    validate_writer_settings(&config.writer)?;
    validate_scan_config(&config.scan)?;
    Ok(())
}

fn validate_api_config(config: &ApiConfig) -> Result<()> {
    if config.base_url.is_empty() {
        bail!("api.base_url must not be empty");
    }

    if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
        bail!("api.base_url must start with http:// or https://");
    }

    if config.timeout_secs == 0 {
        bail!("api.timeout_secs must be greater than 0");
    }

    if config.max_retries > 10 {
        warn!(
            max_retries = config.max_retries,
            "api.max_retries is very large; failing requests will take a long time"
        );
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    for (name, path) in [
        ("storage.bronze_dir", &config.bronze_dir),
        ("storage.silver_dir", &config.silver_dir),
        ("storage.gold_dir", &config.gold_dir),
    ] {
        if path.as_os_str().is_empty() {
            bail!("{} must not be empty", name);
        }
    }

    Ok(())
}

fn validate_writer_settings(config: &WriterSettings) -> Result<()> {
    if !config.max_file_size_mb.is_finite() || config.max_file_size_mb <= 0.0 {
        bail!("writer.max_file_size_mb must be a positive number");
    }

    if config.row_group_size == 0 {
        bail!("writer.row_group_size must be greater than 0");
    }

    if config.partitioning_enabled {
        if config.partition_columns.is_empty() {
            bail!("writer.partition_columns must not be empty when partitioning is enabled");
        }

        let mut seen = HashSet::new();
        for column in &config.partition_columns {
            if column.is_empty() {
                bail!("writer.partition_columns must not contain empty names");
            }
            if !seen.insert(column.as_str()) {
                bail!("writer.partition_columns contains duplicate column '{}'", column);
            }
        }
    }

    // Warn about very large files
    if config.max_file_size_mb > 1024.0 {
        warn!(
            max_file_size_mb = config.max_file_size_mb,
            "writer.max_file_size_mb is very large; may cause memory issues"
        );
    }

    Ok(())
}

fn validate_scan_config(config: &ScanConfig) -> Result<()> {
    if config.patterns.is_empty() {
        bail!("scan.patterns must not be empty");
    }

    if config.columns.is_empty() {
        bail!("scan.columns must not be empty");
    }

    Ok(())
}
