use super::{LogFormat, RuntimeConfig};
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "MEDALLION_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    /// Get a variable by its key WITHOUT the MEDALLION_ prefix.
    fn get(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Upstream API
    if let Some(url) = get_env_string(env, "API_BASE_URL") {
        config.api.base_url = url;
    }
    if let Some(val) = get_env_u64(env, "API_TIMEOUT_SECS")? {
        config.api.timeout_secs = val;
    }
    if let Some(val) = get_env_u64(env, "API_MAX_RETRIES")? {
        config.api.max_retries = u32::try_from(val)
            .map_err(|e| anyhow!("Failed to parse {}API_MAX_RETRIES: {}", ENV_PREFIX, e))?;
    }
    if let Some(val) = get_env_u64(env, "API_RETRY_DELAY_MS")? {
        config.api.retry_delay_ms = val;
    }
    if let Some(val) = get_env_usize(env, "API_DEFAULT_AMOUNT")? {
        config.api.default_amount = val;
    }

    // Layer directories
    if let Some(path) = get_env_string(env, "BRONZE_DIR") {
        config.storage.bronze_dir = PathBuf::from(path);
    }
    if let Some(path) = get_env_string(env, "SILVER_DIR") {
        config.storage.silver_dir = PathBuf::from(path);
    }
    if let Some(path) = get_env_string(env, "GOLD_DIR") {
        config.storage.gold_dir = PathBuf::from(path);
    }

    // Writer
    if let Some(val) = get_env_f64(env, "MAX_FILE_SIZE_MB")? {
        config.writer.max_file_size_mb = val;
    }
    if let Some(codec) = get_env_string(env, "COMPRESSION") {
        config.writer.compression = codec
            .parse()
            .context("Invalid MEDALLION_COMPRESSION value")?;
    }
    if let Some(val) = get_env_bool(env, "PARTITIONING_ENABLED")? {
        config.writer.partitioning_enabled = val;
    }
    if let Some(columns) = get_env_list(env, "PARTITION_COLUMNS") {
        config.writer.partition_columns = columns;
    }
    if let Some(val) = get_env_usize(env, "ROW_GROUP_SIZE")? {
        config.writer.row_group_size = val;
    }

    // Reports
    if let Some(path) = get_env_string(env, "QUERIES_DIR") {
        config.reports.queries_dir = PathBuf::from(path);
    }
    if let Some(reports) = get_env_list(env, "DEFAULT_REPORTS") {
        config.reports.default_reports = reports;
    }

    // Scanner
    if let Some(columns) = get_env_list(env, "SCAN_COLUMNS") {
        config.scan.columns = columns;
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        config.logging.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    Ok(())
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key)
}

/// Comma-separated list; blank entries are dropped.
fn get_env_list<E: EnvSource>(env: &E, key: &str) -> Option<Vec<String>> {
    get_env_string(env, key).map(|val| {
        val.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<u64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_f64<E: EnvSource>(env: &E, key: &str) -> Result<Option<f64>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<f64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_bool<E: EnvSource>(env: &E, key: &str) -> Result<Option<bool>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val.parse::<bool>().map_err(|e| {
                anyhow!(
                    "Failed to parse {}{} (expected bool): {}",
                    ENV_PREFIX,
                    key,
                    e
                )
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
