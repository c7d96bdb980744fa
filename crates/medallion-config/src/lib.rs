// medallion-config - Unified configuration for every pipeline command
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from MEDALLION_CONFIG env var
// 3. Config file contents from MEDALLION_CONFIG_CONTENT env var
// 4. Default config file locations (./medallion.toml, ./.medallion.toml)
// 5. Built-in defaults (lowest priority)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{apply_env_overrides, EnvSource, ENV_PREFIX};

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub writer: WriterSettings,

    #[serde(default)]
    pub reports: ReportsConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Upstream vehicle message API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub default_amount: usize,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9900".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 1000,
            default_amount: 10_000,
        }
    }
}

/// Layer directories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bronze_dir: PathBuf,
    pub silver_dir: PathBuf,
    pub gold_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bronze_dir: PathBuf::from("data/bronze"),
            silver_dir: PathBuf::from("data/silver"),
            gold_dir: PathBuf::from("data/gold"),
        }
    }
}

/// Parquet writer settings shared by the Bronze and Silver layers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterSettings {
    pub max_file_size_mb: f64,
    pub compression: Compression,
    pub partitioning_enabled: bool,
    pub partition_columns: Vec<String>,
    pub row_group_size: usize,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            max_file_size_mb: 125.0,
            compression: Compression::Zstd,
            partitioning_enabled: true,
            partition_columns: vec!["date".to_string(), "hour".to_string()],
            row_group_size: 32 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Zstd,
    Snappy,
    Gzip,
    Lz4,
    Uncompressed,
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Compression::Zstd => "zstd",
            Compression::Snappy => "snappy",
            Compression::Gzip => "gzip",
            Compression::Lz4 => "lz4",
            Compression::Uncompressed => "uncompressed",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Compression {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "zstd" | "zstandard" => Ok(Compression::Zstd),
            "snappy" => Ok(Compression::Snappy),
            "gzip" | "gz" => Ok(Compression::Gzip),
            "lz4" => Ok(Compression::Lz4),
            "none" | "uncompressed" => Ok(Compression::Uncompressed),
            _ => anyhow::bail!(
                "Unsupported compression: {}. Supported: zstd, snappy, gzip, lz4, uncompressed",
                s
            ),
        }
    }
}

/// Gold report settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    pub queries_dir: PathBuf,
    pub default_reports: Vec<String>,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            queries_dir: PathBuf::from("queries"),
            default_reports: vec![
                "fastest_vehicles_per_hour".to_string(),
                "vin_last_state".to_string(),
            ],
        }
    }
}

/// Injection scan settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub columns: Vec<String>,
    pub patterns: Vec<String>,
}

/// Common SQL/script injection signatures.
pub const DEFAULT_INJECTION_PATTERNS: &[&str] = &[
    // quotes and semicolons
    r"('(''|[^'])*')|(;)",
    r"\b(ALTER|CREATE|DELETE|DROP|EXEC(UTE){0,1}|INSERT( +INTO){0,1}|MERGE|SELECT|UPDATE|UNION( +ALL){0,1})\b",
    // comments
    r"(/\*.*?\*/)|(--.*$)|(;.*$)",
    r"UNION\s+(ALL\s+)?SELECT",
    r"\bOR\b.*=.*\bOR\b",
    r"\bAND\b.*=.*\bAND\b",
    r"<script.*?>.*?</script>",
    r"javascript:",
    r"vbscript:",
    r"data:",
];

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            columns: vec![
                "vin".to_string(),
                "manufacturer".to_string(),
                "model".to_string(),
            ],
            patterns: DEFAULT_INJECTION_PATTERNS
                .iter()
                .map(|pattern| pattern.to_string())
                .collect(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration from an explicit file (CLI `--config`).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Parse TOML content on top of defaults, without env overrides.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: RuntimeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_from_str() {
        assert_eq!("zstd".parse::<Compression>().unwrap(), Compression::Zstd);
        assert_eq!("GZ".parse::<Compression>().unwrap(), Compression::Gzip);
        assert_eq!(
            "none".parse::<Compression>().unwrap(),
            Compression::Uncompressed
        );
        assert!("brotli9".parse::<Compression>().is_err());
    }

    #[test]
    fn test_default_configs() {
        let config = RuntimeConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:9900");
        assert_eq!(config.api.timeout(), Duration::from_secs(30));
        assert_eq!(config.api.max_retries, 3);
        assert_eq!(config.writer.max_file_size_mb, 125.0);
        assert_eq!(config.writer.compression, Compression::Zstd);
        assert_eq!(config.writer.partition_columns, vec!["date", "hour"]);
        assert_eq!(config.storage.silver_dir, PathBuf::from("data/silver"));
        assert_eq!(config.scan.patterns, DEFAULT_INJECTION_PATTERNS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RuntimeConfig::from_toml(
            r#"
            [writer]
            max_file_size_mb = 64.0
            compression = "snappy"

            [storage]
            bronze_dir = "/tmp/bronze"
            "#,
        )
        .unwrap();

        assert_eq!(config.writer.max_file_size_mb, 64.0);
        assert_eq!(config.writer.compression, Compression::Snappy);
        assert!(config.writer.partitioning_enabled);
        assert_eq!(config.storage.bronze_dir, PathBuf::from("/tmp/bronze"));
        assert_eq!(config.storage.gold_dir, PathBuf::from("data/gold"));
        assert_eq!(config.api.retry_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn test_unknown_compression_in_toml_is_rejected() {
        let result = RuntimeConfig::from_toml("[writer]\ncompression = \"brotli\"\n");
        assert!(result.is_err());
    }
}
