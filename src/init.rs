// Process-wide initialization
//
// Logging/tracing setup and storage layout reporting

use medallion_config::{LogFormat, LoggingConfig, RuntimeConfig};
use tracing::info;

/// Initialize tracing/logging from LoggingConfig
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Ignore the error if a subscriber is already installed
    let _ = match config.format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}

/// Log where each layer lives and how it will be written.
pub fn log_layout(config: &RuntimeConfig) {
    info!(
        bronze_dir = %config.storage.bronze_dir.display(),
        silver_dir = %config.storage.silver_dir.display(),
        gold_dir = %config.storage.gold_dir.display(),
        "Storage layout"
    );
    info!(
        max_file_size_mb = config.writer.max_file_size_mb,
        compression = %config.writer.compression,
        partitioning = config.writer.partitioning_enabled,
        partition_columns = ?config.writer.partition_columns,
        "Writer settings"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        let config = LoggingConfig {
            level: "not a filter ((".to_string(),
            format: LogFormat::Json,
        };
        init_tracing(&config);
        init_tracing(&LoggingConfig::default());
        log_layout(&RuntimeConfig::default());
    }
}
