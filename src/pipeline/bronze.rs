//! Bronze ingestion: upstream API -> validated, partitioned Parquet.

use super::elapsed_ms;
use crate::client::ApiClient;
use anyhow::{Context, Result};
use medallion_config::WriterSettings;
use medallion_core::schema::bronze::vehicle_message_raw;
use medallion_writer::{ParquetWriter, WriterConfig};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BronzeSummary {
    pub messages_fetched: usize,
    pub files_written: usize,
    pub partitions: usize,
    pub duration_ms: f64,
}

/// Fetch `amount` messages and write them under `output_dir`.
///
/// An empty API response is a successful zero-row run. A single invalid
/// message fails the run and nothing is written.
pub async fn run_bronze_ingestion(
    client: &ApiClient,
    settings: &WriterSettings,
    output_dir: &Path,
    amount: usize,
) -> Result<BronzeSummary> {
    let start = Instant::now();
    info!(
        step = "bronze_ingestion",
        amount,
        output_dir = %output_dir.display(),
        "Starting Bronze ingestion"
    );

    let messages = client
        .fetch_vehicle_messages(amount)
        .await
        .context("Failed to fetch vehicle messages")?;

    if messages.is_empty() {
        warn!(step = "bronze_ingestion", "No data received from API");
        return Ok(BronzeSummary {
            duration_ms: elapsed_ms(start),
            ..BronzeSummary::default()
        });
    }
    let messages_fetched = messages.len();

    let writer = ParquetWriter::new(
        WriterConfig::from_settings(settings, output_dir).with_schema(vehicle_message_raw()),
    )?;
    let stats = tokio::task::spawn_blocking(move || writer.write(messages))
        .await
        .context("Bronze write task did not complete")??;

    let summary = BronzeSummary {
        messages_fetched,
        files_written: stats.files_written,
        partitions: stats.partitions_written,
        duration_ms: elapsed_ms(start),
    };
    info!(
        step = "bronze_ingestion",
        messages_fetched = summary.messages_fetched,
        files_written = summary.files_written,
        partitions = summary.partitions,
        total_duration_ms = summary.duration_ms,
        "Bronze ingestion completed"
    );
    Ok(summary)
}
