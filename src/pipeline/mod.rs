// Medallion pipeline stages

pub mod bronze;
pub mod gold;
pub mod silver;

pub use bronze::{run_bronze_ingestion, BronzeSummary};
pub use gold::{
    DataFusionEngine, GoldSummary, ReportCatalog, ReportError, ReportOutcome, ReportRun,
    ReportRunner, SqlEngine,
};
pub use silver::{run_silver_transform, spawn_silver_transform, transform, SilverSummary};

use std::time::Instant;

pub(crate) fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
