// medallion - vehicle telemetry pipeline
//
// Bronze: fetch raw messages from the upstream API, validate, and write
//         date/hour partitioned Parquet.
// Silver: clean Bronze (null VINs dropped, manufacturer trimmed, gear
//         positions mapped to integers) and write it back out.
// Gold:   run SQL reports over Silver and export them as CSV.
//
// The injection scanner audits any layer for suspicious string values.

pub mod client;
pub mod init;
pub mod pipeline;
pub mod reader;
pub mod scan;

pub use client::{ApiClient, FetchError};
pub use init::init_tracing;
pub use medallion_config::RuntimeConfig;
