//! Upstream vehicle message API client

use medallion_config::ApiConfig;
use medallion_core::RawRecord;
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

pub const VEHICLE_MESSAGES_PATH: &str = "/upstream/vehicle_messages";

#[derive(Debug, Error)]
pub enum FetchError {
    /// Worth retrying: timeouts, connection failures, HTTP 5xx.
    #[error("transient API failure: {0}")]
    Transient(String),
    /// Retrying will not help: HTTP 4xx, malformed body.
    #[error("API request failed: {0}")]
    Fatal(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            FetchError::Transient(err.to_string())
        } else {
            FetchError::Fatal(err.to_string())
        }
    }
}

/// HTTP client with fixed-delay retry on transient failures
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, VEHICLE_MESSAGES_PATH)
    }

    /// Fetch `amount` messages, retrying transient failures up to `max_retries` times.
    pub async fn fetch_vehicle_messages(
        &self,
        amount: usize,
    ) -> Result<Vec<RawRecord>, FetchError> {
        let url = self.endpoint();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let start = Instant::now();

            match self.fetch_once(&url, amount).await {
                Ok(messages) => {
                    info!(
                        step = "api_fetch",
                        url = %url,
                        amount_requested = amount,
                        amount_received = messages.len(),
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        attempt,
                        "Fetched vehicle messages"
                    );
                    return Ok(messages);
                }
                Err(err) if err.is_transient() && attempt <= self.max_retries => {
                    warn!(
                        step = "api_fetch",
                        attempt,
                        error = %err,
                        retry_in_ms = self.retry_delay.as_millis() as u64,
                        "Transient API failure, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => {
                    error!(step = "api_fetch", attempt, error = %err, "API fetch failed");
                    return Err(err);
                }
            }
        }
    }

    async fn fetch_once(&self, url: &str, amount: usize) -> Result<Vec<RawRecord>, FetchError> {
        let response = self
            .http
            .get(url)
            .query(&[("amount", amount)])
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("HTTP error {}: {}", status.as_u16(), body);
            return Err(if status.is_server_error() {
                FetchError::Transient(message)
            } else {
                FetchError::Fatal(message)
            });
        }

        let body: JsonValue = response.json().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Transient(e.to_string())
            } else {
                FetchError::Fatal(format!("malformed response body: {}", e))
            }
        })?;
        parse_messages(body)
    }
}

/// The body must be a JSON array of objects.
fn parse_messages(body: JsonValue) -> Result<Vec<RawRecord>, FetchError> {
    let JsonValue::Array(items) = body else {
        return Err(FetchError::Fatal(format!(
            "expected a JSON array of messages, got {}",
            json_kind(&body)
        )));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            JsonValue::Object(message) => Ok(message),
            other => Err(FetchError::Fatal(format!(
                "message {} is {}, expected an object",
                index,
                json_kind(&other)
            ))),
        })
        .collect()
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
