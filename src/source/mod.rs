//! Alarm source - fetches raw alarm records over HTTP

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::SourceError;

/// Placeholder in `request_body` replaced by the start of the lookback window
pub const ORIGINATED_AFTER: &str = "$ORIGINATED_AFTER";

/// Alarm source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL of the alarm API
    pub base_url: String,

    /// Path appended to `base_url`
    pub endpoint: String,

    /// Bearer token sent with every request
    pub access_token: String,

    /// JSON request body, posted as-is apart from the `$ORIGINATED_AFTER` placeholder
    pub request_body: String,

    /// JSON pointer to the record array inside the response
    pub results_pointer: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost".to_string(),
            endpoint: "graphql".to_string(),
            access_token: String::new(),
            request_body: r#"{"variables":{"originatedAfter":"$ORIGINATED_AFTER"}}"#.to_string(),
            results_pointer: "/data/alarms/results".to_string(),
            timeout_secs: 30,
        }
    }
}

impl SourceConfig {
    /// Full request URL
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint.trim_start_matches('/')
        )
    }

    /// Request body with the lookback start filled in.
    pub fn render_body(&self, originated_after: DateTime<Utc>) -> String {
        self.request_body.replace(
            ORIGINATED_AFTER,
            &originated_after.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    }
}

/// Supplier of raw alarm records
#[async_trait]
pub trait AlarmSource: Send + Sync {
    /// Fetch the current batch of raw records.
    async fn fetch(&self) -> Result<Vec<Value>, SourceError>;
}

/// Take the record array out of a decoded response.
pub fn extract_records(response: Value, pointer: &str) -> Result<Vec<Value>, SourceError> {
    let mut response = response;
    match response.pointer_mut(pointer).map(Value::take) {
        Some(Value::Array(records)) => Ok(records),
        Some(Value::Null) | None => Err(SourceError::MissingResults(pointer.to_string())),
        Some(other) => Err(SourceError::Decode(format!(
            "expected an array at '{}', found {}",
            pointer, other
        ))),
    }
}

/// POSTs the configured request and reads the records from the response
pub struct HttpAlarmSource {
    config: SourceConfig,
    lookback: chrono::Duration,
    client: reqwest::Client,
}

impl HttpAlarmSource {
    /// Client for `config`, asking for alarms newer than `now - lookback`.
    pub fn new(config: SourceConfig, lookback: chrono::Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("alarm-monitor/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            config,
            lookback,
            client,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }
}

#[async_trait]
impl AlarmSource for HttpAlarmSource {
    async fn fetch(&self) -> Result<Vec<Value>, SourceError> {
        let body = self.config.render_body(Utc::now() - self.lookback);

        let response = self
            .client
            .post(self.config.url())
            .bearer_auth(&self.config.access_token)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        let decoded: Value =
            serde_json::from_str(&text).map_err(|e| SourceError::Decode(e.to_string()))?;

        let records = extract_records(decoded, &self.config.results_pointer)?;
        debug!("Fetched {} alarm records from {}", records.len(), self.config.url());
        Ok(records)
    }
}
