//! HTTP client for the AlcoWall backend.
//!
//! Every endpoint is a JSON `POST`. A request counts as acknowledged only when
//! the status and body match what the backend returns on success:
//!
//! | Operation | Status | Body |
//! |---|---|---|
//! | add measurement | 201 | object with `measurement_id` |
//! | global highscore | 200 | array, first element carries `alcohol_percentage` |
//! | add cash batch | 200 | `message` equal to [`CASH_ACK_MESSAGE`] |
//! | ad URL | 200 | object with `ad_url` |
//! | fun fact | 200 | object or array of objects with `sentence` |
//!
//! Anything else, including timeouts, is returned as a [`RemoteError`].
//!
//! # Design Principles
//!
//! - **No automatic retry**: the offline queue decides when to resend
//! - **Single timeout**: covers connect, send and reading the response
//!
//! # Example
//!
//! ```no_run
//! use alcowall_core::config::BackendConfig;
//! use alcowall_network::{RemoteBackend, RestClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RestClient::new(&BackendConfig::default())?;
//! if let Some(highscore) = client.global_highscore().await? {
//!     println!("global highscore: {highscore}");
//! }
//! # Ok(())
//! # }
//! ```

use crate::backend::{
    CASH_ACK_MESSAGE, CashPayload, DeviceRequest, MeasurementPayload, RemoteBackend, endpoint,
};
use crate::{RemoteError, Result};
use alcowall_core::config::BackendConfig;
use alcowall_core::{CoinInsertion, DeviceId, Measurement};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Status and parsed body of a backend response.
#[derive(Debug)]
struct Reply {
    status: StatusCode,
    text: String,
    json: Option<Value>,
}

impl Reply {
    fn expect_status(self, expected: StatusCode) -> Result<Value> {
        if self.status != expected {
            return Err(RemoteError::Status {
                status: self.status.as_u16(),
                body: self.text,
            });
        }
        self.json
            .ok_or_else(|| RemoteError::unexpected_body(format!("not JSON: {}", self.text)))
    }
}

/// REST client implementing [`RemoteBackend`].
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl RestClient {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Transport`] if the HTTP client cannot be built
    /// (for example when the TLS backend fails to initialize).
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let timeout = config.timeout();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        debug!(base_url = %config.base_url, timeout_ms = timeout.as_millis() as u64, "REST client created");

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_transport(&self, err: reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            RemoteError::Timeout(self.timeout.as_millis() as u64)
        } else {
            RemoteError::Transport(err.to_string())
        }
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Reply> {
        let url = format!("{}{}", self.base_url, path);
        trace!(%url, "POST");

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_transport(e))?;
        let json = serde_json::from_str(&text).ok();

        trace!(%url, status = status.as_u16(), "response received");
        Ok(Reply { status, text, json })
    }
}

/// Parse a number that the backend may send either as JSON number or string.
fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Extract the fun fact sentence from an object or a list of objects.
fn parse_sentence(body: &Value) -> Option<String> {
    let object = match body {
        Value::Array(items) => items.first()?,
        other => other,
    };
    object
        .get("sentence")
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl RemoteBackend for RestClient {
    async fn submit_measurement(&self, measurement: &Measurement) -> Result<i64> {
        let payload = MeasurementPayload::from(measurement);
        let body = self
            .post(endpoint::ADD_MEASUREMENT, &payload)
            .await?
            .expect_status(StatusCode::CREATED)?;

        let id = body
            .get("measurement_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| RemoteError::unexpected_body("missing measurement_id"))?;

        debug!(measurement_id = id, level = measurement.alcohol_level, "measurement stored");
        Ok(id)
    }

    async fn submit_coins(&self, coins: &[CoinInsertion]) -> Result<()> {
        let payload: Vec<CashPayload> = coins.iter().map(CashPayload::from).collect();
        let body = self
            .post(endpoint::ADD_CASH_MULTIPLE, &payload)
            .await?
            .expect_status(StatusCode::OK)?;

        match body.get("message").and_then(Value::as_str) {
            Some(CASH_ACK_MESSAGE) => {
                debug!(count = coins.len(), "coin batch stored");
                Ok(())
            }
            other => Err(RemoteError::unexpected_body(format!(
                "unexpected cash confirmation: {other:?}"
            ))),
        }
    }

    async fn global_highscore(&self) -> Result<Option<f64>> {
        let body = self
            .post(endpoint::HIGHSCORE_GLOBAL, &serde_json::json!({}))
            .await?
            .expect_status(StatusCode::OK)?;

        let Value::Array(entries) = body else {
            return Err(RemoteError::unexpected_body("highscore response is not an array"));
        };
        let Some(first) = entries.first() else {
            warn!("backend returned no highscore entries");
            return Ok(None);
        };

        first
            .get("alcohol_percentage")
            .and_then(parse_number)
            .map(Some)
            .ok_or_else(|| RemoteError::unexpected_body("missing alcohol_percentage"))
    }

    async fn ad_url(&self, device_id: &DeviceId) -> Result<String> {
        let request = DeviceRequest {
            device_id: device_id.clone(),
        };
        let body = self
            .post(endpoint::GET_AD_URL, &request)
            .await?
            .expect_status(StatusCode::OK)?;

        body.get("ad_url")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .ok_or_else(|| RemoteError::unexpected_body("missing ad_url"))
    }

    async fn fun_fact(&self) -> Result<String> {
        let body = self
            .post(endpoint::GENERAL_FACT, &serde_json::json!({}))
            .await?
            .expect_status(StatusCode::OK)?;

        parse_sentence(&body).ok_or_else(|| RemoteError::unexpected_body("missing sentence"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!(1.5), Some(1.5))]
    #[case(json!("0.42"), Some(0.42))]
    #[case(json!(" 2 "), Some(2.0))]
    #[case(json!("high"), None)]
    #[case(json!(null), None)]
    fn test_parse_number(#[case] value: Value, #[case] expected: Option<f64>) {
        assert_eq!(parse_number(&value), expected);
    }

    #[rstest]
    #[case(json!({"sentence": "Beer is old."}), Some("Beer is old."))]
    #[case(json!([{"sentence": "Wine is older."}]), Some("Wine is older."))]
    #[case(json!([]), None)]
    #[case(json!({"fact": "no sentence"}), None)]
    fn test_parse_sentence(#[case] body: Value, #[case] expected: Option<&str>) {
        assert_eq!(parse_sentence(&body).as_deref(), expected);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = BackendConfig {
            base_url: "http://localhost:8080/".into(),
            ..Default::default()
        };
        let client = RestClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_connectivity_error() {
        let config = BackendConfig {
            base_url: "http://127.0.0.1:1".into(),
            timeout_ms: 500,
        };
        let client = RestClient::new(&config).unwrap();

        let err = client.fun_fact().await.unwrap_err();
        assert!(err.is_connectivity(), "unexpected error: {err}");
    }
}
