//! The remote backend boundary and its JSON payloads.

use crate::Result;
use alcowall_core::{CoinInsertion, DeviceId, Measurement};
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Endpoint paths, relative to the backend base URL.
pub mod endpoint {
    pub const ADD_MEASUREMENT: &str = "/measurements/add_measurement";
    pub const HIGHSCORE_GLOBAL: &str = "/measurements/highscore_global";
    pub const ADD_CASH_MULTIPLE: &str = "/cash/add_cash_multiple";
    pub const GET_AD_URL: &str = "/advertisment/get_ad_url";
    pub const GENERAL_FACT: &str = "/facts/general_fact";
}

/// Confirmation message the backend returns for a stored coin batch.
pub const CASH_ACK_MESSAGE: &str = "Cash status updated successfully for multiple devices.";

/// Operations the kiosk needs from the backend.
///
/// A method returns `Ok` only when the server explicitly acknowledged the
/// request with the expected status and body shape.
pub trait RemoteBackend: Send + Sync + 'static {
    /// Store a measurement. Returns the server-assigned measurement id.
    fn submit_measurement(
        &self,
        measurement: &Measurement,
    ) -> impl Future<Output = Result<i64>> + Send;

    /// Store a batch of coin insertions in one request.
    fn submit_coins(&self, coins: &[CoinInsertion]) -> impl Future<Output = Result<()>> + Send;

    /// Global all-time highscore, `None` when the server has no measurements.
    fn global_highscore(&self) -> impl Future<Output = Result<Option<f64>>> + Send;

    /// Advertisement video URL for this device.
    fn ad_url(&self, device_id: &DeviceId) -> impl Future<Output = Result<String>> + Send;

    /// A fun fact sentence.
    fn fun_fact(&self) -> impl Future<Output = Result<String>> + Send;
}

/// Timestamps are sent as local time without offset.
pub fn wire_timestamp(timestamp: DateTime<Utc>) -> NaiveDateTime {
    timestamp.with_timezone(&Local).naive_local()
}

/// Body of `POST /measurements/add_measurement`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPayload {
    pub device_id: DeviceId,
    pub alcohol_percentage: f64,
    pub measurement_date: NaiveDateTime,
}

impl From<&Measurement> for MeasurementPayload {
    fn from(measurement: &Measurement) -> Self {
        Self {
            device_id: measurement.device_id.clone(),
            alcohol_percentage: measurement.alcohol_level,
            measurement_date: wire_timestamp(measurement.timestamp),
        }
    }
}

/// One element of the `POST /cash/add_cash_multiple` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashPayload {
    pub device_id: DeviceId,
    pub cash_value: i64,
    pub date: NaiveDateTime,
}

impl From<&CoinInsertion> for CashPayload {
    fn from(coin: &CoinInsertion) -> Self {
        Self {
            device_id: coin.device_id.clone(),
            cash_value: coin.cash_value,
            date: wire_timestamp(coin.timestamp),
        }
    }
}

/// Body of `POST /advertisment/get_ad_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRequest {
    pub device_id: DeviceId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_measurement_payload_fields() {
        let timestamp = Utc.with_ymd_and_hms(2024, 7, 13, 12, 0, 0).unwrap();
        let measurement = Measurement::new(DeviceId::new("alcoWall_01").unwrap(), 0.67, timestamp);

        let json = serde_json::to_value(MeasurementPayload::from(&measurement)).unwrap();
        assert_eq!(json["device_id"], "alcoWall_01");
        assert_eq!(json["alcohol_percentage"], 0.67);
        assert!(json["measurement_date"].as_str().unwrap().starts_with("2024-07-1"));
    }

    #[test]
    fn test_cash_payload_fields() {
        let coin = CoinInsertion::new(DeviceId::new("4").unwrap(), 50, Utc::now());
        let json = serde_json::to_value(CashPayload::from(&coin)).unwrap();

        assert_eq!(json["device_id"], "4");
        assert_eq!(json["cash_value"], 50);
        assert!(json["date"].is_string());
    }
}
