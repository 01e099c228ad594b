use crate::{Result, error::Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Money in minor currency units.
pub type Cents = i64;

/// Kiosk identifier as registered with the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a new device ID with validation.
    ///
    /// Surrounding whitespace is trimmed.
    ///
    /// # Errors
    /// Returns `Error::InvalidDeviceId` if the ID is empty or contains whitespace.
    pub fn new(id: impl AsRef<str>) -> Result<Self> {
        let id = id.as_ref().trim();
        if id.is_empty() {
            return Err(Error::InvalidDeviceId("device ID is empty".to_string()));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(Error::InvalidDeviceId(format!(
                "device ID must not contain whitespace, got {id:?}"
            )));
        }
        Ok(DeviceId(id.to_string()))
    }

    /// Read the device ID from a file such as `device_id.txt`.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read, or
    /// `Error::InvalidDeviceId` if its content is not a valid ID.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::new(content)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DeviceId::new(s)
    }
}

/// A concluded alcohol measurement.
///
/// `alcohol_level` is the delta between the local maximum and the baseline
/// captured when the measurement window opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub device_id: DeviceId,
    pub alcohol_level: f64,
    pub timestamp: DateTime<Utc>,
}

impl Measurement {
    pub fn new(device_id: DeviceId, alcohol_level: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id,
            alcohol_level,
            timestamp,
        }
    }
}

/// A credited coin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinInsertion {
    pub device_id: DeviceId,
    pub cash_value: Cents,
    pub timestamp: DateTime<Utc>,
}

impl CoinInsertion {
    pub fn new(device_id: DeviceId, cash_value: Cents, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id,
            cash_value,
            timestamp,
        }
    }
}

/// Door and coin path switches.
///
/// Serialized with the same keys as the kiosk's `errors.json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultFlags {
    #[serde(default)]
    pub service_door_open: bool,
    #[serde(default)]
    pub coins_door_open: bool,
    #[serde(default)]
    pub coin_stuck: bool,
}

impl FaultFlags {
    /// True when any switch reports a hardware fault.
    #[must_use]
    pub fn any(&self) -> bool {
        self.service_door_open || self.coins_door_open || self.coin_stuck
    }

    /// Human readable description of the first active fault.
    #[must_use]
    pub fn describe(&self) -> Option<&'static str> {
        if self.service_door_open {
            Some("service door open")
        } else if self.coins_door_open {
            Some("coins door open")
        } else if self.coin_stuck {
            Some("coin stuck")
        } else {
            None
        }
    }
}
