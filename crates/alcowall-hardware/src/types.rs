//! Common types shared across sensor implementations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Generic device information.
///
/// Contains metadata about a sensor or peripheral such as name, model and
/// the bus or port it is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (e.g., "ccTalk Coin Acceptor", "Mock Alcohol Sensor").
    pub name: String,

    /// Device model identifier.
    pub model: String,

    /// Port, bus or file the device is read from.
    pub location: Option<String>,
}

impl DeviceInfo {
    /// Create a new DeviceInfo with required fields.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            location: None,
        }
    }

    /// Set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// The physical inputs sampled by the kiosk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Coin,
    Alcohol,
    Proximity,
    /// Service door, coins door and coin-stuck switches.
    Faults,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coin => write!(f, "Coin acceptor"),
            Self::Alcohol => write!(f, "Alcohol sensor"),
            Self::Proximity => write!(f, "Proximity sensor"),
            Self::Faults => write!(f, "Fault switches"),
        }
    }
}
