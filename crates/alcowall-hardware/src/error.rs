//! Error types for hardware operations.
//!
//! This module defines error types specific to sensor and peripheral
//! operations: failed reads, disconnected devices, timeouts and malformed
//! replies from the coin acceptor.

use crate::types::SensorKind;

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// A sensor could not produce a reading. Recoverable by reinitializing.
    #[error("{sensor} read failed: {reason}")]
    SensorRead { sensor: SensorKind, reason: String },

    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Operation timed out after specified duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Reply from a device violated its wire protocol.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Device initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Device configuration error.
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "hardware-serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[cfg(feature = "hardware-rpi")]
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[cfg(feature = "hardware-rpi")]
    #[error("I2C error: {0}")]
    I2c(#[from] rppal::i2c::Error),
}

impl HardwareError {
    /// Create a new sensor read error.
    pub fn sensor_read(sensor: SensorKind, reason: impl Into<String>) -> Self {
        Self::SensorRead {
            sensor,
            reason: reason.into(),
        }
    }

    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }
}
