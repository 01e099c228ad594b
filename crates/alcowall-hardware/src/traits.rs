//! Sensor trait definitions.
//!
//! This module defines the contract between the sensor pollers and the
//! physical inputs of the kiosk (coin acceptor, alcohol sensor, proximity
//! sensor and fault switches). Each trait has a hardware-backed, a
//! file-backed and a mock implementation selected at startup.
//!
//! Methods return `impl Future + Send` so that pollers generic over a sensor
//! can be spawned on the Tokio runtime. Implementations simply write
//! `async fn`.
//!
//! Every trait carries a `reinitialize` method. Pollers call it after a read
//! failure and a backoff pause, so implementations should drop and reopen
//! whatever handle (serial port, I2C bus, GPIO pins) they hold.

use crate::error::Result;
use crate::types::DeviceInfo;
use alcowall_core::FaultFlags;
use std::future::Future;

/// Coin acceptor producing credit events.
pub trait CoinAcceptor: Send {
    /// Return the values, in cents, of coins accepted since the previous call.
    ///
    /// An empty vector means no coin was inserted.
    fn poll_coins(&mut self) -> impl Future<Output = Result<Vec<i64>>> + Send;

    /// Reopen the underlying device after a failure.
    fn reinitialize(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn info(&self) -> DeviceInfo;
}

/// Alcohol sensor reporting a raw level (sensor voltage on the real device).
pub trait AlcoholSensor: Send {
    fn read_level(&mut self) -> impl Future<Output = Result<f64>> + Send;

    fn reinitialize(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn info(&self) -> DeviceInfo;
}

/// Distance sensor in front of the mouthpiece.
pub trait ProximitySensor: Send {
    /// Distance to the nearest object in centimeters.
    fn read_distance(&mut self) -> impl Future<Output = Result<i32>> + Send;

    fn reinitialize(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn info(&self) -> DeviceInfo;
}

/// Door and coin path switches.
pub trait FaultSwitches: Send {
    fn read_faults(&mut self) -> impl Future<Output = Result<FaultFlags>> + Send;

    fn reinitialize(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn info(&self) -> DeviceInfo;
}
