//! Sensor abstraction layer for the AlcoWall kiosk.
//!
//! This crate provides trait-based abstractions for the kiosk's peripherals:
//! the coin acceptor, the alcohol sensor, the proximity sensor and the
//! door/coin-stuck fault switches. Each trait has a mock implementation (for
//! development and testing), a file-backed simulation, and a hardware driver
//! behind a cargo feature.
//!
//! # Design Philosophy
//!
//! - **Async-first**: All I/O operations are asynchronous using native `async fn`
//!   in traits (Rust 1.90 + Edition 2024 RPITIT).
//! - **Send futures**: trait futures are `Send`, so generic pollers can be
//!   spawned on the multi-threaded runtime.
//! - **Error-aware**: All operations return `Result<T>` with detailed error information.
//!
//! # Sensor Polling
//!
//! Every sensor is owned by a [`SensorPoller`] that samples it at a fixed
//! cadence and publishes the reading into the shared
//! [`DeviceState`](alcowall_core::DeviceState). A failed read is logged, the
//! poller backs off and reinitializes the sensor, and the previous value stays
//! in place until a fresh one arrives.
//!
//! ```no_run
//! use alcowall_core::{DeviceContext, DeviceId};
//! use alcowall_core::config::SensorsConfig;
//! use alcowall_hardware::SensorSuite;
//!
//! # async fn run() -> alcowall_hardware::Result<()> {
//! let context = DeviceContext::new(DeviceId::new("1").unwrap());
//! let suite = SensorSuite::open(&SensorsConfig::default()).await?;
//!
//! let pollers = suite.pollers.start(context.clone());
//! // ... read context.state() ...
//! pollers.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `hardware-serial`: ccTalk coin acceptor over a USB serial adapter.
//! - `hardware-rpi`: ADS1115 alcohol sensor, HC-SR04 proximity sensor and GPIO
//!   fault switches on a Raspberry Pi.

pub mod cctalk;
pub mod devices;
pub mod error;
pub mod file;
pub mod manager;
pub mod mock;
pub mod poller;
#[cfg(feature = "hardware-rpi")]
pub mod rpi;
pub mod source;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{HardwareError, Result};
pub use traits::{AlcoholSensor, CoinAcceptor, FaultSwitches, ProximitySensor};
pub use types::{DeviceInfo, SensorKind};

pub use manager::{PollerConfig, PollerHandle, PollerSet, ShutdownReport, TaskTermination};
pub use poller::{PolledSensor, PollerStats, Reading, SensorPoller};
pub use source::{MockHandles, SensorSuite};
