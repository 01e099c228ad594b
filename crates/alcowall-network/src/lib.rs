//! Remote backend layer for AlcoWall
//!
//! This crate defines the kiosk's boundary to the AlcoWall backend and the
//! HTTP client that implements it.
//!
//! # Components
//!
//! - **RemoteBackend**: trait with the five backend operations (measurement,
//!   coin batch, global highscore, ad URL, fun fact)
//! - **RestClient**: JSON-over-HTTP implementation on `reqwest`
//! - **MockBackend**: scripted implementation for tests and offline demos
//!
//! # Example
//!
//! ```no_run
//! use alcowall_core::config::BackendConfig;
//! use alcowall_network::{RemoteBackend, RestClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RestClient::new(&BackendConfig::default())?;
//! let fact = client.fun_fact().await?;
//! println!("{fact}");
//! # Ok(())
//! # }
//! ```

pub mod backend;
mod client;
mod error;
pub mod mock;

pub use backend::{CashPayload, DeviceRequest, MeasurementPayload, RemoteBackend};
pub use client::RestClient;
pub use error::{RemoteError, Result};
pub use mock::MockBackend;
