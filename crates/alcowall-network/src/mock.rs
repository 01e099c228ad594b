//! Scripted in-process backend.
//!
//! [`MockBackend`] records every request and answers according to a script:
//! a number of failures to return before succeeding, an offline switch, and
//! the values served for highscore, ad and fun fact requests. Clones share the
//! same script and records.

use crate::backend::RemoteBackend;
use crate::{RemoteError, Result};
use alcowall_core::{CoinInsertion, DeviceId, Measurement};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug)]
struct Script {
    offline: bool,
    latency: Duration,
    measurement_failures: u32,
    coin_failures: u32,
    highscore: Option<f64>,
    ad_url: String,
    fun_fact: Option<String>,

    measurement_attempts: u32,
    coin_attempts: u32,
    highscore_requests: u32,
    accepted_measurements: Vec<Measurement>,
    accepted_coin_batches: Vec<Vec<CoinInsertion>>,
    next_measurement_id: i64,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            offline: false,
            latency: Duration::ZERO,
            measurement_failures: 0,
            coin_failures: 0,
            highscore: None,
            ad_url: "https://ads.example/video.mp4".to_string(),
            fun_fact: Some("Mock fact".to_string()),
            measurement_attempts: 0,
            coin_attempts: 0,
            highscore_requests: 0,
            accepted_measurements: Vec::new(),
            accepted_coin_batches: Vec::new(),
            next_measurement_id: 1,
        }
    }
}

/// Backend double for tests and offline demos.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    script: Arc<Mutex<Script>>,
}

fn offline_error() -> RemoteError {
    RemoteError::Transport("mock backend offline".to_string())
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        let latency = self.script().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    /// Fail every request until switched back online.
    pub fn set_offline(&self, offline: bool) {
        self.script().offline = offline;
    }

    /// Delay every response.
    pub fn set_latency(&self, latency: Duration) {
        self.script().latency = latency;
    }

    /// Fail the next `count` measurement submissions.
    pub fn fail_next_measurements(&self, count: u32) {
        self.script().measurement_failures = count;
    }

    /// Fail the next `count` coin batch submissions.
    pub fn fail_next_coins(&self, count: u32) {
        self.script().coin_failures = count;
    }

    pub fn set_highscore(&self, highscore: Option<f64>) {
        self.script().highscore = highscore;
    }

    pub fn set_ad_url(&self, url: impl Into<String>) {
        self.script().ad_url = url.into();
    }

    /// `None` makes fun fact requests fail.
    pub fn set_fun_fact(&self, fact: Option<String>) {
        self.script().fun_fact = fact;
    }

    /// Every measurement submission received, acknowledged or not.
    pub fn measurement_attempts(&self) -> u32 {
        self.script().measurement_attempts
    }

    pub fn coin_attempts(&self) -> u32 {
        self.script().coin_attempts
    }

    pub fn highscore_requests(&self) -> u32 {
        self.script().highscore_requests
    }

    /// Measurements acknowledged, in arrival order.
    pub fn accepted_measurements(&self) -> Vec<Measurement> {
        self.script().accepted_measurements.clone()
    }

    /// Coin batches acknowledged, in arrival order.
    pub fn accepted_coin_batches(&self) -> Vec<Vec<CoinInsertion>> {
        self.script().accepted_coin_batches.clone()
    }
}

impl RemoteBackend for MockBackend {
    async fn submit_measurement(&self, measurement: &Measurement) -> Result<i64> {
        self.delay().await;
        let mut script = self.script();
        script.measurement_attempts += 1;

        if script.offline {
            return Err(offline_error());
        }
        if script.measurement_failures > 0 {
            script.measurement_failures -= 1;
            return Err(RemoteError::Timeout(0));
        }

        script.accepted_measurements.push(measurement.clone());
        let id = script.next_measurement_id;
        script.next_measurement_id += 1;
        Ok(id)
    }

    async fn submit_coins(&self, coins: &[CoinInsertion]) -> Result<()> {
        self.delay().await;
        let mut script = self.script();
        script.coin_attempts += 1;

        if script.offline {
            return Err(offline_error());
        }
        if script.coin_failures > 0 {
            script.coin_failures -= 1;
            return Err(RemoteError::Status {
                status: 500,
                body: "mock failure".to_string(),
            });
        }

        script.accepted_coin_batches.push(coins.to_vec());
        Ok(())
    }

    async fn global_highscore(&self) -> Result<Option<f64>> {
        self.delay().await;
        let mut script = self.script();
        script.highscore_requests += 1;

        if script.offline {
            return Err(offline_error());
        }
        Ok(script.highscore)
    }

    async fn ad_url(&self, _device_id: &DeviceId) -> Result<String> {
        self.delay().await;
        let script = self.script();
        if script.offline {
            return Err(offline_error());
        }
        Ok(script.ad_url.clone())
    }

    async fn fun_fact(&self) -> Result<String> {
        self.delay().await;
        let script = self.script();
        if script.offline {
            return Err(offline_error());
        }
        script
            .fun_fact
            .clone()
            .ok_or_else(|| RemoteError::unexpected_body("missing sentence"))
    }
}
