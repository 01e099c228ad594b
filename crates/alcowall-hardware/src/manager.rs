//! Sensor poller supervision.
//!
//! The [`PollerSet`] owns the kiosk's sensors until [`PollerSet::start`]
//! spawns one [`SensorPoller`] task per registered sensor. All tasks share a
//! cancellation token; [`PollerHandle::shutdown`] fires it and reports how
//! each task ended.
//!
//! ```text
//! ┌──────────────┐
//! │ Coin task    │──────►┐
//! └──────────────┘       │
//! ┌──────────────┐       │
//! │ Alcohol task │──────►│
//! └──────────────┘       │    ┌─────────────┐
//! ┌──────────────┐       ├───►│ DeviceState │──────► Workflow controller
//! │ Proximity    │──────►│    └─────────────┘
//! └──────────────┘       │
//! ┌──────────────┐       │
//! │ Fault task   │──────►┘
//! └──────────────┘
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use alcowall_core::{DeviceContext, DeviceId};
//! use alcowall_hardware::devices::AnyAlcoholSensor;
//! use alcowall_hardware::manager::{PollerConfig, PollerSet};
//! use alcowall_hardware::mock::MockAlcoholSensor;
//!
//! #[tokio::main]
//! async fn main() {
//!     let context = DeviceContext::new(DeviceId::new("1").unwrap());
//!     let mut pollers = PollerSet::new(PollerConfig::default());
//!
//!     let (sensor, _handle) = MockAlcoholSensor::new();
//!     pollers.register_alcohol(AnyAlcoholSensor::Mock(sensor));
//!
//!     let handle = pollers.start(context);
//!     // ... run the kiosk ...
//!     handle.shutdown().await;
//! }
//! ```

use crate::devices::{AnyAlcoholSensor, AnyCoinAcceptor, AnyFaultSwitches, AnyProximitySensor};
use crate::poller::{PolledSensor, PollerStats, SensorPoller};
use crate::SensorKind;
use alcowall_core::DeviceContext;
use alcowall_core::config::SensorsConfig;
use alcowall_core::constants::{ALCOHOL_POLL_INTERVAL_MS, DEFAULT_POLL_INTERVAL_MS, SENSOR_BACKOFF_MS};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Polling cadences and the shared backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub coin_interval: Duration,
    pub alcohol_interval: Duration,
    pub proximity_interval: Duration,
    pub fault_interval: Duration,
    pub backoff: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            coin_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            alcohol_interval: Duration::from_millis(ALCOHOL_POLL_INTERVAL_MS),
            proximity_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            fault_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            backoff: Duration::from_millis(SENSOR_BACKOFF_MS),
        }
    }
}

impl From<&SensorsConfig> for PollerConfig {
    fn from(config: &SensorsConfig) -> Self {
        Self {
            coin_interval: Duration::from_millis(config.coin_interval_ms),
            alcohol_interval: Duration::from_millis(config.alcohol_interval_ms),
            proximity_interval: Duration::from_millis(config.proximity_interval_ms),
            fault_interval: Duration::from_millis(config.fault_interval_ms),
            backoff: config.backoff(),
        }
    }
}

/// How a poller task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskTermination {
    /// Task observed the cancellation and returned its counters.
    Completed(PollerStats),
    /// Task was aborted before it could return.
    Cancelled,
    /// Task panicked.
    Panic,
}

/// Outcome of [`PollerHandle::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub completed: Vec<(SensorKind, PollerStats)>,
    pub cancelled: usize,
    pub panicked: usize,
}

/// Handle to the running poller tasks.
#[derive(Debug)]
pub struct PollerHandle {
    tasks: JoinSet<(SensorKind, PollerStats)>,
    cancel: CancellationToken,
}

impl PollerHandle {
    /// Number of poller tasks still running.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Token cancelled when the pollers shut down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop all pollers and wait for them to terminate.
    ///
    /// Individual task failures are reported, never propagated.
    pub async fn shutdown(mut self) -> ShutdownReport {
        self.cancel.cancel();

        let mut report = ShutdownReport::default();
        while let Some(result) = self.tasks.join_next().await {
            match Self::classify_task_result(result) {
                (Some(kind), TaskTermination::Completed(stats)) => {
                    report.completed.push((kind, stats));
                }
                (_, TaskTermination::Cancelled) => report.cancelled += 1,
                (_, TaskTermination::Panic) => report.panicked += 1,
                (None, TaskTermination::Completed(_)) => {}
            }
        }

        if report.panicked > 0 {
            error!(panicked = report.panicked, "sensor pollers panicked");
        }
        info!(
            completed = report.completed.len(),
            cancelled = report.cancelled,
            "sensor pollers stopped"
        );
        report
    }

    /// Classify the termination status of a task.
    fn classify_task_result(
        result: std::result::Result<(SensorKind, PollerStats), tokio::task::JoinError>,
    ) -> (Option<SensorKind>, TaskTermination) {
        match result {
            Ok((kind, stats)) => (Some(kind), TaskTermination::Completed(stats)),
            Err(e) if e.is_cancelled() => (None, TaskTermination::Cancelled),
            Err(_) => (None, TaskTermination::Panic),
        }
    }
}

/// Sensors waiting to be polled.
///
/// # Lifecycle
///
/// 1. Create the set with a configuration
/// 2. Register sensors using `register_*` methods
/// 3. Call `start()` to spawn one task per sensor
/// 4. Call `shutdown()` on the returned handle
#[derive(Debug)]
pub struct PollerSet {
    coin: Option<AnyCoinAcceptor>,
    alcohol: Option<AnyAlcoholSensor>,
    proximity: Option<AnyProximitySensor>,
    faults: Option<AnyFaultSwitches>,
    config: PollerConfig,
}

impl PollerSet {
    pub fn new(config: PollerConfig) -> Self {
        Self {
            coin: None,
            alcohol: None,
            proximity: None,
            faults: None,
            config,
        }
    }

    pub fn register_coin(&mut self, device: AnyCoinAcceptor) {
        self.coin = Some(device);
    }

    pub fn register_alcohol(&mut self, device: AnyAlcoholSensor) {
        self.alcohol = Some(device);
    }

    pub fn register_proximity(&mut self, device: AnyProximitySensor) {
        self.proximity = Some(device);
    }

    pub fn register_faults(&mut self, device: AnyFaultSwitches) {
        self.faults = Some(device);
    }

    /// Spawn a poller task for every registered sensor.
    pub fn start(mut self, context: DeviceContext) -> PollerHandle {
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        if let Some(device) = self.coin.take() {
            let interval = self.config.coin_interval;
            self.spawn(&mut tasks, device, &context, interval, &cancel);
        }
        if let Some(device) = self.alcohol.take() {
            let interval = self.config.alcohol_interval;
            self.spawn(&mut tasks, device, &context, interval, &cancel);
        }
        if let Some(device) = self.proximity.take() {
            let interval = self.config.proximity_interval;
            self.spawn(&mut tasks, device, &context, interval, &cancel);
        }
        if let Some(device) = self.faults.take() {
            let interval = self.config.fault_interval;
            self.spawn(&mut tasks, device, &context, interval, &cancel);
        }

        PollerHandle { tasks, cancel }
    }

    fn spawn<S: PolledSensor>(
        &self,
        tasks: &mut JoinSet<(SensorKind, PollerStats)>,
        device: S,
        context: &DeviceContext,
        interval: Duration,
        cancel: &CancellationToken,
    ) {
        let poller =
            SensorPoller::new(device, context.clone(), interval).with_backoff(self.config.backoff);
        let cancel = cancel.clone();
        tasks.spawn(async move { (S::KIND, poller.run(cancel).await) });
    }
}
