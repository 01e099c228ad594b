//! Sensor polling loops.
//!
//! A [`SensorPoller`] samples one physical input at a fixed cadence and
//! publishes every reading into the shared [`DeviceState`]. It is the only
//! writer of its fields besides the controller's credit debit.
//!
//! Read failures never end the loop. On failure the poller waits for the
//! backoff interval, reinitializes the sensor and resumes; if reinitializing
//! fails too it keeps backing off until it succeeds or the poller is
//! cancelled.

use crate::devices::{AnyAlcoholSensor, AnyCoinAcceptor, AnyFaultSwitches, AnyProximitySensor};
use crate::traits::{AlcoholSensor, CoinAcceptor, FaultSwitches, ProximitySensor};
use crate::{DeviceInfo, Result, SensorKind};
use alcowall_core::constants::SENSOR_BACKOFF_MS;
use alcowall_core::{DeviceContext, DeviceState, FaultFlags};
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One value sampled from a sensor.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// Coins accepted since the previous sample, in cents.
    Coins(Vec<i64>),
    Alcohol(f64),
    /// Distance in centimeters.
    Proximity(i32),
    Faults(FaultFlags),
}

impl Reading {
    /// Write the reading into the shared state.
    pub fn publish(self, state: &DeviceState) {
        match self {
            Self::Coins(coins) => {
                for cents in coins {
                    let credit = state.record_coin(cents, Utc::now());
                    info!(cents, credit, "coin credited");
                }
            }
            Self::Alcohol(level) => state.set_alcohol_level(level),
            Self::Proximity(distance) => state.set_proximity_distance(distance),
            Self::Faults(faults) => {
                let previous = state.faults();
                if previous != faults {
                    if let Some(fault) = faults.describe() {
                        warn!(fault, "hardware fault reported");
                    } else {
                        info!("hardware faults cleared");
                    }
                }
                state.set_faults(faults);
            }
        }
    }
}

/// A sensor that a [`SensorPoller`] can drive.
pub trait PolledSensor: Send + 'static {
    const KIND: SensorKind;

    fn sample(&mut self) -> impl Future<Output = Result<Reading>> + Send;

    fn reinitialize(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn info(&self) -> DeviceInfo;
}

impl PolledSensor for AnyCoinAcceptor {
    const KIND: SensorKind = SensorKind::Coin;

    async fn sample(&mut self) -> Result<Reading> {
        self.poll_coins().await.map(Reading::Coins)
    }

    async fn reinitialize(&mut self) -> Result<()> {
        CoinAcceptor::reinitialize(self).await
    }

    fn info(&self) -> DeviceInfo {
        CoinAcceptor::info(self)
    }
}

impl PolledSensor for AnyAlcoholSensor {
    const KIND: SensorKind = SensorKind::Alcohol;

    async fn sample(&mut self) -> Result<Reading> {
        self.read_level().await.map(Reading::Alcohol)
    }

    async fn reinitialize(&mut self) -> Result<()> {
        AlcoholSensor::reinitialize(self).await
    }

    fn info(&self) -> DeviceInfo {
        AlcoholSensor::info(self)
    }
}

impl PolledSensor for AnyProximitySensor {
    const KIND: SensorKind = SensorKind::Proximity;

    async fn sample(&mut self) -> Result<Reading> {
        self.read_distance().await.map(Reading::Proximity)
    }

    async fn reinitialize(&mut self) -> Result<()> {
        ProximitySensor::reinitialize(self).await
    }

    fn info(&self) -> DeviceInfo {
        ProximitySensor::info(self)
    }
}

impl PolledSensor for AnyFaultSwitches {
    const KIND: SensorKind = SensorKind::Faults;

    async fn sample(&mut self) -> Result<Reading> {
        self.read_faults().await.map(Reading::Faults)
    }

    async fn reinitialize(&mut self) -> Result<()> {
        FaultSwitches::reinitialize(self).await
    }

    fn info(&self) -> DeviceInfo {
        FaultSwitches::info(self)
    }
}

/// Counters reported by a poller when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    pub samples: u64,
    pub failures: u64,
    pub reinitializations: u64,
}

/// Polling loop for one sensor.
///
/// # Examples
///
/// ```
/// use alcowall_core::{DeviceContext, DeviceId};
/// use alcowall_hardware::devices::AnyAlcoholSensor;
/// use alcowall_hardware::mock::MockAlcoholSensor;
/// use alcowall_hardware::poller::SensorPoller;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() {
///     let context = DeviceContext::new(DeviceId::new("1").unwrap());
///     let (sensor, handle) = MockAlcoholSensor::new();
///     handle.set_level(0.25);
///
///     let poller = SensorPoller::new(
///         AnyAlcoholSensor::Mock(sensor),
///         context.clone(),
///         Duration::from_millis(10),
///     );
///     let cancel = CancellationToken::new();
///     let task = tokio::spawn(poller.run(cancel.clone()));
///
///     tokio::time::sleep(Duration::from_millis(50)).await;
///     cancel.cancel();
///     task.await.unwrap();
///
///     assert_eq!(context.state().alcohol_level(), 0.25);
/// }
/// ```
#[derive(Debug)]
pub struct SensorPoller<S> {
    sensor: S,
    context: DeviceContext,
    interval: Duration,
    backoff: Duration,
    stats: PollerStats,
}

impl<S: PolledSensor> SensorPoller<S> {
    pub fn new(sensor: S, context: DeviceContext, interval: Duration) -> Self {
        Self {
            sensor,
            context,
            interval,
            backoff: Duration::from_millis(SENSOR_BACKOFF_MS),
            stats: PollerStats::default(),
        }
    }

    /// Set the pause between a failure and the reinitialization attempt.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Poll until `cancel` fires.
    ///
    /// Never returns early on sensor errors.
    pub async fn run(mut self, cancel: CancellationToken) -> PollerStats {
        let info = self.sensor.info();
        info!(sensor = %S::KIND, device = %info.name, interval_ms = self.interval.as_millis() as u64, "poller started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.sensor.sample() => result,
            };

            match result {
                Ok(reading) => {
                    self.stats.samples += 1;
                    debug!(sensor = %S::KIND, ?reading, "sample");
                    reading.publish(self.context.state());
                }
                Err(e) => {
                    self.stats.failures += 1;
                    warn!(sensor = %S::KIND, error = %e, backoff_ms = self.backoff.as_millis() as u64, "sensor read failed");
                    if !self.recover(&cancel).await {
                        break;
                    }
                    ticker.reset();
                }
            }
        }

        info!(sensor = %S::KIND, samples = self.stats.samples, failures = self.stats.failures, "poller stopped");
        self.stats
    }

    /// Back off and reinitialize until the sensor is usable again.
    ///
    /// Returns `false` if cancelled first.
    async fn recover(&mut self, cancel: &CancellationToken) -> bool {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.backoff) => {}
            }

            self.stats.reinitializations += 1;
            match self.sensor.reinitialize().await {
                Ok(()) => {
                    info!(sensor = %S::KIND, "sensor reinitialized");
                    return true;
                }
                Err(e) => {
                    warn!(sensor = %S::KIND, error = %e, "sensor reinitialization failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAlcoholSensor, MockCoinAcceptor, MockFaultSwitches};
    use alcowall_core::DeviceId;

    fn context() -> DeviceContext {
        DeviceContext::new(DeviceId::new("1").unwrap())
    }

    #[test]
    fn test_publish_coins_records_insertions() {
        let context = context();
        Reading::Coins(vec![100, 50]).publish(context.state());

        assert_eq!(context.state().credit(), 150);
        assert_eq!(context.state().take_coin_insertions().len(), 2);
    }

    #[test]
    fn test_publish_faults() {
        let context = context();
        Reading::Faults(FaultFlags {
            coin_stuck: true,
            ..Default::default()
        })
        .publish(context.state());

        assert!(context.state().coin_stuck());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_publishes_readings() {
        let context = context();
        let (sensor, handle) = MockAlcoholSensor::new();
        handle.set_level(0.3);

        let cancel = CancellationToken::new();
        let poller = SensorPoller::new(
            AnyAlcoholSensor::Mock(sensor),
            context.clone(),
            Duration::from_millis(200),
        );
        let task = tokio::spawn(poller.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(context.state().alcohol_level(), 0.3);

        handle.set_level(0.6);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(context.state().alcohol_level(), 0.6);

        cancel.cancel();
        let stats = task.await.unwrap();
        assert!(stats.samples >= 4);
        assert_eq!(stats.failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_backs_off_and_reinitializes() {
        let context = context();
        let (sensor, handle) = MockAlcoholSensor::new();
        handle.set_level(0.9);
        handle.fail_next(1);

        let cancel = CancellationToken::new();
        let poller = SensorPoller::new(
            AnyAlcoholSensor::Mock(sensor),
            context.clone(),
            Duration::from_millis(200),
        )
        .with_backoff(Duration::from_secs(10));
        let task = tokio::spawn(poller.run(cancel.clone()));

        // First sample fails; nothing is published during the backoff.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(context.state().alcohol_level(), -1.0);
        assert_eq!(handle.reinitializations(), 0);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(handle.reinitializations(), 1);
        assert_eq!(context.state().alcohol_level(), 0.9);

        cancel.cancel();
        let stats = task.await.unwrap();
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.reinitializations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_survives_repeated_failures() {
        let context = context();
        let (switches, handle) = MockFaultSwitches::new();
        handle.fail_next(3);
        handle.set_faults(FaultFlags {
            service_door_open: true,
            ..Default::default()
        });

        let cancel = CancellationToken::new();
        let poller = SensorPoller::new(
            AnyFaultSwitches::Mock(switches),
            context.clone(),
            Duration::from_secs(1),
        )
        .with_backoff(Duration::from_secs(1));
        let task = tokio::spawn(poller.run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(context.state().service_door_open());

        cancel.cancel();
        let stats = task.await.unwrap();
        assert_eq!(stats.failures, 3);
        assert_eq!(handle.reinitializations(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_cancelled_during_backoff() {
        let (acceptor, handle) = MockCoinAcceptor::new();
        handle.fail_next(1);

        let cancel = CancellationToken::new();
        let poller = SensorPoller::new(
            AnyCoinAcceptor::Mock(acceptor),
            context(),
            Duration::from_secs(1),
        );
        let task = tokio::spawn(poller.run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(2)).await;
        cancel.cancel();
        let stats = task.await.unwrap();

        assert_eq!(stats.failures, 1);
        assert_eq!(stats.reinitializations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_coin_poller_credits_state() {
        let context = context();
        let (acceptor, handle) = MockCoinAcceptor::new();

        let cancel = CancellationToken::new();
        let poller = SensorPoller::new(
            AnyCoinAcceptor::Mock(acceptor),
            context.clone(),
            Duration::from_secs(1),
        );
        let task = tokio::spawn(poller.run(cancel.clone()));

        handle.insert_coin(100).await.unwrap();
        handle.insert_coin(50).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(context.state().credit(), 150);
        cancel.cancel();
        task.await.unwrap();
    }
}
