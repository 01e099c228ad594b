//! Mock level sensors: alcohol, proximity and fault switches.
//!
//! Unlike the coin acceptor these sensors report a current value rather than
//! a stream of events, so each mock reads the latest value published by its
//! handle through a `watch` channel.

use super::FaultInjector;
use crate::{
    Result, SensorKind,
    traits::{AlcoholSensor, FaultSwitches, ProximitySensor},
    types::DeviceInfo,
};
use alcowall_core::FaultFlags;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug)]
struct MockValue<T> {
    value_rx: watch::Receiver<T>,
    faults: Arc<FaultInjector>,
    name: String,
}

#[derive(Debug, Clone)]
struct MockValueHandle<T> {
    value_tx: Arc<watch::Sender<T>>,
    faults: Arc<FaultInjector>,
}

fn mock_pair<T>(initial: T, name: &str) -> (MockValue<T>, MockValueHandle<T>) {
    let (value_tx, value_rx) = watch::channel(initial);
    let faults = FaultInjector::shared();
    (
        MockValue {
            value_rx,
            faults: faults.clone(),
            name: name.to_string(),
        },
        MockValueHandle {
            value_tx: Arc::new(value_tx),
            faults,
        },
    )
}

impl<T: Copy> MockValue<T> {
    fn read(&self, sensor: SensorKind) -> Result<T> {
        self.faults.check(sensor)?;
        Ok(*self.value_rx.borrow())
    }

    fn reinitialize(&self) {
        self.faults.record_reinitialization();
    }
}

impl<T> MockValueHandle<T> {
    fn set(&self, value: T) {
        self.value_tx.send_replace(value);
    }
}

/// Mock alcohol sensor.
///
/// # Examples
///
/// ```
/// use alcowall_hardware::mock::MockAlcoholSensor;
/// use alcowall_hardware::traits::AlcoholSensor;
///
/// #[tokio::main]
/// async fn main() -> alcowall_hardware::Result<()> {
///     let (mut sensor, handle) = MockAlcoholSensor::new();
///     handle.set_level(0.42);
///     assert_eq!(sensor.read_level().await?, 0.42);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockAlcoholSensor(MockValue<f64>);

/// Handle for controlling a [`MockAlcoholSensor`].
#[derive(Debug, Clone)]
pub struct MockAlcoholSensorHandle(MockValueHandle<f64>);

impl MockAlcoholSensor {
    /// Create a mock sensor reading `0.0`.
    pub fn new() -> (Self, MockAlcoholSensorHandle) {
        let (sensor, handle) = mock_pair(0.0, "Mock Alcohol Sensor");
        (Self(sensor), MockAlcoholSensorHandle(handle))
    }
}

impl AlcoholSensor for MockAlcoholSensor {
    async fn read_level(&mut self) -> Result<f64> {
        self.0.read(SensorKind::Alcohol)
    }

    async fn reinitialize(&mut self) -> Result<()> {
        self.0.reinitialize();
        Ok(())
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new(self.0.name.clone(), "Mock ADS1115")
    }
}

impl MockAlcoholSensorHandle {
    pub fn set_level(&self, level: f64) {
        self.0.set(level);
    }

    /// Make the next `reads` reads fail.
    pub fn fail_next(&self, reads: u32) {
        self.0.faults.fail_next(reads);
    }

    pub fn reinitializations(&self) -> u32 {
        self.0.faults.reinitializations()
    }
}

/// Mock ultrasonic proximity sensor.
#[derive(Debug)]
pub struct MockProximitySensor(MockValue<i32>);

/// Handle for controlling a [`MockProximitySensor`].
#[derive(Debug, Clone)]
pub struct MockProximitySensorHandle(MockValueHandle<i32>);

impl MockProximitySensor {
    /// Create a mock sensor reporting nothing in range (100 cm).
    pub fn new() -> (Self, MockProximitySensorHandle) {
        let (sensor, handle) = mock_pair(100, "Mock Proximity Sensor");
        (Self(sensor), MockProximitySensorHandle(handle))
    }
}

impl ProximitySensor for MockProximitySensor {
    async fn read_distance(&mut self) -> Result<i32> {
        self.0.read(SensorKind::Proximity)
    }

    async fn reinitialize(&mut self) -> Result<()> {
        self.0.reinitialize();
        Ok(())
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new(self.0.name.clone(), "Mock HC-SR04")
    }
}

impl MockProximitySensorHandle {
    pub fn set_distance(&self, distance_cm: i32) {
        self.0.set(distance_cm);
    }

    pub fn fail_next(&self, reads: u32) {
        self.0.faults.fail_next(reads);
    }

    pub fn reinitializations(&self) -> u32 {
        self.0.faults.reinitializations()
    }
}

/// Mock door and coin-stuck switches.
#[derive(Debug)]
pub struct MockFaultSwitches(MockValue<FaultFlags>);

/// Handle for controlling [`MockFaultSwitches`].
#[derive(Debug, Clone)]
pub struct MockFaultSwitchesHandle(MockValueHandle<FaultFlags>);

impl MockFaultSwitches {
    /// Create mock switches with every door closed.
    pub fn new() -> (Self, MockFaultSwitchesHandle) {
        let (switches, handle) = mock_pair(FaultFlags::default(), "Mock Fault Switches");
        (Self(switches), MockFaultSwitchesHandle(handle))
    }
}

impl FaultSwitches for MockFaultSwitches {
    async fn read_faults(&mut self) -> Result<FaultFlags> {
        self.0.read(SensorKind::Faults)
    }

    async fn reinitialize(&mut self) -> Result<()> {
        self.0.reinitialize();
        Ok(())
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new(self.0.name.clone(), "Mock Switch Bank")
    }
}

impl MockFaultSwitchesHandle {
    pub fn set_faults(&self, faults: FaultFlags) {
        self.0.set(faults);
    }

    pub fn fail_next(&self, reads: u32) {
        self.0.faults.fail_next(reads);
    }

    pub fn reinitializations(&self) -> u32 {
        self.0.faults.reinitializations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HardwareError;

    #[tokio::test]
    async fn test_mock_alcohol_sensor_reads_latest_value() {
        let (mut sensor, handle) = MockAlcoholSensor::new();
        assert_eq!(sensor.read_level().await.unwrap(), 0.0);

        handle.set_level(0.3);
        handle.set_level(0.5);
        assert_eq!(sensor.read_level().await.unwrap(), 0.5);
    }

    #[tokio::test]
    async fn test_mock_proximity_failure_then_recovery() {
        let (mut sensor, handle) = MockProximitySensor::new();
        handle.set_distance(12);
        handle.fail_next(1);

        assert!(matches!(
            sensor.read_distance().await,
            Err(HardwareError::SensorRead {
                sensor: SensorKind::Proximity,
                ..
            })
        ));
        sensor.reinitialize().await.unwrap();
        assert_eq!(sensor.read_distance().await.unwrap(), 12);
        assert_eq!(handle.reinitializations(), 1);
    }

    #[tokio::test]
    async fn test_mock_fault_switches() {
        let (mut switches, handle) = MockFaultSwitches::new();
        assert!(!switches.read_faults().await.unwrap().any());

        handle.set_faults(FaultFlags {
            coins_door_open: true,
            ..Default::default()
        });
        assert!(switches.read_faults().await.unwrap().coins_door_open);
    }

    #[tokio::test]
    async fn test_handle_outlives_sensor() {
        let (sensor, handle) = MockAlcoholSensor::new();
        drop(sensor);
        handle.set_level(1.0);
    }
}
