//! Sensor source selection.
//!
//! The kiosk picks one source for all of its sensors at startup, from
//! [`SensorSourceKind`] in the configuration:
//!
//! - `mock`: in-process mocks; their handles are returned so a caller (tests,
//!   a demo driver) can feed values.
//! - `file`: the file-backed simulation in `sensors.simulation_dir`.
//! - `hardware`: ccTalk coin acceptor and Raspberry Pi peripherals. Requires
//!   the `hardware-serial` and `hardware-rpi` features.

use crate::devices::{AnyAlcoholSensor, AnyCoinAcceptor, AnyFaultSwitches, AnyProximitySensor};
use crate::file::{FileAlcoholSensor, FileCoinAcceptor, FileFaultSwitches, FileProximitySensor};
use crate::manager::{PollerConfig, PollerSet};
use crate::mock::{
    MockAlcoholSensor, MockAlcoholSensorHandle, MockCoinAcceptor, MockCoinAcceptorHandle,
    MockFaultSwitches, MockFaultSwitchesHandle, MockProximitySensor, MockProximitySensorHandle,
};
use crate::Result;
use alcowall_core::config::{SensorSourceKind, SensorsConfig};
use tracing::info;

/// Handles of the mock sensors created for the `mock` source.
#[derive(Debug, Clone)]
pub struct MockHandles {
    pub coin: MockCoinAcceptorHandle,
    pub alcohol: MockAlcoholSensorHandle,
    pub proximity: MockProximitySensorHandle,
    pub faults: MockFaultSwitchesHandle,
}

/// Sensors registered in a [`PollerSet`], ready to start.
#[derive(Debug)]
pub struct SensorSuite {
    pub pollers: PollerSet,
    /// Present only for [`SensorSourceKind::Mock`].
    pub mock_handles: Option<MockHandles>,
}

impl SensorSuite {
    /// Open every sensor of the configured source.
    ///
    /// # Errors
    ///
    /// Returns an error if a hardware device cannot be opened, or if the
    /// hardware source was requested in a build without hardware support.
    pub async fn open(config: &SensorsConfig) -> Result<Self> {
        let mut pollers = PollerSet::new(PollerConfig::from(config));

        let mock_handles = match config.source {
            SensorSourceKind::Mock => Some(Self::register_mocks(&mut pollers)),
            SensorSourceKind::File => {
                let dir = &config.simulation_dir;
                pollers.register_coin(AnyCoinAcceptor::File(FileCoinAcceptor::new(dir)));
                pollers.register_alcohol(AnyAlcoholSensor::File(FileAlcoholSensor::new(dir)));
                pollers.register_proximity(AnyProximitySensor::File(FileProximitySensor::new(dir)));
                pollers.register_faults(AnyFaultSwitches::File(FileFaultSwitches::new(dir)));
                None
            }
            SensorSourceKind::Hardware => {
                Self::register_hardware(&mut pollers, config).await?;
                None
            }
        };

        info!(source = ?config.source, "sensors opened");
        Ok(Self {
            pollers,
            mock_handles,
        })
    }

    fn register_mocks(pollers: &mut PollerSet) -> MockHandles {
        let (coin, coin_handle) = MockCoinAcceptor::new();
        let (alcohol, alcohol_handle) = MockAlcoholSensor::new();
        let (proximity, proximity_handle) = MockProximitySensor::new();
        let (faults, faults_handle) = MockFaultSwitches::new();

        pollers.register_coin(AnyCoinAcceptor::Mock(coin));
        pollers.register_alcohol(AnyAlcoholSensor::Mock(alcohol));
        pollers.register_proximity(AnyProximitySensor::Mock(proximity));
        pollers.register_faults(AnyFaultSwitches::Mock(faults));

        MockHandles {
            coin: coin_handle,
            alcohol: alcohol_handle,
            proximity: proximity_handle,
            faults: faults_handle,
        }
    }

    #[cfg(all(feature = "hardware-serial", feature = "hardware-rpi"))]
    async fn register_hardware(pollers: &mut PollerSet, config: &SensorsConfig) -> Result<()> {
        use crate::cctalk::SerialCoinAcceptor;
        use crate::rpi::{Ads1115AlcoholSensor, GpioFaultSwitches, HcSr04ProximitySensor, SwitchPins};

        let coin = SerialCoinAcceptor::open(config.serial_port.clone()).await?;
        pollers.register_coin(AnyCoinAcceptor::Serial(coin));

        let alcohol = Ads1115AlcoholSensor::open(config.ads1115_address)?;
        pollers.register_alcohol(AnyAlcoholSensor::Ads1115(alcohol));

        let proximity = HcSr04ProximitySensor::open(config.trigger_pin, config.echo_pin)?;
        pollers.register_proximity(AnyProximitySensor::HcSr04(proximity));

        let switches = GpioFaultSwitches::open(SwitchPins {
            service_door: config.service_door_pin,
            coins_door: config.coins_door_pin,
            coin_stuck: config.coin_stuck_pin,
        })?;
        pollers.register_faults(AnyFaultSwitches::Gpio(switches));

        Ok(())
    }

    #[cfg(not(all(feature = "hardware-serial", feature = "hardware-rpi")))]
    async fn register_hardware(_pollers: &mut PollerSet, _config: &SensorsConfig) -> Result<()> {
        Err(crate::HardwareError::configuration(
            "sensor source 'hardware' requires the hardware-serial and hardware-rpi features",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alcowall_core::{DeviceContext, DeviceId};
    use std::time::Duration;

    #[tokio::test]
    async fn test_mock_source_returns_handles() {
        let suite = SensorSuite::open(&SensorsConfig::default()).await.unwrap();
        assert!(suite.mock_handles.is_some());

        let handle = suite
            .pollers
            .start(DeviceContext::new(DeviceId::new("1").unwrap()));
        assert_eq!(handle.len(), 4);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_file_source_reads_simulation_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("proximityCheck.txt"), "11").unwrap();

        let config = SensorsConfig {
            source: SensorSourceKind::File,
            simulation_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let suite = SensorSuite::open(&config).await.unwrap();
        assert!(suite.mock_handles.is_none());

        let context = DeviceContext::new(DeviceId::new("1").unwrap());
        let handle = suite.pollers.start(context.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(context.state().proximity_distance(), 11);
        handle.shutdown().await;
    }

    #[cfg(not(all(feature = "hardware-serial", feature = "hardware-rpi")))]
    #[tokio::test]
    async fn test_hardware_source_requires_features() {
        let config = SensorsConfig {
            source: SensorSourceKind::Hardware,
            ..Default::default()
        };
        assert!(SensorSuite::open(&config).await.is_err());
    }
}
