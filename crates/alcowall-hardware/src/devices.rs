//! Enum wrappers for sensor dispatch.
//!
//! Native `async fn` in traits is not object-safe, so `Box<dyn AlcoholSensor>`
//! is not available. These enums provide concrete type dispatch instead; the
//! variant is chosen once at startup from the configured sensor source.
//!
//! # Examples
//!
//! ```
//! use alcowall_hardware::devices::AnyAlcoholSensor;
//! use alcowall_hardware::mock::MockAlcoholSensor;
//!
//! let (sensor, _handle) = MockAlcoholSensor::new();
//! let any_sensor = AnyAlcoholSensor::Mock(sensor);
//!
//! // Can now be used polymorphically through the AlcoholSensor trait
//! ```

use crate::file::{FileAlcoholSensor, FileCoinAcceptor, FileFaultSwitches, FileProximitySensor};
use crate::mock::{MockAlcoholSensor, MockCoinAcceptor, MockFaultSwitches, MockProximitySensor};
use crate::traits::{AlcoholSensor, CoinAcceptor, FaultSwitches, ProximitySensor};
use crate::{DeviceInfo, Result};
use alcowall_core::FaultFlags;

#[cfg(feature = "hardware-serial")]
use crate::cctalk::SerialCoinAcceptor;
#[cfg(feature = "hardware-rpi")]
use crate::rpi::{Ads1115AlcoholSensor, GpioFaultSwitches, HcSr04ProximitySensor};

/// Enum wrapper for coin acceptor dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyCoinAcceptor {
    /// Mock acceptor for development and testing.
    Mock(MockCoinAcceptor),
    /// Acceptor simulated through `coinInserted.txt`.
    File(FileCoinAcceptor),
    /// ccTalk acceptor on a serial port.
    #[cfg(feature = "hardware-serial")]
    Serial(SerialCoinAcceptor),
}

impl CoinAcceptor for AnyCoinAcceptor {
    async fn poll_coins(&mut self) -> Result<Vec<i64>> {
        match self {
            Self::Mock(device) => device.poll_coins().await,
            Self::File(device) => device.poll_coins().await,
            #[cfg(feature = "hardware-serial")]
            Self::Serial(device) => device.poll_coins().await,
        }
    }

    async fn reinitialize(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.reinitialize().await,
            Self::File(device) => device.reinitialize().await,
            #[cfg(feature = "hardware-serial")]
            Self::Serial(device) => device.reinitialize().await,
        }
    }

    fn info(&self) -> DeviceInfo {
        match self {
            Self::Mock(device) => device.info(),
            Self::File(device) => device.info(),
            #[cfg(feature = "hardware-serial")]
            Self::Serial(device) => device.info(),
        }
    }
}

/// Enum wrapper for alcohol sensor dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyAlcoholSensor {
    Mock(MockAlcoholSensor),
    File(FileAlcoholSensor),
    #[cfg(feature = "hardware-rpi")]
    Ads1115(Ads1115AlcoholSensor),
}

impl AlcoholSensor for AnyAlcoholSensor {
    async fn read_level(&mut self) -> Result<f64> {
        match self {
            Self::Mock(device) => device.read_level().await,
            Self::File(device) => device.read_level().await,
            #[cfg(feature = "hardware-rpi")]
            Self::Ads1115(device) => device.read_level().await,
        }
    }

    async fn reinitialize(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.reinitialize().await,
            Self::File(device) => device.reinitialize().await,
            #[cfg(feature = "hardware-rpi")]
            Self::Ads1115(device) => device.reinitialize().await,
        }
    }

    fn info(&self) -> DeviceInfo {
        match self {
            Self::Mock(device) => device.info(),
            Self::File(device) => device.info(),
            #[cfg(feature = "hardware-rpi")]
            Self::Ads1115(device) => device.info(),
        }
    }
}

/// Enum wrapper for proximity sensor dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyProximitySensor {
    Mock(MockProximitySensor),
    File(FileProximitySensor),
    #[cfg(feature = "hardware-rpi")]
    HcSr04(HcSr04ProximitySensor),
}

impl ProximitySensor for AnyProximitySensor {
    async fn read_distance(&mut self) -> Result<i32> {
        match self {
            Self::Mock(device) => device.read_distance().await,
            Self::File(device) => device.read_distance().await,
            #[cfg(feature = "hardware-rpi")]
            Self::HcSr04(device) => device.read_distance().await,
        }
    }

    async fn reinitialize(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.reinitialize().await,
            Self::File(device) => device.reinitialize().await,
            #[cfg(feature = "hardware-rpi")]
            Self::HcSr04(device) => device.reinitialize().await,
        }
    }

    fn info(&self) -> DeviceInfo {
        match self {
            Self::Mock(device) => device.info(),
            Self::File(device) => device.info(),
            #[cfg(feature = "hardware-rpi")]
            Self::HcSr04(device) => device.info(),
        }
    }
}

/// Enum wrapper for fault switch dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyFaultSwitches {
    Mock(MockFaultSwitches),
    File(FileFaultSwitches),
    #[cfg(feature = "hardware-rpi")]
    Gpio(GpioFaultSwitches),
}

impl FaultSwitches for AnyFaultSwitches {
    async fn read_faults(&mut self) -> Result<FaultFlags> {
        match self {
            Self::Mock(device) => device.read_faults().await,
            Self::File(device) => device.read_faults().await,
            #[cfg(feature = "hardware-rpi")]
            Self::Gpio(device) => device.read_faults().await,
        }
    }

    async fn reinitialize(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.reinitialize().await,
            Self::File(device) => device.reinitialize().await,
            #[cfg(feature = "hardware-rpi")]
            Self::Gpio(device) => device.reinitialize().await,
        }
    }

    fn info(&self) -> DeviceInfo {
        match self {
            Self::Mock(device) => device.info(),
            Self::File(device) => device.info(),
            #[cfg(feature = "hardware-rpi")]
            Self::Gpio(device) => device.info(),
        }
    }
}
