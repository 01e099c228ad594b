//! Raspberry Pi peripherals.
//!
//! - Alcohol sensor: MQ-3 module wired to channel 0 of an ADS1115 ADC on I2C.
//!   The reported level is the channel voltage.
//! - Proximity sensor: HC-SR04 ultrasonic ranger (trigger and echo GPIO).
//! - Fault switches: door and coin-stuck contacts on pulled-up GPIO inputs.
//!   A closed contact pulls the pin low; a high pin means the door is open or
//!   the coin path is blocked.
//!
//! All bus access is blocking and runs on Tokio's blocking pool.

use crate::{
    HardwareError, Result, SensorKind,
    traits::{AlcoholSensor, FaultSwitches, ProximitySensor},
    types::DeviceInfo,
};
use alcowall_core::FaultFlags;
use rppal::gpio::{Gpio, InputPin, Level, OutputPin};
use rppal::i2c::I2c;
use std::time::{Duration, Instant};

/// Run blocking device I/O on a handle that is moved in and handed back.
async fn with_blocking<H, T, F>(handle: H, f: F) -> Result<(H, Result<T>)>
where
    H: Send + 'static,
    T: Send + 'static,
    F: FnOnce(&mut H) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut handle = handle;
        let result = f(&mut handle);
        (handle, result)
    })
    .await
    .map_err(|e| HardwareError::Io(std::io::Error::other(e)))
}

// ============================================================================
// ADS1115 alcohol sensor
// ============================================================================

const ADS1115_REG_CONVERSION: u8 = 0x00;
const ADS1115_REG_CONFIG: u8 = 0x01;
/// Single shot, AIN0 against GND, +/-4.096V, 128 SPS, comparator off.
const ADS1115_CONFIG_AIN0: u16 = 0xC383;
const ADS1115_FULL_SCALE_VOLTS: f64 = 4.096;
const ADS1115_CONVERSION_TIME: Duration = Duration::from_millis(9);

/// Convert a raw ADS1115 conversion result to volts.
pub fn ads1115_volts(raw: [u8; 2]) -> f64 {
    f64::from(i16::from_be_bytes(raw)) * ADS1115_FULL_SCALE_VOLTS / 32768.0
}

#[derive(Debug)]
pub struct Ads1115AlcoholSensor {
    address: u16,
    bus: Option<I2c>,
}

impl Ads1115AlcoholSensor {
    pub fn open(address: u16) -> Result<Self> {
        Ok(Self {
            address,
            bus: Some(Self::connect(address)?),
        })
    }

    fn connect(address: u16) -> Result<I2c> {
        let mut bus = I2c::new()?;
        bus.set_slave_address(address)?;
        Ok(bus)
    }

    fn convert(bus: &mut I2c) -> Result<f64> {
        let [hi, lo] = ADS1115_CONFIG_AIN0.to_be_bytes();
        bus.write(&[ADS1115_REG_CONFIG, hi, lo])?;
        std::thread::sleep(ADS1115_CONVERSION_TIME);

        let mut raw = [0u8; 2];
        bus.write_read(&[ADS1115_REG_CONVERSION], &mut raw)?;
        Ok(ads1115_volts(raw))
    }
}

impl AlcoholSensor for Ads1115AlcoholSensor {
    async fn read_level(&mut self) -> Result<f64> {
        let bus = self
            .bus
            .take()
            .ok_or_else(|| HardwareError::disconnected("ADS1115"))?;
        let (bus, level) = with_blocking(bus, Self::convert).await?;
        self.bus = Some(bus);
        level.map_err(|e| HardwareError::sensor_read(SensorKind::Alcohol, e.to_string()))
    }

    async fn reinitialize(&mut self) -> Result<()> {
        self.bus = None;
        self.bus = Some(Self::connect(self.address)?);
        Ok(())
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new("Alcohol Sensor", "ADS1115")
            .with_location(format!("i2c@{:#04x}", self.address))
    }
}

// ============================================================================
// HC-SR04 proximity sensor
// ============================================================================

/// Centimeters per second of echo pulse (half the speed of sound).
const SOUND_CM_PER_SEC: f64 = 17_150.0;
const ECHO_TIMEOUT: Duration = Duration::from_millis(40);

#[derive(Debug)]
struct SonarPins {
    trigger: OutputPin,
    echo: InputPin,
}

#[derive(Debug)]
pub struct HcSr04ProximitySensor {
    trigger_pin: u8,
    echo_pin: u8,
    pins: Option<SonarPins>,
}

impl HcSr04ProximitySensor {
    pub fn open(trigger_pin: u8, echo_pin: u8) -> Result<Self> {
        Ok(Self {
            trigger_pin,
            echo_pin,
            pins: Some(Self::connect(trigger_pin, echo_pin)?),
        })
    }

    fn connect(trigger_pin: u8, echo_pin: u8) -> Result<SonarPins> {
        let gpio = Gpio::new()?;
        let mut trigger = gpio.get(trigger_pin)?.into_output();
        trigger.set_low();
        let echo = gpio.get(echo_pin)?.into_input();
        Ok(SonarPins { trigger, echo })
    }

    fn wait_for(echo: &InputPin, level: Level, deadline: Instant) -> Result<Instant> {
        while echo.read() != level {
            if Instant::now() >= deadline {
                return Err(HardwareError::timeout(ECHO_TIMEOUT.as_millis() as u64));
            }
        }
        Ok(Instant::now())
    }

    fn measure(pins: &mut SonarPins) -> Result<i32> {
        pins.trigger.set_high();
        std::thread::sleep(Duration::from_micros(10));
        pins.trigger.set_low();

        let deadline = Instant::now() + ECHO_TIMEOUT;
        let start = Self::wait_for(&pins.echo, Level::High, deadline)?;
        let end = Self::wait_for(&pins.echo, Level::Low, start + ECHO_TIMEOUT)?;

        let distance = (end - start).as_secs_f64() * SOUND_CM_PER_SEC;
        Ok(distance.round() as i32)
    }
}

impl ProximitySensor for HcSr04ProximitySensor {
    async fn read_distance(&mut self) -> Result<i32> {
        let pins = self
            .pins
            .take()
            .ok_or_else(|| HardwareError::disconnected("HC-SR04"))?;
        let (pins, distance) = with_blocking(pins, Self::measure).await?;
        self.pins = Some(pins);
        distance.map_err(|e| HardwareError::sensor_read(SensorKind::Proximity, e.to_string()))
    }

    async fn reinitialize(&mut self) -> Result<()> {
        self.pins = None;
        self.pins = Some(Self::connect(self.trigger_pin, self.echo_pin)?);
        Ok(())
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new("Proximity Sensor", "HC-SR04").with_location(format!(
            "gpio trig={} echo={}",
            self.trigger_pin, self.echo_pin
        ))
    }
}

// ============================================================================
// Door and coin-stuck switches
// ============================================================================

/// GPIO assignment of the fault switches. Unassigned switches read as closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwitchPins {
    pub service_door: Option<u8>,
    pub coins_door: Option<u8>,
    pub coin_stuck: Option<u8>,
}

#[derive(Debug)]
struct SwitchInputs {
    service_door: Option<InputPin>,
    coins_door: Option<InputPin>,
    coin_stuck: Option<InputPin>,
}

#[derive(Debug)]
pub struct GpioFaultSwitches {
    pins: SwitchPins,
    inputs: SwitchInputs,
}

impl GpioFaultSwitches {
    pub fn open(pins: SwitchPins) -> Result<Self> {
        Ok(Self {
            pins,
            inputs: Self::connect(pins)?,
        })
    }

    fn connect(pins: SwitchPins) -> Result<SwitchInputs> {
        let gpio = Gpio::new()?;
        let input = |pin: Option<u8>| -> Result<Option<InputPin>> {
            pin.map(|p| -> Result<InputPin> { Ok(gpio.get(p)?.into_input_pullup()) })
                .transpose()
        };
        Ok(SwitchInputs {
            service_door: input(pins.service_door)?,
            coins_door: input(pins.coins_door)?,
            coin_stuck: input(pins.coin_stuck)?,
        })
    }
}

fn is_open(pin: &Option<InputPin>) -> bool {
    pin.as_ref().is_some_and(InputPin::is_high)
}

impl FaultSwitches for GpioFaultSwitches {
    async fn read_faults(&mut self) -> Result<FaultFlags> {
        Ok(FaultFlags {
            service_door_open: is_open(&self.inputs.service_door),
            coins_door_open: is_open(&self.inputs.coins_door),
            coin_stuck: is_open(&self.inputs.coin_stuck),
        })
    }

    async fn reinitialize(&mut self) -> Result<()> {
        self.inputs = Self::connect(self.pins)?;
        Ok(())
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new("Fault Switches", "GPIO")
    }
}
