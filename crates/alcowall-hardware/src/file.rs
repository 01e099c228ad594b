//! File-backed sensor simulation.
//!
//! Lets the kiosk run on a development machine, or be driven by another
//! process, by reading sensor values from plain files in a simulation
//! directory:
//!
//! | File | Content |
//! |---|---|
//! | `coinInserted.txt` | value in cents of an inserted coin; emptied once read |
//! | `alcoholCheck.txt` | line 1 `yes` while someone blows, line 2 the level |
//! | `proximityCheck.txt` | distance in centimeters |
//! | `errors.json` | `{"service_door_open", "coins_door_open", "coin_stuck"}` |
//!
//! A missing or malformed file is reported as a sensor read failure, which
//! the poller handles with its usual backoff.

use crate::{
    HardwareError, Result, SensorKind,
    traits::{AlcoholSensor, CoinAcceptor, FaultSwitches, ProximitySensor},
    types::DeviceInfo,
};
use alcowall_core::FaultFlags;
use alcowall_core::constants::{SIM_ALCOHOL_FILE, SIM_COIN_FILE, SIM_ERRORS_FILE, SIM_PROXIMITY_FILE};
use std::path::{Path, PathBuf};

async fn read_sim_file(sensor: SensorKind, path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| HardwareError::sensor_read(sensor, format!("{}: {e}", path.display())))
}

fn file_info(name: &str, path: &Path) -> DeviceInfo {
    DeviceInfo::new(name, "File simulation").with_location(path.display().to_string())
}

/// Coin acceptor reading `coinInserted.txt`.
#[derive(Debug, Clone)]
pub struct FileCoinAcceptor {
    path: PathBuf,
}

impl FileCoinAcceptor {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(SIM_COIN_FILE),
        }
    }
}

impl CoinAcceptor for FileCoinAcceptor {
    async fn poll_coins(&mut self) -> Result<Vec<i64>> {
        let content = read_sim_file(SensorKind::Coin, &self.path).await?;
        let content = content.trim();
        if content.is_empty() {
            return Ok(Vec::new());
        }

        let cents: i64 = content.parse().map_err(|_| {
            HardwareError::sensor_read(SensorKind::Coin, format!("invalid coin value {content:?}"))
        })?;
        tokio::fs::write(&self.path, "").await?;

        if cents <= 0 {
            return Ok(Vec::new());
        }
        Ok(vec![cents])
    }

    async fn reinitialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn info(&self) -> DeviceInfo {
        file_info("File Coin Acceptor", &self.path)
    }
}

/// Alcohol sensor reading `alcoholCheck.txt`.
///
/// The level on the second line is only reported while the first line is
/// `yes`; otherwise the sensor reads `0.0`.
#[derive(Debug, Clone)]
pub struct FileAlcoholSensor {
    path: PathBuf,
}

impl FileAlcoholSensor {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(SIM_ALCOHOL_FILE),
        }
    }
}

impl AlcoholSensor for FileAlcoholSensor {
    async fn read_level(&mut self) -> Result<f64> {
        let content = read_sim_file(SensorKind::Alcohol, &self.path).await?;
        let mut lines = content.lines().map(str::trim);

        if lines.next() != Some("yes") {
            return Ok(0.0);
        }

        let raw = lines.next().unwrap_or_default();
        raw.parse().map_err(|_| {
            HardwareError::sensor_read(SensorKind::Alcohol, format!("invalid level {raw:?}"))
        })
    }

    async fn reinitialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn info(&self) -> DeviceInfo {
        file_info("File Alcohol Sensor", &self.path)
    }
}

/// Proximity sensor reading `proximityCheck.txt`.
#[derive(Debug, Clone)]
pub struct FileProximitySensor {
    path: PathBuf,
}

impl FileProximitySensor {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(SIM_PROXIMITY_FILE),
        }
    }
}

impl ProximitySensor for FileProximitySensor {
    async fn read_distance(&mut self) -> Result<i32> {
        let content = read_sim_file(SensorKind::Proximity, &self.path).await?;
        let raw = content.trim();
        // Distances may be written with a fractional part.
        let distance: f64 = raw.parse().map_err(|_| {
            HardwareError::sensor_read(SensorKind::Proximity, format!("invalid distance {raw:?}"))
        })?;
        Ok(distance.round() as i32)
    }

    async fn reinitialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn info(&self) -> DeviceInfo {
        file_info("File Proximity Sensor", &self.path)
    }
}

/// Fault switches reading `errors.json`.
#[derive(Debug, Clone)]
pub struct FileFaultSwitches {
    path: PathBuf,
}

impl FileFaultSwitches {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(SIM_ERRORS_FILE),
        }
    }
}

impl FaultSwitches for FileFaultSwitches {
    async fn read_faults(&mut self) -> Result<FaultFlags> {
        let content = read_sim_file(SensorKind::Faults, &self.path).await?;
        serde_json::from_str(&content)
            .map_err(|e| HardwareError::sensor_read(SensorKind::Faults, e.to_string()))
    }

    async fn reinitialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn info(&self) -> DeviceInfo {
        file_info("File Fault Switches", &self.path)
    }
}
