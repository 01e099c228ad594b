//! Kiosk configuration.
//!
//! The configuration is read from a TOML file (`alcowall.toml` by default).
//! Every section and every key is optional; anything left out falls back to
//! the values in [`crate::constants`].
//!
//! ```toml
//! [backend]
//! base_url = "http://localhost:3000"
//!
//! [workflow]
//! countdown_secs = 3
//!
//! [sensors]
//! source = "file"
//! simulation_dir = "testFiles"
//! ```

use crate::constants::*;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    pub device: DeviceConfig,
    pub backend: BackendConfig,
    pub workflow: WorkflowConfig,
    pub sensors: SensorsConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// File holding the kiosk's backend identifier.
    pub id_file: PathBuf,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id_file: PathBuf::from("Constants").join(DEVICE_ID_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Timings and thresholds of the measurement workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub credit_threshold: i64,
    pub countdown_secs: u32,
    pub allowed_error: f64,
    pub max_measuring_secs: u64,
    pub display_cooldown_secs: u64,
    pub settle_grace_ms: u64,
    pub tick_ms: u64,
    pub sampler_ms: u64,
    pub retry_interval_ms: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            credit_threshold: CREDIT_THRESHOLD,
            countdown_secs: COUNTER_FOR_ALCOHOL_MEASURING,
            allowed_error: ALCOHOL_LEVEL_ALLOWED_ERROR,
            max_measuring_secs: ERROR_TO_MUCH_TIME_IN_ALCOHOL_CHECK,
            display_cooldown_secs: DISPLAY_COOLDOWN_SECS,
            settle_grace_ms: SETTLE_GRACE_MS,
            tick_ms: TICK_INTERVAL_MS,
            sampler_ms: SAMPLER_INTERVAL_MS,
            retry_interval_ms: RETRY_INTERVAL_MS,
        }
    }
}

/// Where sensor readings come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorSourceKind {
    /// In-process mocks driven through handles.
    #[default]
    Mock,
    /// Plain files in the simulation directory.
    File,
    /// Serial coin acceptor and Raspberry Pi peripherals.
    Hardware,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    pub source: SensorSourceKind,
    pub alcohol_interval_ms: u64,
    pub coin_interval_ms: u64,
    pub proximity_interval_ms: u64,
    pub fault_interval_ms: u64,
    pub backoff_ms: u64,
    pub simulation_dir: PathBuf,
    /// Serial device of the ccTalk coin acceptor. Auto-detected when unset.
    pub serial_port: Option<String>,
    pub ads1115_address: u16,
    pub trigger_pin: u8,
    pub echo_pin: u8,
    pub service_door_pin: Option<u8>,
    pub coins_door_pin: Option<u8>,
    pub coin_stuck_pin: Option<u8>,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            source: SensorSourceKind::default(),
            alcohol_interval_ms: ALCOHOL_POLL_INTERVAL_MS,
            coin_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            proximity_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            fault_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            backoff_ms: SENSOR_BACKOFF_MS,
            simulation_dir: PathBuf::from("testFiles"),
            serial_port: None,
            ads1115_address: 0x48,
            trigger_pin: 23,
            echo_pin: 24,
            service_door_pin: None,
            coins_door_pin: None,
            coin_stuck_pin: None,
        }
    }
}

impl SensorsConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the retry queue database, highscores and result journals.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl StorageConfig {
    pub fn outbox_path(&self) -> PathBuf {
        self.data_dir.join(OUTBOX_DATABASE_FILE)
    }

    pub fn highscores_path(&self) -> PathBuf {
        self.data_dir.join(HIGHSCORES_FILE)
    }

    pub fn alcohol_results_path(&self) -> PathBuf {
        self.data_dir.join(ALCOHOL_RESULTS_FILE)
    }

    pub fn coin_journal_path(&self) -> PathBuf {
        self.data_dir.join(COIN_INSERTED_FILE)
    }
}

impl KioskConfig {
    /// Parse and validate configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigParse` for malformed TOML and `Error::Config`
    /// when a value is out of range.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: KioskConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read, otherwise the errors
    /// of [`KioskConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load configuration, falling back to defaults when the file is absent.
    ///
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject values the workflow cannot run with.
    pub fn validate(&self) -> Result<()> {
        let w = &self.workflow;
        if w.credit_threshold <= 0 {
            return Err(Error::Config(
                "workflow.credit_threshold must be positive".to_string(),
            ));
        }
        if w.allowed_error < 0.0 || !w.allowed_error.is_finite() {
            return Err(Error::Config(
                "workflow.allowed_error must be a non-negative number".to_string(),
            ));
        }

        let durations = [
            ("workflow.max_measuring_secs", w.max_measuring_secs),
            ("workflow.tick_ms", w.tick_ms),
            ("workflow.sampler_ms", w.sampler_ms),
            ("workflow.retry_interval_ms", w.retry_interval_ms),
            ("sensors.alcohol_interval_ms", self.sensors.alcohol_interval_ms),
            ("sensors.coin_interval_ms", self.sensors.coin_interval_ms),
            ("sensors.proximity_interval_ms", self.sensors.proximity_interval_ms),
            ("sensors.fault_interval_ms", self.sensors.fault_interval_ms),
            ("backend.timeout_ms", self.backend.timeout_ms),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, value)| *value == 0) {
            return Err(Error::Config(format!("{name} must be greater than zero")));
        }

        if self.backend.base_url.trim().is_empty() {
            return Err(Error::Config("backend.base_url is empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config_is_valid() {
        let config = KioskConfig::default();
        config.validate().unwrap();

        assert_eq!(config.workflow.credit_threshold, 100);
        assert_eq!(config.workflow.allowed_error, 0.1);
        assert_eq!(config.sensors.source, SensorSourceKind::Mock);
        assert_eq!(config.backend.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = KioskConfig::from_toml_str(
            r#"
            [workflow]
            countdown_secs = 3

            [sensors]
            source = "file"
            "#,
        )
        .unwrap();

        assert_eq!(config.workflow.countdown_secs, 3);
        assert_eq!(config.workflow.display_cooldown_secs, 10);
        assert_eq!(config.sensors.source, SensorSourceKind::File);
        assert_eq!(config.sensors.alcohol_interval_ms, 200);
    }

    #[rstest]
    #[case("[workflow]\ncredit_threshold = 0")]
    #[case("[workflow]\nallowed_error = -0.5")]
    #[case("[workflow]\ntick_ms = 0")]
    #[case("[sensors]\ncoin_interval_ms = 0")]
    #[case("[backend]\nbase_url = \"  \"")]
    fn test_invalid_values_are_rejected(#[case] content: &str) {
        assert!(matches!(
            KioskConfig::from_toml_str(content),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        assert!(matches!(
            KioskConfig::from_toml_str("[workflow"),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = KioskConfig::load_or_default(dir.path().join("alcowall.toml")).unwrap();
        assert_eq!(config, KioskConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alcowall.toml");
        std::fs::write(&path, "[storage]\ndata_dir = \"/var/lib/alcowall\"\n").unwrap();

        let config = KioskConfig::load(&path).unwrap();
        assert_eq!(
            config.storage.highscores_path(),
            PathBuf::from("/var/lib/alcowall/highscores.json")
        );
    }
}
