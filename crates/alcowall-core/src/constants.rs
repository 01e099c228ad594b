//! Core constants for the AlcoWall kiosk.
//!
//! This module centralizes the numeric defaults used throughout the kiosk:
//! workflow timings, measurement tolerances, sensor cadences, coin
//! denominations and the file names of locally persisted state. Most of them
//! are only defaults; [`crate::config::KioskConfig`] can override them at
//! startup.
//!
//! # Usage
//!
//! ```
//! use alcowall_core::constants::*;
//!
//! // Credit needed to start a measurement, in cents
//! assert_eq!(CREDIT_THRESHOLD, 100);
//!
//! // Proximity window for a precise reading
//! assert!(PROXIMITY_CLOSE_RANGE_CM.contains(&12));
//! assert!(!PROXIMITY_CLOSE_RANGE_CM.contains(&25));
//! ```

use std::ops::Range;

// ============================================================================
// Workflow
// ============================================================================

/// Credit (in cents) debited to authorize one measurement.
pub const CREDIT_THRESHOLD: i64 = 100;

/// Length of the measurement countdown, in seconds.
///
/// Each countdown step is one second. When it reaches zero the controller must
/// decide whether to conclude the measurement.
pub const COUNTER_FOR_ALCOHOL_MEASURING: u32 = 2;

/// Readings whose delta from the baseline stays at or below this value are
/// treated as "no alcohol detected" and conclude immediately at countdown end.
pub const ALCOHOL_LEVEL_ALLOWED_ERROR: f64 = 0.1;

/// Hard ceiling on time spent in the Measuring state, in seconds.
pub const ERROR_TO_MUCH_TIME_IN_ALCOHOL_CHECK: u64 = 100;

/// How long the result stays on screen, in seconds.
pub const DISPLAY_COOLDOWN_SECS: u64 = 10;

/// Extra sampling allowed after the countdown when the maximum is still rising.
pub const SETTLE_GRACE_MS: u64 = 1000;

/// Controller tick period, in milliseconds.
pub const TICK_INTERVAL_MS: u64 = 1000;

/// Local-maximum sampler period, in milliseconds.
pub const SAMPLER_INTERVAL_MS: u64 = 300;

/// Retry period of the offline queue, in milliseconds.
pub const RETRY_INTERVAL_MS: u64 = 1000;

// ============================================================================
// Sensors
// ============================================================================

/// Alcohol sensor polling cadence, in milliseconds.
pub const ALCOHOL_POLL_INTERVAL_MS: u64 = 200;

/// Coin, proximity and fault switch polling cadence, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Pause before a failing sensor is reinitialized, in milliseconds.
pub const SENSOR_BACKOFF_MS: u64 = 10_000;

/// Sentinel stored in [`crate::DeviceState`] until a sensor produced a value.
pub const SENSOR_NOT_READ: i32 = -1;

/// Distances (cm) considered close enough for a precise measurement.
pub const PROXIMITY_CLOSE_RANGE_CM: Range<i32> = 0..20;

/// Coin acceptor codes and their values in cents.
pub const COIN_DENOMINATIONS: [(u8, i64); 6] =
    [(1, 10), (2, 20), (3, 50), (4, 100), (5, 200), (6, 500)];

/// Look up the value in cents of a coin acceptor code.
///
/// # Examples
///
/// ```
/// use alcowall_core::constants::coin_value;
///
/// assert_eq!(coin_value(4), Some(100));
/// assert_eq!(coin_value(9), None);
/// ```
pub fn coin_value(code: u8) -> Option<i64> {
    COIN_DENOMINATIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, cents)| *cents)
}

// ============================================================================
// Backend and local files
// ============================================================================

/// Default REST backend.
pub const DEFAULT_BASE_URL: &str = "https://node.alkowall.indigoingenium.ba";

/// Default HTTP request timeout, in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Sentence shown when no fun fact can be fetched.
pub const FALLBACK_FUN_FACT: &str = "Drink responsibly!";

pub const DEVICE_ID_FILE: &str = "device_id.txt";
pub const HIGHSCORES_FILE: &str = "highscores.json";
pub const ALCOHOL_RESULTS_FILE: &str = "alcohol_results.json";
pub const COIN_INSERTED_FILE: &str = "coinInserted.json";
pub const OUTBOX_DATABASE_FILE: &str = "outbox.db";

/// Simulation files read by the file-backed sensor source.
pub const SIM_COIN_FILE: &str = "coinInserted.txt";
pub const SIM_ALCOHOL_FILE: &str = "alcoholCheck.txt";
pub const SIM_PROXIMITY_FILE: &str = "proximityCheck.txt";
pub const SIM_ERRORS_FILE: &str = "errors.json";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_values_are_known() {
        assert_eq!(coin_value(1), Some(10));
        assert_eq!(coin_value(6), Some(500));
        assert_eq!(coin_value(0), None);
    }

    #[test]
    fn test_proximity_range_bounds() {
        assert!(PROXIMITY_CLOSE_RANGE_CM.contains(&0));
        assert!(PROXIMITY_CLOSE_RANGE_CM.contains(&19));
        assert!(!PROXIMITY_CLOSE_RANGE_CM.contains(&20));
        assert!(!PROXIMITY_CLOSE_RANGE_CM.contains(&SENSOR_NOT_READ));
    }
}
