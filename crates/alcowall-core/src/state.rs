//! Shared live device state.
//!
//! [`DeviceState`] is the single source of truth for sensor values, credit and
//! fault switches. Sensor pollers write into it from their own tasks while the
//! workflow controller reads it on every tick.
//!
//! Every accessor takes the same persistent mutex for the duration of one
//! field access, so readers never observe a partially written value. Credit is
//! the only field with two writers (the coin poller adds, the controller
//! debits), which is why it exposes read-modify-write operations instead of a
//! bare setter for normal use.
//!
//! # Examples
//!
//! ```
//! use alcowall_core::{DeviceId, DeviceState};
//! use chrono::Utc;
//!
//! let state = DeviceState::new(DeviceId::new("1").unwrap());
//! assert_eq!(state.alcohol_level(), -1.0);
//!
//! state.record_coin(100, Utc::now());
//! state.record_coin(50, Utc::now());
//! assert_eq!(state.credit(), 150);
//!
//! assert!(state.try_debit(100));
//! assert_eq!(state.credit(), 50);
//! assert_eq!(state.take_coin_insertions().len(), 2);
//! ```

use crate::constants::SENSOR_NOT_READ;
use crate::types::{Cents, CoinInsertion, DeviceId, FaultFlags};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Fields {
    credit: Cents,
    alcohol_level: f64,
    proximity_distance: i32,
    faults: FaultFlags,
    coin_insertions: Vec<CoinInsertion>,
}

impl Default for Fields {
    fn default() -> Self {
        Self {
            credit: 0,
            alcohol_level: f64::from(SENSOR_NOT_READ),
            proximity_distance: SENSOR_NOT_READ,
            faults: FaultFlags::default(),
            coin_insertions: Vec::new(),
        }
    }
}

/// Point-in-time copy of the live values, taken under one lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSnapshot {
    pub credit: Cents,
    pub alcohol_level: f64,
    pub proximity_distance: i32,
    pub faults: FaultFlags,
}

/// Thread-safe record of live sensor, credit and fault values.
#[derive(Debug)]
pub struct DeviceState {
    device_id: DeviceId,
    fields: Mutex<Fields>,
}

impl DeviceState {
    /// Create a state with every sensor marked as not yet read.
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            fields: Mutex::new(Fields::default()),
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    // Writers always store complete values, so a poisoned guard still holds
    // consistent data.
    fn lock(&self) -> MutexGuard<'_, Fields> {
        self.fields.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current credit in cents.
    pub fn credit(&self) -> Cents {
        self.lock().credit
    }

    pub fn set_credit(&self, cents: Cents) {
        self.lock().credit = cents;
    }

    /// Add credit and return the new balance.
    pub fn add_credit(&self, cents: Cents) -> Cents {
        let mut fields = self.lock();
        fields.credit += cents;
        fields.credit
    }

    /// Debit `amount` cents if the balance covers it.
    ///
    /// Returns `false` and leaves the balance untouched otherwise.
    pub fn try_debit(&self, amount: Cents) -> bool {
        let mut fields = self.lock();
        if fields.credit < amount {
            return false;
        }
        fields.credit -= amount;
        true
    }

    /// Credit a coin and remember it for upload.
    ///
    /// The balance update and the pending insertion are recorded under the
    /// same lock acquisition.
    pub fn record_coin(&self, cents: Cents, at: DateTime<Utc>) -> Cents {
        let mut fields = self.lock();
        fields.credit += cents;
        fields
            .coin_insertions
            .push(CoinInsertion::new(self.device_id.clone(), cents, at));
        fields.credit
    }

    /// Drain coin insertions recorded since the previous call.
    pub fn take_coin_insertions(&self) -> Vec<CoinInsertion> {
        std::mem::take(&mut self.lock().coin_insertions)
    }

    pub fn alcohol_level(&self) -> f64 {
        self.lock().alcohol_level
    }

    pub fn set_alcohol_level(&self, level: f64) {
        self.lock().alcohol_level = level;
    }

    /// Last measured distance in centimeters, `-1` until first read.
    pub fn proximity_distance(&self) -> i32 {
        self.lock().proximity_distance
    }

    pub fn set_proximity_distance(&self, distance_cm: i32) {
        self.lock().proximity_distance = distance_cm;
    }

    pub fn faults(&self) -> FaultFlags {
        self.lock().faults
    }

    pub fn set_faults(&self, faults: FaultFlags) {
        self.lock().faults = faults;
    }

    pub fn service_door_open(&self) -> bool {
        self.lock().faults.service_door_open
    }

    pub fn set_service_door_open(&self, open: bool) {
        self.lock().faults.service_door_open = open;
    }

    pub fn coins_door_open(&self) -> bool {
        self.lock().faults.coins_door_open
    }

    pub fn set_coins_door_open(&self, open: bool) {
        self.lock().faults.coins_door_open = open;
    }

    pub fn coin_stuck(&self) -> bool {
        self.lock().faults.coin_stuck
    }

    pub fn set_coin_stuck(&self, stuck: bool) {
        self.lock().faults.coin_stuck = stuck;
    }

    /// Copy all live values at once.
    pub fn snapshot(&self) -> StateSnapshot {
        let fields = self.lock();
        StateSnapshot {
            credit: fields.credit,
            alcohol_level: fields.alcohol_level,
            proximity_distance: fields.proximity_distance,
            faults: fields.faults,
        }
    }
}

/// Explicitly constructed handle to the kiosk's shared state.
///
/// Created once at process start and cloned into every poller, the
/// controller and the background workers.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    state: Arc<DeviceState>,
}

impl DeviceContext {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            state: Arc::new(DeviceState::new(device_id)),
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        self.state.device_id()
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }
}
