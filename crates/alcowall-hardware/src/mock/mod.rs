//! Mock sensor implementations for testing and development.
//!
//! This module provides simulated sensors that can be controlled
//! programmatically without requiring physical hardware. Each mock is created
//! together with a handle; the handle sets values and can make the next reads
//! fail to exercise the pollers' recovery path.

pub mod coin;
pub mod sensors;

// Re-export commonly used types
pub use coin::{MockCoinAcceptor, MockCoinAcceptorHandle};
pub use sensors::{
    MockAlcoholSensor, MockAlcoholSensorHandle, MockFaultSwitches, MockFaultSwitchesHandle,
    MockProximitySensor, MockProximitySensorHandle,
};

use crate::{HardwareError, SensorKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Failure injection and reinitialization bookkeeping shared between a mock
/// and its handle.
#[derive(Debug, Default)]
pub(crate) struct FaultInjector {
    pending_failures: AtomicU32,
    reinitializations: AtomicU32,
}

impl FaultInjector {
    pub(crate) fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn fail_next(&self, reads: u32) {
        self.pending_failures.fetch_add(reads, Ordering::SeqCst);
    }

    /// Consume one pending failure, if any.
    pub(crate) fn check(&self, sensor: SensorKind) -> crate::Result<()> {
        let consumed = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            Err(HardwareError::sensor_read(sensor, "simulated read failure"))
        } else {
            Ok(())
        }
    }

    pub(crate) fn record_reinitialization(&self) {
        self.reinitializations.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn reinitializations(&self) -> u32 {
        self.reinitializations.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_injector_consumes_failures() {
        let injector = FaultInjector::default();
        injector.fail_next(2);

        assert!(injector.check(SensorKind::Alcohol).is_err());
        assert!(injector.check(SensorKind::Alcohol).is_err());
        assert!(injector.check(SensorKind::Alcohol).is_ok());
    }
}
