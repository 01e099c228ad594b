//! Mock coin acceptor implementation for testing and development.

use super::FaultInjector;
use crate::{
    HardwareError, Result, SensorKind,
    traits::CoinAcceptor,
    types::DeviceInfo,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Mock coin acceptor for testing and development.
///
/// Coins inserted through a [`MockCoinAcceptorHandle`] are queued and
/// returned by the next [`CoinAcceptor::poll_coins`] call.
///
/// # Examples
///
/// ```
/// use alcowall_hardware::mock::MockCoinAcceptor;
/// use alcowall_hardware::traits::CoinAcceptor;
///
/// #[tokio::main]
/// async fn main() -> alcowall_hardware::Result<()> {
///     let (mut acceptor, handle) = MockCoinAcceptor::new();
///
///     handle.insert_coin(100).await?;
///     handle.insert_coin(50).await?;
///
///     assert_eq!(acceptor.poll_coins().await?, vec![100, 50]);
///     assert!(acceptor.poll_coins().await?.is_empty());
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockCoinAcceptor {
    /// Channel receiver for simulated coins
    coin_rx: mpsc::Receiver<i64>,

    faults: Arc<FaultInjector>,

    /// Device name
    name: String,
}

impl MockCoinAcceptor {
    /// Create a new mock coin acceptor with the default name.
    pub fn new() -> (Self, MockCoinAcceptorHandle) {
        Self::with_name("Mock Coin Acceptor".to_string())
    }

    /// Create a new mock coin acceptor with a custom name.
    pub fn with_name(name: String) -> (Self, MockCoinAcceptorHandle) {
        let (coin_tx, coin_rx) = mpsc::channel(32);
        let faults = FaultInjector::shared();

        let acceptor = Self {
            coin_rx,
            faults: faults.clone(),
            name,
        };

        let handle = MockCoinAcceptorHandle { coin_tx, faults };

        (acceptor, handle)
    }
}

impl Default for MockCoinAcceptor {
    fn default() -> Self {
        Self::new().0
    }
}

impl CoinAcceptor for MockCoinAcceptor {
    async fn poll_coins(&mut self) -> Result<Vec<i64>> {
        self.faults.check(SensorKind::Coin)?;

        let mut coins = Vec::new();
        while let Ok(cents) = self.coin_rx.try_recv() {
            coins.push(cents);
        }
        Ok(coins)
    }

    async fn reinitialize(&mut self) -> Result<()> {
        self.faults.record_reinitialization();
        Ok(())
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new(self.name.clone(), "Mock Coin Acceptor v1.0")
    }
}

/// Handle for controlling a mock coin acceptor.
///
/// It can be cloned and shared across tasks.
#[derive(Debug, Clone)]
pub struct MockCoinAcceptorHandle {
    /// Channel sender for simulated coins
    coin_tx: mpsc::Sender<i64>,

    faults: Arc<FaultInjector>,
}

impl MockCoinAcceptorHandle {
    /// Insert a coin worth `cents`.
    ///
    /// # Errors
    ///
    /// Returns an error if the acceptor has been dropped and the channel is closed.
    pub async fn insert_coin(&self, cents: i64) -> Result<()> {
        self.coin_tx
            .send(cents)
            .await
            .map_err(|_| HardwareError::disconnected("Coin acceptor channel closed"))
    }

    /// Make the next `reads` polls fail.
    pub fn fail_next(&self, reads: u32) {
        self.faults.fail_next(reads);
    }

    /// Number of times the acceptor was reinitialized.
    pub fn reinitializations(&self) -> u32 {
        self.faults.reinitializations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_coin_acceptor_queues_coins() {
        let (mut acceptor, handle) = MockCoinAcceptor::new();
        handle.insert_coin(20).await.unwrap();

        assert_eq!(acceptor.poll_coins().await.unwrap(), vec![20]);
        assert!(acceptor.poll_coins().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mock_coin_acceptor_injected_failure_keeps_coins() {
        let (mut acceptor, handle) = MockCoinAcceptor::new();
        handle.insert_coin(200).await.unwrap();
        handle.fail_next(1);

        assert!(matches!(
            acceptor.poll_coins().await,
            Err(HardwareError::SensorRead {
                sensor: SensorKind::Coin,
                ..
            })
        ));
        assert_eq!(acceptor.poll_coins().await.unwrap(), vec![200]);
    }

    #[tokio::test]
    async fn test_mock_coin_acceptor_counts_reinitializations() {
        let (mut acceptor, handle) = MockCoinAcceptor::new();
        acceptor.reinitialize().await.unwrap();
        acceptor.reinitialize().await.unwrap();

        assert_eq!(handle.reinitializations(), 2);
    }

    #[tokio::test]
    async fn test_insert_after_drop_fails() {
        let (acceptor, handle) = MockCoinAcceptor::new();
        drop(acceptor);

        assert!(handle.insert_coin(10).await.is_err());
    }

    #[test]
    fn test_mock_coin_acceptor_info() {
        let (acceptor, _handle) = MockCoinAcceptor::with_name("Front".to_string());
        assert_eq!(acceptor.info().name, "Front");
    }
}
