//! Storage layer for the AlcoWall kiosk.
//!
//! This crate owns everything the kiosk keeps on local disk:
//!
//! - [`Database`] - SQLite connection pool with embedded migrations
//! - [`OfflineRetryQueue`] - durable FIFO of measurements and coin insertions
//!   awaiting backend acknowledgment
//! - [`HighscoreRecord`], [`HighscoreStore`], [`HighscoreReconciler`] - the
//!   `highscores.json` record with weekly and monthly rollover
//! - [`Journal`] - append-only JSONL audit trails
//!
//! # Delivery Guarantees
//!
//! An entry leaves the queue only after the backend explicitly acknowledged
//! it. Timeouts, transport errors and unexpected responses all leave the entry
//! at the head of the queue, and nothing behind it is sent until it succeeds.
//!
//! # Examples
//!
//! ```no_run
//! use alcowall_core::{DeviceId, Measurement};
//! use alcowall_network::MockBackend;
//! use alcowall_storage::{Database, DatabaseConfig, OfflineRetryQueue};
//! use chrono::Utc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("data/outbox.db")).await?;
//! let queue = OfflineRetryQueue::new(db);
//!
//! queue
//!     .enqueue(Measurement::new(DeviceId::new("alcoWall_01")?, 0.3, Utc::now()))
//!     .await?;
//!
//! let report = queue.flush(&MockBackend::new()).await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod highscore;
pub mod journal;
pub mod outbox;

pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use highscore::{HighscoreReconciler, HighscoreRecord, HighscoreStore};
pub use journal::{
    AlcoholResultEntry, AlcoholResultsJournal, CoinJournal, CoinJournalEntry, Journal,
};
pub use outbox::{FlushReport, OfflineRetryQueue, QueueEntry, QueuedEvent, SendState};
