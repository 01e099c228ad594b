//! Durable offline retry queue.
//!
//! Measurements and coin insertions are appended to the `outbox` table and
//! replayed to the backend in insertion order. A flush stops at the first
//! entry the backend does not acknowledge; that entry stays at the head and
//! nothing behind it is sent until it succeeds.
//!
//! Consecutive coin entries at the head are sent as one batch request, and the
//! acknowledgment removes the whole batch.
//!
//! # Example
//!
//! ```no_run
//! use alcowall_core::{DeviceId, Measurement};
//! use alcowall_network::MockBackend;
//! use alcowall_storage::{Database, OfflineRetryQueue};
//! use chrono::Utc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = OfflineRetryQueue::new(Database::in_memory().await?);
//! let device = DeviceId::new("alcoWall_01")?;
//!
//! queue.enqueue(Measurement::new(device, 0.42, Utc::now())).await?;
//! let report = queue.flush(&MockBackend::new()).await?;
//! assert_eq!(report.sent, 1);
//! # Ok(())
//! # }
//! ```

use crate::connection::Database;
use crate::error::{StorageError, StorageResult};
use alcowall_core::{CoinInsertion, Measurement};
use alcowall_network::{RemoteBackend, RemoteError};
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, info, warn};

/// Maximum number of coin entries per batch request.
pub const MAX_COIN_BATCH: usize = 50;

const KIND_MEASUREMENT: &str = "measurement";
const KIND_COIN: &str = "coin";

/// Event waiting to be acknowledged by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum QueuedEvent {
    Measurement(Measurement),
    Coin(CoinInsertion),
}

impl QueuedEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::Measurement(_) => KIND_MEASUREMENT,
            Self::Coin(_) => KIND_COIN,
        }
    }

    fn encode(&self) -> StorageResult<String> {
        Ok(match self {
            Self::Measurement(m) => serde_json::to_string(m)?,
            Self::Coin(c) => serde_json::to_string(c)?,
        })
    }

    fn decode(id: i64, kind: &str, payload: &str) -> StorageResult<Self> {
        let invalid = |reason: String| StorageError::InvalidEntry { id, reason };
        match kind {
            KIND_MEASUREMENT => serde_json::from_str(payload)
                .map(Self::Measurement)
                .map_err(|e| invalid(e.to_string())),
            KIND_COIN => serde_json::from_str(payload)
                .map(Self::Coin)
                .map_err(|e| invalid(e.to_string())),
            other => Err(invalid(format!("unknown kind '{other}'"))),
        }
    }
}

impl From<Measurement> for QueuedEvent {
    fn from(measurement: Measurement) -> Self {
        Self::Measurement(measurement)
    }
}

impl From<CoinInsertion> for QueuedEvent {
    fn from(coin: CoinInsertion) -> Self {
        Self::Coin(coin)
    }
}

/// Send state of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    /// Waiting for an acknowledgment.
    Pending,
    /// Acknowledged; removed at the latest by the next flush.
    Sent,
}

impl SendState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
        }
    }
}

/// A queued event with its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub id: i64,
    pub event: QueuedEvent,
    pub state: SendState,
    /// Failed send attempts so far.
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    id: i64,
    kind: String,
    payload: String,
    state: String,
    attempts: i64,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OutboxRow> for QueueEntry {
    type Error = StorageError;

    fn try_from(row: OutboxRow) -> StorageResult<Self> {
        let state = match row.state.as_str() {
            "pending" => SendState::Pending,
            "sent" => SendState::Sent,
            other => {
                return Err(StorageError::InvalidEntry {
                    id: row.id,
                    reason: format!("unknown state '{other}'"),
                });
            }
        };
        Ok(Self {
            id: row.id,
            event: QueuedEvent::decode(row.id, &row.kind, &row.payload)?,
            state,
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
        })
    }
}

/// Outcome of one [`OfflineRetryQueue::flush`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Entries acknowledged during this flush.
    pub sent: usize,
    /// Entries still pending afterwards.
    pub remaining: usize,
    /// Whether the flush stopped at an unacknowledged entry.
    pub stopped_on_failure: bool,
}

impl fmt::Display for FlushReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sent {}, remaining {}", self.sent, self.remaining)?;
        if self.stopped_on_failure {
            write!(f, " (stopped on failure)")?;
        }
        Ok(())
    }
}

/// FIFO queue of events awaiting backend acknowledgment.
///
/// Cloning is cheap; clones share the database. Flushes must not overlap;
/// the workflow controller keeps at most one in flight.
#[derive(Debug, Clone)]
pub struct OfflineRetryQueue {
    db: Database,
    coin_batch_limit: usize,
}

impl OfflineRetryQueue {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            coin_batch_limit: MAX_COIN_BATCH,
        }
    }

    /// Limit the number of coins sent per batch request.
    pub fn with_coin_batch_limit(mut self, limit: usize) -> Self {
        self.coin_batch_limit = limit.max(1);
        self
    }

    /// Append an event to the durable log. Returns the entry id.
    pub async fn enqueue(&self, event: impl Into<QueuedEvent>) -> StorageResult<i64> {
        let event = event.into();
        let result = sqlx::query(
            r#"
            INSERT INTO outbox (kind, payload, state, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(event.kind())
        .bind(event.encode()?)
        .bind(SendState::Pending.as_str())
        .bind(Utc::now())
        .execute(self.db.pool())
        .await?;

        let id = result.last_insert_rowid();
        debug!(id, kind = event.kind(), "event queued");
        Ok(id)
    }

    /// Pending entries in send order.
    pub async fn pending(&self) -> StorageResult<Vec<QueueEntry>> {
        let rows = sqlx::query_as::<_, OutboxRow>(
            r#"
            SELECT id, kind, payload, state, attempts, last_error, created_at
            FROM outbox
            WHERE state = 'pending'
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(QueueEntry::try_from).collect()
    }

    /// Number of pending entries.
    pub async fn len(&self) -> StorageResult<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM outbox WHERE state = 'pending'")
            .fetch_one(self.db.pool())
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub async fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Send pending entries in FIFO order, stopping at the first failure.
    ///
    /// Backend failures are reported in the [`FlushReport`]; only local
    /// storage failures are returned as errors.
    pub async fn flush<B: RemoteBackend>(&self, backend: &B) -> StorageResult<FlushReport> {
        self.purge_sent().await?;

        let entries = self.pending().await?;
        let mut report = FlushReport::default();
        let mut index = 0;

        while index < entries.len() {
            let batch = self.next_batch(&entries[index..]);
            let ids: Vec<i64> = batch.iter().map(|entry| entry.id).collect();

            match Self::send(backend, batch).await {
                Ok(()) => {
                    self.acknowledge(&ids).await?;
                    report.sent += ids.len();
                    index += ids.len();
                }
                Err(e) => {
                    warn!(head = ids[0], entries = ids.len(), error = %e, "flush stopped, entry kept for retry");
                    self.record_failure(&ids, &e).await?;
                    report.stopped_on_failure = true;
                    break;
                }
            }
        }

        report.remaining = entries.len() - index;
        if report.sent > 0 {
            info!(%report, "offline queue flushed");
        }
        Ok(report)
    }

    /// The head entry alone, or the run of coin entries at the head.
    fn next_batch<'a>(&self, entries: &'a [QueueEntry]) -> &'a [QueueEntry] {
        match entries.first().map(|entry| &entry.event) {
            Some(QueuedEvent::Coin(_)) => {
                let run = entries
                    .iter()
                    .take(self.coin_batch_limit)
                    .take_while(|entry| matches!(entry.event, QueuedEvent::Coin(_)))
                    .count();
                &entries[..run]
            }
            _ => &entries[..entries.len().min(1)],
        }
    }

    async fn send<B: RemoteBackend>(
        backend: &B,
        batch: &[QueueEntry],
    ) -> Result<(), RemoteError> {
        match batch.first().map(|entry| &entry.event) {
            Some(QueuedEvent::Measurement(measurement)) => {
                backend.submit_measurement(measurement).await.map(|_| ())
            }
            Some(QueuedEvent::Coin(_)) => {
                let coins: Vec<CoinInsertion> = batch
                    .iter()
                    .filter_map(|entry| match &entry.event {
                        QueuedEvent::Coin(coin) => Some(coin.clone()),
                        QueuedEvent::Measurement(_) => None,
                    })
                    .collect();
                backend.submit_coins(&coins).await
            }
            None => Ok(()),
        }
    }

    /// Mark entries sent, then remove them.
    async fn acknowledge(&self, ids: &[i64]) -> StorageResult<()> {
        let mut tx = self.db.pool().begin().await?;
        for id in ids {
            sqlx::query("UPDATE outbox SET state = ? WHERE id = ?")
                .bind(SendState::Sent.as_str())
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        self.purge_sent().await
    }

    async fn purge_sent(&self) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM outbox WHERE state = 'sent'")
            .execute(self.db.pool())
            .await?;
        if result.rows_affected() > 0 {
            debug!(removed = result.rows_affected(), "acknowledged entries removed");
        }
        Ok(())
    }

    async fn record_failure(&self, ids: &[i64], error: &RemoteError) -> StorageResult<()> {
        let mut tx = self.db.pool().begin().await?;
        for id in ids {
            sqlx::query("UPDATE outbox SET attempts = attempts + 1, last_error = ? WHERE id = ?")
                .bind(error.to_string())
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
