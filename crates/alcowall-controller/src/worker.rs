//! Short-lived background jobs.
//!
//! Network round trips never run on the controller loop. Each one is spawned
//! into a [`WorkerPool`] and reports back over an mpsc channel as a
//! [`WorkerMessage`], which the controller handles between timer events.

use alcowall_core::DeviceId;
use alcowall_core::constants::FALLBACK_FUN_FACT;
use alcowall_network::RemoteBackend;
use alcowall_storage::{
    FlushReport, HighscoreReconciler, HighscoreRecord, OfflineRetryQueue, StorageResult,
};
use chrono::Local;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 32;

/// Result of a background job.
#[derive(Debug)]
pub enum WorkerMessage {
    Flushed(StorageResult<FlushReport>),
    Highscores(StorageResult<HighscoreRecord>),
    /// Display content for the Displaying cycle `cycle`.
    Content {
        cycle: u64,
        fun_fact: String,
        ad_url: Option<String>,
    },
}

/// Background tasks sharing one result channel and one cancellation token.
#[derive(Debug)]
pub struct WorkerPool {
    tasks: JoinSet<()>,
    tx: mpsc::Sender<WorkerMessage>,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Create a pool and the receiver its results arrive on.
    pub fn new() -> (Self, mpsc::Receiver<WorkerMessage>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let pool = Self {
            tasks: JoinSet::new(),
            tx,
            cancel: CancellationToken::new(),
        };
        (pool, rx)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run `job` in the background and deliver its message.
    pub fn spawn<F>(&mut self, name: &'static str, job: F) -> AbortHandle
    where
        F: Future<Output = WorkerMessage> + Send + 'static,
    {
        let tx = self.tx.clone();
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => debug!(worker = name, "worker cancelled"),
                message = job => {
                    if tx.send(message).await.is_err() {
                        debug!(worker = name, "controller gone, result dropped");
                    }
                }
            }
        })
    }

    /// Wait for the next task to finish. Pending forever while empty.
    pub async fn join_next(&mut self) -> Option<Result<Id, (Id, JoinError)>> {
        if self.tasks.is_empty() {
            return std::future::pending().await;
        }
        self.tasks.join_next_with_id().await.map(|result| match result {
            Ok((id, ())) => Ok(id),
            Err(e) => Err((e.id(), e)),
        })
    }

    /// Cancel outstanding jobs and wait for them to stop.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result
                && e.is_panic()
            {
                warn!(error = %e, "worker panicked during shutdown");
            }
        }
    }
}

/// Send everything pending in the queue.
pub async fn flush_job<B: RemoteBackend>(
    queue: OfflineRetryQueue,
    backend: Arc<B>,
) -> WorkerMessage {
    WorkerMessage::Flushed(queue.flush(backend.as_ref()).await)
}

/// Fold a concluded measurement into the highscores.
pub async fn highscore_job<B: RemoteBackend>(
    reconciler: HighscoreReconciler,
    backend: Arc<B>,
    level: f64,
) -> WorkerMessage {
    let today = Local::now().date_naive();
    WorkerMessage::Highscores(reconciler.on_measurement(backend.as_ref(), level, today).await)
}

/// Merge the global highscore without a new measurement.
pub async fn reconcile_job<B: RemoteBackend>(
    reconciler: HighscoreReconciler,
    backend: Arc<B>,
) -> WorkerMessage {
    let today = Local::now().date_naive();
    WorkerMessage::Highscores(reconciler.reconcile(backend.as_ref(), today).await)
}

/// Fetch the fun fact and ad URL shown next to a result.
///
/// A failed fun fact falls back to [`FALLBACK_FUN_FACT`]; a failed ad URL is
/// simply absent.
pub async fn content_job<B: RemoteBackend>(
    backend: Arc<B>,
    device_id: DeviceId,
    cycle: u64,
) -> WorkerMessage {
    let (fact, ad) = tokio::join!(backend.fun_fact(), backend.ad_url(&device_id));

    let fun_fact = fact.unwrap_or_else(|e| {
        warn!(error = %e, "fun fact unavailable, using fallback");
        FALLBACK_FUN_FACT.to_string()
    });
    let ad_url = ad
        .inspect_err(|e| warn!(error = %e, "ad url unavailable"))
        .ok();

    WorkerMessage::Content {
        cycle,
        fun_fact,
        ad_url,
    }
}
