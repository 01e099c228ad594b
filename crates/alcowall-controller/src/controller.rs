//! Workflow event loop.
//!
//! [`WorkflowController::run`] is the single cooperative loop that drives the
//! [`StateMachine`]. It multiplexes four timers (tick, sampler, countdown,
//! retry), the results of background workers and cancellation in one
//! `tokio::select!`. The sampler and countdown only fire while Measuring and
//! are re-armed on every entry into Measuring, so a timer owned by an earlier
//! cycle can never reach the machine.
//!
//! Everything that waits on the network runs in the [`WorkerPool`]. The loop
//! itself only awaits local storage (queue inserts and journal appends).

use crate::presentation::{Presentation, PresentationPublisher, proximity_hint};
use crate::state_machine::{Effect, KioskEvent, KioskPhase, StateMachine, WorkflowPolicy};
use crate::worker::{
    WorkerMessage, WorkerPool, content_job, flush_job, highscore_job, reconcile_job,
};
use alcowall_core::config::{StorageConfig, WorkflowConfig};
use alcowall_core::{DeviceContext, Measurement};
use alcowall_network::RemoteBackend;
use alcowall_storage::{
    AlcoholResultEntry, AlcoholResultsJournal, CoinJournal, CoinJournalEntry, Database,
    DatabaseConfig, HighscoreReconciler, HighscoreStore, OfflineRetryQueue, StorageResult,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{Id, JoinError};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Local stores the controller writes to.
#[derive(Debug, Clone)]
pub struct KioskStores {
    pub queue: OfflineRetryQueue,
    pub highscores: HighscoreReconciler,
    pub results: AlcoholResultsJournal,
    pub coins: CoinJournal,
}

impl KioskStores {
    /// Open the queue database and the files under `config.data_dir`.
    pub async fn open(config: &StorageConfig) -> StorageResult<Self> {
        let db = Database::new(DatabaseConfig::new(config.outbox_path())).await?;
        Ok(Self::with_database(db, config))
    }

    /// Use an already opened database for the queue.
    pub fn with_database(db: Database, config: &StorageConfig) -> Self {
        Self {
            queue: OfflineRetryQueue::new(db),
            highscores: HighscoreReconciler::new(HighscoreStore::new(config.highscores_path())),
            results: AlcoholResultsJournal::new(config.alcohol_results_path()),
            coins: CoinJournal::new(config.coin_journal_path()),
        }
    }
}

/// Periods of the controller's timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerTimings {
    pub tick: Duration,
    pub sampler: Duration,
    /// Length of one countdown step.
    pub countdown_step: Duration,
    pub retry: Duration,
}

impl From<&WorkflowConfig> for ControllerTimings {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            tick: Duration::from_millis(config.tick_ms),
            sampler: Duration::from_millis(config.sampler_ms),
            countdown_step: Duration::from_secs(1),
            retry: Duration::from_millis(config.retry_interval_ms),
        }
    }
}

impl Default for ControllerTimings {
    fn default() -> Self {
        Self::from(&WorkflowConfig::default())
    }
}

impl ControllerTimings {
    pub fn tick(mut self, period: Duration) -> Self {
        self.tick = period;
        self
    }

    pub fn sampler(mut self, period: Duration) -> Self {
        self.sampler = period;
        self
    }

    pub fn countdown_step(mut self, period: Duration) -> Self {
        self.countdown_step = period;
        self
    }

    pub fn retry(mut self, period: Duration) -> Self {
        self.retry = period;
        self
    }
}

/// Counters returned when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed_cycles: u64,
    pub aborted_cycles: u64,
}

struct Timers {
    tick: Interval,
    sampler: Interval,
    countdown: Interval,
    retry: Interval,
}

impl Timers {
    fn new(timings: &ControllerTimings) -> Self {
        Self {
            tick: delayed_interval(timings.tick),
            sampler: delayed_interval(timings.sampler),
            countdown: delayed_interval(timings.countdown_step),
            retry: delayed_interval(timings.retry),
        }
    }

    /// Restart the timers owned by the Measuring state.
    fn arm_measuring(&mut self) {
        self.sampler.reset();
        self.countdown.reset();
    }
}

fn delayed_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Drives the kiosk workflow.
pub struct WorkflowController<B> {
    context: DeviceContext,
    machine: StateMachine,
    timings: ControllerTimings,
    backend: Arc<B>,
    stores: KioskStores,
    presentation: PresentationPublisher,
    workers: WorkerPool,
    results: mpsc::Receiver<WorkerMessage>,
    /// Number of the current Displaying cycle.
    cycle: u64,
    flush_task: Option<Id>,
    summary: RunSummary,
}

impl<B: RemoteBackend> WorkflowController<B> {
    pub fn new(
        context: DeviceContext,
        backend: Arc<B>,
        stores: KioskStores,
        config: &WorkflowConfig,
    ) -> Self {
        let (workers, results) = WorkerPool::new();
        Self {
            context,
            machine: StateMachine::new(WorkflowPolicy::from(config)),
            timings: ControllerTimings::from(config),
            backend,
            stores,
            presentation: PresentationPublisher::new(),
            workers,
            results,
            cycle: 0,
            flush_task: None,
            summary: RunSummary::default(),
        }
    }

    /// Replace the workflow policy. Only meaningful before [`Self::run`].
    pub fn with_policy(mut self, policy: WorkflowPolicy) -> Self {
        self.machine = StateMachine::new(policy);
        self
    }

    pub fn with_timings(mut self, timings: ControllerTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<Presentation> {
        self.presentation.subscribe()
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Run until `cancel` fires, then stop outstanding workers.
    pub async fn run(&mut self, cancel: CancellationToken) -> RunSummary {
        info!(device = %self.context.device_id(), policy = ?self.machine.policy(), "workflow controller started");

        let mut timers = Timers::new(&self.timings);
        self.workers.spawn(
            "reconcile",
            reconcile_job(self.stores.highscores.clone(), Arc::clone(&self.backend)),
        );

        loop {
            let measuring = self.machine.phase() == KioskPhase::Measuring;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(message) = self.results.recv() => self.on_worker_message(message),
                Some(joined) = self.workers.join_next() => self.on_worker_joined(joined),
                now = timers.tick.tick() => self.on_tick(now, &mut timers).await,
                now = timers.countdown.tick(), if measuring => {
                    self.handle(KioskEvent::CountdownStep { now }, &mut timers).await;
                }
                now = timers.sampler.tick(), if measuring => {
                    let level = self.context.state().alcohol_level();
                    debug!(level, "alcohol sample");
                    self.handle(KioskEvent::Sample { now, level }, &mut timers).await;
                }
                _ = timers.retry.tick() => self.spawn_flush(),
            }
        }

        self.workers.shutdown().await;
        info!(
            completed = self.summary.completed_cycles,
            aborted = self.summary.aborted_cycles,
            "workflow controller stopped"
        );
        self.summary
    }

    async fn on_tick(&mut self, now: Instant, timers: &mut Timers) {
        self.collect_coins().await;

        let snapshot = self.context.state().snapshot();
        self.handle(KioskEvent::Tick { now, snapshot }, timers).await;

        let credit = self.context.state().credit();
        self.presentation.update(|p| {
            p.credit = credit;
            p.proximity_hint = proximity_hint(snapshot.proximity_distance);
            p.fault = snapshot.faults.describe();
        });
    }

    async fn handle(&mut self, event: KioskEvent, timers: &mut Timers) {
        let before = self.machine.phase();
        let effects = self.machine.handle(event);
        for effect in effects {
            self.apply(effect, event.now()).await;
        }

        let after = self.machine.phase();
        if before != after {
            info!(from = %before, to = %after, "workflow transition");
            if after == KioskPhase::Measuring {
                timers.arm_measuring();
            }
        }

        let countdown = self.machine.countdown();
        self.presentation.update(|p| {
            p.phase = after;
            p.countdown = countdown;
            if after == KioskPhase::Idle {
                p.shown_level = None;
                p.fun_fact = None;
                p.ad_url = None;
            }
        });
    }

    async fn apply(&mut self, effect: Effect, now: Instant) {
        match effect {
            Effect::DebitCredit(amount) => {
                let state = self.context.state();
                if state.try_debit(amount) {
                    info!(amount, credit = state.credit(), "credit debited, measurement started");
                } else {
                    warn!(amount, credit = state.credit(), "credit no longer covers a measurement");
                    self.machine.reset(now);
                }
            }
            Effect::RecordMeasurement(level) => {
                self.summary.completed_cycles += 1;
                self.presentation.update(|p| p.shown_level = Some(level));
                self.record_measurement(level).await;
            }
            Effect::EnteredDisplaying => {
                self.cycle += 1;
                self.workers.spawn(
                    "content",
                    content_job(
                        Arc::clone(&self.backend),
                        self.context.device_id().clone(),
                        self.cycle,
                    ),
                );
            }
            Effect::Aborted(reason) => {
                self.summary.aborted_cycles += 1;
                warn!(%reason, "workflow cycle aborted");
                self.presentation.update(|p| p.last_abort = Some(reason.to_string()));
            }
            Effect::ReturnedIdle => debug!(cycle = self.cycle, "display cooldown expired"),
        }
    }

    async fn record_measurement(&mut self, level: f64) {
        let measurement = Measurement::new(self.context.device_id().clone(), level, Utc::now());
        info!(level, "measurement concluded");

        if let Err(e) = self
            .stores
            .results
            .append(&AlcoholResultEntry::from(&measurement))
            .await
        {
            warn!(error = %e, "failed to journal measurement");
        }
        match self.stores.queue.enqueue(measurement).await {
            Ok(id) => debug!(id, "measurement queued"),
            Err(e) => error!(error = %e, level, "failed to queue measurement"),
        }

        self.spawn_flush();
        self.workers.spawn(
            "highscore",
            highscore_job(self.stores.highscores.clone(), Arc::clone(&self.backend), level),
        );
    }

    /// Move coins credited since the last tick into the journal and queue.
    async fn collect_coins(&mut self) {
        let coins = self.context.state().take_coin_insertions();
        if coins.is_empty() {
            return;
        }

        for coin in coins {
            let cents = coin.cash_value;
            if let Err(e) = self.stores.coins.append(&CoinJournalEntry::from(&coin)).await {
                warn!(error = %e, cents, "failed to journal coin");
            }
            if let Err(e) = self.stores.queue.enqueue(coin).await {
                error!(error = %e, cents, "failed to queue coin");
            }
        }
        self.spawn_flush();
    }

    /// Start a flush unless one is already running.
    fn spawn_flush(&mut self) {
        if self.flush_task.is_some() {
            return;
        }
        let handle = self.workers.spawn(
            "flush",
            flush_job(self.stores.queue.clone(), Arc::clone(&self.backend)),
        );
        self.flush_task = Some(handle.id());
    }

    fn on_worker_message(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Flushed(result) => {
                self.flush_task = None;
                match result {
                    Ok(report) if report.stopped_on_failure => {
                        warn!(%report, "queue flush stopped, will retry");
                    }
                    Ok(report) if report.sent > 0 => info!(%report, "queue flushed"),
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "queue flush failed"),
                }
            }
            WorkerMessage::Highscores(Ok(record)) => {
                debug!(weekly = record.weekly, monthly = record.monthly, all_time = record.all_time, "highscores updated");
                self.presentation.update(|p| p.highscores = Some(record));
            }
            WorkerMessage::Highscores(Err(e)) => warn!(error = %e, "highscore update failed"),
            WorkerMessage::Content {
                cycle,
                fun_fact,
                ad_url,
            } => {
                if cycle != self.cycle || self.machine.phase() != KioskPhase::Displaying {
                    debug!(cycle, current = self.cycle, "stale display content ignored");
                    return;
                }
                self.presentation.update(|p| {
                    p.fun_fact = Some(fun_fact);
                    p.ad_url = ad_url;
                });
            }
        }
    }

    fn on_worker_joined(&mut self, joined: Result<Id, (Id, JoinError)>) {
        let id = match joined {
            Ok(id) => id,
            Err((id, e)) => {
                error!(error = %e, "background worker failed");
                id
            }
        };
        if self.flush_task == Some(id) {
            self.flush_task = None;
        }
    }
}
