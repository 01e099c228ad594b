//! End-to-end workflow scenarios.
//!
//! Each test runs a real [`WorkflowController`] against an in-memory queue,
//! temporary journals and the scripted backend. Sensors are simulated by
//! writing straight into the shared device state. Timings are scaled down
//! so every scenario completes in well under a second of wall time.
//!
//! Run with: cargo test --package alcowall-controller --test workflow_scenarios

use alcowall_controller::{
    ControllerTimings, KioskPhase, KioskStores, Presentation, RunSummary, WorkflowController,
    WorkflowPolicy,
};
use alcowall_core::config::{StorageConfig, WorkflowConfig};
use alcowall_core::{DeviceContext, DeviceId};
use alcowall_network::MockBackend;
use alcowall_storage::{AlcoholResultsJournal, CoinJournal, Database, OfflineRetryQueue};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;

const DEADLINE: Duration = Duration::from_secs(5);

fn timings() -> ControllerTimings {
    ControllerTimings::default()
        .tick(Duration::from_millis(20))
        .sampler(Duration::from_millis(10))
        .countdown_step(Duration::from_millis(20))
        .retry(Duration::from_millis(50))
}

fn policy() -> WorkflowPolicy {
    WorkflowPolicy::default()
        .countdown_secs(10)
        .display_cooldown(Duration::from_millis(300))
        .settle_grace(Duration::from_millis(20))
}

struct Kiosk {
    _dir: tempfile::TempDir,
    context: DeviceContext,
    queue: OfflineRetryQueue,
    results: AlcoholResultsJournal,
    coins: CoinJournal,
    presentation: watch::Receiver<Presentation>,
    cancel: CancellationToken,
    task: JoinHandle<RunSummary>,
}

impl Kiosk {
    async fn start(backend: &MockBackend, policy: WorkflowPolicy) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let stores = KioskStores::with_database(
            Database::in_memory().await.unwrap(),
            &StorageConfig {
                data_dir: dir.path().to_path_buf(),
            },
        );
        let queue = stores.queue.clone();
        let results = stores.results.clone();
        let coins = stores.coins.clone();

        let context = DeviceContext::new(DeviceId::new("alcoWall_01").unwrap());
        context.state().set_alcohol_level(0.0);
        context.state().set_proximity_distance(10);

        let mut controller = WorkflowController::new(
            context.clone(),
            Arc::new(backend.clone()),
            stores,
            &WorkflowConfig::default(),
        )
        .with_policy(policy)
        .with_timings(timings());
        let presentation = controller.subscribe();

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move { controller.run(token).await });

        Self {
            _dir: dir,
            context,
            queue,
            results,
            coins,
            presentation,
            cancel,
            task,
        }
    }

    async fn wait_until(&mut self, condition: impl FnMut(&Presentation) -> bool) -> Presentation {
        timeout(DEADLINE, self.presentation.wait_for(condition))
            .await
            .expect("presentation condition not reached in time")
            .unwrap()
            .clone()
    }

    async fn wait_for_phase(&mut self, phase: KioskPhase) -> Presentation {
        self.wait_until(|p| p.phase == phase).await
    }

    async fn stop(self) -> RunSummary {
        self.cancel.cancel();
        timeout(DEADLINE, self.task).await.unwrap().unwrap()
    }
}

async fn eventually(mut check: impl AsyncFnMut() -> bool) {
    let result = timeout(DEADLINE, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "condition not reached in time");
}

/// Scenario 1: credit 150 with threshold 100 starts a measurement and
/// leaves 50 cents.
#[tokio::test]
async fn test_credit_starts_measurement_and_debits_threshold() {
    let backend = MockBackend::new();
    let mut kiosk = Kiosk::start(&backend, policy().countdown_secs(1000)).await;
    assert_eq!(kiosk.presentation.borrow().phase, KioskPhase::Idle);

    kiosk.context.state().set_credit(150);
    let shown = kiosk.wait_for_phase(KioskPhase::Measuring).await;

    assert_eq!(kiosk.context.state().credit(), 50);
    assert!(shown.countdown.is_some());
    kiosk.wait_until(|p| p.credit == 50).await;

    kiosk.stop().await;
}

/// Scenario 2: a delta of 0.05 (below the allowed error) concludes at the
/// end of the countdown and is shown, journaled and submitted.
#[tokio::test]
async fn test_small_delta_concludes_and_is_recorded() {
    let backend = MockBackend::new();
    let mut kiosk = Kiosk::start(&backend, policy()).await;

    kiosk.context.state().set_credit(150);
    kiosk.wait_for_phase(KioskPhase::Measuring).await;
    kiosk.context.state().set_alcohol_level(0.05);

    let shown = kiosk.wait_for_phase(KioskPhase::Displaying).await;
    assert_eq!(shown.shown_level, Some(0.05));

    let content = kiosk.wait_until(|p| p.fun_fact.is_some()).await;
    assert_eq!(content.fun_fact.as_deref(), Some("Mock fact"));
    assert_eq!(content.ad_url.as_deref(), Some("https://ads.example/video.mp4"));

    kiosk
        .wait_until(|p| p.highscores.is_some_and(|h| h.all_time == 0.05))
        .await;

    eventually(async || backend.accepted_measurements().len() == 1).await;
    assert_eq!(backend.accepted_measurements()[0].alcohol_level, 0.05);

    let journal = kiosk.results.read_all().await.unwrap();
    assert_eq!(journal.len(), 1);
    assert_eq!(journal[0].alcohol_level, 0.05);

    kiosk.wait_for_phase(KioskPhase::Idle).await;
    let summary = kiosk.stop().await;
    assert_eq!(summary.completed_cycles, 1);
    assert_eq!(summary.aborted_cycles, 0);
}

/// Scenario 3: opening the service door mid-measurement returns to Idle
/// without recording anything.
#[tokio::test]
async fn test_service_door_aborts_measurement() {
    let backend = MockBackend::new();
    let mut kiosk = Kiosk::start(&backend, policy().countdown_secs(1000)).await;

    kiosk.context.state().set_credit(150);
    kiosk.wait_for_phase(KioskPhase::Measuring).await;
    kiosk.context.state().set_alcohol_level(0.7);
    kiosk.context.state().set_service_door_open(true);

    let shown = kiosk.wait_for_phase(KioskPhase::Idle).await;
    assert_eq!(shown.shown_level, None);
    let shown = kiosk.wait_until(|p| p.fault.is_some()).await;
    assert_eq!(shown.fault, Some("service door open"));
    assert_eq!(
        shown.last_abort.as_deref(),
        Some("hardware fault: service door open")
    );

    // Credit is not refunded and the remainder cannot start a new cycle.
    assert_eq!(kiosk.context.state().credit(), 50);
    assert!(kiosk.queue.is_empty().await.unwrap());
    assert!(kiosk.results.read_all().await.unwrap().is_empty());

    let summary = kiosk.stop().await;
    assert_eq!(summary.completed_cycles, 0);
    assert_eq!(summary.aborted_cycles, 1);
    assert_eq!(backend.measurement_attempts(), 0);
}

/// Scenario 4: the first submission fails, the retry timer delivers it and
/// the queue ends empty.
#[tokio::test]
async fn test_failed_submission_is_retried() {
    let backend = MockBackend::new();
    backend.fail_next_measurements(1);
    let mut kiosk = Kiosk::start(&backend, policy()).await;

    kiosk.context.state().set_credit(100);
    kiosk.wait_for_phase(KioskPhase::Measuring).await;
    kiosk.context.state().set_alcohol_level(0.05);
    kiosk.wait_for_phase(KioskPhase::Displaying).await;

    let queue = kiosk.queue.clone();
    eventually(async || backend.accepted_measurements().len() == 1).await;
    eventually(async || queue.is_empty().await.unwrap()).await;

    assert_eq!(backend.measurement_attempts(), 2);
    kiosk.stop().await;
}

/// Scenario 5: a measurement that never concludes is cut off by the
/// elapsed-time limit.
#[tokio::test]
async fn test_elapsed_limit_returns_to_idle() {
    let backend = MockBackend::new();
    let mut kiosk = Kiosk::start(
        &backend,
        policy()
            .countdown_secs(10_000)
            .max_measuring(Duration::from_millis(200)),
    )
    .await;

    kiosk.context.state().set_credit(100);
    kiosk.wait_for_phase(KioskPhase::Measuring).await;
    let started = Instant::now();

    let shown = kiosk.wait_for_phase(KioskPhase::Idle).await;
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert_eq!(
        shown.last_abort.as_deref(),
        Some("measurement took too long")
    );
    assert!(kiosk.queue.is_empty().await.unwrap());

    let summary = kiosk.stop().await;
    assert_eq!(summary.aborted_cycles, 1);
}

#[tokio::test]
async fn test_coins_are_journaled_and_uploaded() {
    let backend = MockBackend::new();
    let mut kiosk = Kiosk::start(&backend, policy().countdown_secs(1000)).await;

    kiosk.context.state().record_coin(50, Utc::now());
    kiosk.context.state().record_coin(20, Utc::now());

    kiosk.wait_until(|p| p.credit == 70).await;
    eventually(async || {
        backend
            .accepted_coin_batches()
            .iter()
            .map(Vec::len)
            .sum::<usize>()
            == 2
    })
    .await;

    let journal = kiosk.coins.read_all().await.unwrap();
    let values: Vec<i64> = journal.iter().map(|c| c.cash_value).collect();
    assert_eq!(values, vec![50, 20]);
    assert_eq!(kiosk.presentation.borrow().phase, KioskPhase::Idle);

    kiosk.stop().await;
}

#[tokio::test]
async fn test_startup_adopts_global_highscore() {
    let backend = MockBackend::new();
    backend.set_highscore(Some(1.25));
    let mut kiosk = Kiosk::start(&backend, policy()).await;

    let shown = kiosk.wait_until(|p| p.highscores.is_some()).await;
    let highscores = shown.highscores.unwrap();
    assert_eq!(highscores.all_time, 1.25);
    assert_eq!(highscores.weekly, 1.25);

    kiosk.stop().await;
}

#[tokio::test]
async fn test_offline_backend_keeps_workflow_running() {
    let backend = MockBackend::new();
    backend.set_offline(true);
    let mut kiosk = Kiosk::start(&backend, policy()).await;

    kiosk.context.state().set_credit(100);
    kiosk.wait_for_phase(KioskPhase::Measuring).await;
    kiosk.context.state().set_alcohol_level(0.02);

    let content = kiosk.wait_until(|p| p.fun_fact.is_some()).await;
    assert_eq!(content.phase, KioskPhase::Displaying);
    assert_eq!(content.fun_fact.as_deref(), Some("Drink responsibly!"));
    assert_eq!(content.ad_url, None);

    kiosk.wait_for_phase(KioskPhase::Idle).await;
    assert_eq!(kiosk.queue.len().await.unwrap(), 1);

    backend.set_offline(false);
    let queue = kiosk.queue.clone();
    eventually(async || queue.is_empty().await.unwrap()).await;

    kiosk.stop().await;
}

#[tokio::test]
async fn test_proximity_hint_follows_distance() {
    let backend = MockBackend::new();
    let mut kiosk = Kiosk::start(&backend, policy()).await;

    kiosk.wait_until(|p| p.proximity_hint.is_none()).await;
    kiosk.context.state().set_proximity_distance(45);
    let shown = kiosk.wait_until(|p| p.proximity_hint.is_some()).await;
    assert_eq!(shown.proximity_hint, Some("come closer"));

    kiosk.stop().await;
}
