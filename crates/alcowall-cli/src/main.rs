//! `alcowall` kiosk binary.
//!
//! Loads `alcowall.toml` (or the file named by `ALCOWALL_CONFIG`), opens the
//! configured sensor source and local stores, and runs the workflow
//! controller until SIGINT.

use alcowall_controller::{KioskPhase, KioskStores, Presentation, WorkflowController};
use alcowall_core::{DeviceContext, DeviceId, KioskConfig};
use alcowall_hardware::SensorSuite;
use alcowall_network::RestClient;
use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const CONFIG_ENV: &str = "ALCOWALL_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "alcowall.toml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    if let Err(e) = run().await {
        error!("kiosk stopped: {e:#}");
        return Err(e);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config_path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = KioskConfig::load_or_default(&config_path)
        .with_context(|| format!("loading configuration from {config_path}"))?;

    let device_id = DeviceId::from_file(&config.device.id_file)
        .with_context(|| format!("reading device id from {}", config.device.id_file.display()))?;
    info!(
        version = alcowall_core::VERSION,
        device = %device_id,
        backend = %config.backend.base_url,
        source = ?config.sensors.source,
        "starting kiosk"
    );

    let context = DeviceContext::new(device_id);

    let sensors = SensorSuite::open(&config.sensors)
        .await
        .context("opening sensors")?;
    if sensors.mock_handles.is_some() {
        warn!("running with mock sensors, no hardware input will be read");
    }
    let pollers = sensors.pollers.start(context.clone());

    let stores = KioskStores::open(&config.storage)
        .await
        .with_context(|| format!("opening stores in {}", config.storage.data_dir.display()))?;
    let pending = stores.queue.len().await.context("reading retry queue")?;
    if pending > 0 {
        info!(pending, "unsent entries found in retry queue");
    }

    let backend = RestClient::new(&config.backend).context("creating backend client")?;
    let mut controller =
        WorkflowController::new(context, Arc::new(backend), stores, &config.workflow);

    let cancel = CancellationToken::new();
    let presentation_log = tokio::spawn(log_presentation(controller.subscribe(), cancel.clone()));

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(e) => error!("failed to listen for shutdown signal: {e}"),
        }
        shutdown.cancel();
    });

    let summary = controller.run(cancel.clone()).await;
    info!(
        completed = summary.completed_cycles,
        aborted = summary.aborted_cycles,
        "workflow finished"
    );

    let report = pollers.shutdown().await;
    info!(
        completed = report.completed.len(),
        cancelled = report.cancelled,
        panicked = report.panicked,
        "sensor pollers stopped"
    );
    if let Err(e) = presentation_log.await {
        warn!("presentation logger failed: {e}");
    }

    Ok(())
}

/// Stand-in renderer: logs what the screen would show.
async fn log_presentation(mut rx: watch::Receiver<Presentation>, cancel: CancellationToken) {
    let mut last_phase = KioskPhase::Idle;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let shown = rx.borrow_and_update().clone();
                if shown.phase != last_phase {
                    info!(
                        phase = %shown.phase,
                        credit = shown.credit,
                        level = ?shown.shown_level,
                        "screen"
                    );
                    last_phase = shown.phase;
                }
                if let Some(fact) = &shown.fun_fact {
                    debug!(fact, ad = ?shown.ad_url, "display content");
                }
            }
        }
    }
}
