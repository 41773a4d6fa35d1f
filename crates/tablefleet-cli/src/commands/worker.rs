use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use tablefleet_browser::{BrowserDriver, ManagedBrowser};
use tablefleet_types::{FleetConfig, IntentStore};
use tablefleet_worker::{
    Budgets, CdpSurface, NameGenerator, Recovery, Resolver, RetryPolicy, Worker, WorkerParams,
};

/// Run the `tablefleet worker` command.
///
/// Validates the launch parameters before anything else; a bad identity or
/// target URL ends this process without touching the browser.
pub fn run(
    id: Option<&str>,
    url: Option<&str>,
    threshold: Option<&str>,
    root: PathBuf,
) -> Result<()> {
    let config = FleetConfig::load(&root).context("failed to load fleet config")?;
    let params = WorkerParams::from_raw(id, url, threshold, config.worker.default_call_threshold)?;

    tracing::info!(
        worker = %params.id,
        url = %params.target_url,
        threshold = %params.threshold,
        pid = std::process::id(),
        "worker starting"
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    rt.block_on(run_worker(params, config, root))
}

async fn run_worker(params: WorkerParams, config: FleetConfig, root: PathBuf) -> Result<()> {
    let store = IntentStore::new(&root);
    let profile_dir = store.worker_dir(params.id).join("profile");

    let browser = ManagedBrowser::launch(&config.browser, &profile_dir)
        .await
        .context("failed to launch browser")?;
    let driver = match BrowserDriver::connect(browser.page_ws_url()).await {
        Ok(driver) => driver,
        Err(e) => {
            browser.shutdown().await;
            return Err(e).context("failed to attach to browser page");
        }
    };

    let budgets = Budgets::from_settings(&config.worker);
    let recovery = Recovery::new(
        params.id,
        &params.target_url,
        budgets,
        NameGenerator::new(config.names.clone()),
        config.worker.seat_rounds,
        RetryPolicy::fixed(Duration::from_millis(config.worker.login_retry_delay_ms)),
    );
    let mut worker = Worker::new(
        params.id,
        CdpSurface::new(driver, config.surface.clone()),
        store,
        Resolver::new(params.threshold, budgets),
        recovery,
        config.worker.cycle_interval(),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("termination signal received");
        trigger.cancel();
    });

    worker.run(&cancel).await;

    drop(worker);
    browser.shutdown().await;
    tracing::info!(worker = %params.id, "worker stopped");
    Ok(())
}

/// Resolves on SIGTERM or Ctrl-C.
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = term.recv() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for SIGTERM, Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}
