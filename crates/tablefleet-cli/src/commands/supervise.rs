use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::BufReader;

use tablefleet_supervisor::{run_console, LaunchContext, Supervisor, WorkerLaunch};
use tablefleet_types::{FleetConfig, IntentStore};
use tablefleet_worker::{parse_threshold, validate_url};

/// Run the `tablefleet supervise` command.
///
/// Starts `workers` workers, then hands stdin to the operator console until
/// `exit`, end of input or Ctrl-C. Every path out stops the whole fleet.
pub fn run(workers: usize, url: &str, threshold: Option<&str>, root: PathBuf) -> Result<()> {
    let config = FleetConfig::load(&root).context("failed to load fleet config")?;
    let target_url = validate_url(Some(url))?;
    let threshold = parse_threshold(threshold, config.worker.default_call_threshold);

    let launch = WorkerLaunch::current_exe()?;
    let context = LaunchContext {
        root: root.clone(),
        target_url,
        threshold,
    };
    let store = IntentStore::new(&root);

    tracing::info!(
        root = %root.display(),
        workers,
        %threshold,
        "starting fleet"
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    rt.block_on(async move {
        let (mut supervisor, mut events) =
            Supervisor::new(config.supervisor.clone(), store, launch, context);

        if let Err(e) = supervisor.start(workers) {
            supervisor.shutdown(&mut events).await;
            return Err(e).context("failed to start workers");
        }

        let stdin = BufReader::new(tokio::io::stdin());
        let interrupted = tokio::select! {
            _ = run_console(&mut supervisor, &mut events, stdin) => false,
            _ = tokio::signal::ctrl_c() => true,
        };
        if interrupted {
            tracing::info!("interrupted, stopping all workers");
            supervisor.shutdown(&mut events).await;
        }
        Ok(())
    })
}
