mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tablefleet_types::env::{CALL_THRESHOLD_ENV, ROOT_ENV, TARGET_URL_ENV, WORKER_ID_ENV};
use tablefleet_types::default_root;

/// tablefleet -- supervise a fleet of browser-driven table workers.
#[derive(Parser, Debug)]
#[command(name = "tablefleet", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start workers and run the operator console
    Supervise {
        /// Number of workers to start
        #[arg(long, short = 'n', default_value_t = 1)]
        workers: usize,

        /// Target table URL handed to every worker
        #[arg(long, env = TARGET_URL_ENV)]
        url: String,

        /// Highest amount a check may be turned into a call for
        #[arg(long, env = CALL_THRESHOLD_ENV)]
        threshold: Option<String>,

        /// Fleet directory (records, logs, config)
        #[arg(long, env = ROOT_ENV)]
        root: Option<PathBuf>,
    },

    /// Run a single worker (normally launched by `supervise`)
    Worker {
        /// Worker identity
        #[arg(long, env = WORKER_ID_ENV)]
        id: Option<String>,

        /// Target table URL
        #[arg(long, env = TARGET_URL_ENV)]
        url: Option<String>,

        /// Highest amount a check may be turned into a call for
        #[arg(long, env = CALL_THRESHOLD_ENV)]
        threshold: Option<String>,

        /// Fleet directory (records, logs, config)
        #[arg(long, env = ROOT_ENV)]
        root: Option<PathBuf>,
    },

    /// Print every worker's intent record
    Status {
        /// Fleet directory (records, logs, config)
        #[arg(long, env = ROOT_ENV)]
        root: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Supervise {
            workers,
            url,
            threshold,
            root,
        } => commands::supervise::run(
            workers,
            &url,
            threshold.as_deref(),
            root.unwrap_or_else(default_root),
        ),
        Commands::Worker {
            id,
            url,
            threshold,
            root,
        } => commands::worker::run(
            id.as_deref(),
            url.as_deref(),
            threshold.as_deref(),
            root.unwrap_or_else(default_root),
        ),
        Commands::Status { root } => commands::status::run(&root.unwrap_or_else(default_root)),
    }
}
