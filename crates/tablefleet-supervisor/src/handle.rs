//! Worker process launch and handles.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Instant;

use tablefleet_types::env::{CALL_THRESHOLD_ENV, ROOT_ENV, TARGET_URL_ENV, WORKER_ID_ENV};
use tablefleet_types::{Amount, FleetError, WorkerId};

/// Whether a launch starts a new log or continues the existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    Fresh,
    Append,
}

/// Line written to the worker log at the start of every run.
pub fn delimiter(id: WorkerId, pid: u32) -> String {
    format!("=== Starting worker {id} (pid={pid}) ===")
}

/// How to start a worker process.
#[derive(Debug, Clone)]
pub struct WorkerLaunch {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerLaunch {
    /// Re-invoke the running executable as `<exe> worker`.
    pub fn current_exe() -> Result<Self, FleetError> {
        let program = std::env::current_exe().map_err(|e| {
            FleetError::ProcessError(format!("cannot locate current executable: {e}"))
        })?;
        Ok(Self {
            program,
            args: vec!["worker".to_string()],
        })
    }
}

/// Parameters every worker of a fleet shares.
#[derive(Debug, Clone)]
pub struct LaunchContext {
    pub root: PathBuf,
    pub target_url: String,
    pub threshold: Amount,
}

fn open_log(path: &Path, mode: LogMode) -> Result<File, FleetError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            FleetError::ProcessError(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    let mut options = OpenOptions::new();
    options.create(true);
    match mode {
        LogMode::Fresh => options.write(true).truncate(true),
        LogMode::Append => options.append(true),
    };
    options
        .open(path)
        .map_err(|e| FleetError::ProcessError(format!("failed to open {}: {e}", path.display())))
}

/// A live worker process owned by the supervisor.
#[derive(Debug)]
pub struct WorkerHandle {
    pub id: WorkerId,
    pub child: Child,
    pub log_path: PathBuf,
    pub started_at: Instant,
}

/// Observed state of a worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Running { pid: u32 },
    Exited { code: Option<i32> },
}

impl WorkerHandle {
    /// Start a worker in its own process group with stdout and stderr
    /// redirected into `log_path`.
    pub fn spawn(
        id: WorkerId,
        launch: &WorkerLaunch,
        context: &LaunchContext,
        log_path: &Path,
        mode: LogMode,
    ) -> Result<Self, FleetError> {
        let mut log = open_log(log_path, mode)?;
        let clone_log = |log: &File| {
            log.try_clone()
                .map_err(|e| FleetError::ProcessError(format!("failed to share log handle: {e}")))
        };
        let stdout = clone_log(&log)?;
        let stderr = clone_log(&log)?;

        let child = Command::new(&launch.program)
            .args(&launch.args)
            .env(WORKER_ID_ENV, id.to_string())
            .env(TARGET_URL_ENV, &context.target_url)
            .env(CALL_THRESHOLD_ENV, context.threshold.to_string())
            .env(ROOT_ENV, &context.root)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .process_group(0)
            .spawn()
            .map_err(|e| {
                FleetError::ProcessError(format!(
                    "failed to launch {}: {e}",
                    launch.program.display()
                ))
            })?;

        if let Err(e) = writeln!(log, "\n{}", delimiter(id, child.id())) {
            tracing::warn!(worker = %id, error = %e, "failed to write log delimiter");
        }

        Ok(Self {
            id,
            child,
            log_path: log_path.to_path_buf(),
            started_at: Instant::now(),
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn status(&mut self) -> WorkerStatus {
        match self.child.try_wait() {
            Ok(None) => WorkerStatus::Running { pid: self.pid() },
            Ok(Some(status)) => WorkerStatus::Exited {
                code: status.code(),
            },
            Err(e) => {
                tracing::debug!(worker = %self.id, error = %e, "try_wait failed");
                WorkerStatus::Running { pid: self.pid() }
            }
        }
    }
}
