//! Worker process tree termination with signal escalation.
//!
//! A worker runs in its own process group and owns a browser with helper
//! processes of its own. Termination signals the whole group and every
//! descendant found by walking the process table, so helpers that moved to
//! another group are caught too. SIGTERM goes first; after the grace period
//! survivors get SIGKILL.
//!
//! - Refuses to target PID 0 or PID 1.
//! - Only signals processes owned by the current user.
//! - Treats ESRCH (already gone) and zombies as dead.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use tablefleet_types::FleetError;

#[derive(Debug, Clone)]
pub struct KillTreeConfig {
    /// Wait between SIGTERM and SIGKILL.
    pub grace_period: Duration,
    pub poll_interval: Duration,
}

impl Default for KillTreeConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(2),
            poll_interval: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ProcessInfo {
    pid: i32,
    ppid: i32,
    uid: u32,
    zombie: bool,
}

const PROTECTED_PIDS: [i32; 2] = [0, 1];

fn validate_pid(pid: i32) -> Result<(), FleetError> {
    if PROTECTED_PIDS.contains(&pid) {
        return Err(FleetError::ProcessError(format!(
            "refusing to signal protected PID {pid}"
        )));
    }
    if pid < 0 {
        return Err(FleetError::ProcessError(format!("invalid negative PID {pid}")));
    }
    Ok(())
}

fn current_uid() -> u32 {
    // Safety: getuid() cannot fail.
    unsafe { libc::getuid() }
}

/// Parse the fields we need out of `/proc/<pid>/status`.
fn parse_status(pid: i32, status: &str) -> ProcessInfo {
    let mut info = ProcessInfo {
        pid,
        ppid: 0,
        uid: u32::MAX,
        zombie: false,
    };
    for line in status.lines() {
        if let Some(val) = line.strip_prefix("PPid:") {
            info.ppid = val.trim().parse().unwrap_or(0);
        } else if let Some(val) = line.strip_prefix("Uid:") {
            // real effective saved filesystem
            info.uid = val
                .split_whitespace()
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap_or(u32::MAX);
        } else if let Some(val) = line.strip_prefix("State:") {
            info.zombie = val.trim_start().starts_with('Z');
        }
    }
    info
}

#[cfg(target_os = "linux")]
fn enumerate_processes() -> Result<Vec<ProcessInfo>, FleetError> {
    use std::fs;

    let entries = fs::read_dir("/proc")
        .map_err(|e| FleetError::ProcessError(format!("cannot read /proc: {e}")))?;

    let processes: Vec<ProcessInfo> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str()?.parse::<i32>().ok())
        .filter_map(|pid| {
            // The process may exit between listing and reading.
            let status = fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
            Some(parse_status(pid, &status))
        })
        .collect();

    debug!(process_count = processes.len(), "enumerated processes");
    Ok(processes)
}

#[cfg(not(target_os = "linux"))]
fn enumerate_processes() -> Result<Vec<ProcessInfo>, FleetError> {
    let output = std::process::Command::new("ps")
        .args(["-A", "-o", "pid=,ppid=,uid=,stat="])
        .output()
        .map_err(|e| FleetError::ProcessError(format!("failed to run ps: {e}")))?;
    let text = String::from_utf8_lossy(&output.stdout);

    let processes: Vec<ProcessInfo> = text
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let pid = fields.next()?.parse().ok()?;
            let ppid = fields.next()?.parse().ok()?;
            let uid = fields.next()?.parse().ok()?;
            let zombie = fields.next().is_some_and(|s| s.starts_with('Z'));
            Some(ProcessInfo {
                pid,
                ppid,
                uid,
                zombie,
            })
        })
        .collect();

    debug!(process_count = processes.len(), "enumerated processes");
    Ok(processes)
}

/// All descendants of `root_pid`, leaves first.
fn find_descendants(root_pid: i32, processes: &[ProcessInfo]) -> Vec<i32> {
    let mut children: HashMap<i32, Vec<i32>> = HashMap::new();
    for p in processes {
        children.entry(p.ppid).or_default().push(p.pid);
    }

    let mut found = Vec::new();
    let mut queue = VecDeque::from([root_pid]);
    while let Some(pid) = queue.pop_front() {
        for &child in children.get(&pid).into_iter().flatten() {
            if child == root_pid {
                continue;
            }
            found.push(child);
            queue.push_back(child);
        }
    }

    found.reverse();
    found
}

fn send_signal(pid: i32, sig: Signal) {
    match signal::kill(Pid::from_raw(pid), sig) {
        Ok(()) => debug!(pid, signal = ?sig, "signal sent"),
        Err(nix::errno::Errno::ESRCH) => debug!(pid, signal = ?sig, "process already gone"),
        Err(e) => warn!(pid, signal = ?sig, error = %e, "failed to signal process"),
    }
}

fn signal_group(pgid: i32, sig: Signal) {
    match signal::killpg(Pid::from_raw(pgid), sig) {
        Ok(()) => debug!(pgid, signal = ?sig, "group signal sent"),
        Err(nix::errno::Errno::ESRCH) => debug!(pgid, "process group already empty"),
        Err(e) => warn!(pgid, signal = ?sig, error = %e, "failed to signal process group"),
    }
}

/// Whether `pid` still runs. Zombies are dead: they only wait to be reaped.
pub fn is_alive(pid: i32) -> bool {
    if signal::kill(Pid::from_raw(pid), None).is_err() {
        return false;
    }
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string(format!("/proc/{pid}/status")) {
            return !parse_status(pid, &status).zombie;
        }
    }
    true
}

/// Terminate the process group led by `root_pid` and every descendant.
///
/// `root_pid` must have been started as its own group leader. Returns once
/// every targeted process is gone or has been sent SIGKILL.
pub fn kill_tree(root_pid: i32, config: &KillTreeConfig) -> Result<(), FleetError> {
    validate_pid(root_pid)?;

    let processes = enumerate_processes()?;
    let my_uid = current_uid();

    let descendants = find_descendants(root_pid, &processes);
    let mut targets: Vec<i32> = descendants
        .iter()
        .copied()
        .filter(|pid| {
            let owned = processes
                .iter()
                .any(|p| p.pid == *pid && p.uid == my_uid && !PROTECTED_PIDS.contains(pid));
            if !owned {
                warn!(pid, "skipping process not owned by current user");
            }
            owned
        })
        .collect();
    targets.push(root_pid);

    info!(
        root_pid,
        descendant_count = descendants.len(),
        "terminating worker process tree"
    );

    signal_group(root_pid, Signal::SIGTERM);
    for &pid in &targets {
        send_signal(pid, Signal::SIGTERM);
    }

    let deadline = Instant::now() + config.grace_period;
    loop {
        let survivors: Vec<i32> = targets.iter().copied().filter(|&p| is_alive(p)).collect();
        if survivors.is_empty() {
            info!(root_pid, "process tree exited after SIGTERM");
            return Ok(());
        }
        if Instant::now() >= deadline {
            warn!(
                root_pid,
                survivor_count = survivors.len(),
                "grace period expired, sending SIGKILL"
            );
            signal_group(root_pid, Signal::SIGKILL);
            for &pid in &survivors {
                send_signal(pid, Signal::SIGKILL);
            }
            return Ok(());
        }
        std::thread::sleep(config.poll_interval);
    }
}
