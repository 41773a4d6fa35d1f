//! Managed Chromium process for a single worker.
//!
//! Each worker launches its own browser with a private profile directory and
//! a loopback-only remote-debugging port, then attaches to the initial page
//! target. The child is killed when the [`ManagedBrowser`] is dropped.

use std::env;
use std::net::TcpListener;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tablefleet_types::BrowserSettings;
use tokio::process::{Child, Command};

use crate::error::BrowserError;

/// Environment variable naming a browser binary to try before the defaults.
pub const BROWSER_BIN_ENV: &str = "TABLEFLEET_BROWSER_BIN";

/// Entry of the `/json/list` target listing.
#[derive(Debug, Deserialize)]
struct TargetInfo {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    ws_url: Option<String>,
}

/// A running browser and the DevTools URL of its page target.
pub struct ManagedBrowser {
    child: Child,
    page_ws_url: String,
}

impl ManagedBrowser {
    /// Launch a browser using `profile_dir` as its user data directory.
    pub async fn launch(
        settings: &BrowserSettings,
        profile_dir: &Path,
    ) -> Result<Self, BrowserError> {
        let port = pick_ephemeral_port()?;
        std::fs::create_dir_all(profile_dir).map_err(|e| BrowserError::LaunchFailed {
            reason: format!("failed to create profile dir {}: {e}", profile_dir.display()),
        })?;

        let args = launch_args(settings, port, profile_dir);

        let mut last_error = None;
        let mut child = None;
        for candidate in browser_binary_candidates(settings.binary_path.as_deref()) {
            let mut cmd = Command::new(&candidate);
            cmd.args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true);
            match cmd.spawn() {
                Ok(proc) => {
                    tracing::info!(binary = %candidate, port, "browser launched");
                    child = Some(proc);
                    break;
                }
                Err(e) => {
                    tracing::debug!(binary = %candidate, error = %e, "browser candidate failed");
                    last_error = Some(format!("{candidate}: {e}"));
                }
            }
        }
        let mut child = child.ok_or_else(|| BrowserError::LaunchFailed {
            reason: last_error.unwrap_or_else(|| "no candidates available".to_string()),
        })?;

        let timeout = Duration::from_millis(settings.launch_timeout_ms);
        let page_ws_url = match wait_for_page_target(port, timeout).await {
            Ok(ws) => ws,
            Err(e) => {
                let _ = child.kill().await;
                return Err(e);
            }
        };

        Ok(Self {
            child,
            page_ws_url,
        })
    }

    pub fn page_ws_url(&self) -> &str {
        &self.page_ws_url
    }

    /// Kill the browser and reap it.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!(error = %e, "browser already exited");
        }
    }
}

/// Command-line arguments for a managed browser.
pub fn launch_args(settings: &BrowserSettings, port: u16, profile_dir: &Path) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={port}"),
        "--remote-debugging-address=127.0.0.1".to_string(),
        format!("--user-data-dir={}", profile_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
    ];
    if settings.headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
    }
    args.extend(
        settings
            .extra_args
            .iter()
            .filter(|a| !a.trim().is_empty())
            .cloned(),
    );
    args.push("about:blank".to_string());
    args
}

/// Binaries to try in order: configured path, environment override, then
/// well-known names.
pub fn browser_binary_candidates(configured: Option<&str>) -> Vec<String> {
    let mut candidates = Vec::new();
    if let Some(path) = configured.filter(|p| !p.trim().is_empty()) {
        candidates.push(path.to_string());
    }
    if let Ok(env_path) = env::var(BROWSER_BIN_ENV) {
        if !env_path.trim().is_empty() {
            candidates.push(env_path);
        }
    }
    candidates.extend(
        [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "google-chrome",
            "chromium",
            "chromium-browser",
            "chrome",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    candidates
}

fn pick_ephemeral_port() -> Result<u16, BrowserError> {
    let listener = TcpListener::bind("127.0.0.1:0").map_err(|e| BrowserError::LaunchFailed {
        reason: format!("port bind failed: {e}"),
    })?;
    let port = listener
        .local_addr()
        .map_err(|e| BrowserError::LaunchFailed {
            reason: format!("port lookup failed: {e}"),
        })?
        .port();
    Ok(port)
}

/// Pick the first page target's WebSocket URL out of a `/json/list` body.
fn page_target_ws(targets: &[TargetInfo]) -> Option<&str> {
    targets
        .iter()
        .find(|t| t.kind == "page")
        .and_then(|t| t.ws_url.as_deref())
}

async fn wait_for_page_target(port: u16, timeout: Duration) -> Result<String, BrowserError> {
    let deadline = tokio::time::Instant::now() + timeout;
    let url = format!("http://127.0.0.1:{port}/json/list");
    let http = reqwest::Client::new();
    while tokio::time::Instant::now() < deadline {
        if let Ok(resp) = http.get(&url).send().await {
            if let Ok(targets) = resp.json::<Vec<TargetInfo>>().await {
                if let Some(ws) = page_target_ws(&targets) {
                    return Ok(ws.to_string());
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Err(BrowserError::LaunchFailed {
        reason: format!("timed out waiting for a page target on {url}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_args_include_profile_and_port() {
        let dir = tempfile::tempdir().unwrap();
        let settings = BrowserSettings {
            extra_args: vec!["--mute-audio".into(), "  ".into()],
            ..BrowserSettings::default()
        };
        let args = launch_args(&settings, 9333, dir.path());

        assert!(args.contains(&"--remote-debugging-port=9333".to_string()));
        assert!(args.contains(&format!("--user-data-dir={}", dir.path().display())));
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--mute-audio".to_string()));
        assert!(!args.iter().any(|a| a.trim().is_empty()));
        assert_eq!(args.last().map(String::as_str), Some("about:blank"));
    }

    #[test]
    fn headed_args_skip_headless_flags() {
        let dir = tempfile::tempdir().unwrap();
        let settings = BrowserSettings {
            headless: false,
            ..BrowserSettings::default()
        };
        let args = launch_args(&settings, 9333, dir.path());
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
    }

    #[test]
    fn configured_binary_is_tried_first() {
        let candidates = browser_binary_candidates(Some("/opt/chrome/chrome"));
        assert_eq!(candidates[0], "/opt/chrome/chrome");
        assert!(candidates.contains(&"chromium".to_string()));
        assert!(!browser_binary_candidates(Some(" "))
            .iter()
            .any(|c| c.trim().is_empty()));
    }

    #[test]
    fn page_target_is_preferred_over_workers() {
        let body = r#"[
            {"type": "service_worker", "webSocketDebuggerUrl": "ws://127.0.0.1:1/devtools/sw"},
            {"type": "page", "webSocketDebuggerUrl": "ws://127.0.0.1:1/devtools/page/A"}
        ]"#;
        let targets: Vec<TargetInfo> = serde_json::from_str(body).unwrap();
        assert_eq!(
            page_target_ws(&targets),
            Some("ws://127.0.0.1:1/devtools/page/A")
        );
        assert!(page_target_ws(&[]).is_none());
    }
}
