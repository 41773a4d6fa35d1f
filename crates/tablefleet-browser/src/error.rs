//! Error types for the tablefleet-browser crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during browser operations.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Failed to establish a WebSocket connection to Chrome DevTools.
    #[error("failed to connect to Chrome DevTools at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// A CDP command returned an error response.
    #[error("CDP error {code}: {message}")]
    CdpError {
        code: i64,
        message: String,
        data: Option<String>,
    },

    /// A CDP command timed out waiting for a response.
    #[error("CDP command '{method}' timed out after {duration:?}")]
    Timeout { method: String, duration: Duration },

    /// A protocol-level error (serialization, unexpected message format, etc.).
    #[error("CDP protocol error: {detail}")]
    Protocol { detail: String },

    /// The element did not reach the awaited state in time.
    #[error("element {selector} not {wanted} within {duration:?} (last seen {last_seen})")]
    WaitTimeout {
        selector: String,
        wanted: &'static str,
        last_seen: &'static str,
        duration: Duration,
    },

    /// Navigation failed or the new document did not become ready in time.
    #[error("navigation failed: {reason}")]
    NavigationFailed { reason: String },

    /// JavaScript evaluation returned an exception.
    #[error("JavaScript exception: {message}")]
    JsException { message: String },

    /// An element could not be interacted with (e.g., zero-size box).
    #[error("element not interactable: {reason}")]
    ElementNotInteractable { reason: String },

    /// The managed browser process could not be started or reached.
    #[error("browser launch failed: {reason}")]
    LaunchFailed { reason: String },
}
