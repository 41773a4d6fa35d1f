//! Selector-oriented browser driver wrapping the CDP client.
//!
//! Every interaction takes a CSS selector and a time budget. Waiting is done
//! by polling a small JavaScript probe, so the driver never depends on CDP
//! events and a long-running worker accumulates no event backlog.

use std::time::Duration;

use serde_json::Value;

use crate::cdp::CdpClient;
use crate::error::BrowserError;

/// Interval between element and document probes while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Global set on the current document before a navigation so the driver can
/// tell when a new document has replaced it.
const DOCUMENT_MARK: &str = "__tablefleetMark";

/// Observed state of the first element matching a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    /// No element matches.
    Absent,
    /// Present but not rendered (zero-size box, `display: none`,
    /// `visibility: hidden`).
    Hidden,
    /// Rendered but `disabled` or `aria-disabled="true"`.
    Disabled,
    /// Rendered and interactive.
    Enabled,
}

impl ElementState {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementState::Absent => "absent",
            ElementState::Hidden => "hidden",
            ElementState::Disabled => "disabled",
            ElementState::Enabled => "enabled",
        }
    }

    pub fn is_visible(self) -> bool {
        matches!(self, ElementState::Disabled | ElementState::Enabled)
    }

    pub fn is_enabled(self) -> bool {
        self == ElementState::Enabled
    }

    /// Interpret the string returned by the element probe.
    pub fn from_probe(value: &Value) -> Self {
        match value.as_str() {
            Some("hidden") => ElementState::Hidden,
            Some("disabled") => ElementState::Disabled,
            Some("enabled") => ElementState::Enabled,
            _ => ElementState::Absent,
        }
    }
}

/// Quote a selector as a JavaScript string literal.
fn js_string(selector: &str) -> String {
    // A JSON string is a valid JS string literal.
    serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string())
}

/// Build the JavaScript expression that reports an [`ElementState`].
pub fn element_probe(selector: &str) -> String {
    format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  if (!el) return "absent";
  const rect = el.getBoundingClientRect();
  const style = window.getComputedStyle(el);
  if (rect.width === 0 || rect.height === 0 || style.display === "none" || style.visibility === "hidden") return "hidden";
  if (el.disabled === true || el.getAttribute("aria-disabled") === "true") return "disabled";
  return "enabled";
}})()"#,
        sel = js_string(selector)
    )
}

/// Build the JavaScript expression that reports whether a fresh document is
/// ready: `"old"` while the marked document is still current, otherwise
/// `document.readyState`.
fn document_probe() -> String {
    format!(r#"(window.{DOCUMENT_MARK} === true ? "old" : document.readyState)"#)
}

/// Whether a probe failure is expected while the page is between documents.
fn is_transient(err: &BrowserError) -> bool {
    matches!(
        err,
        BrowserError::CdpError { .. } | BrowserError::JsException { .. }
    )
}

/// High-level driver for one page target.
///
/// # Example (conceptual)
///
/// ```ignore
/// let driver = BrowserDriver::connect("ws://127.0.0.1:9222/devtools/page/ABC").await?;
/// driver.navigate("https://table.example", Duration::from_secs(30)).await?;
/// driver.fill("input[name=\"set_username\"]", "River7", Duration::from_secs(2)).await?;
/// let amount = driver.text_content(".btn span", Duration::from_secs(1)).await?;
/// ```
pub struct BrowserDriver {
    client: CdpClient,
}

impl BrowserDriver {
    /// Connect to a page target and enable the Page, DOM and Runtime domains.
    pub async fn connect(ws_url: &str) -> Result<Self, BrowserError> {
        let client = CdpClient::connect(ws_url).await?;

        client.enable_domain("Page").await?;
        client.enable_domain("DOM").await?;
        client.enable_domain("Runtime").await?;

        Ok(Self { client })
    }

    // -----------------------------------------------------------------------
    // JavaScript evaluation
    // -----------------------------------------------------------------------

    /// Evaluate a JavaScript expression in the page and return its value.
    ///
    /// An exception thrown by the expression surfaces as
    /// `BrowserError::JsException`.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        let result = self
            .client
            .send_command(
                "Runtime.evaluate",
                serde_json::json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let message = exception
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(|d| d.as_str())
                .or_else(|| exception.get("text").and_then(|t| t.as_str()))
                .unwrap_or("unknown exception")
                .to_string();
            return Err(BrowserError::JsException { message });
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    // -----------------------------------------------------------------------
    // Element state
    // -----------------------------------------------------------------------

    /// Probe the current state of the first element matching `selector`.
    pub async fn element_state(&self, selector: &str) -> Result<ElementState, BrowserError> {
        let value = self.evaluate(&element_probe(selector)).await?;
        Ok(ElementState::from_probe(&value))
    }

    /// Poll until the element's state satisfies `accept`, or `timeout` elapses.
    ///
    /// `wanted` names the awaited condition in the timeout error. Probe
    /// failures caused by a document swap count as `Absent`.
    pub async fn wait_for_state(
        &self,
        selector: &str,
        wanted: &'static str,
        accept: fn(ElementState) -> bool,
        timeout: Duration,
    ) -> Result<ElementState, BrowserError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let state = match self.element_state(selector).await {
                Ok(state) => state,
                Err(e) if is_transient(&e) => {
                    tracing::trace!(selector, error = %e, "element probe failed, retrying");
                    ElementState::Absent
                }
                Err(e) => return Err(e),
            };
            if accept(state) {
                return Ok(state);
            }
            if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
                return Err(BrowserError::WaitTimeout {
                    selector: selector.to_string(),
                    wanted,
                    last_seen: state.as_str(),
                    duration: timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub async fn wait_visible(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<ElementState, BrowserError> {
        self.wait_for_state(selector, "visible", ElementState::is_visible, timeout)
            .await
    }

    pub async fn wait_enabled(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<ElementState, BrowserError> {
        self.wait_for_state(selector, "enabled", ElementState::is_enabled, timeout)
            .await
    }

    // -----------------------------------------------------------------------
    // Element interaction
    // -----------------------------------------------------------------------

    async fn document_root(&self) -> Result<i64, BrowserError> {
        let result = self
            .client
            .send_command("DOM.getDocument", serde_json::json!({ "depth": 0 }))
            .await?;

        result
            .get("root")
            .and_then(|r| r.get("nodeId"))
            .and_then(|n| n.as_i64())
            .ok_or_else(|| BrowserError::Protocol {
                detail: "DOM.getDocument did not return a root nodeId".to_string(),
            })
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<i64>, BrowserError> {
        let root_id = self.document_root().await?;
        let result = self
            .client
            .send_command(
                "DOM.querySelector",
                serde_json::json!({ "nodeId": root_id, "selector": selector }),
            )
            .await?;

        // CDP reports "no match" as nodeId 0.
        Ok(result
            .get("nodeId")
            .and_then(|n| n.as_i64())
            .filter(|id| *id != 0))
    }

    async fn element_center(&self, node_id: i64) -> Result<(f64, f64), BrowserError> {
        self.client
            .send_command(
                "DOM.scrollIntoViewIfNeeded",
                serde_json::json!({ "nodeId": node_id }),
            )
            .await?;

        let result = self
            .client
            .send_command("DOM.getBoxModel", serde_json::json!({ "nodeId": node_id }))
            .await?;

        let quad: Vec<f64> = result
            .get("model")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_array())
            .ok_or_else(|| BrowserError::Protocol {
                detail: "DOM.getBoxModel did not return a content quad".to_string(),
            })?
            .iter()
            .filter_map(|v| v.as_f64())
            .collect();

        center_of_quad(&quad).ok_or_else(|| BrowserError::ElementNotInteractable {
            reason: format!("content quad has {} usable values, expected 8", quad.len()),
        })
    }

    /// Click the element once it is enabled.
    ///
    /// Waits up to `timeout` for the element, scrolls it into view, then
    /// dispatches `mousePressed` and `mouseReleased` at its center.
    pub async fn click(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.wait_enabled(selector, timeout).await?;

        let node_id = self.query_selector(selector).await?.ok_or_else(|| {
            BrowserError::ElementNotInteractable {
                reason: format!("{selector} detached before click"),
            }
        })?;
        let (x, y) = self.element_center(node_id).await?;

        for event_type in ["mousePressed", "mouseReleased"] {
            self.client
                .send_command("Input.dispatchMouseEvent", click_params(x, y, event_type))
                .await?;
        }

        tracing::trace!(selector, x, y, "clicked");
        Ok(())
    }

    /// Replace the value of an input with `text`.
    pub async fn fill(
        &self,
        selector: &str,
        text: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        self.wait_enabled(selector, timeout).await?;

        let cleared = self
            .evaluate(&format!(
                r#"(() => {{
  const el = document.querySelector({sel});
  if (!el) return false;
  el.focus();
  el.value = "";
  el.dispatchEvent(new Event("input", {{ bubbles: true }}));
  return true;
}})()"#,
                sel = js_string(selector)
            ))
            .await?;
        if cleared != Value::Bool(true) {
            return Err(BrowserError::ElementNotInteractable {
                reason: format!("{selector} detached before fill"),
            });
        }

        self.client
            .send_command("Input.insertText", serde_json::json!({ "text": text }))
            .await?;
        Ok(())
    }

    /// Text content of the element once it is attached, rendered or not.
    pub async fn text_content(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<String, BrowserError> {
        self.wait_for_state(selector, "present", |s| s != ElementState::Absent, timeout)
            .await?;

        let value = self
            .evaluate(&format!(
                r#"(() => {{
  const el = document.querySelector({sel});
  return el ? el.textContent : null;
}})()"#,
                sel = js_string(selector)
            ))
            .await?;

        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BrowserError::ElementNotInteractable {
                reason: format!("{selector} has no text content"),
            })
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// Navigate to `url` and wait until the new document has left the
    /// `loading` state.
    pub async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.mark_document().await;

        let result = self
            .client
            .send_command_with_timeout("Page.navigate", serde_json::json!({ "url": url }), timeout)
            .await?;

        if let Some(error_text) = result.get("errorText").and_then(|v| v.as_str()) {
            return Err(BrowserError::NavigationFailed {
                reason: error_text.to_string(),
            });
        }

        self.wait_for_new_document(timeout).await
    }

    /// Reload the current page and wait for the new document.
    pub async fn reload(&self, timeout: Duration) -> Result<(), BrowserError> {
        self.mark_document().await;
        self.client
            .send_command_with_timeout(
                "Page.reload",
                serde_json::json!({ "ignoreCache": false }),
                timeout,
            )
            .await?;
        self.wait_for_new_document(timeout).await
    }

    async fn mark_document(&self) {
        if let Err(e) = self
            .evaluate(&format!("window.{DOCUMENT_MARK} = true"))
            .await
        {
            // An unmarked document only makes the ready check optimistic.
            tracing::debug!(error = %e, "failed to mark current document");
        }
    }

    async fn wait_for_new_document(&self, timeout: Duration) -> Result<(), BrowserError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let probe = document_probe();
        loop {
            match self.evaluate(&probe).await {
                Ok(Value::String(state)) if state == "interactive" || state == "complete" => {
                    return Ok(())
                }
                Ok(_) => {}
                Err(e) if is_transient(&e) => {}
                Err(e) => return Err(e),
            }
            if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
                return Err(BrowserError::NavigationFailed {
                    reason: format!("document not ready within {timeout:?}"),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// Build CDP `Input.dispatchMouseEvent` parameters for a left click at (x, y).
pub fn click_params(x: f64, y: f64, event_type: &str) -> Value {
    serde_json::json!({
        "type": event_type,
        "x": x,
        "y": y,
        "button": "left",
        "clickCount": 1,
    })
}

/// Center of a content quad (`[x1,y1, x2,y2, x3,y3, x4,y4]`).
///
/// Returns `None` for short or degenerate quads.
pub fn center_of_quad(quad: &[f64]) -> Option<(f64, f64)> {
    if quad.len() < 8 {
        return None;
    }
    let xs = quad.iter().step_by(2).copied();
    let ys = quad.iter().skip(1).step_by(2).copied();
    let (min_x, max_x) = xs.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let (min_y, max_y) = ys.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if max_x - min_x <= 0.0 || max_y - min_y <= 0.0 {
        return None;
    }
    Some(((min_x + max_x) / 2.0, (min_y + max_y) / 2.0))
}
