//! CDP browser driver for tablefleet workers.
//!
//! Each worker drives one headless Chromium page through the Chrome DevTools
//! Protocol. The crate is split into three layers:
//!
//! - **`cdp`**: WebSocket client with JSON-RPC command/response correlation.
//! - **`driver`**: `BrowserDriver`, selector-oriented operations with bounded
//!   waits (element state probes, click, fill, text, navigate, reload).
//! - **`launcher`**: `ManagedBrowser`, which starts a private Chromium with a
//!   remote-debugging port and resolves the page target's WebSocket URL.
//!
//! # Example (conceptual)
//!
//! ```ignore
//! let browser = ManagedBrowser::launch(&settings, &profile_dir).await?;
//! let driver = BrowserDriver::connect(browser.page_ws_url()).await?;
//! driver.navigate("https://table.example/room", Duration::from_secs(30)).await?;
//! driver.click("[data-action-type=\"check\"]", Duration::from_secs(2)).await?;
//! ```

pub mod cdp;
pub mod driver;
pub mod error;
pub mod launcher;

pub use cdp::CdpClient;
pub use driver::{BrowserDriver, ElementState};
pub use error::BrowserError;
pub use launcher::ManagedBrowser;
