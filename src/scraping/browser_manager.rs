//! Browser session management using `chromiumoxide`.
//!
//! One [`BrowserSession`] owns a launched Chromium-family browser plus the task
//! that drives its CDP handler. Profile tabs are opened from it and wrapped in
//! [`CdpLivePage`] for the rest of the crate.

use super::live_page::CdpLivePage;
use crate::core::config::{chrome_executable_override, ScoutConfig};
use anyhow::{anyhow, Result};
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{info, warn};

// ── Browser executable discovery ─────────────────────────────────────────────

const PATH_CANDIDATES: &[&str] = &[
    "google-chrome",
    "chromium",
    "chromium-browser",
    "chrome",
    "brave-browser",
    "brave",
];

#[cfg(target_os = "macos")]
const WELL_KNOWN: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
];

#[cfg(target_os = "linux")]
const WELL_KNOWN: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/local/bin/chromium",
    "/usr/bin/brave-browser",
];

#[cfg(target_os = "windows")]
const WELL_KNOWN: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files\BraveSoftware\Brave-Browser\Application\brave.exe",
];

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
const WELL_KNOWN: &[&str] = &[];

/// Find a usable Chromium-family executable.
///
/// Resolution order: `CHROME_EXECUTABLE`, then a `PATH` scan, then
/// platform install locations.
pub fn find_chrome_executable() -> Option<String> {
    if let Some(p) = chrome_executable_override() {
        return Some(p);
    }

    if let Ok(path_var) = std::env::var("PATH") {
        for dir in std::env::split_paths(&path_var) {
            for exe in PATH_CANDIDATES {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    WELL_KNOWN
        .iter()
        .find(|c| Path::new(c).exists())
        .map(|c| c.to_string())
}

// ── Config builder ───────────────────────────────────────────────────────────

pub fn build_browser_config(exe: &str, headless: bool, width: u32, height: u32) -> Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width,
            height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(width, height)
        .arg("--no-sandbox")
        .arg("--disable-setuid-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--mute-audio")
        .arg("--disable-blink-features=AutomationControlled");

    if !headless {
        builder = builder.with_head();
    }

    builder
        .build()
        .map_err(|e| anyhow!("Failed to build browser config: {}", e))
}

// ── Session ──────────────────────────────────────────────────────────────────

pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    item_selector: String,
}

impl BrowserSession {
    /// Launch a browser according to `config`. `headless_default` applies when
    /// neither the config file nor the environment chooses.
    pub async fn launch(config: &ScoutConfig, headless_default: bool) -> Result<Self> {
        let exe = find_chrome_executable().ok_or_else(|| {
            anyhow!("No browser found. Install Chrome or Chromium, or set CHROME_EXECUTABLE.")
        })?;
        let headless = config.browser.resolve_headless(headless_default);
        info!("browser_manager: launching {} (headless={})", exe, headless);

        let browser_config = build_browser_config(&exe, headless, 1280, 900)?;
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| anyhow!("Failed to launch browser ({}): {}", exe, e))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("browser_manager: CDP handler error: {}", e);
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            item_selector: config.site.resolve_item_link_selector(),
        })
    }

    /// Open `url` in a new tab and wait for its network to settle.
    pub async fn open(&self, url: &str) -> Result<CdpLivePage> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| anyhow!("Failed to open {}: {}", url, e))?;
        wait_until_stable(&page, 1500, 15_000).await?;
        Ok(CdpLivePage::new(page, self.item_selector.clone()))
    }

    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("browser_manager: close error (non-fatal): {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
        info!("browser_manager: browser closed");
    }
}

/// Wait until no new resource entries appear for `quiet_ms` after the document
/// reports `complete`, or until `timeout_ms` elapses.
pub async fn wait_until_stable(page: &Page, quiet_ms: u64, timeout_ms: u64) -> Result<()> {
    let poll = Duration::from_millis(250);
    let quiet = Duration::from_millis(quiet_ms);
    let timeout = Duration::from_millis(timeout_ms);
    let start = Instant::now();
    let mut last_count = 0u64;
    let mut stable_since = Instant::now();

    loop {
        if start.elapsed() >= timeout {
            info!("wait_until_stable: timeout after {}ms", timeout_ms);
            break;
        }

        let state: serde_json::Value = page
            .evaluate(
                "({ n: performance.getEntriesByType('resource').length, ready: document.readyState })",
            )
            .await
            .ok()
            .and_then(|v| v.into_value::<serde_json::Value>().ok())
            .unwrap_or(serde_json::Value::Null);
        let count = state["n"].as_u64().unwrap_or(0);
        let complete = state["ready"].as_str() == Some("complete");

        if !complete || count != last_count {
            last_count = count;
            stable_since = Instant::now();
        } else if stable_since.elapsed() >= quiet {
            info!(
                "wait_until_stable: idle after {}ms ({} resources)",
                start.elapsed().as_millis(),
                count
            );
            break;
        }

        tokio::time::sleep(poll).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headed_and_headless_configs_build() {
        // chromiumoxide only validates the struct, the executable is never spawned here.
        assert!(build_browser_config("/bin/true", true, 800, 600).is_ok());
        assert!(build_browser_config("/bin/true", false, 800, 600).is_ok());
    }
}
