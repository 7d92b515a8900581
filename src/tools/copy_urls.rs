//! "Copy all" and "copy new" actions behind the status UI's clipboard icons.

use crate::features::clipboard::Clipboard;
use crate::features::decision::DecisionPrompt;
use crate::features::scroll_capture::ScrollCaptureController;
use crate::scraping::live_page::LivePage;
use crate::scraping::url_set::{collect_all_item_urls, filter_urls_by_ids};
use crate::types::CaptureEnd;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyStatus {
    Copied(usize),
    NothingToCopy,
    /// Another capture session is still running.
    Busy,
    Failed(String),
}

impl CopyStatus {
    /// Short text shown on the clipboard icon after the action.
    pub fn message(&self) -> String {
        match self {
            CopyStatus::Copied(n) => format!("Copied {} URLs!", n),
            CopyStatus::NothingToCopy => "No URLs found to copy.".to_string(),
            CopyStatus::Busy => "Scraping URLs... please wait".to_string(),
            CopyStatus::Failed(_) => "Error copying URLs.".to_string(),
        }
    }
}

async fn write_urls(clipboard: &dyn Clipboard, urls: &[String]) -> CopyStatus {
    if urls.is_empty() {
        return CopyStatus::NothingToCopy;
    }
    match clipboard.write_text(&urls.join("\n")).await {
        Ok(()) => {
            info!("copy_urls: copied {} urls", urls.len());
            CopyStatus::Copied(urls.len())
        }
        Err(e) => {
            warn!("copy_urls: clipboard write failed: {}", e);
            CopyStatus::Failed(e.to_string())
        }
    }
}

/// Scroll-capture every item URL on the profile and copy them.
pub async fn copy_all(
    controller: &ScrollCaptureController,
    page: &dyn LivePage,
    prompt: &dyn DecisionPrompt,
    clipboard: &dyn Clipboard,
) -> CopyStatus {
    let outcome = controller.capture(page, prompt).await;
    if outcome.end == CaptureEnd::AlreadyRunning {
        return CopyStatus::Busy;
    }
    write_urls(clipboard, &outcome.urls).await
}

/// Copy the URLs of `new_ids` that are currently loaded in the grid.
pub async fn copy_new(
    page: &dyn LivePage,
    item_selector: &str,
    new_ids: &[String],
    clipboard: &dyn Clipboard,
) -> CopyStatus {
    if new_ids.is_empty() {
        return CopyStatus::NothingToCopy;
    }
    let all = match collect_all_item_urls(page, item_selector).await {
        Ok(urls) => urls,
        Err(e) => {
            warn!("copy_urls: could not read item links: {}", e);
            return CopyStatus::Failed(e.to_string());
        }
    };
    let urls = filter_urls_by_ids(&all, new_ids);
    if urls.is_empty() {
        info!(
            "copy_urls: {} new ids but none loaded in the grid yet",
            new_ids.len()
        );
    }
    write_urls(clipboard, &urls).await
}
