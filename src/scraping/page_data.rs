use super::live_page::LivePage;
use super::path_resolver::{DocumentScope, PathResolver};
use crate::types::PageSnapshot;
use scraper::{Html, Selector};
use tracing::{debug, warn};

/// Fixed id of the legacy hydration carrier.
pub const CARRIER_ID: &str = "SIGI_STATE";
/// Id prefix of the current hydration carrier.
pub const CARRIER_ID_PREFIX: &str = "__UNIVERSAL_DATA_FOR_REHYDRATION__";

/// Pulls a [`PageSnapshot`] out of a profile page's embedded hydration JSON.
///
/// Never fails: a missing carrier, an empty carrier, or malformed JSON all
/// produce [`PageSnapshot::empty`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PageDataExtractor {
    resolver: PathResolver,
}

impl PageDataExtractor {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// Text of the carrier element: `#SIGI_STATE` first, then the first element
    /// whose id starts with the rehydration prefix. Blank text counts as absent.
    pub fn carrier_text(html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let selectors = [
            format!("#{}", CARRIER_ID),
            format!("[id^=\"{}\"]", CARRIER_ID_PREFIX),
        ];
        for raw in &selectors {
            let Ok(sel) = Selector::parse(raw) else {
                continue;
            };
            if let Some(el) = document.select(&sel).next() {
                let text = el.text().collect::<String>();
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return None;
                }
                return Some(trimmed.to_string());
            }
        }
        None
    }

    pub fn extract_from_html(&self, html: &str, identity: &str) -> PageSnapshot {
        match Self::carrier_text(html) {
            Some(text) => self.extract_from_json(&text, identity),
            None => {
                debug!("page_data: hydration carrier not found or empty");
                PageSnapshot::empty()
            }
        }
    }

    pub fn extract_from_json(&self, text: &str, identity: &str) -> PageSnapshot {
        let doc: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!("page_data: failed to parse hydration JSON: {}", e);
                return PageSnapshot::empty();
            }
        };

        let scope = DocumentScope::narrow(&doc);
        if scope.detail.is_none() {
            debug!("page_data: no user-detail scope, resolving against document root");
        }

        let total_count = self.resolver.resolve_count_in(scope, identity);
        let item_ids = self.resolver.resolve_item_ids_in(scope, identity);

        if let Some(count) = total_count {
            if count > 0 && (item_ids.len() as u64) < count {
                debug!(
                    "page_data: videoCount is {} but only {} ids were found for {}",
                    count,
                    item_ids.len(),
                    identity
                );
            }
        }
        debug!(
            "page_data: {} → count={:?}, ids={}",
            identity,
            total_count,
            item_ids.len()
        );

        PageSnapshot {
            total_count,
            item_ids,
        }
    }

    /// Snapshot of the live page. A page that cannot deliver its HTML is
    /// treated like a missing carrier.
    pub async fn extract(&self, page: &dyn LivePage, identity: &str) -> PageSnapshot {
        match page.content().await {
            Ok(html) => self.extract_from_html(&html, identity),
            Err(e) => {
                warn!("page_data: could not read page content: {}", e);
                PageSnapshot::empty()
            }
        }
    }
}
