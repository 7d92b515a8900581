//! Item-URL helpers: harvest post links from page HTML and narrow a URL list
//! down to a set of video ids.

use crate::scraping::live_page::LivePage;
use anyhow::Result;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, warn};
use url::Url;

static ITEM_ID_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn item_id_re() -> Option<&'static Regex> {
    ITEM_ID_RE
        .get_or_init(|| Regex::new(r"/(?:video|photo)/([^/?#]+)").ok())
        .as_ref()
}

/// The id segment of an item URL (`…/video/<id>` or `…/photo/<id>`).
pub fn video_id_from_url(url: &str) -> Option<&str> {
    item_id_re()?
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Every item link in `html` matching `selector`, resolved against `base`,
/// deduplicated in document order.
pub fn collect_item_urls(html: &str, base: &Url, selector: &str) -> Vec<String> {
    let sel = match Selector::parse(selector) {
        Ok(s) => s,
        Err(e) => {
            warn!("url_set: invalid item selector {:?}: {}", selector, e);
            return Vec::new();
        }
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    for el in document.select(&sel) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let Some(abs) = normalize_item_url(base, href) else {
            continue;
        };
        if seen.insert(abs.clone()) {
            urls.push(abs);
        }
    }
    urls
}

/// Resolve an href the way the browser's `a.href` would.
pub fn normalize_item_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

/// Item URLs currently present in the live page.
pub async fn collect_all_item_urls(page: &dyn LivePage, selector: &str) -> Result<Vec<String>> {
    let location = page.location().await?;
    let base = Url::parse(&location)?;
    let html = page.content().await?;
    let urls = collect_item_urls(&html, &base, selector);
    debug!("url_set: {} item urls in DOM", urls.len());
    Ok(urls)
}

/// URLs whose item-id segment is one of `ids`, in input order.
pub fn filter_urls_by_ids(urls: &[String], ids: &[String]) -> Vec<String> {
    if ids.is_empty() {
        return Vec::new();
    }
    let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
    urls.iter()
        .filter(|u| video_id_from_url(u).is_some_and(|id| wanted.contains(id)))
        .cloned()
        .collect()
}
