//! Status overlay and new-item highlighting.
//!
//! [`CdpPresenter`] injects a small counts bar into the profile's tab bar and
//! outlines new grid items. [`LogPresenter`] renders the same information to
//! the log, for headless runs and tests.

use crate::scraping::live_page::LivePage;
use crate::types::StatusView;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub const STATUS_CONTAINER_ID: &str = "profile-scout-ui-container";
pub const NEW_ITEM_CLASS: &str = "profile-scout-new-video-outline";
const TAB_BAR_MARKER: &str = "data-profile-scout-tabbar";
const STYLE_ID: &str = "profile-scout-style";

/// Tab labels that identify the profile tab bar when no stable attribute is present.
pub const KNOWN_TAB_TEXTS: &[&str] = &["Videos", "Liked", "Favourites", "Reposts", "Playlists"];

/// How the tab bar was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabBarStrategy {
    /// `[data-e2e="user-profile-tabs"]`
    DataAttribute,
    /// Visible ancestor of at least two known tab labels.
    TabText,
    /// Visible `role="tablist"` with two or more tabs and a known label.
    TabList,
    /// Hosts without a DOM.
    Virtual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabBar {
    pub strategy: TabBarStrategy,
}

#[async_trait]
pub trait Presenter: Send + Sync {
    async fn locate_tab_bar(&self) -> Result<Option<TabBar>>;

    /// Replace any existing status UI with one showing `view`.
    async fn inject_status_ui(&self, tab_bar: &TabBar, view: &StatusView) -> Result<()>;

    async fn remove_status_ui(&self) -> Result<()>;

    async fn has_status_ui(&self) -> Result<bool>;

    /// Outline grid items whose link carries one of `ids`. Returns how many
    /// items were outlined.
    async fn apply_highlight(&self, ids: &[String]) -> Result<usize>;
}

// ─────────────────────────────────────────────────────────────────────────────
// CDP presenter
// ─────────────────────────────────────────────────────────────────────────────

pub struct CdpPresenter {
    page: Arc<dyn LivePage>,
}

impl CdpPresenter {
    pub fn new(page: Arc<dyn LivePage>) -> Self {
        Self { page }
    }

    fn locate_script() -> Result<String> {
        let known = serde_json::to_string(KNOWN_TAB_TEXTS)?;
        Ok(format!(
            r#"(() => {{
    const known = {known};
    const marker = '{TAB_BAR_MARKER}';
    document.querySelectorAll('[' + marker + ']').forEach((el) => el.removeAttribute(marker));
    const mark = (el, how) => {{ el.setAttribute(marker, '1'); return how; }};
    const isKnown = (el) => el.textContent && known.includes(el.textContent.trim());

    const direct = document.querySelector('[data-e2e="user-profile-tabs"]');
    if (direct) return mark(direct, 'data-attribute');

    for (const el of document.querySelectorAll('p, button, div[role="tab"]')) {{
        if (!isKnown(el)) continue;
        let parent = el.parentElement;
        for (let i = 0; i < 5 && parent; i++) {{
            const hits = Array.from(parent.children).filter(isKnown).length;
            if (hits > 1 && parent.offsetParent !== null) return mark(parent, 'tab-text');
            parent = parent.parentElement;
        }}
    }}

    for (const list of document.querySelectorAll('div[role="tablist"]')) {{
        const tabs = list.querySelectorAll('[role="tab"]');
        if (tabs.length < 2 || list.offsetParent === null) continue;
        const labelled = Array.from(tabs).some((t) => t.textContent && known.some((k) => t.textContent.includes(k)));
        if (labelled) return mark(list, 'tab-list');
    }}
    return null;
}})()"#
        ))
    }

    fn inject_script(view: &StatusView) -> Result<String> {
        let total = serde_json::to_string(&view.total_label())?;
        let new = serde_json::to_string(&view.new_label())?;
        Ok(format!(
            r#"(() => {{
    const bar = document.querySelector('[{TAB_BAR_MARKER}]');
    if (!bar) return false;
    if (!document.getElementById('{STYLE_ID}')) {{
        const style = document.createElement('style');
        style.id = '{STYLE_ID}';
        style.textContent = `
            #{STATUS_CONTAINER_ID} {{ display: flex; align-items: center; gap: 15px; margin-left: 16px; font-weight: 600; }}
            .{NEW_ITEM_CLASS} {{ outline: 3px solid #25f4ee; outline-offset: -3px; border-radius: 4px; }}`;
        document.head.appendChild(style);
    }}
    const old = document.getElementById('{STATUS_CONTAINER_ID}');
    if (old) old.remove();
    const box = document.createElement('div');
    box.id = '{STATUS_CONTAINER_ID}';
    for (const [id, text] of [['profile-scout-total', {total}], ['profile-scout-new', {new}]]) {{
        const item = document.createElement('div');
        item.id = id;
        item.textContent = text;
        box.appendChild(item);
    }}
    bar.appendChild(box);
    return true;
}})()"#
        ))
    }

    /// Ids travel as a JSON array and are compared against each link's id
    /// segment, never spliced into a selector.
    fn highlight_script(ids: &[String]) -> Result<String> {
        let ids_js = serde_json::to_string(ids)?;
        Ok(format!(
            r#"(() => {{
    const wanted = new Set({ids_js});
    const segment = /\/(?:video|photo)\/([^/?#]+)/;
    let outlined = 0;
    document.querySelectorAll('a[href*="/video/"], a[href*="/photo/"]').forEach((a) => {{
        const m = segment.exec(a.getAttribute('href') || '');
        if (!m || !wanted.has(m[1])) return;
        const container = a.parentElement;
        if (container && !container.classList.contains('{NEW_ITEM_CLASS}')) {{
            container.classList.add('{NEW_ITEM_CLASS}');
            outlined++;
        }}
    }});
    return outlined;
}})()"#
        ))
    }

    fn parse_strategy(value: &serde_json::Value) -> Option<TabBarStrategy> {
        match value.as_str()? {
            "data-attribute" => Some(TabBarStrategy::DataAttribute),
            "tab-text" => Some(TabBarStrategy::TabText),
            "tab-list" => Some(TabBarStrategy::TabList),
            _ => None,
        }
    }
}

#[async_trait]
impl Presenter for CdpPresenter {
    async fn locate_tab_bar(&self) -> Result<Option<TabBar>> {
        let found = self.page.evaluate_json(&Self::locate_script()?).await?;
        let tab_bar = Self::parse_strategy(&found).map(|strategy| TabBar { strategy });
        debug!("presentation: tab bar {:?}", tab_bar);
        Ok(tab_bar)
    }

    async fn inject_status_ui(&self, _tab_bar: &TabBar, view: &StatusView) -> Result<()> {
        let injected = self.page.evaluate_json(&Self::inject_script(view)?).await?;
        if injected.as_bool() != Some(true) {
            anyhow::bail!("tab bar disappeared before the status UI could be injected");
        }
        info!("presentation: {} | {}", view.total_label(), view.new_label());
        Ok(())
    }

    async fn remove_status_ui(&self) -> Result<()> {
        self.page
            .evaluate_json(&format!(
                "(() => {{ const el = document.getElementById('{STATUS_CONTAINER_ID}'); if (el) el.remove(); return true; }})()"
            ))
            .await?;
        Ok(())
    }

    async fn has_status_ui(&self) -> Result<bool> {
        let v = self
            .page
            .evaluate_json(&format!("!!document.getElementById('{STATUS_CONTAINER_ID}')"))
            .await?;
        Ok(v.as_bool().unwrap_or(false))
    }

    async fn apply_highlight(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let v = self.page.evaluate_json(&Self::highlight_script(ids)?).await?;
        let n = v.as_u64().unwrap_or(0) as usize;
        debug!("presentation: outlined {} item(s)", n);
        Ok(n)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Log presenter
// ─────────────────────────────────────────────────────────────────────────────

/// Keeps the "UI" in memory and reports it through `tracing`.
#[derive(Debug)]
pub struct LogPresenter {
    tab_bar: Option<TabBar>,
    shown: Mutex<Option<StatusView>>,
    highlighted: Mutex<Vec<String>>,
}

impl Default for LogPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl LogPresenter {
    pub fn new() -> Self {
        Self {
            tab_bar: Some(TabBar {
                strategy: TabBarStrategy::Virtual,
            }),
            shown: Mutex::new(None),
            highlighted: Mutex::new(Vec::new()),
        }
    }

    /// A presenter whose page never has a tab bar.
    pub fn without_tab_bar() -> Self {
        Self {
            tab_bar: None,
            ..Self::new()
        }
    }

    pub fn shown(&self) -> Option<StatusView> {
        self.shown.lock().ok().and_then(|s| s.clone())
    }

    pub fn highlighted(&self) -> Vec<String> {
        self.highlighted.lock().map(|h| h.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Presenter for LogPresenter {
    async fn locate_tab_bar(&self) -> Result<Option<TabBar>> {
        Ok(self.tab_bar)
    }

    async fn inject_status_ui(&self, _tab_bar: &TabBar, view: &StatusView) -> Result<()> {
        info!("presentation: {} | {}", view.total_label(), view.new_label());
        if let Ok(mut shown) = self.shown.lock() {
            *shown = Some(view.clone());
        }
        Ok(())
    }

    async fn remove_status_ui(&self) -> Result<()> {
        if let Ok(mut shown) = self.shown.lock() {
            *shown = None;
        }
        if let Ok(mut h) = self.highlighted.lock() {
            h.clear();
        }
        Ok(())
    }

    async fn has_status_ui(&self) -> Result<bool> {
        Ok(self.shown().is_some())
    }

    async fn apply_highlight(&self, ids: &[String]) -> Result<usize> {
        let Ok(mut h) = self.highlighted.lock() else {
            return Ok(0);
        };
        let mut added = 0;
        for id in ids {
            if !h.contains(id) {
                h.push(id.clone());
                added += 1;
            }
        }
        if added > 0 {
            info!("presentation: new → {}", ids.join(", "));
        }
        Ok(added)
    }
}
