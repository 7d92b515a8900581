//! The live document the core drives: location, HTML, scrolling, and a feed
//! of item links reported by an in-page `MutationObserver`.
//!
//! [`CdpLivePage`] implements it over a `chromiumoxide` tab. The observer is
//! injected as page JavaScript and reports back through a CDP runtime
//! binding (`Runtime.addBinding` + `Runtime.bindingCalled`).

use crate::types::MutationBatch;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EventBindingCalled};
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[async_trait]
pub trait LivePage: Send + Sync {
    /// Current location (full URL).
    async fn location(&self) -> Result<String>;

    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String>;

    async fn scroll_height(&self) -> Result<u64>;

    async fn scroll_position(&self) -> Result<f64>;

    async fn scroll_to(&self, y: f64) -> Result<()>;

    /// Start observing the item grid. Every mutation batch that adds nodes is
    /// delivered as the full list of item hrefs present at that moment.
    async fn observe_item_links(&self) -> Result<ItemLinkFeed>;

    /// Disconnect one observer started with [`LivePage::observe_item_links`].
    /// Observers owned by other callers keep running.
    async fn disconnect_observer(&self, id: ObserverId) -> Result<()>;

    /// Evaluate a JavaScript expression and return its JSON value.
    async fn evaluate_json(&self, script: &str) -> Result<serde_json::Value>;
}

/// Identifies one item-link observer on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// A running item-link observer: its id (for disconnecting) and its batches.
#[derive(Debug)]
pub struct ItemLinkFeed {
    pub id: ObserverId,
    pub batches: mpsc::UnboundedReceiver<MutationBatch>,
}

static BINDING_SEQ: AtomicU64 = AtomicU64::new(0);

struct ObserverHandle {
    id: ObserverId,
    binding: String,
    forwarder: JoinHandle<()>,
}

pub struct CdpLivePage {
    page: Page,
    item_selector: String,
    observers: Mutex<Vec<ObserverHandle>>,
}

impl CdpLivePage {
    pub fn new(page: Page, item_selector: impl Into<String>) -> Self {
        Self {
            page,
            item_selector: item_selector.into(),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    fn observer_script(binding: &str, selector: &str) -> Result<String> {
        let binding_js = serde_json::to_string(binding)?;
        let selector_js = serde_json::to_string(selector)?;
        Ok(format!(
            r#"(() => {{
    const binding = {binding_js};
    const sel = {selector_js};
    const first = document.querySelector('div[data-e2e="user-post-item"]');
    const target = (first && first.parentElement) || document.body;
    if (!target) return false;
    const obs = new MutationObserver((mutations) => {{
        let added = false;
        for (const m of mutations) {{
            if (m.type === 'childList' && m.addedNodes.length > 0) {{ added = true; break; }}
        }}
        if (!added) return;
        const hrefs = [];
        document.querySelectorAll(sel).forEach((a) => {{ if (a.href) hrefs.push(a.href); }});
        window[binding](JSON.stringify({{ hrefs }}));
    }});
    obs.observe(target, {{ childList: true, subtree: true }});
    window.__profileScoutObservers = window.__profileScoutObservers || {{}};
    window.__profileScoutObservers[binding] = obs;
    return true;
}})()"#
        ))
    }
}

#[async_trait]
impl LivePage for CdpLivePage {
    async fn location(&self) -> Result<String> {
        self.page
            .url()
            .await
            .map_err(|e| anyhow!("Failed to read page url: {}", e))?
            .ok_or_else(|| anyhow!("Page has no url"))
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| anyhow!("Failed to get page content: {}", e))
    }

    async fn scroll_height(&self) -> Result<u64> {
        let v = self
            .evaluate_json("Math.max(document.body.scrollHeight, document.documentElement.scrollHeight)")
            .await?;
        v.as_u64()
            .or_else(|| v.as_f64().map(|f| f.max(0.0) as u64))
            .ok_or_else(|| anyhow!("scrollHeight was not a number: {}", v))
    }

    async fn scroll_position(&self) -> Result<f64> {
        let v = self.evaluate_json("window.scrollY").await?;
        v.as_f64()
            .ok_or_else(|| anyhow!("scrollY was not a number: {}", v))
    }

    async fn scroll_to(&self, y: f64) -> Result<()> {
        self.page
            .evaluate(format!("window.scrollTo(0, {});", y))
            .await
            .map_err(|e| anyhow!("scrollTo failed: {}", e))?;
        Ok(())
    }

    async fn observe_item_links(&self) -> Result<ItemLinkFeed> {
        let seq = BINDING_SEQ.fetch_add(1, Ordering::Relaxed);
        let binding = format!("__profileScoutMutations{}", seq);

        self.page
            .execute(AddBindingParams::new(binding.clone()))
            .await
            .map_err(|e| anyhow!("Failed to add runtime binding: {}", e))?;

        let mut events = self
            .page
            .event_listener::<EventBindingCalled>()
            .await
            .map_err(|e| anyhow!("Failed to listen for binding calls: {}", e))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let name = binding.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.name != name {
                    continue;
                }
                match serde_json::from_str::<MutationBatch>(&event.payload) {
                    Ok(batch) => {
                        if tx.send(batch).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("live_page: bad mutation payload: {}", e),
                }
            }
        });

        let script = Self::observer_script(&binding, &self.item_selector)?;
        let attached = self.evaluate_json(&script).await?;
        if attached.as_bool() != Some(true) {
            warn!("live_page: no observe target (document.body missing)");
        }
        debug!("live_page: observer {} attached", binding);

        let id = ObserverId(seq);
        self.observers.lock().await.push(ObserverHandle {
            id,
            binding,
            forwarder,
        });
        Ok(ItemLinkFeed { id, batches: rx })
    }

    async fn disconnect_observer(&self, id: ObserverId) -> Result<()> {
        let handle = {
            let mut observers = self.observers.lock().await;
            match observers.iter().position(|h| h.id == id) {
                Some(i) => observers.swap_remove(i),
                None => {
                    debug!("live_page: observer {:?} already disconnected", id);
                    return Ok(());
                }
            }
        };
        let binding_js = serde_json::to_string(&handle.binding)?;
        let script = format!(
            "(() => {{ const o = window.__profileScoutObservers && window.__profileScoutObservers[{b}]; if (o) {{ o.disconnect(); delete window.__profileScoutObservers[{b}]; }} return true; }})()",
            b = binding_js
        );
        if let Err(e) = self.page.evaluate(script).await {
            warn!("live_page: observer disconnect failed (non-fatal): {}", e);
        }
        handle.forwarder.abort();
        Ok(())
    }

    async fn evaluate_json(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| anyhow!("evaluate failed: {}", e))?;
        Ok(result
            .into_value::<serde_json::Value>()
            .unwrap_or(serde_json::Value::Null))
    }
}
