#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use profile_scout::decision::DecisionPrompt;
use profile_scout::live_page::{ItemLinkFeed, LivePage, ObserverId};
use profile_scout::{Decision, MutationBatch};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

pub fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn video_url(handle: &str, id: &str) -> String {
    format!("https://www.tiktok.com/@{}/video/{}", handle, id)
}

pub fn video_urls(handle: &str, ids: impl IntoIterator<Item = u32>) -> Vec<String> {
    ids.into_iter().map(|i| video_url(handle, &format!("v{}", i))).collect()
}

#[derive(Debug, Default)]
pub struct FakeDom {
    pub location: String,
    pub hydration: Option<String>,
    /// Item hrefs currently in the grid.
    pub items: Vec<String>,
    /// Revealed one batch per scroll to the bottom; grows the document.
    pub pending: VecDeque<Vec<String>>,
    /// Reported once through the mutation feed only, never queryable.
    pub transient: VecDeque<Vec<String>>,
    /// Grow the document on a scroll that reveals nothing (a spinner that never resolves).
    pub grow_on_empty_scroll: bool,
    pub height: u64,
    pub position: f64,
    pub scrolls: Vec<f64>,
    pub observers: Vec<(ObserverId, mpsc::UnboundedSender<MutationBatch>)>,
    pub next_observer: u64,
    pub observe_calls: usize,
    pub disconnects: usize,
    pub fail_content: bool,
    /// Whether the page grants `navigator.clipboard` writes.
    pub clipboard_granted: bool,
    /// Every clipboard script evaluated on the page.
    pub clipboard_scripts: Vec<String>,
}

/// An in-memory profile page.
#[derive(Debug)]
pub struct FakePage {
    pub dom: Mutex<FakeDom>,
}

impl FakePage {
    pub fn new(location: &str) -> Self {
        Self {
            dom: Mutex::new(FakeDom {
                location: location.to_string(),
                height: 1000,
                ..FakeDom::default()
            }),
        }
    }

    pub fn profile(handle: &str) -> Self {
        Self::new(&format!("https://www.tiktok.com/@{}", handle))
    }

    pub fn with_items(self, items: Vec<String>) -> Self {
        self.dom().items = items;
        self
    }

    pub fn with_pending(self, batches: Vec<Vec<String>>) -> Self {
        self.dom().pending = batches.into();
        self
    }

    pub fn with_transient(self, batches: Vec<Vec<String>>) -> Self {
        self.dom().transient = batches.into();
        self
    }

    pub fn with_hydration(self, doc: serde_json::Value) -> Self {
        self.dom().hydration = Some(doc.to_string());
        self
    }

    pub fn growing_without_items(self) -> Self {
        self.dom().grow_on_empty_scroll = true;
        self
    }

    pub fn scrolled_to(self, y: f64) -> Self {
        self.dom().position = y;
        self
    }

    pub fn dom(&self) -> std::sync::MutexGuard<'_, FakeDom> {
        self.dom.lock().unwrap()
    }

    pub fn navigate(&self, location: &str, hydration: Option<serde_json::Value>) {
        let mut dom = self.dom();
        dom.location = location.to_string();
        dom.hydration = hydration.map(|h| h.to_string());
        dom.items.clear();
    }

    /// Append items as if the grid had grown, notifying observers.
    pub fn append_items(&self, items: Vec<String>) {
        let mut dom = self.dom();
        dom.items.extend(items);
        let batch = MutationBatch {
            hrefs: dom.items.clone(),
        };
        dom.observers.retain(|(_, tx)| tx.send(batch.clone()).is_ok());
    }

    /// Scrolls that went to the bottom of the document.
    pub fn bottom_scrolls(&self) -> usize {
        let dom = self.dom();
        dom.scrolls.iter().filter(|y| **y >= 1000.0).count()
    }
}

fn render(dom: &FakeDom) -> String {
    let carrier = dom
        .hydration
        .as_ref()
        .map(|h| format!(r#"<script id="SIGI_STATE" type="application/json">{}</script>"#, h))
        .unwrap_or_default();
    let grid: String = dom
        .items
        .iter()
        .map(|href| format!(r#"<div data-e2e="user-post-item"><a href="{}"><img></a></div>"#, href))
        .collect();
    format!("<html><head>{}</head><body><main>{}</main></body></html>", carrier, grid)
}

#[async_trait]
impl LivePage for FakePage {
    async fn location(&self) -> Result<String> {
        Ok(self.dom().location.clone())
    }

    async fn content(&self) -> Result<String> {
        let dom = self.dom();
        if dom.fail_content {
            return Err(anyhow!("target closed"));
        }
        Ok(render(&dom))
    }

    async fn scroll_height(&self) -> Result<u64> {
        Ok(self.dom().height)
    }

    async fn scroll_position(&self) -> Result<f64> {
        Ok(self.dom().position)
    }

    async fn scroll_to(&self, y: f64) -> Result<()> {
        let mut dom = self.dom();
        dom.scrolls.push(y);
        dom.position = y;
        if y < dom.height as f64 {
            return Ok(());
        }

        if let Some(batch) = dom.pending.pop_front() {
            dom.items.extend(batch);
            dom.height += 1000;
            let notice = MutationBatch {
                hrefs: dom.items.clone(),
            };
            dom.observers.retain(|(_, tx)| tx.send(notice.clone()).is_ok());
        } else if let Some(batch) = dom.transient.pop_front() {
            let notice = MutationBatch { hrefs: batch };
            dom.observers.retain(|(_, tx)| tx.send(notice.clone()).is_ok());
        } else if dom.grow_on_empty_scroll {
            dom.height += 500;
        }
        Ok(())
    }

    async fn observe_item_links(&self) -> Result<ItemLinkFeed> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut dom = self.dom();
        let id = ObserverId(dom.next_observer);
        dom.next_observer += 1;
        dom.observers.push((id, tx));
        dom.observe_calls += 1;
        Ok(ItemLinkFeed { id, batches: rx })
    }

    async fn disconnect_observer(&self, id: ObserverId) -> Result<()> {
        let mut dom = self.dom();
        dom.observers.retain(|(owner, _)| *owner != id);
        dom.disconnects += 1;
        Ok(())
    }

    async fn evaluate_json(&self, script: &str) -> Result<serde_json::Value> {
        if !script.contains("navigator.clipboard") {
            return Ok(serde_json::Value::Null);
        }
        let mut dom = self.dom();
        dom.clipboard_scripts.push(script.to_string());
        if dom.clipboard_granted {
            Ok(serde_json::Value::Bool(true))
        } else {
            Ok(serde_json::Value::String("NotAllowedError: Document is not focused.".into()))
        }
    }
}

/// A prompt that never answers, for cancelling while paused.
#[derive(Debug, Default)]
pub struct SilentPrompt {
    pub asked: AtomicUsize,
}

impl SilentPrompt {
    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionPrompt for SilentPrompt {
    async fn decide(&self, _message: &str) -> Decision {
        self.asked.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}
