//! Scroll-driven bulk URL capture.
//!
//! A session scrolls the profile grid to the bottom, waits for the feed to
//! load, and harvests item links from two channels into one set: a direct DOM
//! query after every settle delay, and the page's mutation feed, drained the
//! moment a batch arrives. A run of empty steps (or an empty step that did not
//! grow the document) pauses the session and asks a [`DecisionPrompt`] whether
//! to finish or resume after a cooldown.
//!
//! Only one session runs at a time. A second `capture` while one is active
//! returns an empty result immediately and touches nothing.

use super::decision::DecisionPrompt;
use crate::core::config::CaptureConfig;
use crate::scraping::live_page::LivePage;
use crate::scraping::url_set::collect_all_item_urls;
use crate::types::{CaptureEnd, CaptureOutcome, CaptureState, Decision, MutationBatch};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

// ─────────────────────────────────────────────────────────────────────────────
// Reentrancy guard
// ─────────────────────────────────────────────────────────────────────────────

/// Process-wide "a capture is running" flag, shared by cloning.
#[derive(Debug, Clone, Default)]
pub struct CaptureGuard {
    busy: Arc<AtomicBool>,
}

/// Held for the lifetime of one session; releases the guard on drop.
#[derive(Debug)]
pub struct CaptureLease {
    busy: Arc<AtomicBool>,
}

impl CaptureGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<CaptureLease> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CaptureLease {
                busy: self.busy.clone(),
            })
    }

    pub fn is_held(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for CaptureLease {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session state
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct CaptureSession {
    urls: Vec<String>,
    seen: HashSet<String>,
    no_new_streak: u32,
    pauses: u32,
}

impl CaptureSession {
    /// Add URLs, ignoring ones already collected. Returns how many were new.
    fn harvest<I, S>(&mut self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.urls.len();
        for url in urls {
            let url = url.as_ref().trim();
            if url.is_empty() || self.seen.contains(url) {
                continue;
            }
            self.seen.insert(url.to_string());
            self.urls.push(url.to_string());
        }
        self.urls.len() - before
    }

    fn len(&self) -> usize {
        self.urls.len()
    }
}

/// The page's mutation feed. Once the channel closes it never yields again.
struct MutationFeed(Option<mpsc::UnboundedReceiver<MutationBatch>>);

impl MutationFeed {
    async fn next(&mut self) -> MutationBatch {
        if let Some(rx) = self.0.as_mut() {
            let got = rx.recv().await;
            if let Some(batch) = got {
                return batch;
            }
            debug!("scroll_capture: mutation feed closed");
        }
        self.0 = None;
        std::future::pending().await
    }
}

async fn until_stopped(active: &mut watch::Receiver<bool>) {
    let _ = active.wait_for(|a| !*a).await;
}

pub fn pause_message(collected: usize) -> String {
    format!(
        "Scraping paused. URLs found: {}. Possible end of page or interruption (e.g., CAPTCHA).",
        collected
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Controller
// ─────────────────────────────────────────────────────────────────────────────

pub struct ScrollCaptureController {
    settle_delay: Duration,
    resume_cooldown: Duration,
    stall_threshold: u32,
    step_gap: Duration,
    item_selector: String,
    guard: CaptureGuard,
    active: watch::Sender<bool>,
    state: watch::Sender<CaptureState>,
}

impl ScrollCaptureController {
    pub fn new(cfg: &CaptureConfig, item_selector: impl Into<String>, guard: CaptureGuard) -> Self {
        Self {
            settle_delay: cfg.resolve_settle_delay(),
            resume_cooldown: cfg.resolve_resume_cooldown(),
            stall_threshold: cfg.resolve_stall_threshold(),
            step_gap: cfg.resolve_step_gap(),
            item_selector: item_selector.into(),
            guard,
            active: watch::Sender::new(false),
            state: watch::Sender::new(CaptureState::Idle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_held()
    }

    pub fn state(&self) -> CaptureState {
        *self.state.borrow()
    }

    /// Follow state transitions of the current and future sessions.
    pub fn subscribe_state(&self) -> watch::Receiver<CaptureState> {
        self.state.subscribe()
    }

    /// Ask the running session to stop at its next checkpoint.
    pub fn stop(&self) {
        if self.active.send_replace(false) {
            info!("scroll_capture: stop requested");
        }
    }

    fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    fn transition(&self, to: CaptureState) {
        let from = self.state.send_replace(to);
        if from != to {
            info!("scroll_capture: {:?} → {:?}", from, to);
        }
    }

    pub async fn capture(&self, page: &dyn LivePage, prompt: &dyn DecisionPrompt) -> CaptureOutcome {
        let Some(_lease) = self.guard.try_acquire() else {
            info!("scroll_capture: a session is already running, returning nothing");
            return CaptureOutcome {
                urls: Vec::new(),
                end: CaptureEnd::AlreadyRunning,
                pauses: 0,
            };
        };
        self.active.send_replace(true);
        let mut cancel = self.active.subscribe();

        let origin = match page.scroll_position().await {
            Ok(y) => y,
            Err(e) => {
                warn!("scroll_capture: cannot read scroll position, will restore to top: {}", e);
                0.0
            }
        };

        let mut session = CaptureSession::default();
        match collect_all_item_urls(page, &self.item_selector).await {
            Ok(urls) => {
                session.harvest(urls);
            }
            Err(e) => warn!("scroll_capture: initial DOM harvest failed: {}", e),
        }
        info!("scroll_capture: {} urls already on page", session.len());

        let (observer, mut feed) = match page.observe_item_links().await {
            Ok(f) => (Some(f.id), MutationFeed(Some(f.batches))),
            Err(e) => {
                warn!("scroll_capture: mutation feed unavailable, polling only: {}", e);
                (None, MutationFeed(None))
            }
        };

        let end = self.run(page, prompt, &mut session, &mut feed, &mut cancel).await;

        if let Some(id) = observer {
            if let Err(e) = page.disconnect_observer(id).await {
                warn!("scroll_capture: disconnect failed (non-fatal): {}", e);
            }
        }
        if let Err(e) = page.scroll_to(origin).await {
            warn!("scroll_capture: scroll restore failed (non-fatal): {}", e);
        }
        self.active.send_replace(false);
        self.transition(CaptureState::Finished);
        info!(
            "scroll_capture: finished ({:?}) with {} urls after {} pause(s)",
            end,
            session.len(),
            session.pauses
        );

        CaptureOutcome {
            urls: session.urls,
            end,
            pauses: session.pauses,
        }
    }

    async fn run(
        &self,
        page: &dyn LivePage,
        prompt: &dyn DecisionPrompt,
        session: &mut CaptureSession,
        feed: &mut MutationFeed,
        cancel: &mut watch::Receiver<bool>,
    ) -> CaptureEnd {
        loop {
            if !self.is_active() {
                return CaptureEnd::Cancelled;
            }
            self.transition(CaptureState::Scrolling);

            let height_before = self.height(page).await;
            let count_before = session.len();
            if let Err(e) = page.scroll_to(height_before as f64).await {
                warn!("scroll_capture: scroll failed: {}", e);
            }

            self.transition(CaptureState::WaitingForContent);
            self.harvest_during(self.settle_delay, session, feed).await;
            if !self.is_active() {
                return CaptureEnd::Cancelled;
            }

            match collect_all_item_urls(page, &self.item_selector).await {
                Ok(urls) => {
                    session.harvest(urls);
                }
                Err(e) => warn!("scroll_capture: DOM harvest failed: {}", e),
            }
            let added = session.len() - count_before;
            let height_after = self.height(page).await;

            if added > 0 {
                session.no_new_streak = 0;
                debug!("scroll_capture: +{} (total {})", added, session.len());
            } else {
                session.no_new_streak += 1;
                debug!("scroll_capture: no new urls, streak {}", session.no_new_streak);
            }

            let stalled = session.no_new_streak >= self.stall_threshold
                || (height_after == height_before && added == 0);
            if stalled {
                match self.pause(prompt, session, feed, cancel).await {
                    Some(end) => return end,
                    None => continue,
                }
            }

            self.harvest_during(self.step_gap, session, feed).await;
        }
    }

    /// Ask for a decision. `None` means resume stepping.
    async fn pause(
        &self,
        prompt: &dyn DecisionPrompt,
        session: &mut CaptureSession,
        feed: &mut MutationFeed,
        cancel: &mut watch::Receiver<bool>,
    ) -> Option<CaptureEnd> {
        self.transition(CaptureState::PausedForDecision);
        session.pauses += 1;
        let message = pause_message(session.len());
        warn!("scroll_capture: {}", message);

        let decide = prompt.decide(&message);
        tokio::pin!(decide);
        let decision = loop {
            tokio::select! {
                d = &mut decide => break d,
                _ = until_stopped(cancel) => return Some(CaptureEnd::Cancelled),
                batch = feed.next() => {
                    session.harvest(batch.hrefs);
                }
            }
        };

        match decision {
            Decision::Finish => Some(CaptureEnd::Finished),
            Decision::Resume => {
                info!(
                    "scroll_capture: resuming in {}s",
                    self.resume_cooldown.as_secs()
                );
                self.harvest_during(self.resume_cooldown, session, feed).await;
                if !self.is_active() {
                    return Some(CaptureEnd::Cancelled);
                }
                session.no_new_streak = 0;
                None
            }
        }
    }

    /// Sleep for `period` while draining the mutation feed into the session.
    async fn harvest_during(&self, period: Duration, session: &mut CaptureSession, feed: &mut MutationFeed) {
        let sleep = tokio::time::sleep(period);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                batch = feed.next() => {
                    let added = session.harvest(batch.hrefs);
                    if added > 0 {
                        debug!("scroll_capture: +{} from mutation feed", added);
                    }
                }
            }
        }
    }

    async fn height(&self, page: &dyn LivePage) -> u64 {
        match page.scroll_height().await {
            Ok(h) => h,
            Err(e) => {
                warn!("scroll_capture: cannot read document height: {}", e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_is_exclusive_until_the_lease_drops() {
        let guard = CaptureGuard::new();
        let lease = guard.try_acquire().expect("first acquire");
        assert!(guard.is_held());
        assert!(guard.clone().try_acquire().is_none());
        drop(lease);
        assert!(!guard.is_held());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn harvest_is_idempotent() {
        let mut session = CaptureSession::default();
        assert_eq!(session.harvest(["a", "b", "a"]), 2);
        assert_eq!(session.harvest(["b", " ", "c"]), 1);
        assert_eq!(session.urls, vec!["a", "b", "c"]);
    }

    #[test]
    fn pause_message_reports_count() {
        assert_eq!(
            pause_message(42),
            "Scraping paused. URLs found: 42. Possible end of page or interruption (e.g., CAPTCHA)."
        );
    }
}
