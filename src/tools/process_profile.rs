//! One orchestration cycle over a profile page: extract, reconcile against the
//! stored visit, show the counts, outline new items, persist the new visit.

use crate::features::presentation::Presenter;
use crate::features::profile_store::ProfileStore;
use crate::features::reconcile::{next_state, reconcile};
use crate::scraping::live_page::LivePage;
use crate::scraping::location::identity_from_location;
use crate::scraping::page_data::PageDataExtractor;
use crate::types::{PageSnapshot, ReconciliationResult, StatusView};
use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileReport {
    pub identity: String,
    pub snapshot: PageSnapshot,
    #[serde(flatten)]
    pub result: ReconciliationResult,
    /// Whether a new visit record was written.
    pub stored: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    NotAProfile,
    /// A cycle for the same identity is already running.
    Skipped,
    NoTabBar,
    Processed(ProfileReport),
    Failed(String),
}

#[derive(Debug, Default)]
struct ProcessorState {
    last_identity: Option<String>,
    new_item_ids: Vec<String>,
    processing: bool,
}

/// Clears the `processing` flag when the cycle ends, however it ends.
struct ProcessingMark<'a>(&'a Mutex<ProcessorState>);

impl Drop for ProcessingMark<'_> {
    fn drop(&mut self) {
        if let Ok(mut s) = self.0.lock() {
            s.processing = false;
        }
    }
}

pub struct ProfileProcessor {
    extractor: PageDataExtractor,
    store: Arc<dyn ProfileStore>,
    presenter: Arc<dyn Presenter>,
    state: Mutex<ProcessorState>,
}

impl ProfileProcessor {
    pub fn new(extractor: PageDataExtractor, store: Arc<dyn ProfileStore>, presenter: Arc<dyn Presenter>) -> Self {
        Self {
            extractor,
            store,
            presenter,
            state: Mutex::new(ProcessorState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProcessorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ids found new in the last completed cycle.
    pub fn new_item_ids(&self) -> Vec<String> {
        self.lock().new_item_ids.clone()
    }

    pub fn last_identity(&self) -> Option<String> {
        self.lock().last_identity.clone()
    }

    /// Forget everything about the previous page.
    pub fn reset(&self) {
        let mut s = self.lock();
        s.last_identity = None;
        s.new_item_ids.clear();
        s.processing = false;
    }

    pub async fn process(&self, page: &dyn LivePage) -> ProcessOutcome {
        let location = match page.location().await {
            Ok(l) => l,
            Err(e) => {
                error!("process_profile: cannot read location: {}", e);
                return ProcessOutcome::Failed(e.to_string());
            }
        };

        let Some(identity) = identity_from_location(&location) else {
            debug!("process_profile: {} is not a profile page", location);
            self.remove_ui().await;
            let mut s = self.lock();
            s.last_identity = None;
            s.new_item_ids.clear();
            return ProcessOutcome::NotAProfile;
        };

        let identity_changed = {
            let mut s = self.lock();
            if s.processing && s.last_identity.as_deref() == Some(identity.as_str()) {
                debug!("process_profile: {} already in progress, skipping", identity);
                return ProcessOutcome::Skipped;
            }
            s.processing = true;
            s.last_identity.as_deref() != Some(identity.as_str())
        };
        let _mark = ProcessingMark(&self.state);

        if identity_changed {
            info!("process_profile: switched to @{}", identity);
            self.remove_ui().await;
            self.lock().new_item_ids.clear();
        }

        match self.cycle(page, &identity).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("process_profile: cycle for @{} failed: {:#}", identity, e);
                self.remove_ui().await;
                ProcessOutcome::Failed(e.to_string())
            }
        }
    }

    async fn cycle(&self, page: &dyn LivePage, identity: &str) -> Result<ProcessOutcome> {
        let Some(tab_bar) = self.presenter.locate_tab_bar().await? else {
            warn!("process_profile: tab bar not found for @{}", identity);
            return Ok(ProcessOutcome::NoTabBar);
        };

        let snapshot = self.extractor.extract(page, identity).await;
        let persisted = match self.store.get(identity).await {
            Ok(p) => p,
            Err(e) => {
                warn!("process_profile: stored state unreadable, treating as first visit: {}", e);
                None
            }
        };

        let result = reconcile(&snapshot, persisted.as_ref());
        self.lock().new_item_ids = result.new_item_ids.clone();

        let view = StatusView {
            total_count: snapshot.total_count,
            new_count: result.new_count,
        };
        self.presenter.inject_status_ui(&tab_bar, &view).await?;
        self.presenter.apply_highlight(&result.new_item_ids).await?;
        self.lock().last_identity = Some(identity.to_string());

        let stored = match next_state(&snapshot, Utc::now()) {
            Some(next) => match self.store.set(identity, next).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("process_profile: could not store visit for @{}: {}", identity, e);
                    false
                }
            },
            None => {
                warn!("process_profile: no video count for @{}, stored state left as is", identity);
                false
            }
        };

        info!(
            "process_profile: @{} total={:?} new={} ({} new ids)",
            identity,
            snapshot.total_count,
            result.new_count,
            result.new_item_ids.len()
        );

        Ok(ProcessOutcome::Processed(ProfileReport {
            identity: identity.to_string(),
            snapshot,
            result,
            stored,
        }))
    }

    async fn remove_ui(&self) {
        if let Err(e) = self.presenter.remove_status_ui().await {
            warn!("process_profile: could not remove status UI: {}", e);
        }
    }
}
