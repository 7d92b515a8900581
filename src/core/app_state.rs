use crate::core::config::ScoutConfig;
use crate::features::profile_store::{JsonFileStore, ProfileStore, StoreError};
use crate::features::scroll_capture::{CaptureGuard, ScrollCaptureController};
use crate::scraping::page_data::PageDataExtractor;
use std::sync::Arc;

/// Handles shared by every command: configuration, the profile store, the
/// capture guard and an HTTP client for fetch-only snapshots.
#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub config: Arc<ScoutConfig>,
    pub store: Arc<dyn ProfileStore>,
    /// One guard per process so no two capture sessions overlap.
    pub capture_guard: CaptureGuard,
    pub extractor: PageDataExtractor,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("capture_running", &self.capture_guard.is_held())
            .field("base_url", &self.config.site.resolve_base_url())
            .finish()
    }
}

impl AppState {
    /// State backed by the JSON file store at the configured path.
    pub fn new(http_client: reqwest::Client, config: ScoutConfig) -> Result<Self, StoreError> {
        let store = JsonFileStore::from_config(&config.store)?;
        Ok(Self::with_store(http_client, config, Arc::new(store)))
    }

    pub fn with_store(http_client: reqwest::Client, config: ScoutConfig, store: Arc<dyn ProfileStore>) -> Self {
        Self {
            http_client,
            config: Arc::new(config),
            store,
            capture_guard: CaptureGuard::new(),
            extractor: PageDataExtractor::default(),
        }
    }

    /// A controller sharing this process's capture guard.
    pub fn capture_controller(&self) -> ScrollCaptureController {
        ScrollCaptureController::new(
            &self.config.capture,
            self.config.site.resolve_item_link_selector(),
            self.capture_guard.clone(),
        )
    }
}
