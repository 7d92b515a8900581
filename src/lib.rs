pub mod core;
pub mod features;
pub mod scraping;
pub mod tools;

// --- Primary core exports ---
pub use core::config;
pub use core::types;
pub use core::types::*;
pub use core::AppState;
pub use scraping::PageDataExtractor;

// --- Short module paths ---
pub use features::{clipboard, debounce, decision, presentation, profile_store, reconcile, scroll_capture};
pub use scraping::{live_page, location, page_data, path_resolver, url_set};
pub use tools::{copy_urls, process_profile, watch};
