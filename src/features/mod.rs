pub mod clipboard;
pub mod debounce;
pub mod decision;
pub mod presentation;
pub mod profile_store;
pub mod reconcile;
pub mod scroll_capture;

pub use clipboard::Clipboard;
pub use decision::DecisionPrompt;
pub use presentation::Presenter;
pub use profile_store::{JsonFileStore, MemoryStore, ProfileStore, StoreError};
pub use scroll_capture::{CaptureGuard, ScrollCaptureController};
