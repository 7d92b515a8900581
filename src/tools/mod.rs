pub mod copy_urls;
pub mod process_profile;
pub mod watch;

pub use process_profile::{ProcessOutcome, ProfileProcessor, ProfileReport};
