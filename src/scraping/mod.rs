pub mod browser_manager;
pub mod live_page;
pub mod location;
pub mod page_data;
pub mod path_resolver;
pub mod url_set;

pub use live_page::{CdpLivePage, ItemLinkFeed, LivePage, ObserverId};
pub use page_data::PageDataExtractor;
pub use path_resolver::PathResolver;
