pub mod activity_feed;
pub mod content_store;
pub mod mirror;

pub use activity_feed::{classify, ActivityFeed};
pub use content_store::ContentStore;
pub use mirror::{Mirror, SyncState};
