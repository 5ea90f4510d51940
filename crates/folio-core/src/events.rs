use crate::models::{ActivityItem, Table};

/// What the admin UI should react to after a signal was processed.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A table's mirror was replaced by a fresh fetch
    MirrorRefreshed(Table),
    ActivityAdded(ActivityItem),
    /// An unread item hid itself
    ActivityExpired(String),
    SnapshotRefreshed { degraded: Vec<Table> },
    /// Something failed and stale data is still shown
    Warning(String),
}
