use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Someone used the public contact form
    Contact,
    PageView,
    /// Content or profile changed
    AdminAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityMetadata {
    pub email: Option<String>,
    pub subject: Option<String>,
}

/// One line in the admin activity feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    /// Id of the row this item describes, when there is one.
    pub source_id: Option<String>,
    pub metadata: Option<ActivityMetadata>,
}

impl ActivityItem {
    /// New unread item with a time-ordered id, stamped now.
    pub fn new(kind: ActivityKind, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            kind,
            description: description.into(),
            timestamp: Utc::now(),
            read: false,
            source_id: None,
            metadata: None,
        }
    }

    pub fn with_source(mut self, source_id: Option<String>) -> Self {
        self.source_id = source_id;
        self
    }

    pub fn with_metadata(mut self, metadata: ActivityMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Whether this item describes the given row.
    pub fn describes(&self, row_id: &str) -> bool {
        self.id == row_id || self.source_id.as_deref() == Some(row_id)
    }
}
