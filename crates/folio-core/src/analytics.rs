use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::{Backend, Query, Row};
use crate::error::{BackendError, SyncError};
use crate::metrics::{MetricsSource, SimulatedMetrics};
use crate::models::{ActivityItem, ActivityKind, ActivityMetadata, ContactSubmission, Table};
use crate::store::ActivityFeed;

/// One computed set of dashboard numbers. Replaced field by field on each tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub projects: u64,
    pub skills: u64,
    pub blog_posts: u64,
    pub contact_submissions: u64,
    pub total_visitors: u64,
    pub active_users: u64,
    pub page_views: u64,
    pub recent_activity: Vec<ActivityItem>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl AnalyticsSnapshot {
    pub fn count(&self, table: Table) -> Option<u64> {
        match table {
            Table::Projects => Some(self.projects),
            Table::Skills => Some(self.skills),
            Table::BlogPosts => Some(self.blog_posts),
            Table::ContactSubmissions => Some(self.contact_submissions),
            Table::PersonalInfo => None,
        }
    }

    fn set_count(&mut self, table: Table, value: u64) {
        match table {
            Table::Projects => self.projects = value,
            Table::Skills => self.skills = value,
            Table::BlogPosts => self.blog_posts = value,
            Table::ContactSubmissions => self.contact_submissions = value,
            Table::PersonalInfo => {}
        }
    }
}

/// What a successful tick changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Counted tables whose count failed and kept the previous value
    pub degraded: Vec<Table>,
    /// Recent contacts newly merged into the feed
    pub merged: usize,
}

pub struct AnalyticsPoller {
    backend: Arc<dyn Backend>,
    metrics: Arc<dyn MetricsSource>,
    recent_contacts: usize,
    snapshot: AnalyticsSnapshot,
}

impl AnalyticsPoller {
    pub fn new(backend: Arc<dyn Backend>, recent_contacts: usize) -> Self {
        Self {
            backend,
            metrics: Arc::new(SimulatedMetrics),
            recent_contacts,
            snapshot: AnalyticsSnapshot::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSource>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn snapshot(&self) -> &AnalyticsSnapshot {
        &self.snapshot
    }

    /// Recompute counts and gauges and merge recent contacts into `feed`.
    ///
    /// A failed count keeps that field's previous value. The tick as a whole
    /// only fails, leaving the snapshot untouched, when every count failed.
    pub async fn tick(&mut self, feed: &mut ActivityFeed) -> Result<TickReport, SyncError> {
        let backend = self.backend.as_ref();
        let metrics = self.metrics.as_ref();
        let recent_query =
            Query::for_table(Table::ContactSubmissions).limit(Some(self.recent_contacts));

        let counts = join_all(
            Table::COUNTED
                .into_iter()
                .map(|table| async move { (table, backend.count(table).await) }),
        );
        let (counts, sample, recent) = futures::join!(
            counts,
            metrics.sample(),
            backend.fetch(Table::ContactSubmissions, &recent_query),
        );

        let mut updated = Vec::new();
        let mut failures: Vec<(Table, BackendError)> = Vec::new();
        for (table, result) in counts {
            match result {
                Ok(count) => updated.push((table, count)),
                Err(err) => failures.push((table, err)),
            }
        }

        if updated.is_empty() && !failures.is_empty() {
            let (table, source) = failures.swap_remove(0);
            warn!(table = %table, "Analytics refresh failed, keeping previous snapshot: {}", source);
            return Err(SyncError::ReadFailed { table, source });
        }

        for (table, count) in updated {
            self.snapshot.set_count(table, count);
        }
        let mut report = TickReport::default();
        for (table, err) in failures {
            warn!(table = %table, "Count failed, keeping previous value: {}", err);
            report.degraded.push(table);
        }

        match sample {
            Ok(live) => {
                self.snapshot.total_visitors = live.total_visitors;
                self.snapshot.active_users = live.active_users;
                self.snapshot.page_views = live.page_views;
            }
            Err(err) => warn!("Metrics sample failed, keeping previous gauges: {}", err),
        }

        match recent {
            Ok(rows) => report.merged = feed.merge(contact_items(rows)),
            Err(err) => warn!("Recent contacts fetch failed: {}", err),
        }

        self.snapshot.recent_activity = feed.items().to_vec();
        self.snapshot.refreshed_at = Some(Utc::now());
        debug!(degraded = report.degraded.len(), merged = report.merged, "analytics refreshed");
        Ok(report)
    }
}

/// Feed items for recent contact submissions, keyed by the submission id.
fn contact_items(rows: Vec<Row>) -> Vec<ActivityItem> {
    rows.into_iter()
        .filter_map(|row| serde_json::from_value::<ContactSubmission>(row).ok())
        .map(|contact| {
            let mut item =
                ActivityItem::new(ActivityKind::Contact, format!("New contact from {}", contact.name))
                    .with_source(Some(contact.id.clone()))
                    .with_metadata(ActivityMetadata {
                        email: Some(contact.email),
                        subject: Some(contact.subject),
                    });
            item.id = contact.id;
            if let Some(created_at) = contact.created_at {
                item.timestamp = created_at;
            }
            item
        })
        .collect()
}
