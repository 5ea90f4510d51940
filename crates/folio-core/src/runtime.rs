use std::collections::BTreeSet;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::analytics::{AnalyticsPoller, AnalyticsSnapshot};
use crate::backend::{Backend, Delivery, Subscription};
use crate::config::SessionConfig;
use crate::error::{BackendError, SyncError};
use crate::events::SessionEvent;
use crate::metrics::MetricsSource;
use crate::models::{
    ChangeEvent, ContactStatus, ContentPatch, Flag, Operation, OperationFilter, Table,
};
use crate::store::{ActivityFeed, ContentStore};

/// Something the session has to handle.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Change(ChangeEvent),
    Tick,
    Expired(String),
    /// A live subscription died; its table has to be polled from now on.
    ChannelClosed {
        subscription: u64,
        table: Table,
        reason: String,
    },
}

/// One admin dashboard session.
///
/// Owns the content mirror, the activity feed, the analytics poller, every
/// subscription and every timer. All handling goes through `&mut self`, so
/// handlers never interleave.
pub struct AdminSession {
    backend: Arc<dyn Backend>,
    config: SessionConfig,
    content: ContentStore,
    feed: ActivityFeed,
    analytics: AnalyticsPoller,
    change_tx: mpsc::UnboundedSender<Delivery>,
    change_rx: mpsc::UnboundedReceiver<Delivery>,
    subscriptions: Vec<Subscription>,
    /// Tables without a live subscription, re-fetched on every tick
    polling: BTreeSet<Table>,
    ticker: Option<Interval>,
    started: bool,
    disposed: bool,
}

impl AdminSession {
    pub fn new(backend: Arc<dyn Backend>, config: SessionConfig) -> Self {
        let (change_tx, change_rx) = mpsc::unbounded_channel();
        Self {
            content: ContentStore::new(backend.clone()).with_contact_limit(config.contact_limit),
            feed: ActivityFeed::new(config.feed_capacity(), config.auto_hide()),
            analytics: AnalyticsPoller::new(backend.clone(), config.recent_contacts),
            backend,
            config,
            change_tx,
            change_rx,
            subscriptions: Vec::new(),
            polling: BTreeSet::new(),
            ticker: None,
            started: false,
            disposed: false,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSource>) -> Self {
        self.analytics = self.analytics.with_metrics(metrics);
        self
    }

    // ===== Getters =====

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    pub fn feed(&self) -> &ActivityFeed {
        &self.feed
    }

    pub fn snapshot(&self) -> &AnalyticsSnapshot {
        self.analytics.snapshot()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn polling_tables(&self) -> impl Iterator<Item = Table> + '_ {
        self.polling.iter().copied()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // ===== Lifecycle =====

    /// Load everything, subscribe to every table and run the first refresh.
    pub async fn start(&mut self) -> Vec<SessionEvent> {
        if self.started || self.disposed {
            return Vec::new();
        }
        self.started = true;
        let mut events = Vec::new();

        let failed: Vec<Table> = match self.content.load_all().await {
            Ok(()) => Vec::new(),
            Err(SyncError::LoadFailed(failures)) => failures
                .into_iter()
                .filter_map(|err| {
                    events.push(SessionEvent::Warning(err.to_string()));
                    match err {
                        SyncError::ReadFailed { table, .. } => Some(table),
                        _ => None,
                    }
                })
                .collect(),
            Err(err) => {
                events.push(SessionEvent::Warning(err.to_string()));
                Vec::new()
            }
        };
        for table in Table::ALL {
            if !failed.contains(&table) {
                events.push(SessionEvent::MirrorRefreshed(table));
            }
        }

        for table in Table::ALL {
            match self
                .backend
                .subscribe(table, OperationFilter::All, self.change_tx.clone())
                .await
            {
                Ok(subscription) => self.subscriptions.push(subscription),
                Err(source) => {
                    let err = SyncError::SubscriptionFailed { table, source };
                    warn!(table = %table, "{}, falling back to polling", err);
                    self.polling.insert(table);
                    events.push(SessionEvent::Warning(err.to_string()));
                }
            }
        }

        events.extend(self.refresh_analytics().await);

        let period = self.config.refresh_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);

        info!(
            subscriptions = self.subscriptions.len(),
            polling = self.polling.len(),
            "Admin session started"
        );
        events
    }

    /// Wait for the next change, tick or expiry. `None` once disposed.
    pub async fn next_signal(&mut self) -> Option<Signal> {
        if self.disposed {
            return None;
        }
        tokio::select! {
            Some(delivery) = self.change_rx.recv() => Some(match delivery {
                Delivery::Change(event) => Signal::Change(event),
                Delivery::Closed { subscription, table, reason } => Signal::ChannelClosed {
                    subscription,
                    table,
                    reason,
                },
            }),
            _ = next_tick(&mut self.ticker) => Some(Signal::Tick),
            Some(id) = self.feed.next_expired() => Some(Signal::Expired(id)),
            else => None,
        }
    }

    /// A signal that is already waiting, without blocking.
    pub fn poll_signal(&mut self) -> Option<Signal> {
        self.next_signal().now_or_never().flatten()
    }

    pub async fn process(&mut self, signal: Signal) -> Vec<SessionEvent> {
        if self.disposed {
            return Vec::new();
        }
        match signal {
            Signal::Change(event) => self.handle_change(event).await,
            Signal::Tick => self.handle_tick().await,
            Signal::Expired(id) => {
                if self.feed.expire(&id) {
                    vec![SessionEvent::ActivityExpired(id)]
                } else {
                    Vec::new()
                }
            }
            Signal::ChannelClosed {
                subscription,
                table,
                reason,
            } => self.handle_channel_closed(subscription, table, reason).await,
        }
    }

    /// Unsubscribe everything and stop every timer. Safe to call more than once.
    pub async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.ticker = None;
        self.feed.cancel_timers();

        for subscription in std::mem::take(&mut self.subscriptions) {
            let table = subscription.table;
            if let Err(err) = self.backend.unsubscribe(subscription).await {
                warn!(table = %table, "Unsubscribe failed: {}", err);
            }
        }
        self.polling.clear();
        info!("Admin session disposed");
    }

    async fn handle_change(&mut self, event: ChangeEvent) -> Vec<SessionEvent> {
        debug!(table = %event.table, op = event.operation.as_wire(), "change received");
        let mut events = Vec::new();

        match self.content.on_change_event(&event).await {
            Ok(table) => events.push(SessionEvent::MirrorRefreshed(table)),
            Err(err) => {
                warn!("Re-fetch after change failed: {}", err);
                events.push(SessionEvent::Warning(err.to_string()));
            }
        }

        if let Some(item) = self.feed.record(&event) {
            events.push(SessionEvent::ActivityAdded(item));
        }

        if event.table == Table::ContactSubmissions && event.operation == Operation::Insert {
            events.extend(self.refresh_analytics().await);
        }
        events
    }

    /// Move the table to polling and catch up on whatever the dead channel missed.
    async fn handle_channel_closed(
        &mut self,
        subscription: u64,
        table: Table,
        reason: String,
    ) -> Vec<SessionEvent> {
        let Some(pos) = self.subscriptions.iter().position(|s| s.id() == subscription) else {
            return Vec::new();
        };
        let dead = self.subscriptions.remove(pos);
        if let Err(err) = self.backend.unsubscribe(dead).await {
            debug!(table = %table, "Cleanup of closed channel failed: {}", err);
        }

        let err = SyncError::SubscriptionFailed {
            table,
            source: BackendError::Subscription(reason),
        };
        warn!(table = %table, "{}, falling back to polling", err);
        self.polling.insert(table);
        let mut events = vec![SessionEvent::Warning(err.to_string())];

        match self.content.refresh_table(table).await {
            Ok(()) => events.push(SessionEvent::MirrorRefreshed(table)),
            Err(err) => {
                warn!(table = %table, "Re-fetch after channel loss failed: {}", err);
                events.push(SessionEvent::Warning(err.to_string()));
            }
        }
        events
    }

    async fn handle_tick(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let polled: Vec<Table> = self.polling.iter().copied().collect();
        for table in polled {
            match self.content.refresh_table(table).await {
                Ok(()) => events.push(SessionEvent::MirrorRefreshed(table)),
                Err(err) => {
                    warn!(table = %table, "Polling re-fetch failed: {}", err);
                    events.push(SessionEvent::Warning(err.to_string()));
                }
            }
        }
        events.extend(self.refresh_analytics().await);
        events
    }

    async fn refresh_analytics(&mut self) -> Vec<SessionEvent> {
        match self.analytics.tick(&mut self.feed).await {
            Ok(report) => vec![SessionEvent::SnapshotRefreshed {
                degraded: report.degraded,
            }],
            Err(err) => vec![SessionEvent::Warning(err.to_string())],
        }
    }

    // ===== Admin operations =====

    pub async fn apply_edit(&mut self, id: &str, patch: ContentPatch) -> Result<(), SyncError> {
        let table = patch.table();
        self.content.apply_edit(id, patch).await?;
        self.note_admin_action(table, Operation::Update, id);
        Ok(())
    }

    pub async fn apply_delete(&mut self, table: Table, id: &str) -> Result<(), SyncError> {
        self.content.apply_delete(table, id).await?;
        self.note_admin_action(table, Operation::Delete, id);
        Ok(())
    }

    pub async fn toggle_flag(&mut self, table: Table, id: &str, flag: Flag) -> Result<bool, SyncError> {
        let value = self.content.toggle_flag(table, id, flag).await?;
        self.note_admin_action(table, Operation::Update, id);
        Ok(value)
    }

    pub async fn set_contact_status(&mut self, id: &str, status: ContactStatus) -> Result<(), SyncError> {
        self.content.set_contact_status(id, status).await?;
        let name = self
            .content
            .contacts()
            .get(id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.to_string());
        self.feed
            .record_admin_action(format!("Contact from {} marked {}", name, status), Some(id.to_string()));
        Ok(())
    }

    pub fn mark_read(&mut self, id: &str) -> bool {
        self.feed.mark_read(id)
    }

    pub fn dismiss(&mut self, id: &str) -> bool {
        self.feed.dismiss(id)
    }

    pub fn clear_activity(&mut self) {
        self.feed.clear_all();
    }

    /// Subscribed tables report admin writes through their change feed.
    /// Polled tables get the item here instead.
    fn note_admin_action(&mut self, table: Table, operation: Operation, id: &str) {
        if !self.polling.contains(&table) {
            return;
        }
        let row = serde_json::json!({ "id": id });
        let event = match operation {
            Operation::Delete => ChangeEvent::delete(table, row),
            Operation::Insert => ChangeEvent::insert(table, row),
            Operation::Update => ChangeEvent::update(table, row, None),
        };
        self.feed.record(&event);
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
