use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::models::{ActivityItem, ActivityKind, ActivityMetadata, ChangeEvent, Operation, Table};

/// Turn a change into a feed item. `None` for changes the feed doesn't show.
pub fn classify(event: &ChangeEvent) -> Option<ActivityItem> {
    let (kind, description) = match (event.table, event.operation) {
        (Table::ContactSubmissions, Operation::Insert) => (
            ActivityKind::Contact,
            format!("New contact from {}", event.field("name").unwrap_or("Unknown")),
        ),
        (Table::PersonalInfo, Operation::Update) => (
            ActivityKind::AdminAction,
            "Personal information updated".to_string(),
        ),
        (Table::Projects, op) => (ActivityKind::AdminAction, pick(op, "New project added", "Project updated", "Project deleted")),
        (Table::Skills, op) => (ActivityKind::AdminAction, pick(op, "New skill added", "Skill updated", "Skill deleted")),
        (Table::BlogPosts, op) => (
            ActivityKind::AdminAction,
            pick(op, "New blog post published", "Blog post updated", "Blog post deleted"),
        ),
        _ => return None,
    };

    let mut item = ActivityItem::new(kind, description).with_source(event.row_id());
    if kind == ActivityKind::Contact {
        item = item.with_metadata(ActivityMetadata {
            email: event.field("email").map(str::to_string),
            subject: event.field("subject").map(str::to_string),
        });
    }
    Some(item)
}

fn pick(op: Operation, insert: &str, update: &str, delete: &str) -> String {
    match op {
        Operation::Insert => insert,
        Operation::Update => update,
        Operation::Delete => delete,
    }
    .to_string()
}

/// How many removed rows the feed remembers so merges don't bring them back.
const RETIRED_LIMIT: usize = 100;

/// Bounded, newest-first feed of activity items with per-item auto-hide timers.
pub struct ActivityFeed {
    items: Vec<ActivityItem>,
    capacity: usize,
    auto_hide: Option<Duration>,
    timers: HashMap<String, AbortHandle>,
    /// Rows whose items were dismissed, cleared, expired or evicted, oldest first
    retired: VecDeque<String>,
    expired_tx: mpsc::UnboundedSender<String>,
    expired_rx: mpsc::UnboundedReceiver<String>,
}

impl ActivityFeed {
    pub fn new(capacity: usize, auto_hide: Option<Duration>) -> Self {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        Self {
            items: Vec::new(),
            capacity: capacity.max(1),
            auto_hide,
            timers: HashMap::new(),
            retired: VecDeque::new(),
            expired_tx,
            expired_rx,
        }
    }

    // ===== Getters =====

    pub fn items(&self) -> &[ActivityItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, id: &str) -> Option<&ActivityItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|i| !i.read).count()
    }

    /// Number of auto-hide timers still armed.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    // ===== Mutations =====

    /// Classify a change and put the resulting item at the head of the feed.
    pub fn record(&mut self, event: &ChangeEvent) -> Option<ActivityItem> {
        let item = classify(event)?;
        self.push(item.clone());
        Some(item)
    }

    /// Record something the admin did through this session.
    pub fn record_admin_action(
        &mut self,
        description: impl Into<String>,
        source_id: Option<String>,
    ) -> ActivityItem {
        let item = ActivityItem::new(ActivityKind::AdminAction, description).with_source(source_id);
        self.push(item.clone());
        item
    }

    /// Insert at the head, evict from the tail, arm the auto-hide timer.
    pub fn push(&mut self, item: ActivityItem) {
        let id = item.id.clone();
        self.items.insert(0, item);
        self.evict_overflow();
        if self.get(&id).is_some() {
            self.schedule_expiry(&id);
        }
    }

    /// Merge items fetched from elsewhere. Items describing a row already in
    /// the feed, or one that already left it, are skipped; the rest go in
    /// timestamp order. Returns how many are still in the feed afterwards.
    pub fn merge(&mut self, items: Vec<ActivityItem>) -> usize {
        let mut inserted = Vec::new();
        for item in items {
            let key = row_key(&item).to_string();
            if self.retired.contains(&key) || self.items.iter().any(|i| i.describes(&key)) {
                continue;
            }
            let pos = self.items.partition_point(|i| i.timestamp > item.timestamp);
            inserted.push(item.id.clone());
            self.items.insert(pos, item);
        }
        self.evict_overflow();
        inserted.iter().filter(|id| self.get(id).is_some()).count()
    }

    pub fn mark_read(&mut self, id: &str) -> bool {
        self.cancel_timer(id);
        match self.items.iter_mut().find(|i| i.id == id) {
            Some(item) => {
                item.read = true;
                true
            }
            None => false,
        }
    }

    pub fn dismiss(&mut self, id: &str) -> bool {
        self.cancel_timer(id);
        match self.items.iter().position(|i| i.id == id) {
            Some(pos) => {
                let item = self.items.remove(pos);
                self.retire(&item);
                true
            }
            None => false,
        }
    }

    pub fn clear_all(&mut self) {
        self.cancel_timers();
        for item in std::mem::take(&mut self.items) {
            self.retire(&item);
        }
    }

    /// Timer fired. A no-op when the item was read, dismissed or evicted since.
    pub fn expire(&mut self, id: &str) -> bool {
        if self.timers.remove(id).is_none() {
            return false;
        }
        match self.items.iter().position(|i| i.id == id && !i.read) {
            Some(pos) => {
                let item = self.items.remove(pos);
                self.retire(&item);
                true
            }
            None => false,
        }
    }

    pub fn cancel_timers(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }

    /// Next item whose auto-hide timer fired.
    pub async fn next_expired(&mut self) -> Option<String> {
        self.expired_rx.recv().await
    }

    fn evict_overflow(&mut self) {
        if self.items.len() <= self.capacity {
            return;
        }
        let evicted: Vec<_> = self.items.drain(self.capacity..).collect();
        for item in evicted {
            debug!(id = %item.id, "activity evicted");
            self.cancel_timer(&item.id);
            self.retire(&item);
        }
    }

    fn retire(&mut self, item: &ActivityItem) {
        let key = row_key(item);
        if self.retired.iter().any(|k| k == key) {
            return;
        }
        if self.retired.len() == RETIRED_LIMIT {
            self.retired.pop_front();
        }
        self.retired.push_back(key.to_string());
    }

    fn schedule_expiry(&mut self, id: &str) {
        let Some(delay) = self.auto_hide else {
            return;
        };
        // Without a runtime there is nothing to drive timers; items then only leave by eviction.
        let Ok(runtime) = Handle::try_current() else {
            return;
        };
        let tx = self.expired_tx.clone();
        let item_id = id.to_string();
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(item_id);
        });
        if let Some(previous) = self.timers.insert(id.to_string(), task.abort_handle()) {
            previous.abort();
        }
    }

    fn cancel_timer(&mut self, id: &str) {
        if let Some(handle) = self.timers.remove(id) {
            handle.abort();
        }
    }
}

/// The row an item describes, or the item itself when it has no source.
fn row_key(item: &ActivityItem) -> &str {
    item.source_id.as_deref().unwrap_or(&item.id)
}

impl Drop for ActivityFeed {
    fn drop(&mut self) {
        self.cancel_timers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn project_event(op: Operation) -> ChangeEvent {
        let row = json!({"id": "p1", "title": "Alpha"});
        match op {
            Operation::Insert => ChangeEvent::insert(Table::Projects, row),
            Operation::Update => ChangeEvent::update(Table::Projects, row, None),
            Operation::Delete => ChangeEvent::delete(Table::Projects, row),
        }
    }

    #[test]
    fn test_templates() {
        let contact = ChangeEvent::insert(
            Table::ContactSubmissions,
            json!({"id": "c1", "name": "Jane Doe", "email": "jane@example.com", "subject": "Hello"}),
        );
        let item = classify(&contact).unwrap();
        assert_eq!(item.kind, ActivityKind::Contact);
        assert_eq!(item.description, "New contact from Jane Doe");
        assert_eq!(item.source_id.as_deref(), Some("c1"));
        assert_eq!(item.metadata.unwrap().subject.as_deref(), Some("Hello"));

        let descriptions: Vec<_> = [Operation::Insert, Operation::Update, Operation::Delete]
            .into_iter()
            .map(|op| classify(&project_event(op)).unwrap().description)
            .collect();
        assert_eq!(descriptions, vec!["New project added", "Project updated", "Project deleted"]);

        let info = ChangeEvent::update(Table::PersonalInfo, json!({"id": "1"}), None);
        assert_eq!(classify(&info).unwrap().description, "Personal information updated");

        // the admin changing a contact's status is not feed-worthy
        let status = ChangeEvent::update(Table::ContactSubmissions, json!({"id": "c1"}), None);
        assert!(classify(&status).is_none());
    }

    #[test]
    fn test_fifo_eviction_without_runtime() {
        let mut feed = ActivityFeed::new(3, Some(Duration::from_secs(5)));
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(feed.record_admin_action(format!("action {i}"), None).id);
        }
        assert_eq!(feed.len(), 3);
        let kept: Vec<_> = feed.items().iter().map(|i| i.id.clone()).collect();
        assert_eq!(kept, vec![ids[4].clone(), ids[3].clone(), ids[2].clone()]);
        assert_eq!(feed.pending_timers(), 0);
    }

    #[test]
    fn test_merge_dedupes_by_source() {
        let mut feed = ActivityFeed::new(10, None);
        let contact = ChangeEvent::insert(Table::ContactSubmissions, json!({"id": "c1", "name": "Jane Doe"}));
        feed.record(&contact).unwrap();

        let fetched = vec![
            ActivityItem::new(ActivityKind::Contact, "New contact from Jane Doe").with_source(Some("c1".to_string())),
            ActivityItem::new(ActivityKind::Contact, "New contact from Sam Lee").with_source(Some("c2".to_string())),
        ];
        assert_eq!(feed.merge(fetched.clone()), 1);
        assert_eq!(feed.merge(fetched), 0);
        assert_eq!(feed.len(), 2);
    }

    fn contact_item(id: &str, name: &str, minutes_ago: i64) -> ActivityItem {
        let mut item = ActivityItem::new(ActivityKind::Contact, format!("New contact from {}", name))
            .with_source(Some(id.to_string()));
        item.timestamp = chrono::Utc::now() - chrono::Duration::minutes(minutes_ago);
        item
    }

    #[test]
    fn test_removed_rows_stay_out_of_merges() {
        let mut feed = ActivityFeed::new(10, None);
        let contact = ChangeEvent::insert(Table::ContactSubmissions, json!({"id": "c1", "name": "Jane Doe"}));
        let item = feed.record(&contact).unwrap();
        assert!(feed.dismiss(&item.id));
        assert_eq!(feed.merge(vec![contact_item("c1", "Jane Doe", 0)]), 0);
        assert!(feed.is_empty());

        assert_eq!(feed.merge(vec![contact_item("c2", "Sam Lee", 1)]), 1);
        feed.clear_all();
        assert_eq!(
            feed.merge(vec![contact_item("c1", "Jane Doe", 0), contact_item("c2", "Sam Lee", 1)]),
            0
        );
        assert!(feed.is_empty());

        // a contact nobody has seen yet still comes in
        assert_eq!(feed.merge(vec![contact_item("c3", "Ana Ruiz", 2)]), 1);
    }

    #[test]
    fn test_merge_counts_only_items_that_fit() {
        let mut feed = ActivityFeed::new(2, None);
        feed.record_admin_action("a", None);
        feed.record_admin_action("b", None);

        // both are older than everything in the feed and fall off the end
        let merged = feed.merge(vec![contact_item("c1", "Jane Doe", 60), contact_item("c2", "Sam Lee", 90)]);
        assert_eq!(merged, 0);
        assert_eq!(feed.len(), 2);
        assert!(feed.items().iter().all(|i| i.kind == ActivityKind::AdminAction));
        // and stay out on the next merge
        assert_eq!(feed.merge(vec![contact_item("c1", "Jane Doe", 60)]), 0);
    }

    #[test]
    fn test_mark_read_dismiss_clear() {
        let mut feed = ActivityFeed::new(10, None);
        let a = feed.record_admin_action("a", None).id;
        let b = feed.record_admin_action("b", None).id;

        assert!(feed.mark_read(&a));
        assert_eq!(feed.unread_count(), 1);
        assert!(feed.dismiss(&b));
        assert!(!feed.dismiss(&b));
        assert!(!feed.expire(&a));
        feed.clear_all();
        assert!(feed.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_hide_fires_unless_read() {
        let mut feed = ActivityFeed::new(10, Some(Duration::from_secs(5)));
        let keep = feed.record_admin_action("keep", None).id;
        let gone = feed.record_admin_action("gone", None).id;
        feed.mark_read(&keep);
        assert_eq!(feed.pending_timers(), 1);

        let expired = feed.next_expired().await.unwrap();
        assert_eq!(expired, gone);
        assert!(feed.expire(&expired));
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.items()[0].id, keep);
    }
}
