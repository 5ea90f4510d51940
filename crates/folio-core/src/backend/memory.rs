use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use super::{Backend, ChangeSink, Delivery, Query, Row, Subscription};
use crate::error::BackendError;
use crate::models::{id_from_value, ChangeEvent, OperationFilter, Table};
use crate::seed;

/// Backend operations, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Fetch,
    FetchById,
    Update,
    Delete,
    Count,
    Subscribe,
}

struct Subscriber {
    id: u64,
    table: Table,
    filter: OperationFilter,
    sink: ChangeSink,
}

#[derive(Default)]
struct Inner {
    tables: HashMap<Table, Vec<Row>>,
    subscribers: Vec<Subscriber>,
    next_subscription: u64,
    failures: HashMap<(Call, Table), VecDeque<BackendError>>,
    calls: HashMap<(Call, Table), usize>,
}

impl Inner {
    fn begin(&mut self, call: Call, table: Table) -> Result<(), BackendError> {
        *self.calls.entry((call, table)).or_insert(0) += 1;
        match self.failures.get_mut(&(call, table)).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn rows_mut(&mut self, table: Table) -> &mut Vec<Row> {
        self.tables.entry(table).or_default()
    }

    fn position(&self, table: Table, id: &str) -> Option<usize> {
        self.tables
            .get(&table)?
            .iter()
            .position(|row| row.get("id").and_then(id_from_value).as_deref() == Some(id))
    }

    /// Deliver to every matching subscriber, dropping the ones whose receiver is gone.
    fn emit(&mut self, event: ChangeEvent) {
        self.subscribers.retain(|sub| {
            if sub.table != event.table || !sub.filter.matches(event.operation) {
                return true;
            }
            sub.sink.send(Delivery::Change(event.clone())).is_ok()
        });
    }
}

/// In-process backend with the same ordering, patch and change-feed semantics
/// as the hosted one. Used offline and in tests.
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-filled with a small sample portfolio.
    pub fn with_sample_content() -> Self {
        let backend = Self::new();
        for (table, rows) in seed::sample_rows() {
            backend.seed(table, rows);
        }
        backend
    }

    /// Replace a table's rows without emitting change events.
    pub fn seed(&self, table: Table, rows: Vec<Row>) {
        self.inner.lock().tables.insert(table, rows);
    }

    pub fn rows(&self, table: Table) -> Vec<Row> {
        self.inner.lock().tables.get(&table).cloned().unwrap_or_default()
    }

    /// Insert a row as another client would, notifying subscribers.
    pub fn insert(&self, table: Table, row: Row) {
        let mut inner = self.inner.lock();
        inner.rows_mut(table).push(row.clone());
        inner.emit(ChangeEvent::insert(table, row));
    }

    /// Patch a row as another client would. Returns false if the id is unknown.
    pub fn modify(&self, table: Table, id: &str, patch: &Row) -> bool {
        let mut inner = self.inner.lock();
        let Some(pos) = inner.position(table, id) else {
            return false;
        };
        let rows = inner.rows_mut(table);
        let old = rows[pos].clone();
        merge_fields(&mut rows[pos], patch);
        let new = rows[pos].clone();
        inner.emit(ChangeEvent::update(table, new, Some(old)));
        true
    }

    /// Delete a row as another client would. Returns false if the id is unknown.
    pub fn remove(&self, table: Table, id: &str) -> bool {
        let mut inner = self.inner.lock();
        let Some(pos) = inner.position(table, id) else {
            return false;
        };
        let old = inner.rows_mut(table).remove(pos);
        inner.emit(ChangeEvent::delete(table, old));
        true
    }

    /// Make the next `call` on `table` fail with a 503.
    pub fn fail_next(&self, call: Call, table: Table) {
        self.fail_next_with(
            call,
            table,
            BackendError::Rejected {
                status: 503,
                message: format!("injected {:?} failure", call),
            },
        );
    }

    pub fn fail_next_with(&self, call: Call, table: Table, error: BackendError) {
        self.inner
            .lock()
            .failures
            .entry((call, table))
            .or_default()
            .push_back(error);
    }

    /// How many times `call` has been made against `table`.
    pub fn calls(&self, call: Call, table: Table) -> usize {
        self.inner.lock().calls.get(&(call, table)).copied().unwrap_or(0)
    }

    /// Drop every subscription on `table` as a dying server channel would,
    /// telling each subscriber why. Returns how many were closed.
    pub fn close_channels(&self, table: Table, reason: &str) -> usize {
        let mut inner = self.inner.lock();
        let (closed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.subscribers)
            .into_iter()
            .partition(|sub| sub.table == table);
        inner.subscribers = kept;
        for sub in &closed {
            let _ = sub.sink.send(Delivery::Closed {
                subscription: sub.id,
                table,
                reason: reason.to_string(),
            });
        }
        debug!(table = %table, closed = closed.len(), "memory channels closed");
        closed.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn fetch(&self, table: Table, query: &Query) -> Result<Vec<Row>, BackendError> {
        let mut inner = self.inner.lock();
        inner.begin(Call::Fetch, table)?;

        let mut rows = inner.tables.get(&table).cloned().unwrap_or_default();
        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn fetch_by_id(&self, table: Table, id: &str) -> Result<Option<Row>, BackendError> {
        let mut inner = self.inner.lock();
        inner.begin(Call::FetchById, table)?;
        Ok(inner
            .position(table, id)
            .map(|pos| inner.tables[&table][pos].clone()))
    }

    async fn update(&self, table: Table, id: &str, patch: &Row) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        inner.begin(Call::Update, table)?;

        let pos = inner.position(table, id).ok_or_else(|| BackendError::NotFound {
            table,
            id: id.to_string(),
        })?;
        let rows = inner.rows_mut(table);
        let old = rows[pos].clone();
        merge_fields(&mut rows[pos], patch);
        let new = rows[pos].clone();
        inner.emit(ChangeEvent::update(table, new, Some(old)));
        Ok(())
    }

    async fn delete(&self, table: Table, id: &str) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        inner.begin(Call::Delete, table)?;

        let pos = inner.position(table, id).ok_or_else(|| BackendError::NotFound {
            table,
            id: id.to_string(),
        })?;
        let old = inner.rows_mut(table).remove(pos);
        inner.emit(ChangeEvent::delete(table, old));
        Ok(())
    }

    async fn count(&self, table: Table) -> Result<u64, BackendError> {
        let mut inner = self.inner.lock();
        inner.begin(Call::Count, table)?;
        Ok(inner.tables.get(&table).map_or(0, |rows| rows.len() as u64))
    }

    async fn subscribe(
        &self,
        table: Table,
        filter: OperationFilter,
        sink: ChangeSink,
    ) -> Result<Subscription, BackendError> {
        let mut inner = self.inner.lock();
        if let Err(err) = inner.begin(Call::Subscribe, table) {
            return Err(BackendError::Subscription(err.to_string()));
        }

        inner.next_subscription += 1;
        let id = inner.next_subscription;
        inner.subscribers.push(Subscriber {
            id,
            table,
            filter,
            sink,
        });
        debug!(table = %table, id, "memory subscription opened");
        Ok(Subscription::new(id, table, filter))
    }

    async fn unsubscribe(&self, subscription: Subscription) -> Result<(), BackendError> {
        self.inner
            .lock()
            .subscribers
            .retain(|sub| sub.id != subscription.id);
        Ok(())
    }
}

fn merge_fields(row: &mut Row, patch: &Row) {
    if let (Some(row), Some(patch)) = (row.as_object_mut(), patch.as_object()) {
        for (key, value) in patch {
            row.insert(key.clone(), value.clone());
        }
    }
}

/// Null and missing sort before everything else.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn backend_with_projects() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.seed(
            Table::Projects,
            vec![
                json!({"id": "a", "title": "Old", "created_at": "2023-01-01T00:00:00Z"}),
                json!({"id": "b", "title": "New", "created_at": "2024-01-01T00:00:00Z"}),
                json!({"id": "c", "title": "Undated", "created_at": null}),
            ],
        );
        backend
    }

    #[tokio::test]
    async fn test_fetch_orders_and_limits() {
        let backend = backend_with_projects();
        let rows = backend.fetch_all(Table::Projects).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);

        let rows = backend
            .fetch(Table::Projects, &Query::ordered("title", true).limit(Some(1)))
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], "b");
    }

    #[tokio::test]
    async fn test_update_merges_and_notifies() {
        let backend = backend_with_projects();
        let (tx, mut rx) = mpsc::unbounded_channel();
        backend
            .subscribe(Table::Projects, OperationFilter::All, tx)
            .await
            .unwrap();

        backend
            .update(Table::Projects, "a", &json!({"title": "Renamed"}))
            .await
            .unwrap();
        let row = backend.fetch_by_id(Table::Projects, "a").await.unwrap().unwrap();
        assert_eq!(row["title"], "Renamed");
        assert_eq!(row["created_at"], "2023-01-01T00:00:00Z");

        let event = rx.try_recv().unwrap().into_change().unwrap();
        assert_eq!(event.operation, crate::models::Operation::Update);
        assert_eq!(event.row_id(), Some("a".to_string()));

        let err = backend
            .update(Table::Projects, "zzz", &json!({"title": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let backend = backend_with_projects();
        backend.fail_next(Call::Count, Table::Projects);
        assert!(backend.count(Table::Projects).await.is_err());
        assert_eq!(backend.count(Table::Projects).await.unwrap(), 3);
        assert_eq!(backend.calls(Call::Count, Table::Projects), 2);
    }

    #[tokio::test]
    async fn test_filtered_subscription_and_unsubscribe() {
        let backend = backend_with_projects();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = backend
            .subscribe(
                Table::Projects,
                OperationFilter::Only(crate::models::Operation::Insert),
                tx,
            )
            .await
            .unwrap();

        backend.remove(Table::Projects, "a");
        assert!(rx.try_recv().is_err());

        backend.insert(Table::Projects, json!({"id": "d", "title": "Fresh"}));
        assert_eq!(
            rx.try_recv().unwrap().into_change().unwrap().row_id(),
            Some("d".to_string())
        );

        backend.unsubscribe(sub).await.unwrap();
        assert_eq!(backend.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_close_channels_notifies_subscribers() {
        let backend = backend_with_projects();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = backend
            .subscribe(Table::Projects, OperationFilter::All, tx.clone())
            .await
            .unwrap();
        backend
            .subscribe(Table::Skills, OperationFilter::All, tx)
            .await
            .unwrap();

        assert_eq!(backend.close_channels(Table::Projects, "server went away"), 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            Delivery::Closed {
                subscription: sub.id(),
                table: Table::Projects,
                reason: "server went away".to_string(),
            }
        );
        assert_eq!(backend.subscriber_count(), 1);

        backend.insert(Table::Projects, json!({"id": "d", "title": "Fresh"}));
        assert!(rx.try_recv().is_err());
    }
}
