//! Remote data store seam.
//!
//! Every read, write and subscription the admin session makes goes through
//! [`Backend`], so retry or caching layers can be stacked on top without
//! touching the stores.

pub mod memory;
pub mod realtime;
pub mod rest;

pub use memory::{Call, MemoryBackend};
pub use realtime::RealtimeClient;
pub use rest::RestBackend;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::BackendError;
use crate::models::{ChangeEvent, OperationFilter, Table};

/// A raw row as the backend returns it.
pub type Row = Value;

/// What a subscription hands to its sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Change(ChangeEvent),
    /// The channel ended on the remote side. Nothing more arrives on it.
    Closed {
        subscription: u64,
        table: Table,
        reason: String,
    },
}

impl Delivery {
    pub fn into_change(self) -> Option<ChangeEvent> {
        match self {
            Delivery::Change(event) => Some(event),
            Delivery::Closed { .. } => None,
        }
    }
}

/// Where subscription handlers deliver change events.
pub type ChangeSink = mpsc::UnboundedSender<Delivery>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn ordered(column: &str, ascending: bool) -> Self {
        Self {
            order: Some(Order {
                column: column.to_string(),
                ascending,
            }),
            limit: None,
        }
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// The order each table is shown in on the admin dashboard.
    pub fn for_table(table: Table) -> Self {
        match table {
            Table::Projects => Self::ordered("created_at", false),
            Table::Skills => Self::ordered("category", true),
            Table::BlogPosts => Self::ordered("published_at", false),
            Table::ContactSubmissions => Self::ordered("created_at", false),
            Table::PersonalInfo => Self::default().limit(Some(1)),
        }
    }
}

/// Handle for one open change subscription.
#[derive(Debug)]
pub struct Subscription {
    pub(crate) id: u64,
    pub table: Table,
    pub filter: OperationFilter,
}

impl Subscription {
    pub(crate) fn new(id: u64, table: Table, filter: OperationFilter) -> Self {
        Self { id, table, filter }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch(&self, table: Table, query: &Query) -> Result<Vec<Row>, BackendError>;

    async fn fetch_by_id(&self, table: Table, id: &str) -> Result<Option<Row>, BackendError>;

    /// Field-level update of one row. Fails with `NotFound` when nothing matched.
    async fn update(&self, table: Table, id: &str, patch: &Row) -> Result<(), BackendError>;

    async fn delete(&self, table: Table, id: &str) -> Result<(), BackendError>;

    async fn count(&self, table: Table) -> Result<u64, BackendError>;

    /// Start delivering `table` changes matching `filter` into `sink`.
    /// If the channel later dies on its own, a final [`Delivery::Closed`] is sent.
    async fn subscribe(
        &self,
        table: Table,
        filter: OperationFilter,
        sink: ChangeSink,
    ) -> Result<Subscription, BackendError>;

    async fn unsubscribe(&self, subscription: Subscription) -> Result<(), BackendError>;

    /// Whole table in dashboard order.
    async fn fetch_all(&self, table: Table) -> Result<Vec<Row>, BackendError> {
        self.fetch(table, &Query::for_table(table)).await
    }
}
