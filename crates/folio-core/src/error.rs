use crate::models::{Flag, Table};

/// Failure talking to the remote data store.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Session expired or invalid")]
    AuthExpired,

    #[error("No {table} row with id {id}")]
    NotFound { table: Table, id: String },

    #[error("Malformed row: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Subscription failed: {0}")]
    Subscription(String),
}

impl BackendError {
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, BackendError::AuthExpired)
    }
}

/// Component-level failures handed back to the admin UI.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Failed to load {table}: {source}")]
    ReadFailed { table: Table, source: BackendError },

    #[error("Failed to load {} table(s)", .0.len())]
    LoadFailed(Vec<SyncError>),

    #[error("Failed to update {table} row {id}: {source}")]
    UpdateFailed {
        table: Table,
        id: String,
        source: BackendError,
    },

    #[error("Failed to delete {table} row {id}: {source}")]
    DeleteFailed {
        table: Table,
        id: String,
        source: BackendError,
    },

    #[error("Failed to subscribe to {table}: {source}")]
    SubscriptionFailed { table: Table, source: BackendError },

    #[error("Session expired while writing {table} row {id}; sign in again")]
    AuthExpired { table: Table, id: String },

    #[error("No {table} row with id {id} in the local mirror")]
    UnknownRow { table: Table, id: String },

    #[error("{table} rows have no {flag} flag")]
    UnsupportedFlag { table: Table, flag: Flag },
}

impl SyncError {
    pub(crate) fn update_failed(table: Table, id: &str, source: BackendError) -> Self {
        if source.is_auth_expired() {
            return SyncError::AuthExpired {
                table,
                id: id.to_string(),
            };
        }
        SyncError::UpdateFailed {
            table,
            id: id.to_string(),
            source,
        }
    }

    pub(crate) fn delete_failed(table: Table, id: &str, source: BackendError) -> Self {
        if source.is_auth_expired() {
            return SyncError::AuthExpired {
                table,
                id: id.to_string(),
            };
        }
        SyncError::DeleteFailed {
            table,
            id: id.to_string(),
            source,
        }
    }

    pub(crate) fn unknown_row(table: Table, id: &str) -> Self {
        SyncError::UnknownRow {
            table,
            id: id.to_string(),
        }
    }

    /// True for failed writes the admin should be told about and may retry by hand.
    pub fn is_write_failure(&self) -> bool {
        matches!(
            self,
            SyncError::UpdateFailed { .. } | SyncError::DeleteFailed { .. } | SyncError::AuthExpired { .. }
        )
    }
}

/// Failure in the admin sign-in flow.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Sign-in rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Not signed in")]
    NoSession,

    #[error("Session refresh failed ({status}): {message}")]
    RefreshFailed { status: u16, message: String },

    #[error("Auth request failed: {0}")]
    Transport(#[from] reqwest::Error),
}
