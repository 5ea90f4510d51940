pub mod analytics;
pub mod auth;
pub mod backend;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod metrics;
pub mod models;
pub mod runtime;
pub mod seed;
pub mod store;
pub mod tracing_setup;

pub use analytics::{AnalyticsPoller, AnalyticsSnapshot, TickReport};
pub use auth::{AuthClient, AuthState, Session, TokenSource};
pub use backend::{Backend, Delivery, MemoryBackend, RestBackend};
pub use config::{BackendConfig, SessionConfig};
pub use error::{AuthError, BackendError, SyncError};
pub use events::SessionEvent;
pub use metrics::{LiveMetrics, MetricsSource, SimulatedMetrics};
pub use runtime::{AdminSession, Signal};
pub use store::{ActivityFeed, ContentStore, Mirror, SyncState};
