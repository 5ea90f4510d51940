use std::sync::Arc;

use anyhow::{Context, Result};
use folio_core::auth::TokenSource;
use folio_core::models::{ContactStatus, Flag, Table};
use folio_core::{
    ActivityFeed, AdminSession, AnalyticsPoller, AuthClient, Backend, ContentStore, MemoryBackend,
    RestBackend, SessionConfig, SessionEvent,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::config::CliConfig;

/// CLI command parsed from arguments
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Watch,
    List { table: Table },
    Get { table: Table, id: String },
    ToggleFeatured { table: Table, id: String },
    Delete { table: Table, id: String },
    ContactStatus { id: String, status: ContactStatus },
    Stats,
}

/// A backend plus the auth client keeping its token fresh, if signed in.
struct Connection {
    backend: Arc<dyn Backend>,
    auth: Option<AuthClient>,
}

impl Connection {
    async fn open(config: &CliConfig, offline: bool) -> Result<Self> {
        if offline {
            info!("Using the in-memory backend with sample content");
            return Ok(Self {
                backend: Arc::new(MemoryBackend::with_sample_content()),
                auth: None,
            });
        }

        let backend_config = config.backend_config()?;
        let Some(credentials) = &config.credentials else {
            warn!("No admin credentials configured, requests use the public key");
            return Ok(Self {
                backend: Arc::new(RestBackend::new(
                    &backend_config,
                    TokenSource::anonymous(backend_config.anon_key.clone()),
                )),
                auth: None,
            });
        };

        let auth = AuthClient::new(&backend_config);
        auth.sign_in_with_password(&credentials.email, &credentials.password)
            .await
            .with_context(|| format!("Sign-in failed for {}", credentials.email))?;
        Ok(Self {
            backend: Arc::new(RestBackend::new(&backend_config, auth.token_source())),
            auth: Some(auth),
        })
    }

    async fn close(self) {
        if let Some(auth) = self.auth {
            if let Err(e) = auth.sign_out().await {
                warn!("Sign-out failed: {}", e);
            }
        }
    }
}

/// Run one command against the configured backend.
pub async fn run(command: CliCommand, config: CliConfig, offline: bool, pretty: bool) -> Result<()> {
    let connection = Connection::open(&config, offline).await?;

    let result = match command {
        CliCommand::Watch => watch(connection.backend.clone(), config.session.clone()).await,
        command => execute(command, connection.backend.clone(), &config.session)
            .await
            .and_then(|value| print_json(&value, pretty)),
    };

    connection.close().await;
    result
}

/// Start a session and log its events until Ctrl-C.
async fn watch(backend: Arc<dyn Backend>, session_config: SessionConfig) -> Result<()> {
    let mut session = AdminSession::new(backend, session_config);
    for event in session.start().await {
        log_event(&event);
    }
    info!(
        projects = session.content().projects().len(),
        skills = session.content().skills().len(),
        blog_posts = session.content().blog_posts().len(),
        contacts = session.content().contacts().len(),
        "Watching for changes, Ctrl-C to stop"
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        let signal = tokio::select! {
            _ = &mut ctrl_c => None,
            signal = session.next_signal() => signal,
        };
        let Some(signal) = signal else {
            break;
        };
        for event in session.process(signal).await {
            log_event(&event);
        }
    }

    session.dispose().await;
    Ok(())
}

/// One-shot commands. Returns the JSON to print.
pub async fn execute(
    command: CliCommand,
    backend: Arc<dyn Backend>,
    session_config: &SessionConfig,
) -> Result<Value> {
    let mut store = ContentStore::new(backend.clone()).with_contact_limit(session_config.contact_limit);

    match command {
        CliCommand::Watch => anyhow::bail!("watch is not a one-shot command"),
        CliCommand::List { table } => {
            store.refresh_table(table).await?;
            Ok(store.table_json(table)?)
        }
        CliCommand::Get { table, id } => {
            store.refresh_table(table).await?;
            store
                .row_json(table, &id)?
                .with_context(|| format!("No row {} in {}", id, table))
        }
        CliCommand::ToggleFeatured { table, id } => {
            store.refresh_table(table).await?;
            let featured = store.toggle_flag(table, &id, Flag::Featured).await?;
            Ok(json!({ "table": table.as_str(), "id": id, "featured": featured }))
        }
        CliCommand::Delete { table, id } => {
            store.refresh_table(table).await?;
            store.apply_delete(table, &id).await?;
            Ok(json!({ "table": table.as_str(), "id": id, "deleted": true }))
        }
        CliCommand::ContactStatus { id, status } => {
            store.refresh_table(Table::ContactSubmissions).await?;
            store.set_contact_status(&id, status).await?;
            Ok(json!({ "id": id, "status": status.as_str() }))
        }
        CliCommand::Stats => {
            let mut poller = AnalyticsPoller::new(backend, session_config.recent_contacts);
            let mut feed = ActivityFeed::new(session_config.feed_capacity(), None);
            let report = poller.tick(&mut feed).await?;
            for table in &report.degraded {
                warn!(table = %table, "Count unavailable");
            }
            Ok(serde_json::to_value(poller.snapshot())?)
        }
    }
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::MirrorRefreshed(table) => info!(table = %table, "mirror refreshed"),
        SessionEvent::ActivityAdded(item) => {
            info!(kind = ?item.kind, id = %item.id, "{}", item.description)
        }
        SessionEvent::ActivityExpired(id) => info!(id = %id, "activity hidden"),
        SessionEvent::SnapshotRefreshed { degraded } if degraded.is_empty() => {
            info!("analytics refreshed")
        }
        SessionEvent::SnapshotRefreshed { degraded } => {
            warn!(degraded = ?degraded, "analytics refreshed with stale counts")
        }
        SessionEvent::Warning(message) => warn!("{}", message),
    }
}

fn print_json(value: &Value, pretty: bool) -> Result<()> {
    if pretty {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", serde_json::to_string(value)?);
    }
    Ok(())
}
