use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::constants::{MIN_REFRESH_DELAY_SECS, REFRESH_LEAD_SECS};
use crate::error::AuthError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A signed-in admin session as issued by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: i64,
    /// Unix seconds. Filled from `expires_in` when the service omits it.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl Session {
    fn stamped(mut self, now: i64) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = Some(now + self.expires_in);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    #[default]
    SignedOut,
    SignedIn(Session),
}

impl AuthState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::SignedIn(session) => Some(session),
            AuthState::SignedOut => None,
        }
    }
}

/// Supplies the bearer token for data requests: the admin's access token
/// while signed in, the public key otherwise.
#[derive(Debug, Clone)]
pub struct TokenSource {
    anon_key: String,
    auth: Option<watch::Receiver<AuthState>>,
}

impl TokenSource {
    pub fn anonymous(anon_key: impl Into<String>) -> Self {
        Self {
            anon_key: anon_key.into(),
            auth: None,
        }
    }

    pub fn bearer(&self) -> String {
        self.auth
            .as_ref()
            .and_then(|rx| rx.borrow().session().map(|s| s.access_token.clone()))
            .unwrap_or_else(|| self.anon_key.clone())
    }
}

/// Seconds until the next refresh: five minutes before expiry, never sooner than a minute.
pub fn refresh_delay(expires_at: i64, now: i64) -> Duration {
    let secs = (expires_at - now - REFRESH_LEAD_SECS).max(MIN_REFRESH_DELAY_SECS);
    Duration::from_secs(secs as u64)
}

struct AuthInner {
    http: reqwest::Client,
    auth_url: String,
    anon_key: String,
    state: watch::Sender<AuthState>,
    refresh_task: Mutex<Option<AbortHandle>>,
}

impl AuthInner {
    async fn token_request(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Session, AuthError> {
        let url = format!("{}/token?grant_type={}", self.auth_url, grant_type);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected { status, message });
        }

        let session: Session = response.json().await?;
        Ok(session.stamped(Utc::now().timestamp()))
    }

    async fn refresh(&self) -> Result<Session, AuthError> {
        let refresh_token = self
            .state
            .borrow()
            .session()
            .map(|s| s.refresh_token.clone())
            .ok_or(AuthError::NoSession)?;
        self.token_request(
            "refresh_token",
            serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
        .map_err(|err| match err {
            AuthError::Rejected { status, message } => AuthError::RefreshFailed { status, message },
            other => other,
        })
    }

    fn next_refresh_delay(&self) -> Option<Duration> {
        let state = self.state.borrow();
        let expires_at = state.session()?.expires_at?;
        Some(refresh_delay(expires_at, Utc::now().timestamp()))
    }

    fn cancel_refresh(&self) {
        if let Some(handle) = self.refresh_task.lock().take() {
            handle.abort();
        }
    }
}

/// Keeps the access token fresh until the session ends or the client is dropped.
async fn refresh_loop(weak: Weak<AuthInner>) {
    loop {
        let Some(delay) = weak.upgrade().and_then(|inner| inner.next_refresh_delay()) else {
            return;
        };
        debug!(secs = delay.as_secs(), "next session refresh scheduled");
        tokio::time::sleep(delay).await;

        let Some(inner) = weak.upgrade() else {
            return;
        };
        match inner.refresh().await {
            Ok(session) => {
                info!("Session refreshed");
                inner.state.send_replace(AuthState::SignedIn(session));
            }
            Err(AuthError::NoSession) => return,
            Err(err) => warn!("Session refresh failed, keeping current session: {}", err),
        }
    }
}

/// Admin sign-in against the hosted auth service.
pub struct AuthClient {
    inner: Arc<AuthInner>,
}

impl AuthClient {
    pub fn new(config: &BackendConfig) -> Self {
        let (state, _) = watch::channel(AuthState::SignedOut);
        Self {
            inner: Arc::new(AuthInner {
                http: reqwest::Client::new(),
                auth_url: config.auth_url(),
                anon_key: config.anon_key.clone(),
                state,
                refresh_task: Mutex::new(None),
            }),
        }
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let session = self
            .inner
            .token_request(
                "password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        info!(user = %session.user.id, "Signed in");
        self.install(session.clone());
        Ok(session)
    }

    pub fn get_session(&self) -> Option<Session> {
        self.inner.state.borrow().session().cloned()
    }

    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let session = self.inner.refresh().await?;
        self.install(session.clone());
        Ok(session)
    }

    /// Ends the session locally even if the logout request fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let token = self.get_session().map(|s| s.access_token);
        self.inner.cancel_refresh();
        self.inner.state.send_replace(AuthState::SignedOut);

        let Some(token) = token else {
            return Ok(());
        };
        let response = self
            .inner
            .http
            .post(format!("{}/logout", self.inner.auth_url))
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(token)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected { status, message });
        }
        info!("Signed out");
        Ok(())
    }

    pub fn on_auth_state_change(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Bearer tokens that follow this client's session.
    pub fn token_source(&self) -> TokenSource {
        TokenSource {
            anon_key: self.inner.anon_key.clone(),
            auth: Some(self.inner.state.subscribe()),
        }
    }

    fn install(&self, session: Session) {
        self.inner.state.send_replace(AuthState::SignedIn(session));
        self.inner.cancel_refresh();
        let task = tokio::spawn(refresh_loop(Arc::downgrade(&self.inner)));
        *self.inner.refresh_task.lock() = Some(task.abort_handle());
    }
}

impl Drop for AuthClient {
    fn drop(&mut self) {
        self.inner.cancel_refresh();
    }
}
