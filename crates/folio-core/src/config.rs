use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_AUTO_HIDE_SECS, DEFAULT_FEED_CAPACITY, DEFAULT_RECENT_CONTACTS,
    DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_SCHEMA,
};

/// Tunables for one admin session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub refresh_interval_secs: u64,
    pub feed_capacity: usize,
    /// 0 disables auto-hide
    pub auto_hide_secs: u64,
    pub recent_contacts: usize,
    /// Cap on mirrored contact submissions, newest first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_limit: Option<usize>,
}

impl SessionConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn auto_hide(&self) -> Option<Duration> {
        (self.auto_hide_secs > 0).then(|| Duration::from_secs(self.auto_hide_secs))
    }

    pub fn feed_capacity(&self) -> usize {
        self.feed_capacity.max(1)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            feed_capacity: DEFAULT_FEED_CAPACITY,
            auto_hide_secs: DEFAULT_AUTO_HIDE_SECS,
            recent_contacts: DEFAULT_RECENT_CONTACTS,
            contact_limit: None,
        }
    }
}

/// Where the hosted backend lives and the public key used to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    #[serde(default = "default_schema")]
    pub schema: String,
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            schema: default_schema(),
        }
    }

    fn base(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.base())
    }

    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.base())
    }

    pub fn realtime_url(&self) -> String {
        let base = self.base();
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!(
            "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            ws_base, self.anon_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults_fill_missing_fields() {
        let config: SessionConfig = serde_json::from_str(r#"{"feedCapacity": 3}"#).unwrap();
        assert_eq!(config.feed_capacity, 3);
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.auto_hide(), Some(Duration::from_secs(5)));
        assert!(config.contact_limit.is_none());

        let config: SessionConfig =
            serde_json::from_str(r#"{"autoHideSecs": 0, "feedCapacity": 0}"#).unwrap();
        assert_eq!(config.auto_hide(), None);
        assert_eq!(config.feed_capacity(), 1);
    }

    #[test]
    fn test_backend_urls() {
        let config = BackendConfig::new("https://abc.supabase.co/", "anon");
        assert_eq!(config.rest_url(), "https://abc.supabase.co/rest/v1");
        assert_eq!(config.auth_url(), "https://abc.supabase.co/auth/v1");
        assert_eq!(
            config.realtime_url(),
            "wss://abc.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
        assert_eq!(config.schema, "public");

        let local = BackendConfig::new("http://localhost:54321", "k");
        assert!(local.realtime_url().starts_with("ws://localhost:54321/realtime"));
    }
}
