use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use folio_core::{BackendConfig, SessionConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Project URL of the hosted backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Public (anon) API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anon_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Admin sign-in; without it requests use the public key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,

    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// `~/.config/folio/config.json` or the platform equivalent
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("folio").join("config.json"))
    }

    /// The given file, else the default file if present, then environment overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::load(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override file values with `SUPABASE_URL`, `SUPABASE_ANON_KEY`,
    /// `FOLIO_ADMIN_EMAIL` and `FOLIO_ADMIN_PASSWORD`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SUPABASE_URL") {
            debug!("Using SUPABASE_URL from environment");
            self.url = Some(url);
        }
        if let Some(key) = lookup("SUPABASE_ANON_KEY") {
            debug!("Using SUPABASE_ANON_KEY from environment");
            self.anon_key = Some(key);
        }
        match (lookup("FOLIO_ADMIN_EMAIL"), lookup("FOLIO_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => {
                self.credentials = Some(Credentials { email, password });
            }
            (Some(email), None) => {
                if let Some(credentials) = self.credentials.as_mut() {
                    credentials.email = email;
                }
            }
            (None, Some(password)) => {
                if let Some(credentials) = self.credentials.as_mut() {
                    credentials.password = password;
                }
            }
            (None, None) => {}
        }
    }

    pub fn backend_config(&self) -> Result<BackendConfig> {
        let url = self
            .url
            .clone()
            .context("No backend URL: set `url` in the config file or SUPABASE_URL")?;
        let anon_key = self
            .anon_key
            .clone()
            .context("No API key: set `anonKey` in the config file or SUPABASE_ANON_KEY")?;
        let mut config = BackendConfig::new(url, anon_key);
        if let Some(schema) = &self.schema {
            config.schema = schema.clone();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "url": "https://abc.supabase.co",
                "anonKey": "anon",
                "credentials": {{"email": "admin@example.com", "password": "pw"}},
                "session": {{"refreshIntervalSecs": 10, "contactLimit": 50}}
            }}"#
        )
        .unwrap();

        let config = CliConfig::load(file.path()).unwrap();
        assert_eq!(config.url.as_deref(), Some("https://abc.supabase.co"));
        assert_eq!(config.session.refresh_interval_secs, 10);
        assert_eq!(config.session.contact_limit, Some(50));
        assert_eq!(config.session.feed_capacity, 10);
        assert_eq!(config.credentials.unwrap().email, "admin@example.com");
    }

    #[test]
    fn test_load_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = CliConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse config file"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SUPABASE_URL", "http://localhost:54321"),
            ("FOLIO_ADMIN_EMAIL", "me@example.com"),
            ("FOLIO_ADMIN_PASSWORD", "secret"),
        ]
        .into_iter()
        .collect();

        let mut config = CliConfig {
            url: Some("https://old.supabase.co".to_string()),
            anon_key: Some("anon".to_string()),
            ..Default::default()
        };
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.url.as_deref(), Some("http://localhost:54321"));
        assert_eq!(
            config.credentials,
            Some(Credentials {
                email: "me@example.com".to_string(),
                password: "secret".to_string(),
            })
        );
        let backend = config.backend_config().unwrap();
        assert_eq!(backend.rest_url(), "http://localhost:54321/rest/v1");
    }

    #[test]
    fn test_backend_config_requires_url() {
        let config = CliConfig::default();
        assert!(config.backend_config().is_err());
    }
}
