//! Client configuration.
//!
//! Loaded from a TOML document or from the environment:
//!
//! ```rust
//! use promptline::config::ClientConfig;
//!
//! let config = ClientConfig::from_toml_str(r#"
//!     api_key = "secret"
//!     request_timeout_ms = 20000
//!
//!     [backoff]
//!     max_attempts = 3
//! "#).unwrap();
//!
//! assert_eq!(config.backoff.max_attempts, 3);
//! assert_eq!(config.backoff.base_delay_ms, 1000);
//! ```

use std::env;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::retry::{BackoffPolicy, BackoffSettings};
use crate::transport::{Credential, CredentialPlacement, DEFAULT_ENDPOINT};

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "PROMPTLINE_API_KEY";
/// Environment variable overriding the endpoint URL.
pub const ENDPOINT_VAR: &str = "PROMPTLINE_ENDPOINT";
/// Environment variable setting the per-attempt timeout in milliseconds.
pub const TIMEOUT_VAR: &str = "PROMPTLINE_TIMEOUT_MS";

/// Settings for one orchestrator instance.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// `generateContent` endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API credential, passed through opaquely.
    pub api_key: Credential,
    /// Where the credential goes on the request.
    #[serde(default)]
    pub credential_placement: CredentialPlacement,
    /// Per-attempt timeout. A timeout counts as a network error.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// Backoff between attempts.
    #[serde(default)]
    pub backoff: BackoffSettings,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_owned()
}

impl ClientConfig {
    /// Config with defaults and the given key.
    pub fn new(api_key: Credential) -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key,
            credential_placement: CredentialPlacement::default(),
            request_timeout_ms: None,
            backoff: BackoffSettings::default(),
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Read `PROMPTLINE_API_KEY`, plus optional `PROMPTLINE_ENDPOINT` and
    /// `PROMPTLINE_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var(API_KEY_VAR).map_err(|_| ConfigError::MissingVar(API_KEY_VAR))?;
        let mut config = Self::new(Credential::new(api_key));
        if let Ok(endpoint) = env::var(ENDPOINT_VAR) {
            config.endpoint = endpoint;
        }
        if let Ok(raw) = env::var(TIMEOUT_VAR) {
            let ms = raw.parse().map_err(|_| ConfigError::InvalidVar {
                name: TIMEOUT_VAR,
                value: raw.clone(),
            })?;
            config.request_timeout_ms = Some(ms);
        }
        Ok(config)
    }

    /// Parsed endpoint URL.
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.endpoint).map_err(|err| ConfigError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason: err.to_string(),
        })
    }

    /// Per-attempt timeout, if configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Backoff policy built from the `[backoff]` table.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::from(&self.backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = ClientConfig::from_toml_str(r#"api_key = "k""#).unwrap();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.credential_placement, CredentialPlacement::Query("key".into()));
        assert_eq!(config.backoff_policy(), BackoffPolicy::default());
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn header_placement_and_backoff_table() {
        let config = ClientConfig::from_toml_str(
            r#"
            api_key = "k"
            endpoint = "http://localhost:8080/generate"
            credential_placement = { kind = "header", name = "x-goog-api-key" }

            [backoff]
            base_delay_ms = 50
            max_attempts = 2
            max_delay_ms = 60
            "#,
        )
        .unwrap();
        assert_eq!(
            config.credential_placement,
            CredentialPlacement::Header("x-goog-api-key".into())
        );
        let policy = config.backoff_policy();
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(policy.next_delay(1), Duration::from_millis(60));
        assert_eq!(
            config.endpoint_url().unwrap().as_str(),
            "http://localhost:8080/generate"
        );
    }

    #[test]
    fn missing_key_is_an_error() {
        let err = ClientConfig::from_toml_str("endpoint = \"http://x\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn bad_endpoint_is_reported() {
        let mut config = ClientConfig::new(Credential::new("k"));
        config.endpoint = "not a url".into();
        assert!(matches!(
            config.endpoint_url(),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn credential_debug_is_redacted() {
        let config = ClientConfig::new(Credential::new("super-secret"));
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
