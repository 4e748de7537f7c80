//! Backend configuration.
//!
//! Loaded from environment variables and validated at startup. A missing
//! endpoint or access key fails fast instead of surfacing later as a
//! transport error.

use crate::error::ConfigError;
use reqwest::Url;
use std::env;
use std::time::Duration;

/// Backend endpoint.
pub const URL_VAR: &str = "ATTEND_BACKEND_URL";
/// Public (anonymous) access key.
pub const KEY_VAR: &str = "ATTEND_BACKEND_KEY";
/// Per-request timeout in seconds (default: 10).
pub const TIMEOUT_VAR: &str = "ATTEND_REQUEST_TIMEOUT_SECS";
/// Seconds before an entry-flow notice is dismissed (default: 5).
pub const NOTICE_TTL_VAR: &str = "ATTEND_NOTICE_TTL_SECS";

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_NOTICE_TTL_SECS: u64 = 5;

/// Connection settings for the remote backend.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Base URL of the backend (`http` or `https`)
    pub url: Url,
    /// Public access key sent with every request
    pub anon_key: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// How long entry-flow notices stay visible
    pub notice_ttl: Duration,
}

impl BackendConfig {
    /// Build a configuration with default timeouts.
    #[must_use]
    pub fn new(url: Url, anon_key: impl Into<String>) -> Self {
        Self {
            url,
            anon_key: anon_key.into(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            notice_ttl: Duration::from_secs(DEFAULT_NOTICE_TTL_SECS),
        }
    }

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] for an absent or blank required
    /// variable and [`ConfigError::Invalid`] for values that do not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let raw_url = non_blank(URL_VAR).ok_or(ConfigError::Missing(URL_VAR))?;
        let url = Url::parse(raw_url.trim()).map_err(|e| ConfigError::Invalid {
            key: URL_VAR,
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                key: URL_VAR,
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let anon_key = non_blank(KEY_VAR).ok_or(ConfigError::Missing(KEY_VAR))?;

        let mut config = Self::new(url, anon_key.trim());

        if let Some(secs) = non_blank(TIMEOUT_VAR) {
            config.request_timeout = parse_secs(TIMEOUT_VAR, &secs)?;
        }
        if let Some(secs) = non_blank(NOTICE_TTL_VAR) {
            config.notice_ttl = parse_secs(NOTICE_TTL_VAR, &secs)?;
        }

        Ok(config)
    }

    /// Base URL without a trailing slash, ready for path concatenation.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }
}

fn parse_secs(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        reason: format!("expected whole seconds, got '{value}'"),
    })?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("notice_ttl", &self.notice_ttl)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_loads_required_values_with_defaults() {
        let config = BackendConfig::from_lookup(lookup(&[
            (URL_VAR, "https://project.example.co/"),
            (KEY_VAR, "anon-key"),
        ]))
        .unwrap();

        assert_eq!(config.base_url(), "https://project.example.co");
        assert_eq!(config.anon_key, "anon-key");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.notice_ttl, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_url_fails_fast() {
        let result = BackendConfig::from_lookup(lookup(&[(KEY_VAR, "anon-key")]));
        assert_eq!(result, Err(ConfigError::Missing(URL_VAR)));
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let result = BackendConfig::from_lookup(lookup(&[
            (URL_VAR, "https://project.example.co"),
            (KEY_VAR, "   "),
        ]));
        assert_eq!(result, Err(ConfigError::Missing(KEY_VAR)));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let result = BackendConfig::from_lookup(lookup(&[
            (URL_VAR, "ftp://project.example.co"),
            (KEY_VAR, "anon-key"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid { key: URL_VAR, .. })));
    }

    #[test]
    fn test_parses_optional_durations() {
        let config = BackendConfig::from_lookup(lookup(&[
            (URL_VAR, "http://localhost:54321"),
            (KEY_VAR, "anon-key"),
            (TIMEOUT_VAR, "3"),
            (NOTICE_TTL_VAR, "1"),
        ]))
        .unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.notice_ttl, Duration::from_secs(1));

        let invalid = BackendConfig::from_lookup(lookup(&[
            (URL_VAR, "http://localhost:54321"),
            (KEY_VAR, "anon-key"),
            (TIMEOUT_VAR, "0"),
        ]));
        assert!(matches!(invalid, Err(ConfigError::Invalid { key: TIMEOUT_VAR, .. })));
    }

    #[test]
    fn test_debug_hides_key() {
        let config = BackendConfig::from_lookup(lookup(&[
            (URL_VAR, "http://localhost:54321"),
            (KEY_VAR, "super-secret"),
        ]))
        .unwrap();
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
