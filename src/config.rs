//! Adapter and platform configuration
//!
//! Values normally come from CLI flags with environment fallbacks
//! (see `main.rs`); every struct is also deserializable so embedders can
//! load it from their own config files.

use crate::error::{AdapterError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default LaunchDarkly REST endpoint
pub const LAUNCHDARKLY_API_BASE: &str = "https://app.launchdarkly.com";

/// Default Sentry REST endpoint
pub const SENTRY_API_BASE: &str = "https://sentry.io/api/0/";

/// Domain every Sentry issue URL must belong to
pub const SENTRY_DOMAIN: &str = "sentry.io";

/// Adapter-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// How long the initialization gate waits for the backend
    pub init_timeout_ms: u64,
    /// Readiness probe interval
    pub poll_interval_ms: u64,
    /// Per-request HTTP timeout for backend calls
    pub request_timeout_secs: u64,
    /// Optional bound on cached entries (unbounded when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_max_entries: Option<usize>,
    /// Fallback log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            init_timeout_ms: 10_000,
            poll_interval_ms: 100,
            request_timeout_secs: 30,
            cache_max_entries: None,
            log_level: "info".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Initialization timeout as a `Duration`
    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    /// Probe interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// HTTP request timeout as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reject values that would make the adapter unusable
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(AdapterError::Configuration(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.init_timeout_ms < self.poll_interval_ms {
            return Err(AdapterError::Configuration(format!(
                "init timeout ({}ms) must not be shorter than the poll interval ({}ms)",
                self.init_timeout_ms, self.poll_interval_ms
            )));
        }
        if self.cache_max_entries == Some(0) {
            return Err(AdapterError::Configuration(
                "cache bound must be at least 1 entry".to_string(),
            ));
        }
        Ok(())
    }
}

/// LaunchDarkly connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchDarklyConfig {
    /// API access token
    pub api_key: String,
    /// Environment key (e.g. "production")
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Project key
    #[serde(default = "default_project_key")]
    pub project_key: String,
    /// REST API base URL
    #[serde(default = "default_launchdarkly_base")]
    pub base_url: String,
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_project_key() -> String {
    "default".to_string()
}

fn default_launchdarkly_base() -> String {
    LAUNCHDARKLY_API_BASE.to_string()
}

impl LaunchDarklyConfig {
    /// Config with defaults for everything but the token
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            environment: default_environment(),
            project_key: default_project_key(),
            base_url: default_launchdarkly_base(),
        }
    }

    /// Override the environment
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Override the project key
    pub fn with_project_key(mut self, project_key: impl Into<String>) -> Self {
        self.project_key = project_key.into();
        self
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Check required fields
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(AdapterError::Configuration(
                "LaunchDarkly API key is required (set LAUNCHDARKLY_API_KEY)".to_string(),
            ));
        }
        if self.environment.trim().is_empty() {
            return Err(AdapterError::Configuration(
                "LaunchDarkly environment must not be empty".to_string(),
            ));
        }
        if self.project_key.trim().is_empty() {
            return Err(AdapterError::Configuration(
                "LaunchDarkly project key must not be empty".to_string(),
            ));
        }
        validate_base_url(&self.base_url)
    }
}

/// Sentry connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentryConfig {
    /// Bearer auth token
    pub auth_token: String,
    /// Default organization slug for list operations
    #[serde(default)]
    pub organization: Option<String>,
    /// REST API base URL
    #[serde(default = "default_sentry_base")]
    pub base_url: String,
    /// Domain issue URLs must belong to
    #[serde(default = "default_sentry_domain")]
    pub domain_suffix: String,
}

fn default_sentry_base() -> String {
    SENTRY_API_BASE.to_string()
}

fn default_sentry_domain() -> String {
    SENTRY_DOMAIN.to_string()
}

impl SentryConfig {
    /// Config with defaults for everything but the token
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            organization: None,
            base_url: default_sentry_base(),
            domain_suffix: default_sentry_domain(),
        }
    }

    /// Set the default organization
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Check required fields
    pub fn validate(&self) -> Result<()> {
        if self.auth_token.trim().is_empty() {
            return Err(AdapterError::Configuration(
                "Sentry authentication token not found. \
                 Please specify your Sentry auth token (set SENTRY_TOKEN)"
                    .to_string(),
            ));
        }
        if self.domain_suffix.trim().is_empty() {
            return Err(AdapterError::Configuration(
                "Sentry domain suffix must not be empty".to_string(),
            ));
        }
        validate_base_url(&self.base_url)
    }
}

fn validate_base_url(base_url: &str) -> Result<()> {
    let parsed = url::Url::parse(base_url).map_err(|e| {
        AdapterError::Configuration(format!("Invalid API base URL '{}': {}", base_url, e))
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(AdapterError::Configuration(format!(
            "Unsupported API base URL scheme '{}' in '{}'",
            other, base_url
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::translate::translate;

    #[test]
    fn test_bridge_defaults() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.init_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.poll_interval(), Duration::from_millis(100));
        assert!(cfg.cache_max_entries.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_bridge_rejects_zero_poll_interval() {
        let cfg = BridgeConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bridge_partial_deserialize() {
        let cfg: BridgeConfig = serde_json::from_str(r#"{"initTimeoutMs": 500}"#).unwrap();
        assert_eq!(cfg.init_timeout_ms, 500);
        assert_eq!(cfg.poll_interval_ms, 100);
    }

    #[test]
    fn test_launchdarkly_missing_key_is_configuration_error() {
        let err = LaunchDarklyConfig::new("  ").validate().unwrap_err();
        assert_eq!(translate(&err).kind, ErrorKind::ConfigurationError);
    }

    #[test]
    fn test_launchdarkly_defaults() {
        let cfg: LaunchDarklyConfig = serde_json::from_str(r#"{"apiKey": "api-123"}"#).unwrap();
        assert_eq!(cfg.environment, "production");
        assert_eq!(cfg.project_key, "default");
        assert_eq!(cfg.base_url, LAUNCHDARKLY_API_BASE);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_sentry_rejects_bad_base_url() {
        let cfg = SentryConfig::new("tok").with_base_url("ftp://sentry.example");
        assert!(cfg.validate().is_err());
        let cfg = SentryConfig::new("tok").with_base_url("not a url");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_sentry_missing_token() {
        let err = SentryConfig::new("").validate().unwrap_err();
        assert!(err.to_string().contains("SENTRY_TOKEN"));
    }
}
