//! Command-line interface
//!
//! One subcommand per backend. Credentials fall back to the environment
//! variables each platform documents.

use crate::config::{
    BridgeConfig, LaunchDarklyConfig, SentryConfig, LAUNCHDARKLY_API_BASE, SENTRY_API_BASE,
    SENTRY_DOMAIN,
};
use crate::error::Result;
use crate::provider::launchdarkly::LaunchDarklyBackend;
use crate::provider::memory::MemoryBackend;
use crate::provider::sentry::SentryBackend;
use crate::provider::Backend;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::sync::Arc;

/// A3S Bridge - feature flags and issue tracking as MCP tools
#[derive(Debug, Parser)]
#[command(name = "a3s-bridge", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub options: GlobalOptions,

    #[command(subcommand)]
    pub command: Commands,
}

/// Settings shared by every backend
#[derive(Debug, Args)]
pub struct GlobalOptions {
    /// Milliseconds to wait for the backend to become ready
    #[arg(long, global = true, default_value_t = 10_000)]
    pub init_timeout_ms: u64,

    /// Readiness probe interval in milliseconds
    #[arg(long, global = true, default_value_t = 100)]
    pub poll_interval_ms: u64,

    /// Per-request HTTP timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Maximum number of cached reads (unbounded when omitted)
    #[arg(long, global = true)]
    pub cache_max_entries: Option<usize>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

impl GlobalOptions {
    /// Adapter configuration from the flags
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            init_timeout_ms: self.init_timeout_ms,
            poll_interval_ms: self.poll_interval_ms,
            request_timeout_secs: self.request_timeout_secs,
            cache_max_entries: self.cache_max_entries,
            log_level: self.log_level.clone(),
        }
    }
}

/// Available backends
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve LaunchDarkly flags and segments
    Launchdarkly {
        /// API access token
        #[arg(long, env = "LAUNCHDARKLY_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Environment key
        #[arg(long, env = "LAUNCHDARKLY_ENVIRONMENT", default_value = "production")]
        environment: String,

        /// Project key
        #[arg(long, env = "LAUNCHDARKLY_PROJECT_KEY", default_value = "default")]
        project_key: String,

        /// REST API base URL
        #[arg(long, default_value = LAUNCHDARKLY_API_BASE)]
        base_url: String,
    },

    /// Serve Sentry issues
    Sentry {
        /// Authentication token
        #[arg(long, env = "SENTRY_TOKEN", hide_env_values = true)]
        auth_token: Option<String>,

        /// Default organization slug
        #[arg(long, env = "SENTRY_ORGANIZATION")]
        organization: Option<String>,

        /// REST API base URL
        #[arg(long, default_value = SENTRY_API_BASE)]
        base_url: String,

        /// Domain issue URLs must belong to
        #[arg(long, default_value = SENTRY_DOMAIN)]
        domain: String,
    },

    /// Serve seeded in-memory data
    Memory {
        /// Tool family to serve
        #[arg(long, value_enum, default_value_t = MemoryPlatform::Flags)]
        platform: MemoryPlatform,
    },
}

/// Tool family for the memory backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MemoryPlatform {
    /// Feature-flag tools
    Flags,
    /// Issue-tracking tools
    Issues,
}

impl Commands {
    /// Build the selected backend, validating its configuration
    pub fn build_backend(&self, config: &BridgeConfig) -> Result<Arc<dyn Backend>> {
        let backend: Arc<dyn Backend> = match self {
            Self::Launchdarkly {
                api_key,
                environment,
                project_key,
                base_url,
            } => {
                let ld = LaunchDarklyConfig::new(api_key.clone().unwrap_or_default())
                    .with_environment(environment)
                    .with_project_key(project_key)
                    .with_base_url(base_url);
                Arc::new(LaunchDarklyBackend::new(ld, config.request_timeout())?)
            }
            Self::Sentry {
                auth_token,
                organization,
                base_url,
                domain,
            } => {
                let mut sentry = SentryConfig::new(auth_token.clone().unwrap_or_default())
                    .with_base_url(base_url);
                sentry.organization = organization.clone();
                sentry.domain_suffix = domain.clone();
                Arc::new(SentryBackend::new(sentry, config.request_timeout())?)
            }
            Self::Memory { platform } => Arc::new(match platform {
                MemoryPlatform::Flags => MemoryBackend::feature_flags_demo(),
                MemoryPlatform::Issues => MemoryBackend::issue_tracking_demo(),
            }),
        };
        Ok(backend)
    }

    /// Domain issue URLs must belong to
    pub fn issue_domain(&self) -> &str {
        match self {
            Self::Sentry { domain, .. } => domain,
            _ => SENTRY_DOMAIN,
        }
    }
}
