//! # a3s-bridge
//!
//! Feature-flag management (LaunchDarkly) and issue tracking (Sentry)
//! exposed as MCP tools.
//!
//! ## Overview
//!
//! A caller submits a named tool invocation with structured arguments and
//! receives content blocks or a typed error. The adapter gates backend
//! readiness, validates arguments, memoizes idempotent reads and folds
//! every backend failure into a small error taxonomy.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_bridge::{Dispatcher, InitGate, ResponseCache, ToolInvocationRequest};
//! use a3s_bridge::provider::memory::MemoryBackend;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), a3s_bridge::ErrorEnvelope> {
//! let backend = Arc::new(MemoryBackend::feature_flags_demo());
//! let gate = Arc::new(InitGate::new(backend.clone(), Duration::from_secs(10)));
//! let dispatcher = Dispatcher::new(backend, Arc::new(ResponseCache::new()), gate);
//!
//! let result = dispatcher
//!     .dispatch(ToolInvocationRequest::from_value(
//!         "get-flag",
//!         serde_json::json!({ "flag_key": "checkout-v2" }),
//!     ))
//!     .await?;
//! println!("{}", result.joined_text());
//! # Ok(())
//! # }
//! ```
//!
//! ## Backends
//!
//! - **launchdarkly**: flags, segments and evaluation over the REST API
//! - **sentry**: issues, latest events and projects over the REST API
//! - **memory**: seeded in-process data for tests and local runs
//!
//! ## Architecture
//!
//! - **Backend** trait: core abstraction every platform client implements
//! - **InitGate**: single coordinated readiness wait with a timeout
//! - **ResponseCache**: read-through memoization of flag and segment reads
//! - **Dispatcher**: tool lookup, validation and error translation
//! - **McpServer**: line-delimited JSON-RPC over stdio

pub mod cache;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod issue_id;
pub mod provider;
pub mod server;
pub mod stacktrace;
pub mod tools;
pub mod translate;
pub mod types;

// Re-export core types
pub use cache::{CacheStats, CachedValue, ResponseCache};
pub use config::{BridgeConfig, LaunchDarklyConfig, SentryConfig};
pub use dispatcher::Dispatcher;
pub use error::{AdapterError, BackendError, ErrorEnvelope, ErrorKind, Result};
pub use gate::{ClientState, InitGate};
pub use issue_id::{extract_issue_id, extract_issue_id_for_domain, IdentifierError};
pub use provider::{Backend, Platform};
pub use server::McpServer;
pub use stacktrace::format_stacktrace;
pub use tools::{ArgSpec, ArgType, Tool, ToolDescriptor};
pub use translate::translate;
pub use types::{
    ContentBlock, Entity, EntityKind, EvaluationResult, IssueSummary, ToolInvocationRequest,
    ToolInvocationResult,
};

// Re-export providers for convenience
pub use provider::launchdarkly::{LaunchDarklyBackend, LaunchDarklyClient};
pub use provider::memory::MemoryBackend;
pub use provider::sentry::{SentryBackend, SentryClient};
