//! Backend trait: the core abstraction for platform clients
//!
//! Every platform (LaunchDarkly, Sentry, in-memory) implements `Backend`
//! so the dispatcher, cache and initialization gate never depend on a
//! concrete client.

use crate::error::{BackendError, BackendResult};
use crate::types::{Entity, EntityKind, EvaluationResult, JsonMap, ListFilters};
use async_trait::async_trait;

pub mod launchdarkly;
pub mod memory;
pub mod sentry;

/// Which family of tools a backend serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Feature-flag management
    FeatureFlags,
    /// Issue tracking
    IssueTracking,
}

impl Platform {
    /// Name used in logs and server info
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FeatureFlags => "feature-flags",
            Self::IssueTracking => "issue-tracking",
        }
    }
}

/// Core trait for platform clients
///
/// Implementations perform the network I/O and authentication. Errors are
/// reported as raw `BackendError`s; classification happens in
/// [`crate::translate`].
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend name (e.g. "launchdarkly", "sentry", "memory")
    fn name(&self) -> &str;

    /// Tool family this backend serves
    fn platform(&self) -> Platform;

    /// Readiness probe, polled by the initialization gate
    async fn is_ready(&self) -> BackendResult<bool>;

    /// Fetch one entity by key
    async fn fetch_entity(&self, kind: EntityKind, key: &str) -> BackendResult<Entity>;

    /// List entities of a kind
    async fn list_entities(&self, kind: EntityKind, filters: &ListFilters)
        -> BackendResult<Vec<Entity>>;

    /// Evaluate a flag for a subject
    ///
    /// Default implementation reports the operation as unsupported.
    async fn evaluate(
        &self,
        _flag_key: &str,
        _subject: &str,
        _attributes: &JsonMap,
    ) -> BackendResult<EvaluationResult> {
        Err(BackendError::Unsupported {
            backend: self.name().to_string(),
            operation: "evaluate".to_string(),
        })
    }

    /// Release backend resources
    async fn close(&self) {}
}

/// Error for an entity kind the backend does not serve
pub(crate) fn unsupported_kind(backend: &str, op: &str, kind: EntityKind) -> BackendError {
    BackendError::Unsupported {
        backend: backend.to_string(),
        operation: format!("{} {}", op, kind.singular()),
    }
}

/// Map a non-success HTTP response to a `BackendError`
pub(crate) async fn error_for_status(
    response: reqwest::Response,
) -> BackendResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    let detail = extract_error_detail(&body).unwrap_or(body);
    Err(BackendError::status(
        status.as_u16(),
        if detail.is_empty() {
            format!("{} returned {}", url, status)
        } else {
            format!("{} returned {}: {}", url, status, detail)
        },
    ))
}

/// Pull a readable message out of a JSON error body
fn extract_error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "detail"]
        .iter()
        .find_map(|k| value.get(*k).and_then(|v| v.as_str()))
        .map(str::to_string)
}
