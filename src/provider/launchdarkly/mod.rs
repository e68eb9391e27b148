//! LaunchDarkly feature-flag backend
//!
//! Implements `Backend` over the LaunchDarkly REST API v2. Serves flags and
//! segments, evaluates flags for a user context.

mod client;

pub use client::LaunchDarklyClient;

use crate::config::LaunchDarklyConfig;
use crate::error::{BackendResult, Result};
use crate::provider::{unsupported_kind, Backend, Platform};
use crate::types::{Entity, EntityKind, EvaluationResult, JsonMap, ListFilters};
use async_trait::async_trait;
use std::time::Duration;

/// LaunchDarkly backend
///
/// Wraps `LaunchDarklyClient` and implements the `Backend` trait.
pub struct LaunchDarklyBackend {
    client: LaunchDarklyClient,
}

impl LaunchDarklyBackend {
    /// Create the backend; no request is sent until the first probe
    pub fn new(config: LaunchDarklyConfig, request_timeout: Duration) -> Result<Self> {
        let client = LaunchDarklyClient::new(config, request_timeout)?;
        Ok(Self { client })
    }

    /// Get the underlying client for advanced usage
    pub fn client(&self) -> &LaunchDarklyClient {
        &self.client
    }
}

#[async_trait]
impl Backend for LaunchDarklyBackend {
    fn name(&self) -> &str {
        "launchdarkly"
    }

    fn platform(&self) -> Platform {
        Platform::FeatureFlags
    }

    async fn is_ready(&self) -> BackendResult<bool> {
        self.client.check_environment().await
    }

    async fn fetch_entity(&self, kind: EntityKind, key: &str) -> BackendResult<Entity> {
        match kind {
            EntityKind::Flag => self.client.get_flag(key).await.map(Entity::Flag),
            EntityKind::Segment => self.client.get_segment(key).await.map(Entity::Segment),
            other => Err(unsupported_kind(self.name(), "fetch", other)),
        }
    }

    async fn list_entities(
        &self,
        kind: EntityKind,
        _filters: &ListFilters,
    ) -> BackendResult<Vec<Entity>> {
        match kind {
            EntityKind::Flag => Ok(self
                .client
                .list_flags()
                .await?
                .into_iter()
                .map(Entity::Flag)
                .collect()),
            EntityKind::Segment => Ok(self
                .client
                .list_segments()
                .await?
                .into_iter()
                .map(Entity::Segment)
                .collect()),
            other => Err(unsupported_kind(self.name(), "list", other)),
        }
    }

    async fn evaluate(
        &self,
        flag_key: &str,
        subject: &str,
        attributes: &JsonMap,
    ) -> BackendResult<EvaluationResult> {
        self.client.evaluate(flag_key, subject, attributes).await
    }

    async fn close(&self) {
        tracing::info!(
            project = %self.client.config().project_key,
            "LaunchDarkly client closed"
        );
    }
}
