//! Sentry issue-tracking backend
//!
//! Implements `Backend` over the Sentry REST API. The API is stateless, so
//! the readiness probe reports ready without a round trip.

mod client;

pub use client::SentryClient;

use crate::config::SentryConfig;
use crate::error::{BackendResult, Result};
use crate::provider::{unsupported_kind, Backend, Platform};
use crate::types::{Entity, EntityKind, ListFilters};
use async_trait::async_trait;
use std::time::Duration;

/// Sentry backend
pub struct SentryBackend {
    client: SentryClient,
}

impl SentryBackend {
    /// Create the backend
    pub fn new(config: SentryConfig, request_timeout: Duration) -> Result<Self> {
        let client = SentryClient::new(config, request_timeout)?;
        Ok(Self { client })
    }

    /// Get the underlying client for advanced usage
    pub fn client(&self) -> &SentryClient {
        &self.client
    }
}

#[async_trait]
impl Backend for SentryBackend {
    fn name(&self) -> &str {
        "sentry"
    }

    fn platform(&self) -> Platform {
        Platform::IssueTracking
    }

    async fn is_ready(&self) -> BackendResult<bool> {
        Ok(true)
    }

    async fn fetch_entity(&self, kind: EntityKind, key: &str) -> BackendResult<Entity> {
        match kind {
            EntityKind::Issue => self.client.get_issue(key).await.map(Entity::Issue),
            EntityKind::LatestEvent => self.client.get_latest_event(key).await.map(Entity::Event),
            other => Err(unsupported_kind(self.name(), "fetch", other)),
        }
    }

    async fn list_entities(
        &self,
        kind: EntityKind,
        filters: &ListFilters,
    ) -> BackendResult<Vec<Entity>> {
        match kind {
            EntityKind::Issue => Ok(self
                .client
                .list_issues(filters)
                .await?
                .into_iter()
                .map(Entity::Issue)
                .collect()),
            EntityKind::Project => Ok(self
                .client
                .list_projects(filters)
                .await?
                .into_iter()
                .map(Entity::Project)
                .collect()),
            other => Err(unsupported_kind(self.name(), "list", other)),
        }
    }
}
