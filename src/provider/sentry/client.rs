//! Sentry REST client: issues, latest events, projects

use crate::config::SentryConfig;
use crate::error::{AdapterError, BackendError, BackendResult, Result};
use crate::provider::error_for_status;
use crate::types::{EventRecord, Issue, ListFilters, Project};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("a3s-bridge/", env!("CARGO_PKG_VERSION"));

/// Filter keys that select the organization rather than a query parameter
const ORGANIZATION_FILTER: &str = "organization";

/// Sentry REST API client using a bearer token
pub struct SentryClient {
    http: reqwest::Client,
    base_url: Url,
    config: Arc<SentryConfig>,
}

impl SentryClient {
    /// Build a client; fails on invalid configuration
    pub fn new(config: SentryConfig, request_timeout: Duration) -> Result<Self> {
        config.validate()?;

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| AdapterError::Configuration(format!("Invalid Sentry base URL: {}", e)))?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| {
                AdapterError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        tracing::info!(
            base_url = %base_url,
            organization = ?config.organization,
            "Sentry client created"
        );

        Ok(Self {
            http,
            base_url,
            config: Arc::new(config),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &SentryConfig {
        &self.config
    }

    /// Get one issue
    pub async fn get_issue(&self, issue_id: &str) -> BackendResult<Issue> {
        let url = self.endpoint(&["issues", issue_id])?;
        self.get_json(url).await
    }

    /// Latest event of an issue, taken from its first hash
    pub async fn get_latest_event(&self, issue_id: &str) -> BackendResult<EventRecord> {
        let url = self.endpoint(&["issues", issue_id, "hashes"])?;
        let hashes: Vec<IssueHash> = self.get_json(url).await?;

        hashes
            .into_iter()
            .next()
            .map(|h| h.latest_event)
            .ok_or_else(|| BackendError::not_found("No Sentry events found for this issue"))
    }

    /// List issues of an organization
    ///
    /// Every filter except `organization` is sent as a query parameter.
    pub async fn list_issues(&self, filters: &ListFilters) -> BackendResult<Vec<Issue>> {
        let organization = self.organization(filters)?;
        let mut url = self.endpoint(&["organizations", organization, "issues"])?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in filters.iter().filter(|(k, _)| *k != ORGANIZATION_FILTER) {
                query.append_pair(key, value);
            }
        }
        self.get_json(url).await
    }

    /// List projects of an organization
    pub async fn list_projects(&self, filters: &ListFilters) -> BackendResult<Vec<Project>> {
        let organization = self.organization(filters)?;
        let url = self.endpoint(&["organizations", organization, "projects"])?;
        self.get_json(url).await
    }

    fn organization<'a>(&'a self, filters: &'a ListFilters) -> BackendResult<&'a str> {
        filters
            .get(ORGANIZATION_FILTER)
            .or(self.config.organization.as_deref())
            .ok_or_else(|| BackendError::Unsupported {
                backend: "sentry".to_string(),
                operation: "listing without an organization".to_string(),
            })
    }

    /// Endpoint URL with a trailing slash, as the Sentry API expects
    fn endpoint(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                BackendError::Transport(format!("{} cannot be used as a base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments)
            .push("");
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> BackendResult<T> {
        tracing::debug!(url = %url, "GET");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.config.auth_token)
            .send()
            .await?;
        let response = error_for_status(response).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueHash {
    #[serde(default)]
    latest_event: EventRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SentryClient {
        SentryClient::new(
            SentryConfig::new("tok").with_organization("acme"),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_keeps_api_prefix_and_trailing_slash() {
        let c = client();
        assert_eq!(
            c.endpoint(&["issues", "42"]).unwrap().as_str(),
            "https://sentry.io/api/0/issues/42/"
        );
        assert_eq!(
            c.endpoint(&["issues", "42", "hashes"]).unwrap().as_str(),
            "https://sentry.io/api/0/issues/42/hashes/"
        );
    }

    #[test]
    fn test_organization_falls_back_to_config() {
        let c = client();
        assert_eq!(c.organization(&ListFilters::new()).unwrap(), "acme");
        let filters = ListFilters::new().with("organization", "other");
        assert_eq!(c.organization(&filters).unwrap(), "other");
    }

    #[test]
    fn test_organization_required() {
        let c = SentryClient::new(SentryConfig::new("tok"), Duration::from_secs(5)).unwrap();
        assert!(c.organization(&ListFilters::new()).is_err());
    }

    #[test]
    fn test_issue_hash_decodes_latest_event() {
        let hashes: Vec<IssueHash> = serde_json::from_value(serde_json::json!([{
            "id": "abc",
            "latestEvent": {
                "eventID": "e1",
                "entries": [{ "type": "exception", "data": { "values": [] } }]
            }
        }]))
        .unwrap();
        assert_eq!(hashes[0].latest_event.event_id.as_deref(), Some("e1"));
        assert_eq!(hashes[0].latest_event.entries.len(), 1);
    }

    #[test]
    fn test_new_rejects_missing_token() {
        let result = SentryClient::new(SentryConfig::new(""), Duration::from_secs(1));
        assert!(matches!(result, Err(AdapterError::Configuration(_))));
    }
}
