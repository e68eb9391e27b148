//! LaunchDarkly REST client: flags, segments, evaluation

use crate::config::LaunchDarklyConfig;
use crate::error::{AdapterError, BackendError, BackendResult, Result};
use crate::provider::error_for_status;
use crate::types::{EvaluationResult, FeatureFlag, FlagVariation, JsonMap, Segment};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("a3s-bridge/", env!("CARGO_PKG_VERSION"));

/// LaunchDarkly REST API client
///
/// Every request carries the access token in the `Authorization` header
/// and is scoped to the configured project and environment.
pub struct LaunchDarklyClient {
    http: reqwest::Client,
    base_url: Url,
    config: Arc<LaunchDarklyConfig>,
}

impl LaunchDarklyClient {
    /// Build a client; fails on invalid configuration
    pub fn new(config: LaunchDarklyConfig, request_timeout: Duration) -> Result<Self> {
        config.validate()?;

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            AdapterError::Configuration(format!("Invalid LaunchDarkly base URL: {}", e))
        })?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| {
                AdapterError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        tracing::info!(
            base_url = %base_url,
            project = %config.project_key,
            environment = %config.environment,
            "LaunchDarkly client created"
        );

        Ok(Self {
            http,
            base_url,
            config: Arc::new(config),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &LaunchDarklyConfig {
        &self.config
    }

    /// Get one flag with its state in the configured environment
    pub async fn get_flag(&self, flag_key: &str) -> BackendResult<FeatureFlag> {
        let url = self.flags_url(Some(flag_key))?;
        let raw: RawFlag = self.get_json(url).await?;
        Ok(raw.into_flag(&self.config.environment))
    }

    /// List all flags of the project
    pub async fn list_flags(&self) -> BackendResult<Vec<FeatureFlag>> {
        let url = self.flags_url(None)?;
        let raw: Items<RawFlag> = self.get_json(url).await?;
        Ok(raw
            .items
            .into_iter()
            .map(|f| f.into_flag(&self.config.environment))
            .collect())
    }

    /// Get one segment of the configured environment
    pub async fn get_segment(&self, segment_key: &str) -> BackendResult<Segment> {
        let url = self.endpoint(&[
            "api",
            "v2",
            "segments",
            &self.config.project_key,
            &self.config.environment,
            segment_key,
        ])?;
        let raw: RawSegment = self.get_json(url).await?;
        Ok(raw.into())
    }

    /// List all segments of the configured environment
    pub async fn list_segments(&self) -> BackendResult<Vec<Segment>> {
        let url = self.endpoint(&[
            "api",
            "v2",
            "segments",
            &self.config.project_key,
            &self.config.environment,
        ])?;
        let raw: Items<RawSegment> = self.get_json(url).await?;
        Ok(raw.items.into_iter().map(Into::into).collect())
    }

    /// Evaluate a flag for a user context
    pub async fn evaluate(
        &self,
        flag_key: &str,
        user_key: &str,
        attributes: &JsonMap,
    ) -> BackendResult<EvaluationResult> {
        let url = self.environment_url(&["flags", "evaluate"])?;

        let mut context = attributes.clone();
        context.insert("kind".to_string(), "user".into());
        context.insert("key".to_string(), user_key.into());

        let response = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, &self.config.api_key)
            .json(&serde_json::Value::Object(context))
            .send()
            .await?;
        let response = error_for_status(response).await?;
        let raw: Items<RawEvaluation> = decode(response).await?;

        let result = evaluation_for(raw.items, flag_key)?;

        tracing::debug!(
            flag_key = %flag_key,
            user_key = %user_key,
            variation = ?result.variation_index,
            "Flag evaluated"
        );

        Ok(result)
    }

    /// Readiness probe: the configured project environment is reachable
    pub async fn check_environment(&self) -> BackendResult<bool> {
        let url = self.environment_url(&[])?;
        let response = self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, &self.config.api_key)
            .send()
            .await?;
        error_for_status(response).await?;
        Ok(true)
    }

    fn flags_url(&self, flag_key: Option<&str>) -> BackendResult<Url> {
        let mut segments = vec!["api", "v2", "flags", self.config.project_key.as_str()];
        segments.extend(flag_key);
        let mut url = self.endpoint(&segments)?;
        url.query_pairs_mut()
            .append_pair("env", &self.config.environment);
        Ok(url)
    }

    fn environment_url(&self, tail: &[&str]) -> BackendResult<Url> {
        let mut segments = vec![
            "api",
            "v2",
            "projects",
            self.config.project_key.as_str(),
            "environments",
            self.config.environment.as_str(),
        ];
        segments.extend_from_slice(tail);
        self.endpoint(&segments)
    }

    fn endpoint(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                BackendError::Transport(format!("{} cannot be used as a base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> BackendResult<T> {
        tracing::debug!(url = %url, "GET");
        let response = self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, &self.config.api_key)
            .send()
            .await?;
        let response = error_for_status(response).await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> BackendResult<T> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| BackendError::Decode(e.to_string()))
}

/// Millisecond epoch timestamps become RFC 3339 strings
fn millis_to_rfc3339(millis: Option<i64>) -> Option<String> {
    millis
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| t.to_rfc3339())
}

#[derive(Debug, Deserialize)]
struct Items<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFlag {
    key: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    variations: Vec<FlagVariation>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    creation_date: Option<i64>,
    #[serde(default)]
    environments: HashMap<String, RawFlagEnvironment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFlagEnvironment {
    #[serde(default)]
    on: bool,
    #[serde(default)]
    last_modified: Option<i64>,
}

impl RawFlag {
    fn into_flag(self, environment: &str) -> FeatureFlag {
        let env = self.environments.get(environment);
        FeatureFlag {
            key: self.key,
            name: self.name,
            description: self.description,
            variations: self.variations,
            tags: self.tags,
            is_enabled: env.is_some_and(|e| e.on),
            created_at: millis_to_rfc3339(self.creation_date),
            updated_at: millis_to_rfc3339(env.and_then(|e| e.last_modified)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSegment {
    key: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    included: Vec<String>,
    #[serde(default)]
    excluded: Vec<String>,
    #[serde(default)]
    rules: Vec<serde_json::Value>,
    #[serde(default)]
    creation_date: Option<i64>,
    #[serde(default)]
    last_modified_date: Option<i64>,
}

impl From<RawSegment> for Segment {
    fn from(raw: RawSegment) -> Self {
        Self {
            key: raw.key,
            name: raw.name,
            description: raw.description,
            included: raw.included,
            excluded: raw.excluded,
            rules: raw.rules,
            created_at: millis_to_rfc3339(raw.creation_date),
            updated_at: millis_to_rfc3339(raw.last_modified_date),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvaluation {
    key: String,
    #[serde(default, rename = "_value")]
    value: serde_json::Value,
    #[serde(default)]
    variation_index: Option<i64>,
    #[serde(default)]
    reason: Option<JsonMap>,
}

/// Pick the item evaluated for `flag_key` out of an evaluate response
fn evaluation_for(items: Vec<RawEvaluation>, flag_key: &str) -> BackendResult<EvaluationResult> {
    let item = items
        .into_iter()
        .find(|item| item.key == flag_key)
        .ok_or_else(|| BackendError::not_found(format!("Flag {} not found", flag_key)))?;

    Ok(EvaluationResult {
        flag_key: item.key,
        value: item.value,
        variation_index: item.variation_index,
        reason: item.reason,
    })
}
