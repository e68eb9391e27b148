//! Tool dispatcher: the adapter's entry point
//!
//! `dispatch` resolves the tool, validates arguments, waits on the
//! initialization gate, runs the handler and folds any failure into an
//! `ErrorEnvelope`. Errors never escape as anything else.

use crate::cache::{CacheStats, ResponseCache};
use crate::config::SENTRY_DOMAIN;
use crate::error::{AdapterError, ErrorEnvelope, Result};
use crate::gate::InitGate;
use crate::provider::{Backend, Platform};
use crate::tools::{self, flags, issues, Tool, ToolContext, ToolDescriptor};
use crate::translate::translate;
use crate::types::{IssueSummary, ToolInvocationRequest, ToolInvocationResult};
use std::sync::Arc;
use tracing::Instrument;

/// Routes tool invocations to their handlers
pub struct Dispatcher {
    backend: Arc<dyn Backend>,
    cache: Arc<ResponseCache>,
    gate: Arc<InitGate>,
    issue_domain: String,
}

impl Dispatcher {
    /// Create a dispatcher serving the backend's platform
    pub fn new(backend: Arc<dyn Backend>, cache: Arc<ResponseCache>, gate: Arc<InitGate>) -> Self {
        Self {
            backend,
            cache,
            gate,
            issue_domain: SENTRY_DOMAIN.to_string(),
        }
    }

    /// Domain issue URLs must belong to
    pub fn with_issue_domain(mut self, domain: impl Into<String>) -> Self {
        self.issue_domain = domain.into();
        self
    }

    /// Platform served
    pub fn platform(&self) -> Platform {
        self.backend.platform()
    }

    /// Backend name
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Descriptors of every tool this dispatcher accepts
    pub fn tools(&self) -> Vec<&'static ToolDescriptor> {
        tools::catalog(self.platform())
    }

    /// Initialization gate
    pub fn gate(&self) -> &InitGate {
        &self.gate
    }

    /// Drop every cached read
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Cache counters
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Handle one tool invocation
    pub async fn dispatch(
        &self,
        request: ToolInvocationRequest,
    ) -> std::result::Result<ToolInvocationResult, ErrorEnvelope> {
        let span = tracing::info_span!(
            "dispatch",
            tool = %request.name,
            request_id = %uuid::Uuid::new_v4(),
            backend = self.backend.name(),
        );

        async {
            match self.run(&request).await {
                Ok(result) => {
                    tracing::debug!(blocks = result.content().len(), "Tool succeeded");
                    Ok(result)
                }
                Err(err) => {
                    let envelope = translate(&err);
                    tracing::warn!(kind = %envelope.kind, error = %envelope.message, "Tool failed");
                    Err(envelope)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Full issue summary for the `sentry-issue` prompt
    pub async fn issue_summary(
        &self,
        issue_id_or_url: &str,
    ) -> std::result::Result<IssueSummary, ErrorEnvelope> {
        let result = async {
            if self.platform() != Platform::IssueTracking {
                return Err(AdapterError::UnknownTool("sentry-issue".to_string()));
            }
            self.gate.await_ready().await?;
            issues::issue_summary(&self.context(), issue_id_or_url).await
        }
        .await;
        result.map_err(|e| translate(&e))
    }

    async fn run(&self, request: &ToolInvocationRequest) -> Result<ToolInvocationResult> {
        let tool = Tool::lookup(self.platform(), &request.name)
            .ok_or_else(|| AdapterError::UnknownTool(request.name.clone()))?;

        tool.descriptor().validate(&request.arguments)?;

        self.gate.await_ready().await?;

        let ctx = self.context();
        let args = &request.arguments;
        match tool {
            Tool::EvaluateFlag => flags::evaluate_flag(&ctx, args).await,
            Tool::GetFlag => flags::get_flag(&ctx, args).await,
            Tool::ListFlags => flags::list_flags(&ctx, args).await,
            Tool::GetSegment => flags::get_segment(&ctx, args).await,
            Tool::ListSegments => flags::list_segments(&ctx, args).await,
            Tool::GetIssue => issues::get_issue(&ctx, args).await,
            Tool::ListIssues => issues::list_issues(&ctx, args).await,
        }
    }

    fn context(&self) -> ToolContext<'_> {
        ToolContext {
            backend: self.backend.as_ref(),
            cache: &self.cache,
            issue_domain: &self.issue_domain,
        }
    }
}
