//! Issue-tracking tool handlers

use super::{opt_int_arg, opt_str_arg, str_arg, unexpected_entity, ToolContext};
use crate::error::{AdapterError, BackendError, Result};
use crate::issue_id::extract_issue_id_for_domain;
use crate::stacktrace::format_stacktrace;
use crate::types::{
    ContentBlock, Entity, EntityKind, IssueSummary, JsonMap, ListFilters, ToolInvocationResult,
};

/// Stats period used when `duration` is not given
pub const DEFAULT_DURATION: &str = "24h";

/// Resolve an identifier or URL and build the full summary with stacktrace
pub(crate) async fn issue_summary(
    ctx: &ToolContext<'_>,
    issue_id_or_url: &str,
) -> Result<IssueSummary> {
    let issue_id = extract_issue_id_for_domain(issue_id_or_url, ctx.issue_domain)
        .map_err(|e| AdapterError::Validation(e.to_string()))?;

    let issue = match ctx.read_entity(EntityKind::Issue, &issue_id).await? {
        Entity::Issue(issue) => issue,
        other => return Err(unexpected_entity(EntityKind::Issue, &other)),
    };

    let event = match ctx.read_entity(EntityKind::LatestEvent, &issue_id).await? {
        Entity::Event(event) => event,
        other => return Err(unexpected_entity(EntityKind::LatestEvent, &other)),
    };

    let mut summary = IssueSummary::from_issue(&issue).with_stacktrace(format_stacktrace(&event));
    summary.issue_id = issue_id;
    Ok(summary)
}

/// `get-issue`
pub(crate) async fn get_issue(
    ctx: &ToolContext<'_>,
    args: &JsonMap,
) -> Result<ToolInvocationResult> {
    let raw = str_arg(args, "issue_id_or_url")?;
    let summary = issue_summary(ctx, raw).await?;
    Ok(ToolInvocationResult::text(summary.to_text()))
}

/// `list-issues`: one text block per issue
pub(crate) async fn list_issues(
    ctx: &ToolContext<'_>,
    args: &JsonMap,
) -> Result<ToolInvocationResult> {
    let organization = str_arg(args, "organization")?;
    let environment = str_arg(args, "environment")?;

    let project = match opt_str_arg(args, "project") {
        Some(p) => Some(resolve_project(ctx, organization, p).await?),
        None => None,
    };

    let filters = ListFilters::new()
        .with("organization", organization)
        .with("environment", environment)
        .with(
            "statsPeriod",
            opt_str_arg(args, "duration").unwrap_or(DEFAULT_DURATION),
        )
        .with_opt("project", project)
        .with_opt("query", opt_str_arg(args, "query"))
        .with_opt("sort", opt_str_arg(args, "sort"))
        .with_opt("limit", opt_int_arg(args, "limit").map(|l| l.to_string()))
        .with_opt("cursor", opt_str_arg(args, "cursor"));

    let issues = ctx.list_entities(EntityKind::Issue, &filters).await?;

    let mut content = Vec::with_capacity(issues.len());
    for entity in &issues {
        match entity {
            Entity::Issue(issue) => {
                content.push(ContentBlock::Text(IssueSummary::from_issue(issue).to_text()))
            }
            other => return Err(unexpected_entity(EntityKind::Issue, other)),
        }
    }

    tracing::debug!(
        organization = %organization,
        environment = %environment,
        count = content.len(),
        "Issues listed"
    );

    Ok(ToolInvocationResult::new(content))
}

/// Numeric ids pass through; names and slugs are looked up
async fn resolve_project(
    ctx: &ToolContext<'_>,
    organization: &str,
    project: &str,
) -> Result<String> {
    if !project.is_empty() && project.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(project.to_string());
    }

    let filters = ListFilters::new().with("organization", organization);
    let projects = ctx.list_entities(EntityKind::Project, &filters).await?;

    projects
        .iter()
        .find_map(|e| match e {
            Entity::Project(p) if p.matches(project) => Some(p.id.clone()),
            _ => None,
        })
        .ok_or_else(|| {
            AdapterError::backend(
                ctx.backend.name(),
                format!("Failed to resolve project in {}", organization),
                BackendError::not_found(format!("Project '{}' not found", project)),
            )
        })
}
