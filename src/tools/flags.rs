//! Feature-flag tool handlers

use super::{str_arg, unexpected_entity, ToolContext};
use crate::error::{AdapterError, Result};
use crate::types::{Entity, EntityKind, JsonMap, ListFilters, ToolInvocationResult};
use serde_json::Value;

/// `evaluate-flag`: never cached, one backend call per invocation
pub(crate) async fn evaluate_flag(
    ctx: &ToolContext<'_>,
    args: &JsonMap,
) -> Result<ToolInvocationResult> {
    let flag_key = str_arg(args, "flag_key")?;
    let user_key = str_arg(args, "user_key")?;
    let attributes = match args.get("attributes") {
        Some(Value::Object(map)) => map.clone(),
        _ => JsonMap::new(),
    };

    let result = ctx
        .backend
        .evaluate(flag_key, user_key, &attributes)
        .await
        .map_err(|e| {
            AdapterError::backend(
                ctx.backend.name(),
                format!("Failed to evaluate flag {}", flag_key),
                e,
            )
        })?;

    ToolInvocationResult::json(&result)
}

/// `get-flag`
pub(crate) async fn get_flag(
    ctx: &ToolContext<'_>,
    args: &JsonMap,
) -> Result<ToolInvocationResult> {
    let flag_key = str_arg(args, "flag_key")?;
    match ctx.read_entity(EntityKind::Flag, flag_key).await? {
        Entity::Flag(flag) => ToolInvocationResult::json(&flag),
        other => Err(unexpected_entity(EntityKind::Flag, &other)),
    }
}

/// `list-flags`
pub(crate) async fn list_flags(
    ctx: &ToolContext<'_>,
    _args: &JsonMap,
) -> Result<ToolInvocationResult> {
    list_as_json(ctx, EntityKind::Flag).await
}

/// `get-segment`
pub(crate) async fn get_segment(
    ctx: &ToolContext<'_>,
    args: &JsonMap,
) -> Result<ToolInvocationResult> {
    let segment_key = str_arg(args, "segment_key")?;
    match ctx.read_entity(EntityKind::Segment, segment_key).await? {
        Entity::Segment(segment) => ToolInvocationResult::json(&segment),
        other => Err(unexpected_entity(EntityKind::Segment, &other)),
    }
}

/// `list-segments`
pub(crate) async fn list_segments(
    ctx: &ToolContext<'_>,
    _args: &JsonMap,
) -> Result<ToolInvocationResult> {
    list_as_json(ctx, EntityKind::Segment).await
}

async fn list_as_json(ctx: &ToolContext<'_>, kind: EntityKind) -> Result<ToolInvocationResult> {
    let entities = ctx.list_entities(kind, &ListFilters::new()).await?;

    if let Some(other) = entities.iter().find(|e| e.kind() != kind) {
        return Err(unexpected_entity(kind, other));
    }

    let items: Vec<Value> = entities.iter().map(Entity::to_json).collect();
    ToolInvocationResult::json(&items)
}
