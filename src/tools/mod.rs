//! Tool catalog and handlers
//!
//! Each tool has a static `ToolDescriptor` describing its arguments; the
//! dispatcher validates requests against it before the handler in
//! [`flags`] or [`issues`] runs.

pub mod flags;
pub mod issues;

use crate::cache::{entity_key, list_key, CachedValue, ResponseCache};
use crate::error::{AdapterError, Result};
use crate::provider::{Backend, Platform};
use crate::types::{Entity, EntityKind, JsonMap, ListFilters};
use serde_json::{json, Value};
use std::collections::BTreeSet;

/// JSON type an argument must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    /// JSON string
    String,
    /// JSON integer
    Integer,
    /// JSON object
    Object,
}

impl ArgType {
    /// JSON Schema type name
    pub fn schema_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Object => "object",
        }
    }

    /// Whether `value` has this type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Object => value.is_object(),
        }
    }
}

/// One declared argument of a tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    /// Argument name
    pub name: &'static str,
    /// Expected JSON type
    pub arg_type: ArgType,
    /// Whether the caller must supply it
    pub required: bool,
    /// Shown to the caller in `tools/list`
    pub description: &'static str,
}

const fn required(name: &'static str, arg_type: ArgType, description: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        arg_type,
        required: true,
        description,
    }
}

const fn optional(name: &'static str, arg_type: ArgType, description: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        arg_type,
        required: false,
        description,
    }
}

/// Static description of a tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    /// Wire name
    pub name: &'static str,
    /// Human description
    pub description: &'static str,
    /// Platform the tool belongs to
    pub platform: Platform,
    /// Declared arguments
    pub args: &'static [ArgSpec],
}

impl ToolDescriptor {
    /// Names of required arguments
    pub fn required_arg_names(&self) -> BTreeSet<&'static str> {
        self.args.iter().filter(|a| a.required).map(|a| a.name).collect()
    }

    /// Names of optional arguments
    pub fn optional_arg_names(&self) -> BTreeSet<&'static str> {
        self.args.iter().filter(|a| !a.required).map(|a| a.name).collect()
    }

    /// Check presence and types of the supplied arguments
    ///
    /// `null` counts as absent. Undeclared arguments are ignored.
    pub fn validate(&self, arguments: &JsonMap) -> Result<()> {
        let missing: Vec<String> = self
            .args
            .iter()
            .filter(|a| a.required && arguments.get(a.name).map_or(true, Value::is_null))
            .map(|a| a.name.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(AdapterError::MissingArguments {
                tool: self.name.to_string(),
                missing,
            });
        }

        for spec in self.args {
            match arguments.get(spec.name) {
                Some(value) if !value.is_null() && !spec.arg_type.matches(value) => {
                    return Err(AdapterError::InvalidArgument {
                        name: spec.name.to_string(),
                        reason: format!("expected {}", spec.arg_type.schema_type()),
                    });
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// JSON Schema for `tools/list`
    pub fn input_schema(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .args
            .iter()
            .map(|a| {
                (
                    a.name.to_string(),
                    json!({ "type": a.arg_type.schema_type(), "description": a.description }),
                )
            })
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": self.args.iter().filter(|a| a.required).map(|a| a.name).collect::<Vec<_>>(),
        })
    }
}

/// Every supported tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    EvaluateFlag,
    GetFlag,
    ListFlags,
    GetSegment,
    ListSegments,
    GetIssue,
    ListIssues,
}

impl Tool {
    /// All tools in catalog order
    pub const ALL: [Tool; 7] = [
        Tool::EvaluateFlag,
        Tool::GetFlag,
        Tool::ListFlags,
        Tool::GetSegment,
        Tool::ListSegments,
        Tool::GetIssue,
        Tool::ListIssues,
    ];

    /// Static descriptor
    pub fn descriptor(&self) -> &'static ToolDescriptor {
        match self {
            Self::EvaluateFlag => &EVALUATE_FLAG,
            Self::GetFlag => &GET_FLAG,
            Self::ListFlags => &LIST_FLAGS,
            Self::GetSegment => &GET_SEGMENT,
            Self::ListSegments => &LIST_SEGMENTS,
            Self::GetIssue => &GET_ISSUE,
            Self::ListIssues => &LIST_ISSUES,
        }
    }

    /// Wire name
    pub fn name(&self) -> &'static str {
        self.descriptor().name
    }

    /// Look up a tool of `platform` by wire name
    pub fn lookup(platform: Platform, name: &str) -> Option<Tool> {
        Self::ALL
            .into_iter()
            .find(|t| t.descriptor().platform == platform && t.name() == name)
    }
}

/// Descriptors served for a platform, in catalog order
pub fn catalog(platform: Platform) -> Vec<&'static ToolDescriptor> {
    Tool::ALL
        .iter()
        .map(Tool::descriptor)
        .filter(|d| d.platform == platform)
        .collect()
}

static EVALUATE_FLAG: ToolDescriptor = ToolDescriptor {
    name: "evaluate-flag",
    description: "Evaluate a feature flag for a given user context",
    platform: Platform::FeatureFlags,
    args: &[
        required("flag_key", ArgType::String, "Feature flag key to evaluate"),
        required("user_key", ArgType::String, "Unique user identifier"),
        optional("attributes", ArgType::Object, "Additional user attributes"),
    ],
};

static GET_FLAG: ToolDescriptor = ToolDescriptor {
    name: "get-flag",
    description: "Get details about a specific feature flag",
    platform: Platform::FeatureFlags,
    args: &[required("flag_key", ArgType::String, "Feature flag key")],
};

static LIST_FLAGS: ToolDescriptor = ToolDescriptor {
    name: "list-flags",
    description: "List all available feature flags",
    platform: Platform::FeatureFlags,
    args: &[],
};

static GET_SEGMENT: ToolDescriptor = ToolDescriptor {
    name: "get-segment",
    description: "Get details about a specific user segment",
    platform: Platform::FeatureFlags,
    args: &[required("segment_key", ArgType::String, "User segment key")],
};

static LIST_SEGMENTS: ToolDescriptor = ToolDescriptor {
    name: "list-segments",
    description: "List all available user segments",
    platform: Platform::FeatureFlags,
    args: &[],
};

static GET_ISSUE: ToolDescriptor = ToolDescriptor {
    name: "get-issue",
    description: "Retrieve and analyze a Sentry issue by ID or URL. Use this tool when you need to:
    - Investigate production errors and crashes
    - Access detailed stacktraces from Sentry
    - Analyze error patterns and frequencies
    - Get information about when issues first/last occurred
    - Review error counts and status",
    platform: Platform::IssueTracking,
    args: &[required(
        "issue_id_or_url",
        ArgType::String,
        "Sentry issue ID or URL to analyze",
    )],
};

static LIST_ISSUES: ToolDescriptor = ToolDescriptor {
    name: "list-issues",
    description: "List Sentry issues for a project. Use this tool when you need to:
    - Retrieve a list of issues for a specific project
    - Filter issues by status, level, or date range
    - Get a summary of issues for analysis",
    platform: Platform::IssueTracking,
    args: &[
        required("organization", ArgType::String, "Sentry organization identifier"),
        required(
            "environment",
            ArgType::String,
            "Environment (e.g., production, staging)",
        ),
        optional(
            "project",
            ArgType::String,
            "Sentry project identifier in the format of id or name (performs lookup)",
        ),
        optional(
            "duration",
            ArgType::String,
            "Time range for issues (e.g. '7d' for the last 7 days, default '24h')",
        ),
        optional(
            "query",
            ArgType::String,
            "Optional query for filtering issues (e.g., 'is:unresolved')",
        ),
        optional(
            "sort",
            ArgType::String,
            "Optional sort order (e.g., 'new', 'old', 'priority', 'freq')",
        ),
        optional("limit", ArgType::Integer, "Optional limit on the number of results"),
        optional("cursor", ArgType::String, "Pagination cursor from a previous page"),
    ],
};

/// Everything a handler needs
pub(crate) struct ToolContext<'a> {
    pub backend: &'a dyn Backend,
    pub cache: &'a ResponseCache,
    pub issue_domain: &'a str,
}

impl ToolContext<'_> {
    /// Read one entity, through the cache when its kind is cacheable
    pub async fn read_entity(&self, kind: EntityKind, key: &str) -> Result<Entity> {
        let fetch = move || async move {
            self.backend
                .fetch_entity(kind, key)
                .await
                .map(CachedValue::One)
                .map_err(|e| {
                    AdapterError::backend(
                        self.backend.name(),
                        format!("Failed to get {} {}", kind.singular(), key),
                        e,
                    )
                })
        };

        let value = if kind.is_cacheable() {
            self.cache.get_or_compute(&entity_key(kind, key), fetch).await?
        } else {
            fetch().await?
        };

        match value {
            CachedValue::One(entity) => Ok(entity),
            CachedValue::Many(_) => Err(unexpected_shape(kind)),
        }
    }

    /// List entities, through the cache when unfiltered and cacheable
    pub async fn list_entities(
        &self,
        kind: EntityKind,
        filters: &ListFilters,
    ) -> Result<Vec<Entity>> {
        let fetch = move || async move {
            self.backend
                .list_entities(kind, filters)
                .await
                .map(CachedValue::Many)
                .map_err(|e| {
                    AdapterError::backend(
                        self.backend.name(),
                        format!("Failed to list {}", kind.plural()),
                        e,
                    )
                })
        };

        let value = if kind.is_cacheable() && filters.is_empty() {
            self.cache.get_or_compute(&list_key(kind), fetch).await?
        } else {
            fetch().await?
        };

        match value {
            CachedValue::Many(entities) => Ok(entities),
            CachedValue::One(_) => Err(unexpected_shape(kind)),
        }
    }
}

fn unexpected_shape(kind: EntityKind) -> AdapterError {
    AdapterError::Internal(format!("unexpected value shape for {}", kind.singular()))
}

/// Backend returned a different entity kind than requested
pub(crate) fn unexpected_entity(expected: EntityKind, got: &Entity) -> AdapterError {
    AdapterError::Internal(format!(
        "expected {} but backend returned {}",
        expected.singular(),
        got.kind().singular()
    ))
}

/// Required string argument
pub(crate) fn str_arg<'a>(args: &'a JsonMap, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| AdapterError::InvalidArgument {
            name: name.to_string(),
            reason: "expected string".to_string(),
        })
}

/// Optional string argument; `null` counts as absent
pub(crate) fn opt_str_arg<'a>(args: &'a JsonMap, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}

/// Optional integer argument
pub(crate) fn opt_int_arg(args: &JsonMap, name: &str) -> Option<i64> {
    args.get(name).and_then(Value::as_i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> JsonMap {
        match value {
            Value::Object(map) => map,
            _ => JsonMap::new(),
        }
    }

    #[test]
    fn test_seven_tools_split_by_platform() {
        assert_eq!(catalog(Platform::FeatureFlags).len(), 5);
        assert_eq!(catalog(Platform::IssueTracking).len(), 2);
    }

    #[test]
    fn test_names_are_unique() {
        let names: BTreeSet<&str> = Tool::ALL.iter().map(Tool::name).collect();
        assert_eq!(names.len(), Tool::ALL.len());
    }

    #[test]
    fn test_lookup_respects_platform() {
        assert_eq!(
            Tool::lookup(Platform::FeatureFlags, "get-flag"),
            Some(Tool::GetFlag)
        );
        assert_eq!(Tool::lookup(Platform::IssueTracking, "get-flag"), None);
        assert_eq!(Tool::lookup(Platform::FeatureFlags, "stream-flags"), None);
    }

    #[test]
    fn test_required_and_optional_names() {
        let d = Tool::ListIssues.descriptor();
        assert_eq!(
            d.required_arg_names(),
            BTreeSet::from(["environment", "organization"])
        );
        assert!(d.optional_arg_names().contains("duration"));
        assert!(d.optional_arg_names().contains("limit"));
    }

    #[test]
    fn test_validate_lists_all_missing() {
        let err = Tool::EvaluateFlag
            .descriptor()
            .validate(&JsonMap::new())
            .unwrap_err();
        match err {
            AdapterError::MissingArguments { tool, missing } => {
                assert_eq!(tool, "evaluate-flag");
                assert_eq!(missing, vec!["flag_key", "user_key"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_null_is_missing() {
        let err = Tool::GetFlag
            .descriptor()
            .validate(&args(json!({ "flag_key": null })))
            .unwrap_err();
        assert!(matches!(err, AdapterError::MissingArguments { .. }));
    }

    #[test]
    fn test_validate_types() {
        let d = Tool::EvaluateFlag.descriptor();
        let with_attributes = json!({
            "flag_key": "a",
            "user_key": "u",
            "attributes": { "plan": "pro" }
        });
        assert!(d.validate(&args(with_attributes)).is_ok());

        let err = d
            .validate(&args(json!({ "flag_key": "a", "user_key": "u", "attributes": "pro" })))
            .unwrap_err();
        assert!(matches!(
            err,
            AdapterError::InvalidArgument { ref name, .. } if name == "attributes"
        ));

        let err = Tool::ListIssues
            .descriptor()
            .validate(&args(json!({ "organization": "o", "environment": "e", "limit": "ten" })))
            .unwrap_err();
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn test_input_schema() {
        let schema = Tool::GetIssue.descriptor().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["issue_id_or_url"]));
        assert_eq!(schema["properties"]["issue_id_or_url"]["type"], "string");

        let schema = Tool::ListFlags.descriptor().input_schema();
        assert_eq!(schema["required"], json!([]));
    }
}
