//! Core types for the a3s-bridge adapter
//!
//! Entities mirror the subset of each platform's REST payload the tools
//! expose. Platform payloads use camelCase; our own output uses snake_case.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Arbitrary JSON object
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Kind of entity a backend can fetch or list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Feature flag
    Flag,
    /// User segment
    Segment,
    /// Tracked issue
    Issue,
    /// Most recent event recorded for an issue
    LatestEvent,
    /// Project inside an organization
    Project,
}

impl EntityKind {
    /// Singular name, used as the cache key prefix for single reads
    pub fn singular(&self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Segment => "segment",
            Self::Issue => "issue",
            Self::LatestEvent => "latest-event",
            Self::Project => "project",
        }
    }

    /// Plural name, used as the cache key prefix for list reads
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Flag => "flags",
            Self::Segment => "segments",
            Self::Issue => "issues",
            Self::LatestEvent => "latest-events",
            Self::Project => "projects",
        }
    }

    /// Whether reads of this kind may be memoized
    ///
    /// Flag and segment configuration is externally versioned and rarely
    /// changes; issue state moves continuously and is always read live.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Self::Flag | Self::Segment)
    }
}

/// A single flag variation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagVariation {
    /// Variation value (any JSON)
    pub value: serde_json::Value,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
}

/// Feature flag configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlag {
    /// Flag key
    pub key: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Available variations
    #[serde(default)]
    pub variations: Vec<FlagVariation>,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether targeting is on in the configured environment
    #[serde(default)]
    pub is_enabled: bool,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last modification timestamp
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// User segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Segment key
    pub key: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Context keys explicitly included
    #[serde(default)]
    pub included: Vec<String>,
    /// Context keys explicitly excluded
    #[serde(default)]
    pub excluded: Vec<String>,
    /// Targeting rules, passed through verbatim
    #[serde(default)]
    pub rules: Vec<serde_json::Value>,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last modification timestamp
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Tracked issue as reported by the issue platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Numeric issue id (as string)
    pub id: String,
    /// Issue title
    #[serde(default)]
    pub title: String,
    /// resolved / unresolved / ignored
    #[serde(default)]
    pub status: String,
    /// error / warning / ...
    #[serde(default)]
    pub level: String,
    /// First occurrence
    #[serde(default)]
    pub first_seen: String,
    /// Last occurrence
    #[serde(default)]
    pub last_seen: String,
    /// Event count, reported as a string by the platform
    #[serde(default)]
    pub count: String,
    /// Code location blamed for the issue
    #[serde(default)]
    pub culprit: Option<String>,
    /// Web link
    #[serde(default)]
    pub permalink: Option<String>,
    /// Short human id (e.g. `BACKEND-1A`)
    #[serde(default)]
    pub short_id: Option<String>,
}

/// Project inside an organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Numeric id (as string)
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// URL slug
    #[serde(default)]
    pub slug: String,
}

impl Project {
    /// Whether `needle` names this project by id, name or slug
    pub fn matches(&self, needle: &str) -> bool {
        self.id == needle || self.name == needle || self.slug == needle
    }
}

/// One entry of an event (exception, breadcrumbs, request, message, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEntry {
    /// Entry type, e.g. `exception`
    #[serde(rename = "type")]
    pub entry_type: String,
    /// Type-specific payload
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Event recorded against an issue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Event id
    #[serde(default, rename = "eventID")]
    pub event_id: Option<String>,
    /// Ordered entries
    #[serde(default)]
    pub entries: Vec<EventEntry>,
}

/// Anything a backend can return from a read
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    /// Feature flag
    Flag(FeatureFlag),
    /// User segment
    Segment(Segment),
    /// Issue
    Issue(Issue),
    /// Latest event of an issue
    Event(EventRecord),
    /// Project
    Project(Project),
}

impl Entity {
    /// Kind of this entity
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Flag(_) => EntityKind::Flag,
            Self::Segment(_) => EntityKind::Segment,
            Self::Issue(_) => EntityKind::Issue,
            Self::Event(_) => EntityKind::LatestEvent,
            Self::Project(_) => EntityKind::Project,
        }
    }

    /// Serialize the inner value to JSON
    pub fn to_json(&self) -> serde_json::Value {
        let value = match self {
            Self::Flag(f) => serde_json::to_value(f),
            Self::Segment(s) => serde_json::to_value(s),
            Self::Issue(i) => serde_json::to_value(i),
            Self::Event(e) => serde_json::to_value(e),
            Self::Project(p) => serde_json::to_value(p),
        };
        value.unwrap_or(serde_json::Value::Null)
    }
}

/// Filters accepted by list operations
///
/// Keys are backend-specific (e.g. `organization`, `environment`,
/// `statsPeriod`); backends ignore what they do not understand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilters {
    filters: Vec<(String, String)>,
}

impl ListFilters {
    /// Empty filter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((key.into(), value.into()));
        self
    }

    /// Add a filter only when a value is present
    pub fn with_opt(self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    /// Look up a filter value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.filters
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over all filters in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.filters.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether no filters are set
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Result of evaluating a flag for one subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Evaluated flag
    pub flag_key: String,
    /// Served value
    pub value: serde_json::Value,
    /// Index of the served variation
    pub variation_index: Option<i64>,
    /// Why this value was served
    pub reason: Option<JsonMap>,
}

/// A named tool call with its arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    /// Tool name
    pub name: String,
    /// Arguments keyed by name
    #[serde(default)]
    pub arguments: JsonMap,
}

impl ToolInvocationRequest {
    /// Create a request
    pub fn new(name: impl Into<String>, arguments: JsonMap) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Create a request from a JSON value; non-objects yield no arguments
    pub fn from_value(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        let arguments = match arguments {
            serde_json::Value::Object(map) => map,
            _ => JsonMap::new(),
        };
        Self::new(name, arguments)
    }
}

/// One block of tool output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    /// Plain or structured text
    Text(String),
    /// Opaque bytes with a MIME type
    Binary { data: Vec<u8>, mime_type: String },
}

impl ContentBlock {
    /// Text content, if this is a text block
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            Self::Binary { .. } => None,
        }
    }
}

/// Ordered output of one tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolInvocationResult {
    content: Vec<ContentBlock>,
}

impl ToolInvocationResult {
    /// Build from content blocks
    pub fn new(content: Vec<ContentBlock>) -> Self {
        Self { content }
    }

    /// Single text block
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![ContentBlock::Text(text.into())])
    }

    /// Pretty-printed JSON as a single text block
    pub fn json<T: Serialize>(value: &T) -> crate::error::Result<Self> {
        Ok(Self::text(serde_json::to_string_pretty(value)?))
    }

    /// Content blocks in order
    pub fn content(&self) -> &[ContentBlock] {
        &self.content
    }

    /// Concatenate all text blocks
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Human-readable issue summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueSummary {
    /// Issue title
    pub title: String,
    /// Issue id
    pub issue_id: String,
    /// Status
    pub status: String,
    /// Level
    pub level: String,
    /// First occurrence
    pub first_seen: String,
    /// Last occurrence
    pub last_seen: String,
    /// Event count
    pub count: String,
    /// Formatted stacktrace, absent in list views
    pub stacktrace: Option<String>,
}

impl IssueSummary {
    /// Summary of an issue without a stacktrace
    pub fn from_issue(issue: &Issue) -> Self {
        Self {
            title: issue.title.clone(),
            issue_id: issue.id.clone(),
            status: issue.status.clone(),
            level: issue.level.clone(),
            first_seen: issue.first_seen.clone(),
            last_seen: issue.last_seen.clone(),
            count: issue.count.clone(),
            stacktrace: None,
        }
    }

    /// Attach a formatted stacktrace
    pub fn with_stacktrace(mut self, stacktrace: impl Into<String>) -> Self {
        self.stacktrace = Some(stacktrace.into());
        self
    }

    /// Render as plain text
    pub fn to_text(&self) -> String {
        let mut text = format!(
            "Sentry Issue: {}\nIssue ID: {}\nStatus: {}\nLevel: {}\n\
             First Seen: {}\nLast Seen: {}\nEvent Count: {}\n",
            self.title,
            self.issue_id,
            self.status,
            self.level,
            self.first_seen,
            self.last_seen,
            self.count,
        );
        if let Some(ref stacktrace) = self.stacktrace {
            text.push('\n');
            text.push_str(stacktrace);
            text.push('\n');
        }
        text
    }
}

/// Per-operation call counters, keyed by operation name
pub type CallCounts = HashMap<String, u64>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_deserialize_camel_case() {
        let json = r#"{
            "id": "42",
            "title": "ZeroDivisionError",
            "status": "unresolved",
            "level": "error",
            "firstSeen": "2024-01-01T00:00:00Z",
            "lastSeen": "2024-01-02T00:00:00Z",
            "count": "17",
            "shortId": "API-1"
        }"#;
        let issue: Issue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.first_seen, "2024-01-01T00:00:00Z");
        assert_eq!(issue.short_id.as_deref(), Some("API-1"));
        assert!(issue.permalink.is_none());
    }

    #[test]
    fn test_issue_summary_text() {
        let summary = IssueSummary {
            title: "Boom".into(),
            issue_id: "7".into(),
            status: "unresolved".into(),
            level: "error".into(),
            first_seen: "a".into(),
            last_seen: "b".into(),
            count: "3".into(),
            stacktrace: None,
        };
        let text = summary.to_text();
        assert!(text.starts_with("Sentry Issue: Boom\nIssue ID: 7\n"));
        assert!(text.contains("Event Count: 3"));

        let text = summary.with_stacktrace("No stacktrace found").to_text();
        assert!(text.ends_with("\nNo stacktrace found\n"));
    }

    #[test]
    fn test_entity_kind_cacheability() {
        assert!(EntityKind::Flag.is_cacheable());
        assert!(EntityKind::Segment.is_cacheable());
        assert!(!EntityKind::Issue.is_cacheable());
        assert!(!EntityKind::LatestEvent.is_cacheable());
    }

    #[test]
    fn test_list_filters() {
        let filters = ListFilters::new()
            .with("organization", "acme")
            .with_opt("query", None::<String>)
            .with_opt("sort", Some("freq"));
        assert_eq!(filters.get("organization"), Some("acme"));
        assert_eq!(filters.get("query"), None);
        assert_eq!(filters.iter().count(), 2);
    }

    #[test]
    fn test_request_from_non_object_arguments() {
        let req = ToolInvocationRequest::from_value("list-flags", serde_json::Value::Null);
        assert!(req.arguments.is_empty());
    }

    #[test]
    fn test_project_matches() {
        let p = Project {
            id: "11".into(),
            name: "Backend".into(),
            slug: "backend".into(),
        };
        assert!(p.matches("11"));
        assert!(p.matches("Backend"));
        assert!(p.matches("backend"));
        assert!(!p.matches("frontend"));
    }
}
