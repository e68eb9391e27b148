//! In-memory backend for tests and local runs
//!
//! Serves seeded entities, counts every call per operation and can be told
//! to fail specific operations or to delay readiness. No network I/O.

use super::{unsupported_kind, Backend, Platform};
use crate::error::{BackendError, BackendResult};
use crate::types::{
    CallCounts, Entity, EntityKind, EvaluationResult, EventRecord, FeatureFlag, Issue, JsonMap,
    ListFilters, Project, Segment,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Operation names used for call counting and failure injection
pub mod ops {
    /// Readiness probe
    pub const IS_READY: &str = "is_ready";
    /// Flag evaluation
    pub const EVALUATE: &str = "evaluate";

    /// `fetch:<kind>`, e.g. `fetch:flag`
    pub fn fetch(kind: crate::types::EntityKind) -> String {
        format!("fetch:{}", kind.singular())
    }

    /// `list:<kinds>`, e.g. `list:flags`
    pub fn list(kind: crate::types::EntityKind) -> String {
        format!("list:{}", kind.plural())
    }
}

/// When the readiness probe starts reporting ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Ready on the first probe
    Immediate,
    /// Ready once this long has passed since the first probe
    After(Duration),
    /// Never ready
    Never,
}

/// Seeded in-memory backend
pub struct MemoryBackend {
    platform: Platform,
    readiness: Readiness,
    first_probe: RwLock<Option<Instant>>,
    entities: RwLock<HashMap<EntityKind, BTreeMap<String, Entity>>>,
    failures: RwLock<HashMap<String, BackendError>>,
    calls: RwLock<CallCounts>,
    last_filters: RwLock<HashMap<EntityKind, ListFilters>>,
    closed: AtomicBool,
}

impl MemoryBackend {
    /// Empty backend serving the given platform, ready immediately
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            readiness: Readiness::Immediate,
            first_probe: RwLock::new(None),
            entities: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
            calls: RwLock::new(CallCounts::new()),
            last_filters: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Backend seeded with a few flags and segments
    pub fn feature_flags_demo() -> Self {
        use crate::types::FlagVariation;
        use serde_json::json;

        let variations = |on: serde_json::Value, off: serde_json::Value| {
            vec![
                FlagVariation {
                    value: on,
                    description: Some("on".to_string()),
                },
                FlagVariation {
                    value: off,
                    description: Some("off".to_string()),
                },
            ]
        };

        Self::new(Platform::FeatureFlags)
            .with_entity(Entity::Flag(FeatureFlag {
                key: "checkout-v2".to_string(),
                name: Some("Checkout v2".to_string()),
                description: Some("New checkout flow".to_string()),
                variations: variations(json!(true), json!(false)),
                tags: vec!["checkout".to_string()],
                is_enabled: true,
                created_at: None,
                updated_at: None,
            }))
            .with_entity(Entity::Flag(FeatureFlag {
                key: "search-ranking".to_string(),
                name: Some("Search ranking".to_string()),
                description: None,
                variations: variations(json!("semantic"), json!("lexical")),
                tags: Vec::new(),
                is_enabled: false,
                created_at: None,
                updated_at: None,
            }))
            .with_entity(Entity::Segment(Segment {
                key: "beta-testers".to_string(),
                name: Some("Beta testers".to_string()),
                description: None,
                included: vec!["user-1".to_string()],
                excluded: Vec::new(),
                rules: Vec::new(),
                created_at: None,
                updated_at: None,
            }))
    }

    /// Backend seeded with one project, one issue and its latest event
    pub fn issue_tracking_demo() -> Self {
        use serde_json::json;

        let event = EventRecord {
            event_id: Some("9fa1c2".to_string()),
            entries: vec![crate::types::EventEntry {
                entry_type: "exception".to_string(),
                data: json!({
                    "values": [{
                        "type": "ZeroDivisionError",
                        "value": "division by zero",
                        "stacktrace": { "frames": [
                            { "filename": "app/main.py", "lineNo": 10, "function": "main" },
                            {
                                "filename": "app/math.py",
                                "lineNo": 42,
                                "function": "divide",
                                "context": [[42, "    return a / b"]]
                            }
                        ]}
                    }]
                }),
            }],
        };

        Self::new(Platform::IssueTracking)
            .with_entity(Entity::Project(Project {
                id: "1".to_string(),
                name: "Backend".to_string(),
                slug: "backend".to_string(),
            }))
            .with_entity(Entity::Issue(Issue {
                id: "12345".to_string(),
                title: "ZeroDivisionError: division by zero".to_string(),
                status: "unresolved".to_string(),
                level: "error".to_string(),
                first_seen: "2024-05-01T10:00:00Z".to_string(),
                last_seen: "2024-05-02T08:30:00Z".to_string(),
                count: "17".to_string(),
                culprit: Some("app.math in divide".to_string()),
                permalink: None,
                short_id: Some("BACKEND-1".to_string()),
            }))
            .with_latest_event("12345", event)
    }

    /// Change when the probe reports ready
    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    /// Seed an entity
    pub fn with_entity(mut self, entity: Entity) -> Self {
        let key = entity_id(&entity);
        self.entities
            .get_mut()
            .entry(entity.kind())
            .or_default()
            .insert(key, entity);
        self
    }

    /// Seed the latest event of an issue
    pub fn with_latest_event(mut self, issue_id: impl Into<String>, event: EventRecord) -> Self {
        self.entities
            .get_mut()
            .entry(EntityKind::LatestEvent)
            .or_default()
            .insert(issue_id.into(), Entity::Event(event));
        self
    }

    /// Make every call of `operation` fail with `error`
    pub fn with_failure(mut self, operation: impl Into<String>, error: BackendError) -> Self {
        self.failures.get_mut().insert(operation.into(), error);
        self
    }

    /// Add or replace an entity at runtime
    pub async fn insert(&self, entity: Entity) {
        let key = entity_id(&entity);
        self.entities
            .write()
            .await
            .entry(entity.kind())
            .or_default()
            .insert(key, entity);
    }

    /// Inject a failure at runtime
    pub async fn fail(&self, operation: impl Into<String>, error: BackendError) {
        self.failures.write().await.insert(operation.into(), error);
    }

    /// Remove an injected failure
    pub async fn heal(&self, operation: &str) {
        self.failures.write().await.remove(operation);
    }

    /// Number of calls made to `operation`
    pub async fn calls(&self, operation: &str) -> u64 {
        self.calls.read().await.get(operation).copied().unwrap_or(0)
    }

    /// Snapshot of all call counters
    pub async fn call_counts(&self) -> CallCounts {
        self.calls.read().await.clone()
    }

    /// Filters passed to the most recent list call of `kind`
    pub async fn last_filters(&self, kind: EntityKind) -> Option<ListFilters> {
        self.last_filters.read().await.get(&kind).cloned()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn record(&self, operation: &str) -> BackendResult<()> {
        *self
            .calls
            .write()
            .await
            .entry(operation.to_string())
            .or_insert(0) += 1;

        match self.failures.read().await.get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn serves(&self, kind: EntityKind) -> bool {
        match self.platform {
            Platform::FeatureFlags => matches!(kind, EntityKind::Flag | EntityKind::Segment),
            Platform::IssueTracking => matches!(
                kind,
                EntityKind::Issue | EntityKind::LatestEvent | EntityKind::Project
            ),
        }
    }
}

/// Storage key of an entity
fn entity_id(entity: &Entity) -> String {
    match entity {
        Entity::Flag(f) => f.key.clone(),
        Entity::Segment(s) => s.key.clone(),
        Entity::Issue(Issue { id, .. }) | Entity::Project(Project { id, .. }) => id.clone(),
        Entity::Event(e) => e.event_id.clone().unwrap_or_default(),
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    async fn is_ready(&self) -> BackendResult<bool> {
        self.record(ops::IS_READY).await?;

        match self.readiness {
            Readiness::Immediate => Ok(true),
            Readiness::Never => Ok(false),
            Readiness::After(delay) => {
                let mut first = self.first_probe.write().await;
                let started = *first.get_or_insert_with(Instant::now);
                Ok(started.elapsed() >= delay)
            }
        }
    }

    async fn fetch_entity(&self, kind: EntityKind, key: &str) -> BackendResult<Entity> {
        self.record(&ops::fetch(kind)).await?;
        if !self.serves(kind) {
            return Err(unsupported_kind(self.name(), "fetch", kind));
        }

        self.entities
            .read()
            .await
            .get(&kind)
            .and_then(|m| m.get(key))
            .cloned()
            .ok_or_else(|| {
                BackendError::not_found(format!("{} {} not found", kind.singular(), key))
            })
    }

    async fn list_entities(
        &self,
        kind: EntityKind,
        filters: &ListFilters,
    ) -> BackendResult<Vec<Entity>> {
        self.record(&ops::list(kind)).await?;
        if !self.serves(kind) {
            return Err(unsupported_kind(self.name(), "list", kind));
        }

        self.last_filters
            .write()
            .await
            .insert(kind, filters.clone());

        let entities = self.entities.read().await;
        let mut items: Vec<Entity> = entities
            .get(&kind)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();

        // Other filters are recorded but not applied
        if let Some(limit) = filters.get("limit").and_then(|l| l.parse::<usize>().ok()) {
            items.truncate(limit);
        }

        Ok(items)
    }

    async fn evaluate(
        &self,
        flag_key: &str,
        subject: &str,
        _attributes: &JsonMap,
    ) -> BackendResult<EvaluationResult> {
        self.record(ops::EVALUATE).await?;
        if self.platform != Platform::FeatureFlags {
            return Err(BackendError::Unsupported {
                backend: self.name().to_string(),
                operation: "evaluate".to_string(),
            });
        }

        let entities = self.entities.read().await;
        let flag = match entities.get(&EntityKind::Flag).and_then(|m| m.get(flag_key)) {
            Some(Entity::Flag(flag)) => flag,
            _ => {
                return Err(BackendError::not_found(format!(
                    "flag {} not found",
                    flag_key
                )))
            }
        };

        // Enabled flags serve the first variation, disabled ones the last
        let (index, reason) = if flag.is_enabled {
            (0, "FALLTHROUGH")
        } else {
            (flag.variations.len().saturating_sub(1), "OFF")
        };
        let value = flag
            .variations
            .get(index)
            .map(|v| v.value.clone())
            .unwrap_or(serde_json::Value::Null);

        let mut reason_map = JsonMap::new();
        reason_map.insert("kind".to_string(), reason.into());

        tracing::debug!(flag_key = %flag_key, subject = %subject, "Evaluated flag in memory");

        Ok(EvaluationResult {
            flag_key: flag_key.to_string(),
            value,
            variation_index: (!flag.variations.is_empty()).then_some(index as i64),
            reason: Some(reason_map),
        })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        tracing::info!("Memory backend closed");
    }
}
