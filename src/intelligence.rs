//! Advisory signals derived from store activity.
//!
//! The tracker is updated inside the store's critical section on every
//! mutation. Everything here is derived data: [`IntelligenceTracker::rebuild`]
//! reconstructs the gap list from the entity set after a reload, and losing
//! the counters loses nothing the store depends on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::entity::{Entity, EntityId, EntityKind};

/// Number of recent access contexts retained.
pub const RECENT_CONTEXT_LIMIT: usize = 20;

/// Kind of store mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreEventType {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for StoreEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// The most recent mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreEvent {
    pub event_type: StoreEventType,
    pub entity_id: EntityId,
    pub kind: EntityKind,
    pub timestamp: DateTime<Utc>,
}

impl StoreEvent {
    /// Pattern key, e.g. `architectural_decision_update`.
    pub fn pattern_key(&self) -> String {
        format!("{}_{}", self.kind, self.event_type)
    }
}

/// Frequency of one mutation pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternStat {
    pub count: u64,
    /// Share of all observed events.
    pub confidence: f64,
}

/// An entity whose confidence is too low to rely on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeGap {
    pub entity_id: EntityId,
    pub kind: EntityKind,
    pub title: String,
    pub confidence: f64,
    pub reason: String,
}

/// Point-in-time copy of the tracker state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntelligenceSnapshot {
    pub last_event: Option<StoreEvent>,
    pub total_events: u64,
    pub pattern_confidence: BTreeMap<String, PatternStat>,
    pub knowledge_gaps: Vec<KnowledgeGap>,
    pub recent_contexts: Vec<String>,
}

/// Rolling advisory state.
#[derive(Debug, Clone)]
pub struct IntelligenceTracker {
    gap_floor: f64,
    last_event: Option<StoreEvent>,
    total_events: u64,
    pattern_counts: HashMap<String, u64>,
    gaps: BTreeMap<EntityId, KnowledgeGap>,
    recent_contexts: VecDeque<String>,
}

impl IntelligenceTracker {
    pub fn new(gap_floor: f64) -> Self {
        Self {
            gap_floor,
            last_event: None,
            total_events: 0,
            pattern_counts: HashMap::new(),
            gaps: BTreeMap::new(),
            recent_contexts: VecDeque::new(),
        }
    }

    /// Record an insert or update of `entity`.
    pub fn record_upsert(&mut self, entity: &Entity, event_type: StoreEventType, at: DateTime<Utc>) {
        self.record_event(StoreEvent {
            event_type,
            entity_id: entity.id,
            kind: entity.kind(),
            timestamp: at,
        });
        self.refresh_gap(entity);
    }

    /// Record a deletion.
    pub fn record_delete(&mut self, entity: &Entity, at: DateTime<Utc>) {
        self.record_event(StoreEvent {
            event_type: StoreEventType::Delete,
            entity_id: entity.id,
            kind: entity.kind(),
            timestamp: at,
        });
        self.gaps.remove(&entity.id);
    }

    /// Record a tracked read context.
    pub fn record_access(&mut self, context: &str) {
        if context.trim().is_empty() {
            return;
        }
        self.recent_contexts.push_back(context.to_string());
        while self.recent_contexts.len() > RECENT_CONTEXT_LIMIT {
            self.recent_contexts.pop_front();
        }
    }

    /// Recompute the gap list from scratch; counters are reset.
    pub fn rebuild<'a>(&mut self, entities: impl IntoIterator<Item = &'a Entity>) {
        *self = Self::new(self.gap_floor);
        for entity in entities {
            self.refresh_gap(entity);
        }
    }

    pub fn snapshot(&self) -> IntelligenceSnapshot {
        let total = self.total_events.max(1) as f64;
        let pattern_confidence = self
            .pattern_counts
            .iter()
            .map(|(key, count)| {
                (
                    key.clone(),
                    PatternStat {
                        count: *count,
                        confidence: *count as f64 / total,
                    },
                )
            })
            .collect();

        let mut knowledge_gaps: Vec<KnowledgeGap> = self.gaps.values().cloned().collect();
        knowledge_gaps.sort_by(|a, b| {
            a.confidence
                .total_cmp(&b.confidence)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });

        IntelligenceSnapshot {
            last_event: self.last_event.clone(),
            total_events: self.total_events,
            pattern_confidence,
            knowledge_gaps,
            recent_contexts: self.recent_contexts.iter().cloned().collect(),
        }
    }

    fn record_event(&mut self, event: StoreEvent) {
        self.total_events += 1;
        *self.pattern_counts.entry(event.pattern_key()).or_insert(0) += 1;
        self.last_event = Some(event);
    }

    fn refresh_gap(&mut self, entity: &Entity) {
        if entity.confidence < self.gap_floor {
            self.gaps.insert(
                entity.id,
                KnowledgeGap {
                    entity_id: entity.id,
                    kind: entity.kind(),
                    title: entity.title.clone(),
                    confidence: entity.confidence,
                    reason: format!(
                        "Confidence {:.2} is below the {:.2} floor",
                        entity.confidence, self.gap_floor
                    ),
                },
            );
        } else {
            self.gaps.remove(&entity.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::validate::build_entity;
    use crate::entity::{DecisionStatus, EntityInput, EntityPayload};

    fn entity(confidence: f64) -> Entity {
        build_entity(
            EntityInput::new(
                EntityPayload::decision(DecisionStatus::Accepted, "Use gRPC"),
                "Transport",
            )
            .with_confidence(confidence),
            EntityId::new(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_pattern_counters() {
        let mut tracker = IntelligenceTracker::new(0.5);
        let e = entity(0.9);
        tracker.record_upsert(&e, StoreEventType::Create, Utc::now());
        tracker.record_upsert(&e, StoreEventType::Update, Utc::now());
        tracker.record_upsert(&e, StoreEventType::Update, Utc::now());

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.total_events, 3);
        let update = &snapshot.pattern_confidence["architectural_decision_update"];
        assert_eq!(update.count, 2);
        assert!((update.confidence - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            snapshot.last_event.unwrap().event_type,
            StoreEventType::Update
        );
    }

    #[test]
    fn test_knowledge_gaps_follow_confidence() {
        let mut tracker = IntelligenceTracker::new(0.5);
        let mut e = entity(0.2);
        tracker.record_upsert(&e, StoreEventType::Create, Utc::now());
        assert_eq!(tracker.snapshot().knowledge_gaps.len(), 1);

        e.confidence = 0.7;
        tracker.record_upsert(&e, StoreEventType::Update, Utc::now());
        assert!(tracker.snapshot().knowledge_gaps.is_empty());

        e.confidence = 0.1;
        tracker.record_upsert(&e, StoreEventType::Update, Utc::now());
        tracker.record_delete(&e, Utc::now());
        assert!(tracker.snapshot().knowledge_gaps.is_empty());
    }

    #[test]
    fn test_rebuild_from_entities() {
        let mut tracker = IntelligenceTracker::new(0.5);
        let low = entity(0.1);
        let high = entity(0.9);
        tracker.record_upsert(&high, StoreEventType::Create, Utc::now());

        tracker.rebuild([&low, &high]);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.total_events, 0);
        assert_eq!(snapshot.knowledge_gaps.len(), 1);
        assert_eq!(snapshot.knowledge_gaps[0].entity_id, low.id);
    }

    #[test]
    fn test_recent_contexts_bounded() {
        let mut tracker = IntelligenceTracker::new(0.5);
        for i in 0..(RECENT_CONTEXT_LIMIT + 3) {
            tracker.record_access(&format!("ctx-{}", i));
        }
        tracker.record_access("  ");
        let contexts = tracker.snapshot().recent_contexts;
        assert_eq!(contexts.len(), RECENT_CONTEXT_LIMIT);
        assert_eq!(contexts[0], "ctx-3");
    }
}
