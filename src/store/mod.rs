//! The knowledge store facade.
//!
//! A [`KnowledgeStore`] owns one entity map, one relationship graph and one
//! intelligence tracker behind a single `RwLock`. Every mutation runs under
//! the write guard and bumps a sequence number; reads share the read guard.
//! Disk I/O never happens under either guard: snapshots are cloned under the
//! read guard and written afterwards, inline or on a blocking tokio thread.
//!
//! ## Example
//!
//! ```rust,ignore
//! use archmem_core::{DecisionStatus, EntityInput, EntityPayload, KnowledgeStore};
//!
//! let store = KnowledgeStore::in_memory();
//! let adr = store.upsert_entity(
//!     EntityInput::new(
//!         EntityPayload::decision(DecisionStatus::Accepted, "Use Postgres"),
//!         "Primary database",
//!     )
//!     .with_stack(["node", "postgres"]),
//! )?;
//! let report = store.create_cross_tool_relationships()?;
//! ```

mod config;
#[cfg(test)]
mod proptest;

pub use config::StoreConfig;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::entity::validate::{build_entity, check_unit, merge_entity, merge_labeled, validate_entity};
use crate::entity::{Entity, EntityId, EntityInput, EntityKind, Transformation, Validation};
use crate::error::{Error, Result};
use crate::graph::{
    traverse, InferredOutcome, RelatedEntities, Relationship, RelationshipGraph, RelationshipId,
    RelationshipInput, RelationshipType,
};
use crate::inference::{ConflictDetector, CrossToolReport, InferenceEngine};
use crate::intelligence::{IntelligenceSnapshot, IntelligenceTracker, StoreEventType};
use crate::persistence::{PersistenceManager, Snapshot};
use crate::query::{EntityQuery, QueryResult};

/// Relevance changes smaller than this are not worth a new version.
const MIN_DECAY_STEP: f64 = 1e-4;

/// Everything guarded by the store lock.
struct StoreState {
    entities: HashMap<EntityId, Entity>,
    /// Deleted ids; re-inserting one is rejected.
    tombstones: HashSet<EntityId>,
    graph: RelationshipGraph,
    intelligence: IntelligenceTracker,
    /// Incremented on every mutation.
    seq: u64,
}

impl StoreState {
    fn new(gap_floor: f64) -> Self {
        Self {
            entities: HashMap::new(),
            tombstones: HashSet::new(),
            graph: RelationshipGraph::new(),
            intelligence: IntelligenceTracker::new(gap_floor),
            seq: 0,
        }
    }

    fn commit(&mut self, entity: Entity, event: StoreEventType, at: DateTime<Utc>) -> u64 {
        self.intelligence.record_upsert(&entity, event, at);
        self.entities.insert(entity.id, entity);
        self.bump()
    }

    fn bump(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.seq,
            self.entities.values().cloned().collect(),
            self.graph.iter().cloned().collect(),
        )
        .with_tombstones(self.tombstones.iter().copied())
    }
}

struct StoreInner {
    config: StoreConfig,
    state: RwLock<StoreState>,
    persistence: Option<Arc<PersistenceManager>>,
}

/// Statistics about the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_entities: u64,
    pub entities_by_kind: HashMap<EntityKind, u64>,
    pub total_relationships: u64,
    pub relationships_by_type: HashMap<RelationshipType, u64>,
    pub mean_confidence: f64,
    pub deleted_entities: u64,
    /// Mutations not yet written to disk; always 0 without persistence.
    pub pending_mutations: u64,
}

/// Embedded knowledge-graph store.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct KnowledgeStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for KnowledgeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeStore")
            .field("config", &self.inner.config)
            .field("persistence", &self.inner.persistence)
            .finish()
    }
}

impl KnowledgeStore {
    /// Open a store, loading existing snapshots when configured to.
    #[instrument(skip(config), fields(data_dir = ?config.persistence.data_dir))]
    pub fn open(config: StoreConfig) -> Result<Self> {
        let mut state = StoreState::new(config.knowledge_gap_floor);

        let persistence = match &config.persistence.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| {
                    Error::persistence(format!("create data directory {}", dir.display()), e)
                })?;
                PersistenceManager::from_config(&config.persistence).map(Arc::new)
            }
            None => None,
        };

        if let Some(manager) = &persistence {
            if config.persistence.load_on_init {
                let loaded = manager.load();
                state.tombstones = loaded.tombstones;
                for entity in loaded.entities {
                    match validate_entity(&entity) {
                        Ok(()) => {
                            state.entities.insert(entity.id, entity);
                        }
                        Err(e) => {
                            warn!(id = %entity.id, error = %e, "Skipping invalid entity in snapshot")
                        }
                    }
                }
                for relationship in loaded.relationships {
                    let known = state.entities.contains_key(&relationship.source_id)
                        && state.entities.contains_key(&relationship.target_id);
                    if !known || !state.graph.insert(relationship) {
                        debug!("Skipping relationship that no longer fits the entity set");
                    }
                }
                state.intelligence.rebuild(state.entities.values());
            }
            manager.mark_clean(0)?;
        }

        info!(
            entities = state.entities.len(),
            relationships = state.graph.len(),
            persistent = persistence.is_some(),
            "Knowledge store opened"
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                config,
                state: RwLock::new(state),
                persistence,
            }),
        })
    }

    /// Create a memory-only store.
    pub fn in_memory() -> Self {
        let config = StoreConfig::in_memory();
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(StoreState::new(config.knowledge_gap_floor)),
                config,
                persistence: None,
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.inner
            .state
            .read()
            .map_err(|e| Error::Internal(format!("Failed to lock store state: {}", e)))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.inner
            .state
            .write()
            .map_err(|e| Error::Internal(format!("Failed to lock store state: {}", e)))
    }

    // ==================== Entity Operations ====================

    /// Insert a new entity or merge fields into an existing one.
    ///
    /// An update that changes nothing returns the stored record as-is.
    #[instrument(skip(self, input), fields(id = ?input.id))]
    pub fn upsert_entity(&self, input: EntityInput) -> Result<Entity> {
        let now = Utc::now();
        let (entity, seq) = {
            let mut state = self.write_state()?;

            if let Some(id) = input.id {
                if state.tombstones.contains(&id) {
                    return Err(Error::validation(
                        "id",
                        format!("entity {} was deleted and cannot be reused", id),
                    ));
                }
            }

            let existing = input.id.and_then(|id| state.entities.get(&id).cloned());
            let (entity, event) = match existing {
                Some(existing) => match merge_entity(&existing, input, now)? {
                    Some(merged) => (merged, StoreEventType::Update),
                    None => return Ok(existing),
                },
                None => {
                    let id = input.id.unwrap_or_default();
                    (build_entity(input, id, now)?, StoreEventType::Create)
                }
            };

            let seq = state.commit(entity.clone(), event, now);
            debug!(id = %entity.id, kind = %entity.kind(), version = entity.version, %event, "Entity upserted");
            (entity, seq)
        };

        self.after_mutation(seq);
        Ok(entity)
    }

    /// Get an entity by id.
    pub fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>> {
        Ok(self.read_state()?.entities.get(id).cloned())
    }

    /// Get an entity and record the access under `context`.
    ///
    /// Access bookkeeping is not a content change: the version is untouched.
    pub fn get_entity_tracked(&self, id: &EntityId, context: &str) -> Result<Option<Entity>> {
        let now = Utc::now();
        let mut guard = self.write_state()?;
        let state = &mut *guard;

        let Some(entity) = state.entities.get_mut(id) else {
            return Ok(None);
        };
        entity.access_pattern.record(Some(context), now);
        state.intelligence.record_access(context);
        Ok(Some(entity.clone()))
    }

    /// Delete an entity and every relationship touching it.
    ///
    /// Returns `false` when the entity does not exist.
    #[instrument(skip(self, id), fields(id = %id))]
    pub fn delete_entity(&self, id: &EntityId) -> Result<bool> {
        let seq = {
            let mut guard = self.write_state()?;
            let state = &mut *guard;

            let Some(entity) = state.entities.remove(id) else {
                return Ok(false);
            };
            let removed = state.graph.remove_entity(id);
            state.tombstones.insert(*id);
            state.intelligence.record_delete(&entity, Utc::now());
            info!(kind = %entity.kind(), relationships = removed.len(), "Entity deleted");
            state.bump()
        };

        self.after_mutation(seq);
        Ok(true)
    }

    /// Transformation log of an entity, oldest first.
    pub fn evolution_history(&self, id: &EntityId) -> Result<Vec<Transformation>> {
        self.read_state()?
            .entities
            .get(id)
            .map(|e| e.evolution.transformations.clone())
            .ok_or_else(|| Error::not_found("entity", id))
    }

    /// Mark an entity as verified by `method`.
    ///
    /// Fails validation when the entity has no description.
    #[instrument(skip(self, id, method), fields(id = %id))]
    pub fn mark_verified(&self, id: &EntityId, method: impl Into<String>) -> Result<Entity> {
        let now = Utc::now();
        let method = method.into();
        let (entity, seq) = {
            let mut state = self.write_state()?;
            let existing = state
                .entities
                .get(id)
                .cloned()
                .ok_or_else(|| Error::not_found("entity", id))?;

            let validation = Validation {
                is_verified: true,
                verification_method: Some(method.clone()),
                verification_timestamp: Some(now),
                conflict_resolution: existing.validation.conflict_resolution.clone(),
            };
            let input = EntityInput::update(*id).with_validation(validation);
            let merged = merge_labeled(
                &existing,
                input,
                now,
                "verified",
                Some(format!("Verified by {}", method)),
            )?;
            let Some(merged) = merged else {
                return Ok(existing);
            };
            let seq = state.commit(merged.clone(), StoreEventType::Update, now);
            (merged, seq)
        };

        self.after_mutation(seq);
        Ok(entity)
    }

    /// Decay relevance by `factor` per day since each entity was last touched.
    ///
    /// Relevance never drops below `min_relevance`. Returns the decayed ids.
    #[instrument(skip(self))]
    pub fn decay_relevance(&self, factor: f64, min_relevance: f64) -> Result<Vec<EntityId>> {
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(Error::validation(
                "factor",
                format!("must be within (0, 1], got {}", factor),
            ));
        }
        check_unit("minRelevance", min_relevance)?;

        let now = Utc::now();
        let mut decayed = Vec::new();
        let seq = {
            let mut state = self.write_state()?;

            let mut updates = Vec::new();
            for entity in state.entities.values() {
                let days = (now - entity.last_touched()).num_seconds().max(0) as f64 / 86_400.0;
                let relevance = (entity.relevance * factor.powf(days)).max(min_relevance);
                if entity.relevance - relevance < MIN_DECAY_STEP {
                    continue;
                }
                let input = EntityInput::update(entity.id).with_relevance(relevance);
                let description = format!(
                    "Relevance decayed from {:.3} to {:.3}",
                    entity.relevance, relevance
                );
                if let Some(next) = merge_labeled(entity, input, now, "decay", Some(description))? {
                    updates.push(next);
                }
            }

            updates.sort_by(|a, b| a.id.cmp(&b.id));
            let mut seq = None;
            for entity in updates {
                decayed.push(entity.id);
                seq = Some(state.commit(entity, StoreEventType::Update, now));
            }
            seq
        };

        if let Some(seq) = seq {
            info!(count = decayed.len(), "Relevance decayed");
            self.after_mutation(seq);
        }
        Ok(decayed)
    }

    // ==================== Query Operations ====================

    /// Filter, sort and paginate entities.
    ///
    /// Access is recorded on the returned page only when the query asks for
    /// it with [`EntityQuery::track_access`].
    pub fn query_entities(&self, query: &EntityQuery) -> Result<QueryResult> {
        let Some(context) = &query.track_access else {
            let state = self.read_state()?;
            return query.execute(&state.entities, &state.graph);
        };

        let now = Utc::now();
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let mut result = query.execute(&state.entities, &state.graph)?;
        for entity in &mut result.entities {
            if let Some(stored) = state.entities.get_mut(&entity.id) {
                stored.access_pattern.record(Some(context.as_str()), now);
                entity.access_pattern = stored.access_pattern.clone();
            }
        }
        state.intelligence.record_access(context);
        Ok(result)
    }

    /// Entity and relationship counts.
    pub fn stats(&self) -> Result<StoreStats> {
        let state = self.read_state()?;

        let mut entities_by_kind = HashMap::new();
        let mut confidence_sum = 0.0;
        for entity in state.entities.values() {
            *entities_by_kind.entry(entity.kind()).or_insert(0) += 1;
            confidence_sum += entity.confidence;
        }
        let total_entities = state.entities.len() as u64;
        let mean_confidence = if total_entities == 0 {
            0.0
        } else {
            confidence_sum / total_entities as f64
        };

        let pending_mutations = match &self.inner.persistence {
            Some(manager) => manager.pending()?,
            None => 0,
        };

        Ok(StoreStats {
            total_entities,
            entities_by_kind,
            total_relationships: state.graph.len() as u64,
            relationships_by_type: state.graph.count_by_type(),
            mean_confidence,
            deleted_entities: state.tombstones.len() as u64,
            pending_mutations,
        })
    }

    /// Current advisory signals.
    pub fn get_intelligence(&self) -> Result<IntelligenceSnapshot> {
        Ok(self.read_state()?.intelligence.snapshot())
    }

    // ==================== Relationship Operations ====================

    /// Insert or update a relationship between two existing entities.
    #[instrument(skip(self, input), fields(source = %input.source_id, target = %input.target_id, kind = %input.relationship_type))]
    pub fn upsert_relationship(&self, input: RelationshipInput) -> Result<Relationship> {
        input.validate()?;
        let now = Utc::now();

        let (outcome, seq) = {
            let mut state = self.write_state()?;
            for endpoint in [input.source_id, input.target_id] {
                if !state.entities.contains_key(&endpoint) {
                    return Err(Error::not_found("entity", endpoint));
                }
            }

            let outcome = state.graph.upsert(input, now)?;
            let seq = outcome.is_mutation().then(|| state.bump());
            (outcome, seq)
        };

        if let Some(seq) = seq {
            debug!(id = %outcome.relationship().id, "Relationship upserted");
            self.after_mutation(seq);
        }
        Ok(outcome.into_relationship())
    }

    /// Every relationship touching `id`, oldest first.
    pub fn relationships_for(&self, id: &EntityId) -> Result<Vec<Relationship>> {
        let state = self.read_state()?;
        if !state.entities.contains_key(id) {
            return Err(Error::not_found("entity", id));
        }
        let mut edges: Vec<Relationship> = state.graph.edges_of(id).cloned().collect();
        edges.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        Ok(edges)
    }

    /// Delete one relationship. Returns `false` when it does not exist.
    pub fn delete_relationship(&self, id: &RelationshipId) -> Result<bool> {
        let seq = {
            let mut state = self.write_state()?;
            if state.graph.remove(id).is_none() {
                return Ok(false);
            }
            state.bump()
        };

        self.after_mutation(seq);
        Ok(true)
    }

    /// Breadth-first walk from `id`, up to `max_depth` hops.
    ///
    /// The depth is clamped to [`StoreConfig::max_traversal_depth`].
    pub fn find_related_entities(&self, id: &EntityId, max_depth: usize) -> Result<RelatedEntities> {
        let depth = max_depth.min(self.inner.config.max_traversal_depth);
        let state = self.read_state()?;
        Ok(traverse(&state.graph, &state.entities, *id, depth))
    }

    /// Infer relationships and detect conflicts across the whole store.
    ///
    /// Analysis runs over one read snapshot; confident candidates are then
    /// created in a single write section, skipping any whose endpoints were
    /// deleted in between.
    #[instrument(skip(self))]
    pub fn create_cross_tool_relationships(&self) -> Result<CrossToolReport> {
        let config = &self.inner.config;
        let (output, conflicts) = {
            let state = self.read_state()?;
            let output = InferenceEngine::new(&config.inference).infer(state.entities.values(), &state.graph);
            let conflicts =
                ConflictDetector::new(&config.conflicts).detect(state.entities.values(), &state.graph);
            (output, conflicts)
        };

        let now = Utc::now();
        let mut auto_created_count = 0;
        let seq = {
            let mut guard = self.write_state()?;
            let state = &mut *guard;

            let mut changed = false;
            for candidate in &output.auto_create {
                if !state.entities.contains_key(&candidate.source_id)
                    || !state.entities.contains_key(&candidate.target_id)
                {
                    continue;
                }
                match state.graph.merge_inferred(candidate.to_input(), now) {
                    InferredOutcome::Created => {
                        auto_created_count += 1;
                        changed = true;
                    }
                    InferredOutcome::Strengthened => changed = true,
                    InferredOutcome::Unchanged => {}
                }
            }
            changed.then(|| state.bump())
        };

        info!(
            auto_created = auto_created_count,
            suggested = output.suggested.len(),
            conflicts = conflicts.len(),
            "Cross-tool analysis complete"
        );
        if let Some(seq) = seq {
            self.after_mutation(seq);
        }

        Ok(CrossToolReport {
            suggested_relationships: output.suggested,
            conflicts,
            auto_created_count,
        })
    }

    // ==================== Persistence ====================

    /// Write a snapshot now and report any failure.
    ///
    /// A memory-only store has nothing to write and succeeds.
    #[instrument(skip(self))]
    pub fn force_persist(&self) -> Result<()> {
        let Some(manager) = &self.inner.persistence else {
            debug!("No data directory configured; nothing to persist");
            return Ok(());
        };
        let snapshot = self.read_state()?.snapshot();
        manager.write(&snapshot)?;
        Ok(())
    }

    /// Write a snapshot if the flush policy says pending mutations are due.
    ///
    /// Returns whether a snapshot was written. Always `false` in test mode.
    pub fn flush_if_due(&self) -> Result<bool> {
        let Some(manager) = &self.inner.persistence else {
            return Ok(false);
        };
        if !manager.is_due()? {
            return Ok(false);
        }
        let snapshot = self.read_state()?.snapshot();
        manager.write(&snapshot)
    }

    /// Reset all in-memory state. Files on disk are left alone.
    pub fn clear_cache(&self) -> Result<()> {
        let mut state = self.write_state()?;
        let seq = state.seq;
        *state = StoreState::new(self.inner.config.knowledge_gap_floor);
        state.seq = seq;
        if let Some(manager) = &self.inner.persistence {
            manager.mark_clean(seq)?;
        }
        debug!("Store cache cleared");
        Ok(())
    }

    /// Start a background task that flushes on the elapsed-time trigger.
    ///
    /// Returns `None` without persistence, in test mode, or outside a tokio
    /// runtime. The task ends once every handle to the store is dropped.
    pub fn spawn_persistence_task(&self) -> Option<JoinHandle<()>> {
        self.inner.persistence.as_ref()?;
        if self.inner.config.persistence.test_mode {
            return None;
        }
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No tokio runtime; background persistence not started");
                return None;
            }
        };

        let period = self.inner.config.persistence.check_interval();
        let weak: Weak<StoreInner> = Arc::downgrade(&self.inner);
        Some(handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    debug!("Store dropped; persistence task exiting");
                    break;
                };
                let store = KnowledgeStore { inner };
                if let Err(e) = store.flush_if_due() {
                    warn!(error = %e, "Periodic flush failed");
                }
            }
        }))
    }

    fn after_mutation(&self, seq: u64) {
        let Some(manager) = &self.inner.persistence else {
            return;
        };
        match manager.record_mutation(seq) {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                warn!(error = %e, "Failed to record mutation");
                return;
            }
        }

        let snapshot = match self.read_state() {
            Ok(state) => state.snapshot(),
            Err(e) => {
                warn!(error = %e, "Failed to capture snapshot");
                return;
            }
        };

        let manager = Arc::clone(manager);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn_blocking(move || manager.flush(&snapshot));
                handle.spawn(async move {
                    if let Err(e) = task.await {
                        warn!(error = %e, seq, "Background flush task failed");
                    }
                });
            }
            Err(_) => manager.flush(&snapshot),
        }
    }
}
