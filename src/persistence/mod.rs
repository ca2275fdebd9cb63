//! Durable snapshots of the store.
//!
//! The store's full contents are written as three JSON arrays,
//! `entities.json`, `relationships.json` and `tombstones.json` (ids of
//! deleted entities), each replaced atomically. A
//! [`FlushTrigger`] decides when pending mutations are worth writing; the
//! store consults it after every mutation and a background task consults it
//! on a timer. Writes never happen under the store lock: the store captures a
//! [`Snapshot`] under the read guard and hands it to the manager.

mod policy;
mod snapshot;

pub use policy::{FlushPolicy, FlushTrigger};
pub use snapshot::{read_records, write_atomic, write_records, Snapshot};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::entity::{Entity, EntityId};
use crate::error::{Error, Result};
use crate::graph::Relationship;

/// Persistence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistenceConfig {
    /// Directory holding the snapshot files; `None` keeps the store in memory.
    pub data_dir: Option<PathBuf>,
    pub entities_file: String,
    pub relationships_file: String,
    /// Ids of deleted entities.
    pub tombstones_file: String,
    /// Flush pending mutations after this long, in seconds.
    pub flush_interval_secs: u64,
    /// Flush once this many mutations are pending.
    pub mutation_threshold: u64,
    /// Disable every automatic flush; only `force_persist` writes.
    pub test_mode: bool,
    /// Load existing snapshots when the store opens.
    pub load_on_init: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            entities_file: "entities.json".to_string(),
            relationships_file: "relationships.json".to_string(),
            tombstones_file: "tombstones.json".to_string(),
            flush_interval_secs: 30 * 60,
            mutation_threshold: 2,
            test_mode: false,
            load_on_init: true,
        }
    }
}

impl PersistenceConfig {
    /// Persist under `dir` with default cadence.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Persist under `dir`, writing only on explicit request.
    pub fn for_tests(dir: impl Into<PathBuf>) -> Self {
        Self {
            test_mode: true,
            ..Self::in_dir(dir)
        }
    }

    /// No persistence at all.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_flush_interval_secs(mut self, secs: u64) -> Self {
        self.flush_interval_secs = secs.max(1);
        self
    }

    pub fn with_mutation_threshold(mut self, threshold: u64) -> Self {
        self.mutation_threshold = threshold.max(1);
        self
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    pub fn without_load(mut self) -> Self {
        self.load_on_init = false;
        self
    }

    /// Policy derived from the cadence fields.
    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy {
            interval: Duration::from_secs(self.flush_interval_secs.max(1)),
            mutation_threshold: self.mutation_threshold.max(1),
        }
    }

    /// How often the background task checks the elapsed-time trigger.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs.clamp(1, 60))
    }
}

/// Entities and relationships recovered from disk.
#[derive(Debug, Clone, Default)]
pub struct LoadedSnapshot {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub tombstones: HashSet<EntityId>,
    /// Relationships discarded for unknown endpoints or duplicate triples.
    pub dropped_relationships: usize,
}

#[derive(Debug)]
struct FlushState {
    /// Highest store sequence number reported as mutated.
    latest_seq: u64,
    /// Sequence number of the newest snapshot on disk.
    written_seq: u64,
    last_flush: Instant,
}

impl FlushState {
    fn pending(&self) -> u64 {
        self.latest_seq.saturating_sub(self.written_seq)
    }
}

/// Tracks unflushed mutations and writes snapshots.
pub struct PersistenceManager {
    entities_path: PathBuf,
    relationships_path: PathBuf,
    tombstones_path: PathBuf,
    trigger: Box<dyn FlushTrigger>,
    test_mode: bool,
    state: Mutex<FlushState>,
    /// Serializes writers so the sequence check and the rename are atomic.
    io: Mutex<()>,
}

impl std::fmt::Debug for PersistenceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceManager")
            .field("entities_path", &self.entities_path)
            .field("relationships_path", &self.relationships_path)
            .field("tombstones_path", &self.tombstones_path)
            .field("test_mode", &self.test_mode)
            .finish()
    }
}

impl PersistenceManager {
    /// Build a manager for the configured directory, or `None` when disabled.
    pub fn from_config(config: &PersistenceConfig) -> Option<Self> {
        let dir = config.data_dir.as_ref()?;
        Some(Self::with_trigger(
            dir.join(&config.entities_file),
            dir.join(&config.relationships_file),
            dir.join(&config.tombstones_file),
            Box::new(config.flush_policy()),
            config.test_mode,
        ))
    }

    /// Build a manager with a custom trigger.
    pub fn with_trigger(
        entities_path: PathBuf,
        relationships_path: PathBuf,
        tombstones_path: PathBuf,
        trigger: Box<dyn FlushTrigger>,
        test_mode: bool,
    ) -> Self {
        Self {
            entities_path,
            relationships_path,
            tombstones_path,
            trigger,
            test_mode,
            state: Mutex::new(FlushState {
                latest_seq: 0,
                written_seq: 0,
                last_flush: Instant::now(),
            }),
            io: Mutex::new(()),
        }
    }

    pub fn entities_path(&self) -> &PathBuf {
        &self.entities_path
    }

    pub fn relationships_path(&self) -> &PathBuf {
        &self.relationships_path
    }

    pub fn tombstones_path(&self) -> &PathBuf {
        &self.tombstones_path
    }

    pub fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    /// Note that the store reached sequence number `seq`.
    ///
    /// Returns `true` when an automatic flush should follow.
    pub fn record_mutation(&self, seq: u64) -> Result<bool> {
        let mut state = self.lock_state()?;
        state.latest_seq = state.latest_seq.max(seq);
        Ok(!self.test_mode
            && self
                .trigger
                .should_flush(state.pending(), state.last_flush.elapsed()))
    }

    /// Whether pending mutations are due by the trigger alone.
    pub fn is_due(&self) -> Result<bool> {
        let state = self.lock_state()?;
        Ok(!self.test_mode
            && self
                .trigger
                .should_flush(state.pending(), state.last_flush.elapsed()))
    }

    /// Number of mutations not yet on disk.
    pub fn pending(&self) -> Result<u64> {
        Ok(self.lock_state()?.pending())
    }

    /// Forget pending mutations without writing, e.g. after an in-memory reset.
    pub fn mark_clean(&self, seq: u64) -> Result<()> {
        let mut state = self.lock_state()?;
        state.latest_seq = seq;
        state.written_seq = seq;
        state.last_flush = Instant::now();
        Ok(())
    }

    /// Write a snapshot unless a newer one is already on disk.
    ///
    /// Returns `Ok(false)` when the snapshot was stale and skipped.
    #[instrument(skip(self, snapshot), fields(seq = snapshot.seq))]
    pub fn write(&self, snapshot: &Snapshot) -> Result<bool> {
        let _io = self
            .io
            .lock()
            .map_err(|_| Error::Internal("persistence io lock poisoned".into()))?;

        if snapshot.seq < self.lock_state()?.written_seq {
            debug!("Skipping stale snapshot");
            return Ok(false);
        }

        write_records(&self.tombstones_path, &snapshot.tombstones)?;
        write_records(&self.entities_path, &snapshot.entities)?;
        write_records(&self.relationships_path, &snapshot.relationships)?;

        let mut state = self.lock_state()?;
        state.written_seq = state.written_seq.max(snapshot.seq);
        state.latest_seq = state.latest_seq.max(snapshot.seq);
        state.last_flush = Instant::now();
        debug!(
            entities = snapshot.entities.len(),
            relationships = snapshot.relationships.len(),
            "Snapshot written"
        );
        Ok(true)
    }

    /// Automatic flush: write and log, never fail.
    pub fn flush(&self, snapshot: &Snapshot) {
        if let Err(e) = self.write(snapshot) {
            warn!(error = %e, seq = snapshot.seq, "Automatic flush failed");
        }
    }

    /// Read the snapshot files.
    ///
    /// Missing or unreadable files count as empty. Entities whose id is
    /// tombstoned are dropped, as are relationships with an unknown endpoint
    /// or a repeated triple.
    #[instrument(skip(self))]
    pub fn load(&self) -> LoadedSnapshot {
        let mut entities: Vec<Entity> =
            snapshot::read_records_or_empty(&self.entities_path, "entity");
        let raw: Vec<Relationship> =
            snapshot::read_records_or_empty(&self.relationships_path, "relationship");
        let tombstones: HashSet<EntityId> =
            snapshot::read_records_or_empty(&self.tombstones_path, "tombstone")
                .into_iter()
                .collect();

        let mut seen_ids: HashSet<EntityId> = HashSet::new();
        entities.retain(|e| !tombstones.contains(&e.id) && seen_ids.insert(e.id));

        let mut triples = HashMap::new();
        let mut relationships = Vec::with_capacity(raw.len());
        let mut dropped = 0;
        for relationship in raw {
            let known = seen_ids.contains(&relationship.source_id)
                && seen_ids.contains(&relationship.target_id);
            if !known || triples.insert(relationship.triple(), relationship.id).is_some() {
                dropped += 1;
                continue;
            }
            relationships.push(relationship);
        }

        if dropped > 0 {
            warn!(dropped, "Dropped dangling or duplicate relationships on load");
        }
        info!(
            entities = entities.len(),
            relationships = relationships.len(),
            tombstones = tombstones.len(),
            "Loaded snapshot"
        );

        LoadedSnapshot {
            entities,
            relationships,
            tombstones,
            dropped_relationships: dropped,
        }
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, FlushState>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("persistence state lock poisoned".into()))
    }
}
