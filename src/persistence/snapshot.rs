//! On-disk snapshot format and atomic file replacement.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;

use tracing::warn;

use crate::entity::{Entity, EntityId};
use crate::error::{Error, Result};
use crate::graph::Relationship;

/// Full copy of store contents taken under the read lock.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Store mutation sequence number at capture time.
    pub seq: u64,
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    /// Ids of deleted entities, which must never be reused.
    pub tombstones: Vec<EntityId>,
}

impl Snapshot {
    /// Build a snapshot with records sorted by id for stable output.
    pub fn new(seq: u64, mut entities: Vec<Entity>, mut relationships: Vec<Relationship>) -> Self {
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        relationships.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            seq,
            entities,
            relationships,
            tombstones: Vec::new(),
        }
    }

    /// Attach deleted ids, sorted.
    pub fn with_tombstones(mut self, tombstones: impl IntoIterator<Item = EntityId>) -> Self {
        self.tombstones = tombstones.into_iter().collect();
        self.tombstones.sort();
        self
    }
}

/// Serialize `records` as a JSON array and atomically replace `path`.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(records)?;
    write_atomic(path, &bytes)
}

/// Write to a sibling temp file, sync it, then rename over the target.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::persistence(format!("create directory {}", parent.display()), e)
            })?;
        }
    }

    let tmp = path.with_extension("json.tmp");
    let write = || -> std::io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()
    };
    if let Err(e) = write() {
        let _ = fs::remove_file(&tmp);
        return Err(Error::persistence(format!("write {}", tmp.display()), e));
    }

    fs::rename(&tmp, path)
        .map_err(|e| Error::persistence(format!("rename onto {}", path.display()), e))
}

/// Read a JSON array of records.
///
/// A missing file is `Ok(None)`; unreadable or malformed content is an error.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Option<Vec<T>>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::persistence(format!("read {}", path.display()), e)),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Read a JSON array of records, treating any failure as empty.
pub fn read_records_or_empty<T: DeserializeOwned>(path: &Path, what: &str) -> Vec<T> {
    match read_records(path) {
        Ok(Some(records)) => records,
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable {} snapshot", what);
            Vec::new()
        }
    }
}
