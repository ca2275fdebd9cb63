//! In-memory relationship index.
//!
//! Edges live in a flat map keyed by [`RelationshipId`]; a triple index
//! enforces uniqueness and an adjacency index maps each entity to the edges
//! touching it. Entities are referenced only by id, so deleting one is a
//! plain index operation.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

use super::types::{Relationship, RelationshipId, RelationshipInput, RelationshipType, Triple};
use crate::entity::EntityId;
use crate::error::{Error, Result};

/// Result of a caller-driven relationship upsert.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// A new edge was stored.
    Inserted(Relationship),
    /// An existing edge was overwritten (explicit replace).
    Replaced(Relationship),
    /// An identical edge already existed.
    Unchanged(Relationship),
}

impl UpsertOutcome {
    pub fn relationship(&self) -> &Relationship {
        match self {
            Self::Inserted(r) | Self::Replaced(r) | Self::Unchanged(r) => r,
        }
    }

    pub fn into_relationship(self) -> Relationship {
        match self {
            Self::Inserted(r) | Self::Replaced(r) | Self::Unchanged(r) => r,
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Unchanged(_))
    }
}

/// Result of merging an inferred edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferredOutcome {
    Created,
    Strengthened,
    Unchanged,
}

/// Typed, directed edges indexed by id, triple and endpoint.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    edges: HashMap<RelationshipId, Relationship>,
    triples: HashMap<Triple, RelationshipId>,
    adjacency: HashMap<EntityId, BTreeSet<RelationshipId>>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn get(&self, id: &RelationshipId) -> Option<&Relationship> {
        self.edges.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.edges.values()
    }

    /// Look up an edge by its exact triple.
    pub fn find(&self, triple: &Triple) -> Option<&Relationship> {
        self.triples.get(triple).and_then(|id| self.edges.get(id))
    }

    /// Look up an edge by triple, also accepting the reverse direction for
    /// symmetric types.
    pub fn find_link(
        &self,
        source: EntityId,
        target: EntityId,
        relationship_type: RelationshipType,
    ) -> Option<&Relationship> {
        self.find(&(source, target, relationship_type)).or_else(|| {
            if relationship_type.is_symmetric() {
                self.find(&(target, source, relationship_type))
            } else {
                None
            }
        })
    }

    /// Edges touching an entity, ordered by relationship id.
    pub fn edges_of<'a>(&'a self, id: &EntityId) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.adjacency
            .get(id)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(move |rid| self.edges.get(rid))
    }

    /// Whether any edge connects `a` and `b`, in either direction.
    pub fn connected(&self, a: &EntityId, b: &EntityId) -> bool {
        self.edges_of(a).any(|r| r.other_end(a) == Some(*b))
    }

    /// Insert or replace according to the uniqueness rules.
    ///
    /// Endpoint existence is the caller's concern.
    pub fn upsert(&mut self, input: RelationshipInput, now: DateTime<Utc>) -> Result<UpsertOutcome> {
        input.validate()?;

        if let Some(existing) = self.find(&input.triple()) {
            if existing.same_attributes(&input) {
                return Ok(UpsertOutcome::Unchanged(existing.clone()));
            }
            if !input.replace {
                return Err(Error::conflict(format!(
                    "relationship {} {} {} already exists with different attributes",
                    input.source_id, input.relationship_type, input.target_id
                )));
            }

            let mut replaced = existing.clone();
            replaced.strength = input.strength;
            replaced.confidence = input.confidence;
            replaced.evidence = input.evidence;
            replaced.last_validated = now;
            self.edges.insert(replaced.id, replaced.clone());
            return Ok(UpsertOutcome::Replaced(replaced));
        }

        let relationship = input.into_relationship(now);
        self.index(relationship.clone());
        Ok(UpsertOutcome::Inserted(relationship))
    }

    /// Store an already-materialized edge, e.g. from a snapshot.
    ///
    /// Returns `false` and stores nothing when the triple or id is taken.
    pub fn insert(&mut self, relationship: Relationship) -> bool {
        if self.triples.contains_key(&relationship.triple())
            || self.edges.contains_key(&relationship.id)
        {
            return false;
        }
        self.index(relationship);
        true
    }

    /// Merge an inferred edge without duplicating or weakening existing ones.
    pub fn merge_inferred(&mut self, input: RelationshipInput, now: DateTime<Utc>) -> InferredOutcome {
        let existing_id = self
            .find_link(input.source_id, input.target_id, input.relationship_type)
            .map(|r| r.id);

        match existing_id.and_then(|id| self.edges.get_mut(&id)) {
            Some(existing) => {
                if input.confidence <= existing.confidence {
                    return InferredOutcome::Unchanged;
                }
                existing.confidence = input.confidence;
                existing.strength = existing.strength.max(input.strength);
                for item in input.evidence {
                    if !existing.evidence.contains(&item) {
                        existing.evidence.push(item);
                    }
                }
                existing.last_validated = now;
                InferredOutcome::Strengthened
            }
            None => {
                self.index(input.into_relationship(now));
                InferredOutcome::Created
            }
        }
    }

    /// Remove one edge.
    pub fn remove(&mut self, id: &RelationshipId) -> Option<Relationship> {
        let relationship = self.edges.remove(id)?;
        self.triples.remove(&relationship.triple());
        for endpoint in [relationship.source_id, relationship.target_id] {
            if let Some(ids) = self.adjacency.get_mut(&endpoint) {
                ids.remove(id);
                if ids.is_empty() {
                    self.adjacency.remove(&endpoint);
                }
            }
        }
        Some(relationship)
    }

    /// Remove every edge touching an entity.
    pub fn remove_entity(&mut self, id: &EntityId) -> Vec<Relationship> {
        let ids: Vec<RelationshipId> = self
            .adjacency
            .get(id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();

        ids.iter().filter_map(|rid| self.remove(rid)).collect()
    }

    /// Edge counts grouped by type.
    pub fn count_by_type(&self) -> HashMap<RelationshipType, u64> {
        let mut counts = HashMap::new();
        for relationship in self.edges.values() {
            *counts.entry(relationship.relationship_type).or_insert(0) += 1;
        }
        counts
    }

    fn index(&mut self, relationship: Relationship) {
        let id = relationship.id;
        self.triples.insert(relationship.triple(), id);
        self.adjacency
            .entry(relationship.source_id)
            .or_default()
            .insert(id);
        self.adjacency
            .entry(relationship.target_id)
            .or_default()
            .insert(id);
        self.edges.insert(id, relationship);
    }
}
