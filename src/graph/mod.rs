//! Typed relationship graph between entities.
//!
//! Relationships are directed, weighted edges keyed by
//! `(source, target, type)`. The graph holds entity ids only, never entity
//! records, so there are no ownership cycles to manage.
//!
//! ## Example
//!
//! ```rust,ignore
//! use archmem_core::graph::{RelationshipInput, RelationshipType};
//!
//! store.upsert_relationship(
//!     RelationshipInput::new(component.id, decision.id, RelationshipType::Implements)
//!         .with_confidence(0.9)
//!         .with_evidence("src/db.rs opens the Postgres pool"),
//! )?;
//!
//! let related = store.find_related_entities(&decision.id, 2)?;
//! ```

mod index;
mod traversal;
mod types;

pub use index::{InferredOutcome, RelationshipGraph, UpsertOutcome};
pub use traversal::{traverse, RelatedEntities, RelatedEntity, RelationshipPath};
pub use types::{Relationship, RelationshipId, RelationshipInput, RelationshipType, Triple};
