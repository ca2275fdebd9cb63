//! # archmem-core
//!
//! An embedded knowledge-graph store for architectural decision memory.
//!
//! ## Core Components
//!
//! - **Entity**: Versioned records of a closed set of kinds (decisions,
//!   deployment assessments, code components, ...)
//! - **Graph**: Typed, weighted relationships and bounded traversal
//! - **Query**: Filtering, stable sorting, pagination and aggregation
//! - **Inference**: Automatic relationship proposals and conflict detection
//! - **Intelligence**: Advisory activity patterns and knowledge gaps
//! - **Persistence**: Atomic JSON snapshots with a pluggable flush trigger
//!
//! ## Example
//!
//! ```rust,ignore
//! use archmem_core::{
//!     DecisionStatus, EntityInput, EntityPayload, KnowledgeStore, StoreConfig,
//! };
//!
//! let store = KnowledgeStore::open(StoreConfig::persistent("./.archmem"))?;
//! let decision = store.upsert_entity(
//!     EntityInput::new(
//!         EntityPayload::decision(DecisionStatus::Accepted, "Adopt event sourcing"),
//!         "Order history model",
//!     )
//!     .with_stack(["kafka", "postgres"]),
//! )?;
//!
//! let report = store.create_cross_tool_relationships()?;
//! for conflict in &report.conflicts {
//!     println!("{}: {}", conflict.severity, conflict.description);
//! }
//! store.force_persist()?;
//! ```

pub mod entity;
pub mod error;
pub mod graph;
pub mod inference;
pub mod intelligence;
pub mod persistence;
pub mod query;
pub mod store;

// Re-exports for convenience
pub use entity::{
    AssessmentPayload, DecisionStatus, Entity, EntityContext, EntityId, EntityInput, EntityKind,
    EntityPayload, Transformation, Validation,
};
pub use error::{Error, Result};
pub use graph::{
    RelatedEntities, Relationship, RelationshipId, RelationshipInput, RelationshipType,
};
pub use inference::{
    Conflict, ConflictConfig, ConflictSeverity, CrossToolReport, InferenceConfig,
    SuggestedRelationship,
};
pub use intelligence::{IntelligenceSnapshot, KnowledgeGap};
pub use persistence::{FlushPolicy, FlushTrigger, PersistenceConfig};
pub use query::{EntityQuery, QueryResult, SortKey, SortOrder};
pub use store::{KnowledgeStore, StoreConfig, StoreStats};
