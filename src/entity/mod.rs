//! Typed memory entities.
//!
//! Entities are versioned records over a closed set of kinds:
//!
//! - **Architectural decisions** with status, consequences and alternatives
//! - **Deployment assessments** with a readiness score and blocking issues
//! - **Code components**, **knowledge artifacts**, **troubleshooting sessions**,
//!   **environment snapshots**, **security patterns**, **failure patterns**
//!
//! ## Example
//!
//! ```rust,ignore
//! use archmem_core::entity::{DecisionStatus, EntityInput, EntityPayload};
//!
//! let input = EntityInput::new(
//!     EntityPayload::decision(DecisionStatus::Accepted, "Use PostgreSQL"),
//!     "Primary datastore",
//! )
//! .with_stack(["node", "postgres"])
//! .with_confidence(0.9);
//!
//! let entity = store.upsert_entity(input)?;
//! assert_eq!(entity.version, 1);
//! ```

mod input;
mod payload;
mod types;
pub(crate) mod validate;

pub use input::EntityInput;
pub use payload::{
    ArtifactPayload, AssessmentPayload, ComponentPayload, DecisionPayload, DecisionStatus,
    EntityPayload, EnvironmentPayload, FailurePayload, SecurityPayload, TroubleshootingPayload,
};
pub use types::{
    AccessPattern, Entity, EntityContext, EntityId, EntityKind, Evolution, Origin,
    Transformation, Validation, MAX_ACCESS_CONTEXTS,
};
pub use validate::{DEFAULT_CONFIDENCE, DEFAULT_RELEVANCE};
