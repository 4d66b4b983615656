//! Reconciliation engine for the synapse operator.
//!
//! A pass takes the synthesized children of one component and converges the
//! cluster toward them. Key concepts:
//!
//! - **Desired state**: the children synthesized from a record.
//! - **Observed state**: what the record store currently holds.
//! - **Drift**: a difference in one of the fields a kind's checklist inspects.
//!
//! # Invariants
//!
//! - Passes are idempotent: a second pass with no external change writes
//!   nothing.
//! - Children are applied content first, then the workload, then the service.
//! - Every create and patch carries a controller owner reference.
//! - The rollout marker is only rewritten by [`force_rollout`], never by a
//!   patch.

pub mod child;
pub mod diff;
pub mod driver;
pub mod error;
pub mod memory;
pub mod owner;
pub mod retry;
pub mod rollout;
pub mod store;

pub use child::{ChildKind, ChildResource};
pub use driver::{apply_children, ensure, ChildOutcome, ChildSet, PassReport};
pub use error::{Disposition, Outcome, ReconcileError};
pub use memory::{InMemoryStore, WriteRecord, WriteVerb};
pub use owner::{owner_reference, set_owner};
pub use retry::{RetryPolicy, RetryTracker};
pub use rollout::{force_rollout, rollout_marker, rollout_marker_of, ROLLOUT_ANNOTATION};
pub use store::{Managed, ObjectKey, ResourceStore, StoreError};
