//! relsync-domain: Relationship-tuple model and reconciliation planning
//!
//! This crate contains the pure core of the synchronizer:
//! - Tuple and object-identifier types
//! - Check-request parsing and the cache-key codec
//! - Fine-grained policy descriptors
//! - Set-difference planners that turn desired/current tuple sets into
//!   minimal write/delete batches
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               relsync-domain                 │
//! ├─────────────────────────────────────────────┤
//! │  model/   - Tuples, check items, policies   │
//! │  plan.rs  - Reconciliation diff computation │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Everything here is synchronous, in-memory computation; I/O lives in
//! `relsync-storage` and above.

pub mod error;
pub mod model;
pub mod plan;

// Re-export commonly used types at the crate root
pub use error::{DomainError, DomainResult};
pub use model::check::CheckItem;
pub use model::policy::Policy;
pub use model::tuple::Tuple;
pub use plan::TupleDiff;
