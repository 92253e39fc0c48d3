//! relsync-storage: Storage abstraction layer
//!
//! This crate provides the synchronizer's view of its two remote
//! dependencies:
//! - The relationship store (a ReBAC engine reached over the wire), via
//!   the `RelationClient` trait and the `StoreAdapter` built on top of it
//! - The shared KV cache, via the `KvBucket` trait
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              relsync-storage                 │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs  - RelationClient / KvBucket     │
//! │  adapter.rs - StoreAdapter (pagination,     │
//! │               idempotent writes, cache      │
//! │               invalidation)                 │
//! │  memory.rs  - In-memory test doubles        │
//! └─────────────────────────────────────────────┘
//! ```

pub mod adapter;
pub mod error;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use adapter::StoreAdapter;
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryKvBucket, MemoryRelationClient};
pub use traits::{KvBucket, KvEntry, ReadPage, RelationClient};

// Re-export chrono types for timestamp handling
pub use chrono::{DateTime, Utc};
