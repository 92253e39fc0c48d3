//! relsync-server: Business logic layer
//!
//! This crate contains the synchronizer's business logic:
//! - The reconciliation engine (full-object sync, per-user member put and
//!   remove, two-level policy expansion)
//! - Generic event-envelope handlers for the four bus operations
//! - The batched check service with invalidation-aware caching and
//!   per-key singleflight
//! - Configuration management
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               relsync-server                 │
//! ├─────────────────────────────────────────────┤
//! │  config.rs   - Configuration management     │
//! │  engine/     - Reconciliation engine        │
//! │  handlers/   - Envelope + check handlers    │
//! └─────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;

// Re-exports for convenience
pub use config::{ConfigLoadError, ServiceConfig};
pub use engine::SyncEngine;
pub use error::{HandlerError, HandlerResult};
pub use handlers::access::EventService;
pub use handlers::check::CheckService;
