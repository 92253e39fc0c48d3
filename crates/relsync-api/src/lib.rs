//! relsync-api: Process surface of the synchronizer
//!
//! This crate wires the business logic to the outside world:
//! - Bus subjects and the dispatcher mapping them to handlers
//! - Resource-specific legacy adapters (committee, project, meeting, ...)
//! - The OpenFGA HTTP client and the JetStream KV bucket adapter
//! - Observability initialization and the metrics/health listener

pub mod dispatch;
pub mod nats;
pub mod observability;
pub mod openfga;
pub mod resources;
pub mod subjects;

pub use dispatch::{BusMessage, DispatchError, Dispatcher};
