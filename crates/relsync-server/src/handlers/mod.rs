//! Event and check handlers.

pub mod access;
pub mod check;
pub mod envelope;

pub use access::EventService;
pub use check::CheckService;
pub use envelope::{AccessData, DeleteData, Envelope, MemberData};
