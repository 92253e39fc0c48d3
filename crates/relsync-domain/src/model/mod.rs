//! Data model: tuples, check items, and policies.

pub mod check;
pub mod policy;
pub mod tuple;

pub use check::{parse_check_request, CheckItem};
pub use policy::Policy;
pub use tuple::Tuple;
