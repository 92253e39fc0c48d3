//! Relationship tuples and identifier helpers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The wildcard user granting public access.
pub const USER_WILDCARD: &str = "user:*";

/// Prefix for user principals (`user:<id>`).
pub const USER_PREFIX: &str = "user:";

/// Relation granted to `user:*` when an object is public.
pub const RELATION_VIEWER: &str = "viewer";

/// Relation whose reference values are typed by the enclosing object type.
pub const RELATION_PARENT: &str = "parent";

/// Default member relation used by policy expansion.
pub const RELATION_MEMBER: &str = "member";

/// A relationship tuple `(user, relation, object)`.
///
/// Tuples are globally unique by all three fields. The `user` field is
/// typed: `user:<id>`, the wildcard `user:*`, another object `<type>:<id>`
/// standing for its members, or a userset reference `<type>:<id>#<relation>`.
/// The synchronizer never interprets userset references; they pass through
/// to the store untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tuple {
    pub user: String,
    pub relation: String,
    pub object: String,
}

impl Tuple {
    /// Creates a new tuple.
    pub fn new(
        user: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }

    /// The `(user, relation)` identity used when de-duplicating a desired
    /// set for a single object.
    pub fn member_key(&self) -> (&str, &str) {
        (self.user.as_str(), self.relation.as_str())
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.object, self.relation, self.user)
    }
}

/// Renders the canonical object fingerprint `<type>:<uid>`.
pub fn object_id(object_type: &str, uid: &str) -> String {
    format!("{object_type}:{uid}")
}

/// Renders the principal identity for a username (`user:<username>`).
pub fn user_principal(username: &str) -> String {
    format!("{USER_PREFIX}{username}")
}
