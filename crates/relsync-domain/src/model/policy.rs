//! Fine-grained authorization policies.
//!
//! A policy attaches a named, valued rule to a resource through a two-level
//! tuple structure. The store expands it as:
//!
//! ```text
//! Object: committee:1234
//! └── relation: visibility_policy → user: visibility_policy:basic_profile
//!     └── relation: allows_basic_profile → user: committee:1234#member
//!         └── contains: user:<id>
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// A fine-grained authorization policy carried on a resource event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    pub relation: String,
    pub value: String,
}

impl Policy {
    /// Checks that all fields are present.
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.is_empty() {
            return Err(DomainError::InvalidPolicy {
                message: "policy name cannot be empty".to_string(),
            });
        }
        if self.value.is_empty() {
            return Err(DomainError::InvalidPolicy {
                message: "policy value cannot be empty".to_string(),
            });
        }
        if self.relation.is_empty() {
            return Err(DomainError::InvalidPolicy {
                message: "policy relation cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// The policy's own object identifier, e.g. `visibility_policy:basic_profile`.
    pub fn object_id(&self) -> String {
        format!("{}:{}", self.name, self.value)
    }

    /// The userset reference granting the policy to an object's members,
    /// e.g. `committee:123#member`.
    pub fn userset_ref(&self, object: &str, member_relation: &str) -> String {
        format!("{object}#{member_relation}")
    }
}
