//! The generic event envelope and its operation payloads.
//!
//! Every mutating bus subject carries the same envelope so producers do
//! not need resource-specific message formats:
//!
//! ```json
//! {
//!   "object_type": "committee",
//!   "operation": "update_access",
//!   "data": { "uid": "committee-123", "relations": {"member": ["alice"]} }
//! }
//! ```

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use relsync_domain::Policy;

use crate::error::{HandlerError, HandlerResult};

/// Operation identifier for full-object access updates.
pub const OP_UPDATE_ACCESS: &str = "update_access";
/// Operation identifier for deleting all of an object's tuples.
pub const OP_DELETE_ACCESS: &str = "delete_access";
/// Operation identifier for per-user relation puts.
pub const OP_MEMBER_PUT: &str = "member_put";
/// Operation identifier for per-user relation removals.
pub const OP_MEMBER_REMOVE: &str = "member_remove";

/// The universal message format for all synchronizer operations.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub object_type: String,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Parses an envelope from a raw bus payload.
    pub fn parse(payload: &[u8]) -> HandlerResult<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| HandlerError::malformed(format!("failed to parse envelope: {e}")))
    }

    /// Validates the shared required fields against the expected operation.
    pub fn expect_operation(&self, operation: &str) -> HandlerResult<()> {
        if self.object_type.is_empty() {
            return Err(HandlerError::malformed("object_type is required"));
        }
        if self.operation != operation {
            return Err(HandlerError::malformed(format!(
                "invalid operation {:?} for {operation} handler",
                self.operation
            )));
        }
        Ok(())
    }

    /// Deserializes the `data` field into an operation payload.
    pub fn data_as<T: DeserializeOwned>(&self) -> HandlerResult<T> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| HandlerError::malformed(format!("failed to parse operation data: {e}")))
    }
}

/// Payload of an `update_access` operation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessData {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub public: bool,
    /// relation name → principal usernames
    #[serde(default)]
    pub relations: HashMap<String, Vec<String>>,
    /// relation name → referenced object ids (bare or typed)
    #[serde(default)]
    pub references: HashMap<String, Vec<String>>,
    /// Relations managed by other event streams; a sync must not touch them.
    #[serde(default)]
    pub exclude_relations: Vec<String>,
    /// Fine-grained policies to expand after the sync.
    #[serde(default)]
    pub policies: Vec<Policy>,
}

impl AccessData {
    pub fn validate(&self, object_type: &str) -> HandlerResult<()> {
        if self.uid.is_empty() {
            return Err(HandlerError::malformed(format!("{object_type} uid is required")));
        }
        Ok(())
    }
}

/// Payload of a `delete_access` operation.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteData {
    #[serde(default)]
    pub uid: String,
}

impl DeleteData {
    pub fn validate(&self) -> HandlerResult<()> {
        if self.uid.is_empty() {
            return Err(HandlerError::malformed("uid is required"));
        }
        Ok(())
    }
}

/// Payload of a `member_put` or `member_remove` operation.
///
/// Multiple relations are supported so a user's whole role set on an
/// object updates atomically.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberData {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub relations: Vec<String>,
    /// Relations to vacate when putting the desired ones.
    #[serde(default)]
    pub mutually_exclusive_with: Vec<String>,
}

impl MemberData {
    /// Validation shared by put and remove.
    pub fn validate(&self) -> HandlerResult<()> {
        if self.username.is_empty() {
            return Err(HandlerError::malformed("username is required"));
        }
        if self.uid.is_empty() {
            return Err(HandlerError::malformed("uid is required"));
        }
        Ok(())
    }

    /// Additional validation for `member_put`, which must name at least
    /// one non-empty relation.
    pub fn validate_for_put(&self) -> HandlerResult<()> {
        self.validate()?;
        if self.relations.is_empty() {
            return Err(HandlerError::malformed("relations array cannot be empty"));
        }
        if self.relations.iter().any(String::is_empty) {
            return Err(HandlerError::malformed("relation value cannot be empty"));
        }
        Ok(())
    }
}
