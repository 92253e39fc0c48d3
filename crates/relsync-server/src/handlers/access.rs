//! Generic handlers for the four mutating bus operations.
//!
//! This is the only layer that turns event payloads into desired tuple
//! sets; the engine below it deals purely in tuples. Resource-specific
//! legacy subjects translate their payloads into the same operations and
//! funnel through here.

use std::sync::Arc;

use tracing::{error, info};

use relsync_domain::model::tuple::{
    object_id, user_principal, RELATION_MEMBER, RELATION_PARENT, RELATION_VIEWER, USER_WILDCARD,
};
use relsync_domain::Tuple;
use relsync_storage::{KvBucket, RelationClient, StoreAdapter};

use crate::engine::SyncEngine;
use crate::error::HandlerResult;
use crate::handlers::envelope::{
    AccessData, DeleteData, Envelope, MemberData, OP_DELETE_ACCESS, OP_MEMBER_PUT,
    OP_MEMBER_REMOVE, OP_UPDATE_ACCESS,
};

/// Builds the desired tuple set for an access update.
///
/// - `public: true` becomes the wildcard viewer tuple `(user:*, viewer, ·)`.
/// - Each reference value becomes a userset tuple. A value already
///   containing `:` is used verbatim; a bare value is prefixed with the
///   reference's relation name, except for the `parent` relation, whose
///   references are typed by the enclosing object type (a committee's
///   parent is another committee).
/// - Each principal under `relations` becomes a `user:<principal>` tuple.
pub fn build_desired_tuples(object_type: &str, object: &str, data: &AccessData) -> Vec<Tuple> {
    let mut tuples = Vec::with_capacity(4);

    if data.public {
        tuples.push(Tuple::new(USER_WILDCARD, RELATION_VIEWER, object));
    }

    for (reference, values) in &data.references {
        let ref_type = if reference == RELATION_PARENT {
            object_type
        } else {
            reference.as_str()
        };
        for value in values {
            let user = if value.contains(':') {
                value.clone()
            } else {
                format!("{ref_type}:{value}")
            };
            tuples.push(Tuple::new(user, reference.clone(), object));
        }
    }

    for (relation, principals) in &data.relations {
        for principal in principals {
            tuples.push(Tuple::new(user_principal(principal), relation.clone(), object));
        }
    }

    tuples
}

/// Entry point for mutating events: parses envelopes, validates payloads,
/// and drives the reconciliation engine.
#[derive(Debug)]
pub struct EventService<C, K> {
    engine: SyncEngine<C, K>,
}

impl<C, K> EventService<C, K>
where
    C: RelationClient,
    K: KvBucket,
{
    /// Creates the service over a shared store adapter.
    pub fn new(store: Arc<StoreAdapter<C, K>>) -> Self {
        Self {
            engine: SyncEngine::new(store),
        }
    }

    /// The engine, for callers composing their own operations.
    pub fn engine(&self) -> &SyncEngine<C, K> {
        &self.engine
    }

    /// Handles a generic `update_access` envelope.
    pub async fn update_access(&self, payload: &[u8]) -> HandlerResult<()> {
        let envelope = Envelope::parse(payload)?;
        envelope.expect_operation(OP_UPDATE_ACCESS)?;
        let data: AccessData = envelope.data_as()?;
        self.apply_update_access(&envelope.object_type, data).await
    }

    /// Applies an access update that has already been translated out of
    /// its envelope (the path legacy resource adapters take).
    pub async fn apply_update_access(
        &self,
        object_type: &str,
        data: AccessData,
    ) -> HandlerResult<()> {
        data.validate(object_type)?;
        let object = object_id(object_type, &data.uid);
        let desired = build_desired_tuples(object_type, &object, &data);

        let (writes, deletes) = self
            .engine
            .sync_object(&object, desired, &data.exclude_relations)
            .await
            .inspect_err(|err| error!(object, error = %err, "failed to sync object tuples"))?;
        info!(object, writes, deletes, "handled access update");

        if !data.policies.is_empty() {
            self.engine
                .apply_policies(&object, RELATION_MEMBER, &data.policies)
                .await
                .inspect_err(|err| error!(object, error = %err, "failed to evaluate policies"))?;
        }

        Ok(())
    }

    /// Handles a generic `delete_access` envelope.
    pub async fn delete_access(&self, payload: &[u8]) -> HandlerResult<()> {
        let envelope = Envelope::parse(payload)?;
        envelope.expect_operation(OP_DELETE_ACCESS)?;
        let data: DeleteData = envelope.data_as()?;
        data.validate()?;
        self.apply_delete_access(&envelope.object_type, &data.uid).await
    }

    /// Deletes every tuple for an object by syncing against an empty
    /// desired set.
    pub async fn apply_delete_access(&self, object_type: &str, uid: &str) -> HandlerResult<()> {
        let object = object_id(object_type, uid);
        let (writes, deletes) = self
            .engine
            .sync_object(&object, Vec::new(), &[])
            .await
            .inspect_err(|err| error!(object, error = %err, "failed to delete access"))?;
        info!(object, writes, deletes, "deleted all access");
        Ok(())
    }

    /// Handles a generic `member_put` envelope.
    pub async fn member_put(&self, payload: &[u8]) -> HandlerResult<()> {
        let envelope = Envelope::parse(payload)?;
        envelope.expect_operation(OP_MEMBER_PUT)?;
        let data: MemberData = envelope.data_as()?;
        self.apply_member_put(&envelope.object_type, data).await
    }

    /// Grants a user their desired relation set on an object.
    pub async fn apply_member_put(&self, object_type: &str, data: MemberData) -> HandlerResult<()> {
        data.validate_for_put()?;
        let object = object_id(object_type, &data.uid);
        let user = user_principal(&data.username);

        self.engine
            .put_member(&object, &user, &data.relations, &data.mutually_exclusive_with)
            .await
            .inspect_err(|err| error!(object, user, error = %err, "failed to put member"))?;
        Ok(())
    }

    /// Handles a generic `member_remove` envelope.
    pub async fn member_remove(&self, payload: &[u8]) -> HandlerResult<()> {
        let envelope = Envelope::parse(payload)?;
        envelope.expect_operation(OP_MEMBER_REMOVE)?;
        let data: MemberData = envelope.data_as()?;
        self.apply_member_remove(&envelope.object_type, data).await
    }

    /// Removes relations a user holds on an object; an empty relation
    /// list removes them all.
    pub async fn apply_member_remove(
        &self,
        object_type: &str,
        data: MemberData,
    ) -> HandlerResult<()> {
        data.validate()?;
        let object = object_id(object_type, &data.uid);
        let user = user_principal(&data.username);

        self.engine
            .remove_member(&object, &user, &data.relations)
            .await
            .inspect_err(|err| error!(object, user, error = %err, "failed to remove member"))?;
        Ok(())
    }
}
