//! The reconciliation engine.
//!
//! Three public operations cover every mutation the synchronizer performs:
//! a full-object sync against a desired tuple set, a per-user multi-relation
//! put with mutual-exclusion support, and a per-user remove. Each follows
//! the same read → diff → single-write pipeline; the engine is stateless
//! across events, so redelivering a failed event is always safe.

mod policy;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use relsync_domain::plan::{diff_object, member_put_diff, member_remove_tuples, normalize_desired};
use relsync_domain::Tuple;
use relsync_storage::{KvBucket, RelationClient, StoreAdapter};

use crate::error::{HandlerError, HandlerResult};

/// Reconciles the store's tuples for one object with a desired state.
#[derive(Debug)]
pub struct SyncEngine<C, K> {
    store: Arc<StoreAdapter<C, K>>,
}

impl<C, K> SyncEngine<C, K>
where
    C: RelationClient,
    K: KvBucket,
{
    /// Creates an engine over a shared store adapter.
    pub fn new(store: Arc<StoreAdapter<C, K>>) -> Self {
        Self { store }
    }

    /// The underlying store adapter.
    pub fn store(&self) -> &Arc<StoreAdapter<C, K>> {
        &self.store
    }

    /// Makes the store's tuples for `object` equal to `desired`, leaving
    /// tuples with excluded relations untouched.
    ///
    /// Returns the number of tuples written and deleted. When the store
    /// already matches the desired set, no store call is made and
    /// `(0, 0)` is returned, which is what makes redelivery idempotent.
    pub async fn sync_object(
        &self,
        object: &str,
        desired: Vec<Tuple>,
        excluded_relations: &[String],
    ) -> HandlerResult<(usize, usize)> {
        let excluded: HashSet<String> = excluded_relations.iter().cloned().collect();
        let desired = normalize_desired(object, desired, &excluded);

        let current = self.store.read_object(object).await?;
        let diff = diff_object(&desired, &current, &excluded);

        if diff.is_empty() {
            debug!(object, "object already in sync");
            return Ok((0, 0));
        }

        let counts = diff.counts();
        self.store.write_and_delete(diff.writes, diff.deletes).await?;

        info!(
            object,
            writes = counts.0,
            deletes = counts.1,
            "synced object tuples"
        );
        Ok(counts)
    }

    /// Grants `user` every relation in `desired_relations` on `object`,
    /// vacating relations listed in `mutually_exclusive_with` that the
    /// user holds but no longer wants. Additions and removals land in one
    /// atomic batch, so a role transition never passes through a state
    /// where the user holds neither role.
    pub async fn put_member(
        &self,
        object: &str,
        user: &str,
        desired_relations: &[String],
        mutually_exclusive_with: &[String],
    ) -> HandlerResult<(usize, usize)> {
        if desired_relations.is_empty() {
            return Err(HandlerError::malformed("relations array cannot be empty"));
        }
        if desired_relations.iter().any(String::is_empty) {
            return Err(HandlerError::malformed("relation value cannot be empty"));
        }

        let current = self.store.read_object(object).await?;
        let diff = member_put_diff(
            object,
            user,
            desired_relations,
            mutually_exclusive_with,
            &current,
        );

        if diff.is_empty() {
            info!(user, object, "member already has correct relations");
            return Ok((0, 0));
        }

        let counts = diff.counts();
        self.store.write_and_delete(diff.writes, diff.deletes).await?;

        info!(
            user,
            object,
            writes = counts.0,
            deletes = counts.1,
            "put member relations"
        );
        Ok(counts)
    }

    /// Removes relations `user` holds on `object`.
    ///
    /// An empty relation list (after dropping empty names) removes every
    /// tuple the user holds on the object. Named relations are deleted
    /// tolerantly; deleting a relation the user does not hold is a no-op.
    /// Returns the number of tuples deleted.
    pub async fn remove_member(
        &self,
        object: &str,
        user: &str,
        relations: &[String],
    ) -> HandlerResult<usize> {
        let deletes = member_remove_tuples(object, user, relations);

        if deletes.is_empty() {
            let deleted = self.store.delete_by_user_on_object(user, object).await?;
            info!(user, object, deleted, "removed all member relations");
            return Ok(deleted);
        }

        let count = deletes.len();
        self.store.write_and_delete(Vec::new(), deletes).await?;

        info!(user, object, deletes = count, "removed member relations");
        Ok(count)
    }
}

impl<C, K> Clone for SyncEngine<C, K> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}
