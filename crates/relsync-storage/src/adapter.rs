//! Stateful wrapper around the relationship store.
//!
//! `StoreAdapter` owns the only code path that mutates the store, and
//! after every successful mutation it bumps the shared cache invalidation
//! marker so cached check results older than the write are treated as
//! misses. The adapter takes no locks; concurrency control is the
//! caller's responsibility.

use std::sync::Arc;

use tracing::{debug, warn};

use relsync_domain::model::check::{CACHE_ALLOWED_VALUE, INVALIDATION_KEY};
use relsync_domain::{CheckItem, Tuple};

use crate::error::{StoreError, StoreResult};
use crate::traits::{KvBucket, RelationClient};

/// High-level tuple operations over a wire client and the shared cache
/// bucket.
#[derive(Debug)]
pub struct StoreAdapter<C, K> {
    client: Arc<C>,
    bucket: Arc<K>,
}

impl<C, K> StoreAdapter<C, K>
where
    C: RelationClient,
    K: KvBucket,
{
    /// Creates a new adapter over a shared client and cache bucket.
    pub fn new(client: Arc<C>, bucket: Arc<K>) -> Self {
        Self { client, bucket }
    }

    /// The cache bucket this adapter invalidates.
    pub fn bucket(&self) -> &Arc<K> {
        &self.bucket
    }

    /// Reads all tuples for an object, following pagination until the
    /// continuation token runs out. Partial results are discarded on any
    /// page error.
    pub async fn read_object(&self, object: &str) -> StoreResult<Vec<Tuple>> {
        let mut tuples = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self.client.read(object, continuation.as_deref()).await?;
            tuples.extend(page.tuples);
            match page.continuation {
                Some(token) if !token.is_empty() => continuation = Some(token),
                _ => break,
            }
        }

        Ok(tuples)
    }

    /// Reads an object's tuples filtered to one relation.
    ///
    /// The store offers no server-side relation filter, so this filters in
    /// memory after a full object read.
    pub async fn read_object_by_relation(
        &self,
        object: &str,
        relation: &str,
    ) -> StoreResult<Vec<Tuple>> {
        let mut tuples = self.read_object(object).await?;
        tuples.retain(|t| t.relation == relation);
        Ok(tuples)
    }

    /// Reads an object's tuples filtered to one user.
    pub async fn read_object_by_user(&self, object: &str, user: &str) -> StoreResult<Vec<Tuple>> {
        let mut tuples = self.read_object(object).await?;
        tuples.retain(|t| t.user == user);
        Ok(tuples)
    }

    /// Applies a write/delete batch in a single round trip.
    ///
    /// Never issues an empty batch. Duplicate writes and missing deletes
    /// are idempotent no-ops; a reported conflict is retried once. On
    /// success the invalidation marker is bumped.
    pub async fn write_and_delete(&self, writes: Vec<Tuple>, deletes: Vec<Tuple>) -> StoreResult<()> {
        if writes.is_empty() && deletes.is_empty() {
            return Ok(());
        }

        match self.client.write(&writes, &deletes).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists { tuple }) => {
                debug!(%tuple, "write raced with an identical tuple");
            }
            Err(StoreError::NotFound { tuple }) => {
                debug!(%tuple, "delete targeted an already-absent tuple");
            }
            Err(StoreError::Conflict { message }) => {
                warn!(%message, "store reported a conflict, retrying once");
                self.client.write(&writes, &deletes).await?;
            }
            Err(err) => return Err(err),
        }

        metrics::counter!("relsync_tuple_writes_total").increment(writes.len() as u64);
        metrics::counter!("relsync_tuple_deletes_total").increment(deletes.len() as u64);

        self.bump_invalidation().await;
        Ok(())
    }

    /// Deletes every tuple the user holds on the object, in one batch.
    ///
    /// Returns the number of tuples deleted; zero means no store call was
    /// made.
    pub async fn delete_by_user_on_object(&self, user: &str, object: &str) -> StoreResult<usize> {
        let tuples = self.read_object_by_user(object, user).await?;
        let count = tuples.len();
        if count > 0 {
            self.write_and_delete(Vec::new(), tuples).await?;
        }
        Ok(count)
    }

    /// Evaluates a batch of checks against the store.
    ///
    /// The returned vector is positionally aligned with the input; a
    /// length mismatch from the wire is a transport fault.
    pub async fn batch_check(&self, items: &[CheckItem]) -> StoreResult<Vec<bool>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let results = self.client.batch_check(items).await?;
        if results.len() != items.len() {
            return Err(StoreError::Transport {
                message: format!(
                    "batch check returned {} results for {} items",
                    results.len(),
                    items.len()
                ),
            });
        }
        Ok(results)
    }

    /// Bumps the invalidation marker after a mutation.
    ///
    /// Best effort: the marker only needs to be at least as new as the
    /// latest write, so a failed bump is repaired by the next one. The
    /// failure is logged, not returned.
    async fn bump_invalidation(&self) {
        if let Err(err) = self
            .bucket
            .put_string(INVALIDATION_KEY, CACHE_ALLOWED_VALUE)
            .await
        {
            warn!(error = %err, "failed to bump cache invalidation marker");
        }
    }
}

impl<C, K> Clone for StoreAdapter<C, K> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            bucket: Arc::clone(&self.bucket),
        }
    }
}
