//! Trait definitions for the remote store and the shared KV cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use relsync_domain::{CheckItem, Tuple};

use crate::error::StoreResult;

/// One page of a paginated tuple read.
#[derive(Debug, Clone, Default)]
pub struct ReadPage {
    pub tuples: Vec<Tuple>,
    /// Token for the next page; `None` means the read is complete.
    pub continuation: Option<String>,
}

/// Wire-level client for the relationship store.
///
/// The store is remote and shared; implementations must be safe for
/// concurrent use. Four operations cover everything the synchronizer
/// needs: paginated reads scoped to one object, an atomic write-plus-delete
/// batch, and single/batched authorization checks.
#[async_trait]
pub trait RelationClient: Send + Sync {
    /// Reads one page of tuples whose `object` equals the argument.
    async fn read(&self, object: &str, continuation: Option<&str>) -> StoreResult<ReadPage>;

    /// Atomically adds `writes` and removes `deletes` in one round trip.
    ///
    /// Implementations report `AlreadyExists` for duplicate writes and
    /// `NotFound` for missing deletes; the adapter treats both as success.
    async fn write(&self, writes: &[Tuple], deletes: &[Tuple]) -> StoreResult<()>;

    /// Evaluates a batch of checks. The result is positionally aligned
    /// with the input: same length, same order.
    async fn batch_check(&self, items: &[CheckItem]) -> StoreResult<Vec<bool>>;

    /// Evaluates a single check.
    async fn check(&self, item: &CheckItem) -> StoreResult<bool> {
        let results = self.batch_check(std::slice::from_ref(item)).await?;
        Ok(results.first().copied().unwrap_or(false))
    }
}

/// An entry read from the KV cache.
#[derive(Debug, Clone)]
pub struct KvEntry {
    pub value: Vec<u8>,
    /// When this revision of the key was written. Freshness decisions
    /// compare this against the invalidation marker's timestamp.
    pub created: DateTime<Utc>,
}

/// Key/value bucket shared by all synchronizer instances.
///
/// Entries are soft state: losing the bucket degrades check latency, never
/// correctness. Keys are restricted to the bucket's charset, which is why
/// relation keys are base32-encoded before they land here.
#[async_trait]
pub trait KvBucket: Send + Sync {
    /// Fetches a key, `None` when absent.
    async fn get(&self, key: &str) -> StoreResult<Option<KvEntry>>;

    /// Writes a key, returning the new revision.
    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<u64>;

    /// Writes a string value, returning the new revision.
    async fn put_string(&self, key: &str, value: &str) -> StoreResult<u64> {
        self.put(key, value.as_bytes()).await
    }
}
