//! In-memory implementations for testing.
//!
//! `MemoryRelationClient` mimics the store's wire behavior closely enough
//! for the engine and check-service tests: paginated object reads, strict
//! atomic write batches (duplicate writes and missing deletes error the
//! way the real store does), and direct-match batch checks. Failure
//! injection hooks let tests exercise the transport-error paths.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use relsync_domain::{CheckItem, Tuple};

use crate::error::{StoreError, StoreResult};
use crate::traits::{KvBucket, KvEntry, ReadPage, RelationClient};

const DEFAULT_PAGE_SIZE: usize = 100;

/// In-memory relationship store.
#[derive(Debug)]
pub struct MemoryRelationClient {
    /// Tuples in insertion order so pagination is stable across pages.
    tuples: RwLock<Vec<Tuple>>,
    page_size: AtomicUsize,
    /// Remaining successful reads before a forced transport error.
    reads_until_failure: Mutex<Option<usize>>,
    fail_writes: AtomicBool,
    fail_checks: AtomicBool,
    write_calls: AtomicUsize,
}

impl Default for MemoryRelationClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRelationClient {
    /// Creates an empty store with the default page size.
    pub fn new() -> Self {
        Self {
            tuples: RwLock::new(Vec::new()),
            page_size: AtomicUsize::new(DEFAULT_PAGE_SIZE),
            reads_until_failure: Mutex::new(None),
            fail_writes: AtomicBool::new(false),
            fail_checks: AtomicBool::new(false),
            write_calls: AtomicUsize::new(0),
        }
    }

    /// Seeds a tuple directly, bypassing the write path.
    pub fn insert(&self, tuple: Tuple) {
        let mut tuples = self.tuples.write().unwrap();
        if !tuples.contains(&tuple) {
            tuples.push(tuple);
        }
    }

    /// True when the exact tuple is stored.
    pub fn contains(&self, tuple: &Tuple) -> bool {
        self.tuples.read().unwrap().contains(tuple)
    }

    /// Snapshot of all stored tuples.
    pub fn all(&self) -> Vec<Tuple> {
        self.tuples.read().unwrap().clone()
    }

    /// Snapshot of one object's tuples as a set, for assertions.
    pub fn object_set(&self, object: &str) -> HashSet<Tuple> {
        self.tuples
            .read()
            .unwrap()
            .iter()
            .filter(|t| t.object == object)
            .cloned()
            .collect()
    }

    /// Overrides the read page size.
    pub fn set_page_size(&self, size: usize) {
        self.page_size.store(size.max(1), Ordering::Relaxed);
    }

    /// Makes read calls fail after `successes` successful calls.
    pub fn fail_reads_after(&self, successes: usize) {
        *self.reads_until_failure.lock().unwrap() = Some(successes);
    }

    /// Makes every write call fail with a transport error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Makes every check call fail with a transport error.
    pub fn fail_checks(&self, fail: bool) {
        self.fail_checks.store(fail, Ordering::Relaxed);
    }

    /// Number of write batches issued so far.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::Relaxed)
    }

    fn take_read_permit(&self) -> StoreResult<()> {
        let mut remaining = self.reads_until_failure.lock().unwrap();
        if let Some(left) = remaining.as_mut() {
            if *left == 0 {
                return Err(StoreError::Transport {
                    message: "injected read failure".to_string(),
                });
            }
            *left -= 1;
        }
        Ok(())
    }
}

#[async_trait]
impl RelationClient for MemoryRelationClient {
    async fn read(&self, object: &str, continuation: Option<&str>) -> StoreResult<ReadPage> {
        self.take_read_permit()?;

        let matching: Vec<Tuple> = self
            .tuples
            .read()
            .unwrap()
            .iter()
            .filter(|t| t.object == object)
            .cloned()
            .collect();

        let offset = match continuation {
            Some(token) => token.parse::<usize>().map_err(|_| StoreError::InvalidInput {
                message: format!("bad continuation token: {token:?}"),
            })?,
            None => 0,
        };

        let page_size = self.page_size.load(Ordering::Relaxed);
        let end = (offset + page_size).min(matching.len());
        let tuples = matching[offset.min(end)..end].to_vec();
        let continuation = (end < matching.len()).then(|| end.to_string());

        Ok(ReadPage {
            tuples,
            continuation,
        })
    }

    async fn write(&self, writes: &[Tuple], deletes: &[Tuple]) -> StoreResult<()> {
        self.write_calls.fetch_add(1, Ordering::Relaxed);

        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Transport {
                message: "injected write failure".to_string(),
            });
        }

        let mut tuples = self.tuples.write().unwrap();

        // Validate the whole batch before touching anything: the real
        // store applies write-plus-delete atomically.
        for tuple in writes {
            if tuples.contains(tuple) {
                return Err(StoreError::AlreadyExists {
                    tuple: tuple.to_string(),
                });
            }
        }
        for tuple in deletes {
            if !tuples.contains(tuple) {
                return Err(StoreError::NotFound {
                    tuple: tuple.to_string(),
                });
            }
        }

        tuples.retain(|t| !deletes.contains(t));
        tuples.extend(writes.iter().cloned());
        Ok(())
    }

    async fn batch_check(&self, items: &[CheckItem]) -> StoreResult<Vec<bool>> {
        if self.fail_checks.load(Ordering::Relaxed) {
            return Err(StoreError::Transport {
                message: "injected check failure".to_string(),
            });
        }

        let tuples = self.tuples.read().unwrap();
        Ok(items
            .iter()
            .map(|item| {
                tuples.iter().any(|t| {
                    t.object == item.object && t.relation == item.relation && t.user == item.user
                })
            })
            .collect())
    }
}

/// In-memory KV bucket with strictly increasing write timestamps.
///
/// Each put advances a logical clock by one microsecond, so "written
/// later" always means "created later" regardless of wall-clock
/// resolution. Freshness tests can still pin timestamps explicitly with
/// [`MemoryKvBucket::set_created`].
#[derive(Debug)]
pub struct MemoryKvBucket {
    entries: DashMap<String, KvEntry>,
    base: DateTime<Utc>,
    seq: AtomicU64,
    revision: AtomicU64,
    fail_gets: AtomicBool,
    fail_puts: AtomicBool,
}

impl MemoryKvBucket {
    /// Creates an empty bucket.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            base: Utc::now(),
            seq: AtomicU64::new(0),
            revision: AtomicU64::new(0),
            fail_gets: AtomicBool::new(false),
            fail_puts: AtomicBool::new(false),
        }
    }

    /// Makes every get fail with a transport error.
    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::Relaxed);
    }

    /// Makes every put fail with a transport error.
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::Relaxed);
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the bucket holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Pins an existing entry's created-at timestamp.
    pub fn set_created(&self, key: &str, created: DateTime<Utc>) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.created = created;
        }
    }

    fn next_created(&self) -> DateTime<Utc> {
        let tick = self.seq.fetch_add(1, Ordering::Relaxed) as i64;
        self.base + Duration::microseconds(tick + 1)
    }
}

impl Default for MemoryKvBucket {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvBucket for MemoryKvBucket {
    async fn get(&self, key: &str) -> StoreResult<Option<KvEntry>> {
        if self.fail_gets.load(Ordering::Relaxed) {
            return Err(StoreError::Transport {
                message: "injected get failure".to_string(),
            });
        }
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<u64> {
        if self.fail_puts.load(Ordering::Relaxed) {
            return Err(StoreError::Transport {
                message: "injected put failure".to_string(),
            });
        }
        self.entries.insert(
            key.to_string(),
            KvEntry {
                value: value.to_vec(),
                created: self.next_created(),
            },
        );
        Ok(self.revision.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_paginates_in_insertion_order() {
        let client = MemoryRelationClient::new();
        client.set_page_size(2);
        for i in 0..5 {
            client.insert(Tuple::new(format!("user:{i}"), "writer", "project:1"));
        }

        let first = client.read("project:1", None).await.unwrap();
        assert_eq!(first.tuples.len(), 2);
        let token = first.continuation.unwrap();

        let second = client.read("project:1", Some(&token)).await.unwrap();
        assert_eq!(second.tuples.len(), 2);

        let third = client
            .read("project:1", second.continuation.as_deref())
            .await
            .unwrap();
        assert_eq!(third.tuples.len(), 1);
        assert!(third.continuation.is_none());
    }

    #[tokio::test]
    async fn write_batch_is_atomic() {
        let client = MemoryRelationClient::new();
        client.insert(Tuple::new("user:a", "writer", "project:1"));

        // One valid write plus one missing delete: nothing must change.
        let err = client
            .write(
                &[Tuple::new("user:b", "writer", "project:1")],
                &[Tuple::new("user:ghost", "writer", "project:1")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(client.all().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_write_reports_already_exists() {
        let client = MemoryRelationClient::new();
        let tuple = Tuple::new("user:a", "writer", "project:1");
        client.insert(tuple.clone());

        let err = client.write(&[tuple], &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn kv_timestamps_strictly_increase() {
        let bucket = MemoryKvBucket::new();
        bucket.put("a", b"1").await.unwrap();
        bucket.put("b", b"1").await.unwrap();

        let a = bucket.get("a").await.unwrap().unwrap();
        let b = bucket.get("b").await.unwrap().unwrap();
        assert!(b.created > a.created);
    }

    #[tokio::test]
    async fn kv_put_overwrites_and_refreshes_created() {
        let bucket = MemoryKvBucket::new();
        bucket.put("k", b"old").await.unwrap();
        let old = bucket.get("k").await.unwrap().unwrap();

        bucket.put_string("k", "new").await.unwrap();
        let new = bucket.get("k").await.unwrap().unwrap();
        assert_eq!(new.value, b"new");
        assert!(new.created > old.created);
    }
}
