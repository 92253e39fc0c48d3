//! The batched check service.
//!
//! Parses a newline-delimited batch of `<object>#<relation>@<user>` lines,
//! answers each from the shared KV cache when the entry is newer than the
//! invalidation marker, asks the store once for everything else, and
//! assembles a positional binary response. Positive results are written
//! back to the cache on a best-effort basis.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, warn};

use relsync_domain::model::check::{parse_check_request, CACHE_ALLOWED_VALUE, INVALIDATION_KEY};
use relsync_domain::CheckItem;
use relsync_storage::{KvBucket, RelationClient, StoreAdapter};

use crate::error::HandlerResult;

/// Empirical upper bound on a response line, used to preallocate the
/// output buffer.
pub const RESPONSE_BYTES_PER_ITEM: usize = 80;

/// Answers batched authorization checks through a read-through cache.
///
/// Safe to share across concurrent requests: the cache is eventually
/// consistent, the invalidation marker provides the monotonic freshness
/// cutoff, and concurrent identical misses collapse onto one store
/// flight through the in-flight board.
pub struct CheckService<C, K> {
    store: Arc<StoreAdapter<C, K>>,
    /// Store-bound checks currently in flight, keyed by relation key.
    /// The request that starts a flight publishes the verdict on the
    /// watch channel; requests missing on the same key meanwhile wait
    /// for it instead of issuing their own store call.
    in_flight: DashMap<String, watch::Sender<Option<bool>>>,
}

/// The store flights one request leads.
///
/// Dropping the set retires every flight still unpublished, so an error
/// or cancellation mid-batch cannot strand concurrent joiners: they see
/// their channel close and fall back to their own store call.
struct LedFlights<'a> {
    board: &'a DashMap<String, watch::Sender<Option<bool>>>,
    keys: Vec<String>,
    items: Vec<CheckItem>,
}

impl<'a> LedFlights<'a> {
    fn new(board: &'a DashMap<String, watch::Sender<Option<bool>>>) -> Self {
        Self {
            board,
            keys: Vec::new(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, key: String, item: CheckItem) {
        self.keys.push(key);
        self.items.push(item);
    }

    fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn items(&self) -> &[CheckItem] {
        &self.items
    }

    /// Publishes one verdict per flight to any joiners and retires the
    /// flights, returning the key/verdict pairs.
    fn publish(mut self, verdicts: Vec<bool>) -> Vec<(String, bool)> {
        let board = self.board;
        let keys = std::mem::take(&mut self.keys);
        self.items.clear();
        keys.into_iter()
            .zip(verdicts)
            .map(|(key, allowed)| {
                if let Some((_, tx)) = board.remove(&key) {
                    let _ = tx.send(Some(allowed));
                }
                (key, allowed)
            })
            .collect()
    }
}

impl Drop for LedFlights<'_> {
    fn drop(&mut self) {
        for key in self.keys.drain(..) {
            self.board.remove(&key);
        }
    }
}

impl<C, K> CheckService<C, K>
where
    C: RelationClient,
    K: KvBucket,
{
    /// Creates the service over a shared store adapter.
    pub fn new(store: Arc<StoreAdapter<C, K>>) -> Self {
        Self {
            store,
            in_flight: DashMap::new(),
        }
    }

    /// Handles one check request payload, returning the binary response:
    /// one `<line>=<0|1>\n` entry per input line, in input order. An
    /// empty or all-newline request yields an empty response.
    pub async fn handle(&self, payload: &[u8]) -> HandlerResult<Vec<u8>> {
        let items = parse_check_request(payload)?;
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let cutoff = self.invalidation_cutoff().await;

        // Cache pass: a fresh entry is an allowed result; anything else
        // (stale, missing, or an errored read) falls through to the store.
        let mut allowed: Vec<Option<bool>> = vec![None; items.len()];
        for (i, item) in items.iter().enumerate() {
            if self.cache_lookup(item, cutoff).await {
                allowed[i] = Some(true);
            }
        }

        let misses: Vec<usize> = (0..items.len()).filter(|i| allowed[*i].is_none()).collect();
        if !misses.is_empty() {
            let results = self.resolve_misses(&items, &misses).await?;
            for (&idx, result) in misses.iter().zip(results) {
                allowed[idx] = Some(result);
            }
        }

        // Best-effort write-back of every allowed result, hits included,
        // so their created-at moves past the latest invalidation.
        for (i, item) in items.iter().enumerate() {
            if allowed[i] == Some(true) {
                if let Err(err) = self
                    .store
                    .bucket()
                    .put_string(&item.cache_key(), CACHE_ALLOWED_VALUE)
                    .await
                {
                    debug!(error = %err, relation = %item.relation_key(), "cache write-back failed");
                }
            }
        }

        let mut response = Vec::with_capacity(items.len() * RESPONSE_BYTES_PER_ITEM);
        for (i, item) in items.iter().enumerate() {
            response.extend_from_slice(item.relation_key().as_bytes());
            response.push(b'=');
            response.push(if allowed[i] == Some(true) { b'1' } else { b'0' });
            response.push(b'\n');
        }
        Ok(response)
    }

    /// Reads the invalidation marker's write timestamp.
    ///
    /// A missing marker means nothing has ever been invalidated, so the
    /// cutoff is the zero time. A failed read gets the opposite
    /// treatment: with the cutoff unknown, every cached entry must be
    /// assumed stale.
    async fn invalidation_cutoff(&self) -> DateTime<Utc> {
        match self.store.bucket().get(INVALIDATION_KEY).await {
            Ok(Some(entry)) => entry.created,
            Ok(None) => DateTime::<Utc>::UNIX_EPOCH,
            Err(err) => {
                warn!(error = %err, "failed to read invalidation marker, bypassing cache");
                DateTime::<Utc>::MAX_UTC
            }
        }
    }

    /// Returns true only for a fresh cache hit; every failure mode
    /// degrades to a miss rather than failing the request.
    async fn cache_lookup(&self, item: &CheckItem, cutoff: DateTime<Utc>) -> bool {
        match self.store.bucket().get(&item.cache_key()).await {
            Ok(Some(entry)) if entry.created > cutoff => {
                metrics::counter!("relsync_check_cache_hits_total").increment(1);
                true
            }
            Ok(Some(_)) => {
                metrics::counter!("relsync_check_cache_stale_total").increment(1);
                false
            }
            Ok(None) => {
                metrics::counter!("relsync_check_cache_misses_total").increment(1);
                false
            }
            Err(err) => {
                debug!(error = %err, relation = %item.relation_key(), "cache read failed, treating as miss");
                false
            }
        }
    }

    /// Resolves cache misses against the store.
    ///
    /// Misses are deduplicated by relation key. Each unique key either
    /// joins a flight another request already has against the store, or
    /// is led here: led keys go to the store in one batch and their
    /// verdicts are published to whoever joined meanwhile. Returns one
    /// result per entry of `misses`, in order.
    async fn resolve_misses(
        &self,
        items: &[CheckItem],
        misses: &[usize],
    ) -> HandlerResult<Vec<bool>> {
        use dashmap::mapref::entry::Entry;

        let mut outcomes: HashMap<String, bool> = HashMap::with_capacity(misses.len());
        let mut seen: HashSet<String> = HashSet::with_capacity(misses.len());
        let mut led = LedFlights::new(&self.in_flight);
        let mut joined: Vec<(String, CheckItem, watch::Receiver<Option<bool>>)> = Vec::new();

        for &idx in misses {
            let item = &items[idx];
            let key = item.relation_key();
            if !seen.insert(key.clone()) {
                continue;
            }
            // The entry API keeps the join-or-lead decision atomic under
            // concurrent requests.
            match self.in_flight.entry(key.clone()) {
                Entry::Occupied(entry) => {
                    joined.push((key, item.clone(), entry.get().subscribe()));
                }
                Entry::Vacant(entry) => {
                    let (tx, _rx) = watch::channel(None);
                    entry.insert(tx);
                    led.push(key, item.clone());
                }
            }
        }

        if !led.is_empty() {
            // On error the early return drops `led`, retiring the flights
            // without a verdict.
            let verdicts = self.store.batch_check(led.items()).await?;
            for (key, allowed) in led.publish(verdicts) {
                outcomes.insert(key, allowed);
            }
        }

        for (key, item, mut rx) in joined {
            let published = match rx.wait_for(Option::is_some).await {
                Ok(value) => Some((*value).unwrap_or(false)),
                Err(_) => None,
            };
            let verdict = match published {
                Some(value) => value,
                None => {
                    // The flight ended without publishing; check directly
                    // instead of failing this request for another's error.
                    let results = self.store.batch_check(std::slice::from_ref(&item)).await?;
                    results.first().copied().unwrap_or(false)
                }
            };
            outcomes.insert(key, verdict);
        }

        Ok(misses
            .iter()
            .map(|&idx| outcomes[&items[idx].relation_key()])
            .collect())
    }
}
