//! Stale-while-revalidate cache in front of every source
//!
//! Reads never wait for the provider once a value exists: a stale value is
//! returned as is and a background fetch replaces it. Fetches run on spawned
//! tasks and are shared by every caller asking for the same key while they
//! run. Whichever fetch finishes last owns the cached value. A fallback value
//! is served but never counts as fresh, so the next read retries the provider.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::time::Instant;
use tracing::debug;

use crate::sources::{DynSource, Sourced};
use crate::{Result, WinterReadyError};

/// Freshness parameters of one source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    /// How long a value may be served without revalidation. `None` means every read revalidates.
    pub max_age: Option<Duration>,
    /// How often the aggregator revalidates proactively
    pub refresh_interval: Duration,
    /// Non-forced revalidations of a key are skipped this long after the last fetch started
    pub dedupe_window: Duration,
}

impl FreshnessPolicy {
    #[must_use]
    pub fn is_stale(&self, age: Duration) -> bool {
        self.max_age.is_none_or(|max_age| age > max_age)
    }

    /// How long an entry is kept at all: stale values are served for as long
    /// again as they were fresh
    #[must_use]
    pub fn retention(&self) -> Duration {
        self.max_age.unwrap_or(Duration::ZERO).max(self.refresh_interval) * 2
    }
}

/// A stored value and when it arrived
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: Sourced<V>,
    pub fetched_at: Instant,
}

/// Backing storage of a [`SwrCache`]
pub trait CacheStore<V>: Send + Sync {
    fn load(&self, key: &str) -> Option<CacheEntry<V>>;

    fn save(&self, key: &str, entry: CacheEntry<V>);

    /// Returns whether the key was present
    fn remove(&self, key: &str) -> bool;

    fn clear(&self);

    fn keys(&self) -> Vec<String>;

    /// Drops entries fetched longer than `max_age` before `now`; returns how many
    fn evict_older_than(&self, max_age: Duration, now: Instant) -> usize;
}

/// Process-local store
pub struct MemoryStore<V> {
    entries: DashMap<String, CacheEntry<V>>,
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V: Clone + Send + Sync> CacheStore<V> for MemoryStore<V> {
    fn load(&self, key: &str) -> Option<CacheEntry<V>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn save(&self, key: &str, entry: CacheEntry<V>) {
        self.entries.insert(key.to_string(), entry);
    }

    fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    fn evict_older_than(&self, max_age: Duration, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.fetched_at) <= max_age);
        before.saturating_sub(self.entries.len())
    }
}

/// Result of a cache read
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead<V> {
    pub value: V,
    /// The value is the source's static fallback
    pub degraded: bool,
    /// Older than the source's max age, or a fallback; a revalidation has been requested
    pub is_stale: bool,
    pub age: Duration,
}

impl<V> CacheRead<V> {
    #[must_use]
    pub fn into_sourced(self) -> Sourced<V> {
        Sourced {
            value: self.value,
            degraded: self.degraded,
        }
    }
}

type SharedFetch<V> = Shared<BoxFuture<'static, std::result::Result<Sourced<V>, String>>>;

struct InFlight<V> {
    id: u64,
    fetch: SharedFetch<V>,
}

struct Inner<P, V> {
    source: DynSource<P, V>,
    store: Arc<dyn CacheStore<V>>,
    policy: FreshnessPolicy,
    /// Latest fetch per key, joined by non-forced reads
    in_flight: DashMap<String, InFlight<V>>,
    /// Fetches still running per key, including replaced ones
    running: DashMap<String, usize>,
    last_started: DashMap<String, Instant>,
    next_id: AtomicU64,
}

impl<P, V> Inner<P, V>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Drops entries past their retention and dedupe marks past the window
    fn evict_expired(&self, now: Instant) {
        let evicted = self.store.evict_older_than(self.policy.retention(), now);
        let dedupe_window = self.policy.dedupe_window;
        self.last_started
            .retain(|_, started| now.duration_since(*started) < dedupe_window);
        if evicted > 0 {
            debug!("Evicted {} expired {} entries", evicted, self.source.name());
        }
    }
}

/// Accounts for one running fetch. Dropped when the fetch task ends, however it ends.
struct FetchGuard<P, V> {
    inner: Arc<Inner<P, V>>,
    key: String,
    id: u64,
}

impl<P, V> FetchGuard<P, V> {
    fn new(inner: Arc<Inner<P, V>>, key: String, id: u64) -> Self {
        *inner.running.entry(key.clone()).or_insert(0) += 1;
        Self { inner, key, id }
    }
}

impl<P, V> Drop for FetchGuard<P, V> {
    fn drop(&mut self) {
        let id = self.id;
        self.inner
            .in_flight
            .remove_if(&self.key, |_, flight| flight.id == id);
        if let Entry::Occupied(mut running) = self.inner.running.entry(self.key.clone()) {
            *running.get_mut() -= 1;
            if *running.get() == 0 {
                running.remove();
            }
        }
    }
}

/// Stale-while-revalidate cache over one source
pub struct SwrCache<P, V> {
    inner: Arc<Inner<P, V>>,
}

impl<P, V> Clone for SwrCache<P, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, V> SwrCache<P, V>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Cache backed by a fresh [`MemoryStore`]
    pub fn new(source: DynSource<P, V>, policy: FreshnessPolicy) -> Self {
        Self::with_store(source, policy, Arc::new(MemoryStore::default()))
    }

    pub fn with_store(
        source: DynSource<P, V>,
        policy: FreshnessPolicy,
        store: Arc<dyn CacheStore<V>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                store,
                policy,
                in_flight: DashMap::new(),
                running: DashMap::new(),
                last_started: DashMap::new(),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub fn source_name(&self) -> &'static str {
        self.inner.source.name()
    }

    #[must_use]
    pub fn policy(&self) -> &FreshnessPolicy {
        &self.inner.policy
    }

    #[must_use]
    pub fn key(&self, params: &P) -> String {
        self.inner.source.cache_key(params)
    }

    /// Returns the cached value immediately. A stale value also starts a
    /// background revalidation. `None` on a miss; nothing is fetched then.
    #[tracing::instrument(name = "query_cache", level = "debug", skip_all, fields(source = self.source_name()))]
    pub fn get(&self, params: &P) -> Option<CacheRead<V>> {
        let key = self.key(params);
        let Some(entry) = self.inner.store.load(&key) else {
            debug!("Key not found: {}", key);
            return None;
        };

        let read = self.read_entry(entry);
        if !read.is_stale {
            debug!("Key {} found and still fresh", key);
        } else if self.start(params, false).is_some() {
            debug!("Key {} is stale, revalidating in background", key);
        }
        Some(read)
    }

    /// Like [`get`](Self::get), but waits for the first fetch on a miss
    pub async fn get_or_fetch(&self, params: &P) -> Result<CacheRead<V>> {
        if let Some(read) = self.get(params) {
            return Ok(read);
        }

        match self.start(params, false) {
            Some(fetch) => {
                let sourced = fetch.await.map_err(WinterReadyError::server)?;
                Ok(CacheRead {
                    value: sourced.value,
                    degraded: sourced.degraded,
                    is_stale: sourced.degraded,
                    age: Duration::ZERO,
                })
            }
            // Another caller filled the key in the meantime
            None => self.get(params).ok_or_else(|| {
                WinterReadyError::server(format!("{} cache entry vanished", self.source_name()))
            }),
        }
    }

    /// Fetches the key again and waits for the result.
    ///
    /// Without `force` this joins a fetch already running for the key, or
    /// returns `None` when the last fetch started inside the dedupe window.
    /// With `force` a new upstream call always starts.
    pub async fn revalidate(&self, params: &P, force: bool) -> Result<Option<Sourced<V>>> {
        match self.start(params, force) {
            Some(fetch) => fetch.await.map(Some).map_err(WinterReadyError::server),
            None => Ok(None),
        }
    }

    /// True while any fetch for the key is running
    #[must_use]
    pub fn is_revalidating(&self, params: &P) -> bool {
        self.inner.running.contains_key(&self.key(params))
    }

    /// Drops one key, or everything when `key` is `None`
    pub fn purge(&self, key: Option<&str>) -> bool {
        match key {
            Some(key) => {
                self.inner.last_started.remove(key);
                self.inner.store.remove(key)
            }
            None => {
                self.inner.last_started.clear();
                self.inner.store.clear();
                true
            }
        }
    }

    /// Keys currently held by the store
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.store.keys()
    }

    fn read_entry(&self, entry: CacheEntry<V>) -> CacheRead<V> {
        let age = entry.fetched_at.elapsed();
        CacheRead {
            value: entry.value.value,
            degraded: entry.value.degraded,
            is_stale: entry.value.degraded || self.inner.policy.is_stale(age),
            age,
        }
    }

    fn started_recently(&self, key: &str, now: Instant) -> bool {
        self.inner
            .last_started
            .get(key)
            .is_some_and(|started| now.duration_since(*started) < self.inner.policy.dedupe_window)
    }

    /// Joins or starts a fetch for the key. `None` when deduplicated away.
    fn start(&self, params: &P, force: bool) -> Option<SharedFetch<V>> {
        let key = self.key(params);
        let now = Instant::now();

        match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(flight) if !force => {
                debug!("Joining in-flight fetch for {}", key);
                Some(flight.get().fetch.clone())
            }
            entry => {
                if !force && self.started_recently(&key, now) && self.inner.store.load(&key).is_some() {
                    debug!("Skipping revalidation of {} inside dedupe window", key);
                    return None;
                }

                let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                self.inner.last_started.insert(key.clone(), now);
                let fetch = self.spawn_fetch(key, params.clone(), id);
                entry.insert(InFlight {
                    id,
                    fetch: fetch.clone(),
                });
                Some(fetch)
            }
        }
    }

    fn spawn_fetch(&self, key: String, params: P, id: u64) -> SharedFetch<V> {
        let inner = Arc::clone(&self.inner);
        let source_name = inner.source.name();
        let guard = FetchGuard::new(Arc::clone(&inner), key.clone(), id);

        let handle = tokio::spawn(async move {
            let sourced = inner.source.fetch(&params).await;
            let now = Instant::now();
            inner.store.save(
                &key,
                CacheEntry {
                    value: sourced.clone(),
                    fetched_at: now,
                },
            );
            drop(guard);
            inner.evict_expired(now);
            sourced
        });

        handle
            .map(move |joined| joined.map_err(|e| format!("{source_name} fetch task failed: {e}")))
            .boxed()
            .shared()
    }
}
