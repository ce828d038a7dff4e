//! Keyed resource cache with single-flight fetches.
//!
//! Each key holds the last good value, a status, and an `invalidated` flag.
//! At most one fetch runs per key; concurrent readers share it through a
//! [`Shared`] future. Every fetch is driven by its own tokio task, so it
//! completes and updates the entry even if all readers go away.
//!
//! Two counters keep late completions honest:
//! - a per-entry `generation`, bumped by [`ResourceCache::invalidate`]. A
//!   fetch that started before the bump stores its value but leaves the
//!   entry invalidated.
//! - a cache-wide `epoch`, bumped by [`ResourceCache::clear`]. Completions
//!   from an older epoch are dropped.
//!
//! The lock is never held across an `.await`.

use crate::{ApiError, ApiResult};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, warn};

type SharedFetch<V> = Shared<BoxFuture<'static, ApiResult<V>>>;

/// Fetch state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Entry state without the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryStatus {
    pub status: CacheStatus,
    pub invalidated: bool,
    pub has_value: bool,
    pub last_error: Option<String>,
}

/// Entry state including a copy of the value.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSnapshot<V> {
    pub value: Option<V>,
    pub status: CacheStatus,
    pub invalidated: bool,
    pub last_error: Option<ApiError>,
}

struct InFlight<V> {
    id: u64,
    generation: u64,
    future: SharedFetch<V>,
}

struct Entry<V> {
    value: Option<V>,
    status: CacheStatus,
    generation: u64,
    invalidated: bool,
    last_error: Option<ApiError>,
    in_flight: Option<InFlight<V>>,
}

impl<V> Default for Entry<V> {
    fn default() -> Self {
        Self {
            value: None,
            status: CacheStatus::Idle,
            generation: 0,
            invalidated: false,
            last_error: None,
            in_flight: None,
        }
    }
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    epoch: u64,
    next_fetch_id: u64,
}

enum ReadPlan<V> {
    Cached(V),
    Await {
        /// Generation the fetch started at.
        fetch_generation: u64,
        /// Generation the entry had when this read planned.
        required: u64,
        future: SharedFetch<V>,
    },
}

/// Cache of values of type `V` keyed by `K`.
///
/// Cloning is cheap and clones share state.
pub struct ResourceCache<K, V> {
    inner: Arc<Mutex<Inner<K, V>>>,
}

impl<K, V> Clone for ResourceCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> Default for ResourceCache<K, V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                epoch: 0,
                next_fetch_id: 0,
            })),
        }
    }
}

impl<K, V> ResourceCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `key`.
    ///
    /// A fresh cached value is returned immediately and a background
    /// revalidation is started unless one is already running. A missing or
    /// invalidated entry joins the running fetch, or starts one, and waits.
    ///
    /// `fetch` is called with the cache lock held and must only build the
    /// future, not touch this cache.
    pub async fn read<F, Fut>(&self, key: K, fetch: F) -> ApiResult<V>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ApiResult<V>> + Send + 'static,
    {
        self.load(key, fetch, true).await
    }

    /// Fetch `key` now (joining a fetch already running) and wait for it.
    pub async fn refetch<F, Fut>(&self, key: K, fetch: F) -> ApiResult<V>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ApiResult<V>> + Send + 'static,
    {
        self.load(key, fetch, false).await
    }

    async fn load<F, Fut>(&self, key: K, fetch: F, serve_cached: bool) -> ApiResult<V>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ApiResult<V>> + Send + 'static,
    {
        let mut serve_cached = serve_cached;
        loop {
            let (fetch_generation, required, future) =
                match self.plan(&key, &fetch, serve_cached) {
                    ReadPlan::Cached(value) => return Ok(value),
                    ReadPlan::Await {
                        fetch_generation,
                        required,
                        future,
                    } => (fetch_generation, required, future),
                };

            let value = future.await?;
            if fetch_generation >= required {
                return Ok(value);
            }

            // Joined a fetch that began before the entry was invalidated.
            debug!(key = ?key, "Joined fetch predates invalidation, fetching again");
            serve_cached = false;
        }
    }

    fn plan<F, Fut>(&self, key: &K, fetch: &F, serve_cached: bool) -> ReadPlan<V>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ApiResult<V>> + Send + 'static,
    {
        let mut inner = self.inner.lock();
        let epoch = inner.epoch;
        let fetch_id = inner.next_fetch_id;
        let entry = inner.entries.entry(key.clone()).or_default();

        if serve_cached && !entry.invalidated {
            if let Some(value) = entry.value.clone() {
                if entry.in_flight.is_none() {
                    debug!(key = ?key, "Serving cached value, revalidating in background");
                    self.start_fetch(entry, key, fetch(), epoch, fetch_id);
                    inner.next_fetch_id += 1;
                }
                return ReadPlan::Cached(value);
            }
        }

        let required = entry.generation;
        if let Some(in_flight) = &entry.in_flight {
            debug!(key = ?key, "Joining in-flight fetch");
            return ReadPlan::Await {
                fetch_generation: in_flight.generation,
                required,
                future: in_flight.future.clone(),
            };
        }

        let (fetch_generation, future) = self.start_fetch(entry, key, fetch(), epoch, fetch_id);
        inner.next_fetch_id += 1;
        ReadPlan::Await {
            fetch_generation,
            required,
            future,
        }
    }

    /// Install a new in-flight fetch on `entry` and spawn its driver.
    fn start_fetch<Fut>(
        &self,
        entry: &mut Entry<V>,
        key: &K,
        fetch: Fut,
        epoch: u64,
        fetch_id: u64,
    ) -> (u64, SharedFetch<V>)
    where
        Fut: Future<Output = ApiResult<V>> + Send + 'static,
    {
        let generation = entry.generation;
        let inner = Arc::downgrade(&self.inner);
        let completion_key = key.clone();

        let future = async move {
            let result = fetch.await;
            if let Some(inner) = inner.upgrade() {
                complete(&inner, &completion_key, fetch_id, epoch, generation, &result);
            }
            result
        }
        .boxed()
        .shared();

        entry.status = CacheStatus::Loading;
        entry.in_flight = Some(InFlight {
            id: fetch_id,
            generation,
            future: future.clone(),
        });

        debug!(key = ?key, fetch_id, generation, "Fetch started");
        tokio::spawn(future.clone());
        (generation, future)
    }

    /// Current value and state of `key`.
    pub fn snapshot(&self, key: &K) -> CacheSnapshot<V> {
        let inner = self.inner.lock();
        match inner.entries.get(key) {
            Some(entry) => CacheSnapshot {
                value: entry.value.clone(),
                status: entry.status,
                invalidated: entry.invalidated,
                last_error: entry.last_error.clone(),
            },
            None => CacheSnapshot {
                value: None,
                status: CacheStatus::Idle,
                invalidated: false,
                last_error: None,
            },
        }
    }

    pub fn status(&self, key: &K) -> EntryStatus {
        let inner = self.inner.lock();
        match inner.entries.get(key) {
            Some(entry) => EntryStatus {
                status: entry.status,
                invalidated: entry.invalidated,
                has_value: entry.value.is_some(),
                last_error: entry.last_error.as_ref().map(ToString::to_string),
            },
            None => EntryStatus {
                status: CacheStatus::Idle,
                invalidated: false,
                has_value: false,
                last_error: None,
            },
        }
    }

    /// Whether a fetch for `key` is running.
    pub fn is_loading(&self, key: &K) -> bool {
        let inner = self.inner.lock();
        inner
            .entries
            .get(key)
            .is_some_and(|entry| entry.in_flight.is_some())
    }

    /// Mark `key` stale. The next read waits for a fresh fetch.
    pub fn invalidate(&self, key: &K) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.generation += 1;
            entry.invalidated = true;
            debug!(key = ?key, generation = entry.generation, "Entry invalidated");
        }
    }

    /// Mark every entry stale.
    pub fn invalidate_all(&self) {
        let mut inner = self.inner.lock();
        for entry in inner.entries.values_mut() {
            entry.generation += 1;
            entry.invalidated = true;
        }
    }

    /// Mark every entry whose key matches `predicate` stale.
    pub fn invalidate_where(&self, predicate: impl Fn(&K) -> bool) {
        let mut inner = self.inner.lock();
        for (key, entry) in inner.entries.iter_mut() {
            if predicate(key) {
                entry.generation += 1;
                entry.invalidated = true;
            }
        }
    }

    /// Drop every entry. Fetches still running complete into nothing.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.epoch += 1;
        debug!(epoch = inner.epoch, "Cache cleared");
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn complete<K, V>(
    inner: &Mutex<Inner<K, V>>,
    key: &K,
    fetch_id: u64,
    epoch: u64,
    generation: u64,
    result: &ApiResult<V>,
) where
    K: Eq + Hash + Debug,
    V: Clone,
{
    let mut inner = inner.lock();
    if inner.epoch != epoch {
        debug!(key = ?key, fetch_id, "Dropping fetch result from before cache clear");
        return;
    }
    let Some(entry) = inner.entries.get_mut(key) else {
        return;
    };

    if entry
        .in_flight
        .as_ref()
        .is_some_and(|in_flight| in_flight.id == fetch_id)
    {
        entry.in_flight = None;
    }

    match result {
        Ok(value) => {
            entry.value = Some(value.clone());
            entry.status = CacheStatus::Success;
            entry.last_error = None;
            if entry.generation == generation {
                entry.invalidated = false;
            }
            debug!(key = ?key, fetch_id, invalidated = entry.invalidated, "Fetch completed");
        }
        Err(err) => {
            entry.status = CacheStatus::Error;
            entry.last_error = Some(err.clone());
            warn!(key = ?key, fetch_id, error = %err, "Fetch failed, keeping last good value");
        }
    }
}
