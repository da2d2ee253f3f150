//! Resource cache: fetched server state keyed by position in the
//! team → project → service → domain hierarchy.
//!
//! - Concurrent reads of one key share a single outstanding fetch.
//! - Prefix invalidation drops unobserved entries and refetches observed
//!   ones in place; a fetch that started before the invalidation never
//!   overwrites the entry.
//! - Subscriptions keep entries alive and own the entry's poll task.
//! - Unobserved entries are evicted after an idle retention window.
//!
//! Values of any `Send + Sync + 'static` type share one cache; reading a key
//! under a different type than it was stored with is a [`CacheError`].

mod entry;
mod error;
mod key;
mod policy;
mod subscription;

pub use entry::{CachedValue, Fetcher};
pub use error::CacheError;
pub use key::CacheKey;
pub use policy::{
    Freshness, DEFAULT_IDLE_RETENTION, DEFAULT_LOGS_POLL_INTERVAL, DEFAULT_METADATA_TTL,
    DEFAULT_SERVICE_POLL_INTERVAL,
};
pub use subscription::Subscription;

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::FutureExt;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::invalidation::InvalidationTarget;
use entry::{Entry, FetchFuture};

type Entries = HashMap<CacheKey, Entry>;

enum Lookup {
    Ready(CachedValue),
    Pending(FetchFuture),
}

/// Shared, cloneable handle to the cache.
#[derive(Clone)]
pub struct ResourceCache {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    entries: Mutex<Entries>,
    idle_retention: Duration,
    generations: AtomicU64,
    fetches: AtomicU64,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::with_idle_retention(DEFAULT_IDLE_RETENTION)
    }

    pub fn with_idle_retention(idle_retention: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                idle_retention,
                generations: AtomicU64::new(0),
                fetches: AtomicU64::new(0),
            }),
        }
    }

    /// Return a value no older than `ttl`, fetching it if needed.
    ///
    /// Joins an in-flight fetch of the same key instead of starting another.
    pub async fn read<T, F, Fut>(&self, key: CacheKey, ttl: Duration, fetch: F) -> ApiResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let fetcher = erase(fetch);
        let lookup = {
            let now = Instant::now();
            let mut entries = self.inner.lock();
            self.inner.evict_idle_locked(&mut entries, now);
            let entry = self.inner.entry_mut(&mut entries, &key, ttl, now);
            entry.ttl = ttl;
            entry.fetcher = Some(Arc::clone(&fetcher));
            entry.touch(now);
            match entry.fresh_value(now) {
                Some(value) => Lookup::Ready(value),
                None => Lookup::Pending(self.inner.join_or_start(&key, entry, fetcher)),
            }
        };

        let value = match lookup {
            Lookup::Ready(value) => value,
            Lookup::Pending(fetch) => fetch.await?,
        };
        Ok(downcast(&key, value)?)
    }

    /// Return whatever is cached, starting a background refetch when it is
    /// stale. Waits for a fetch only if nothing is cached yet.
    pub async fn read_provisional<T, F, Fut>(
        &self,
        key: CacheKey,
        ttl: Duration,
        fetch: F,
    ) -> ApiResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let fetcher = erase(fetch);
        let lookup = {
            let now = Instant::now();
            let mut entries = self.inner.lock();
            self.inner.evict_idle_locked(&mut entries, now);
            let entry = self.inner.entry_mut(&mut entries, &key, ttl, now);
            entry.ttl = ttl;
            entry.fetcher = Some(Arc::clone(&fetcher));
            entry.touch(now);
            match entry.value.clone() {
                Some(value) => {
                    if entry.needs_refetch(now) {
                        let _refetch = self.inner.join_or_start(&key, entry, fetcher);
                    }
                    Lookup::Ready(value)
                }
                None => Lookup::Pending(self.inner.join_or_start(&key, entry, fetcher)),
            }
        };

        let value = match lookup {
            Lookup::Ready(value) => value,
            Lookup::Pending(fetch) => fetch.await?,
        };
        Ok(downcast(&key, value)?)
    }

    /// The cached value at `key`, without fetching.
    pub fn peek<T: Send + Sync + 'static>(&self, key: &CacheKey) -> Result<Option<Arc<T>>, CacheError> {
        self.inner.peek(key)
    }

    /// Observe `key`: fetch it if needed, keep it alive, and poll it when
    /// `freshness` asks for polling.
    pub async fn subscribe<T, F, Fut>(
        &self,
        key: CacheKey,
        freshness: Freshness,
        fetch: F,
    ) -> ApiResult<Subscription<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let fetcher = erase(fetch);
        let (mut subscription, initial) = {
            let now = Instant::now();
            let mut entries = self.inner.lock();
            self.inner.evict_idle_locked(&mut entries, now);
            let entry = self.inner.entry_mut(&mut entries, &key, freshness.ttl, now);
            entry.ttl = freshness.ttl;
            entry.fetcher = Some(Arc::clone(&fetcher));
            entry.subscribers += 1;
            entry.idle_since = None;

            // The fastest interval asked for by any subscriber wins.
            if let Some(interval) = freshness.poll_interval {
                if entry.poll_interval.map_or(true, |current| interval < current) {
                    entry.stop_polling();
                    entry.poll = Some(tokio::spawn(poll_loop(
                        Arc::downgrade(&self.inner),
                        key.clone(),
                        entry.id,
                        interval,
                    )));
                    entry.poll_interval = Some(interval);
                    debug!(%key, interval_ms = interval.as_millis() as u64, "Polling started");
                }
            }

            let subscription =
                Subscription::new(&self.inner, key.clone(), entry.id, entry.updates.subscribe());
            let initial = if entry.needs_refetch(now) {
                let has_value = entry.value.is_some();
                let fetch = self.inner.join_or_start(&key, entry, fetcher);
                (!has_value).then_some(fetch)
            } else {
                None
            };
            (subscription, initial)
        };

        // Dropping the subscription on error undoes the count.
        if let Some(fetch) = initial {
            fetch.await?;
        }
        subscription.latest()?;
        subscription.mark_seen();
        Ok(subscription)
    }

    /// Invalidate every entry under `prefix`. Returns how many matched.
    pub fn invalidate(&self, prefix: &CacheKey) -> usize {
        self.inner.invalidate_where(|key| key.starts_with(prefix))
    }

    /// Invalidate the entry at exactly `key`.
    pub fn invalidate_exact(&self, key: &CacheKey) -> usize {
        self.inner.invalidate_where(|candidate| candidate == key)
    }

    /// Apply the targets of a completed mutation.
    pub fn apply(&self, targets: &[InvalidationTarget]) -> usize {
        targets
            .iter()
            .map(|target| match target {
                InvalidationTarget::Exact(key) => self.invalidate_exact(key),
                InvalidationTarget::Subtree(prefix) => self.invalidate(prefix),
            })
            .sum()
    }

    /// Remove every entry and stop every poll task. Existing subscriptions
    /// see their entry close.
    pub fn clear(&self) {
        let removed = {
            let mut entries = self.inner.lock();
            let removed = entries.len();
            entries.clear();
            removed
        };
        debug!(removed, "Cache cleared");
    }

    /// A handle that does not keep the cache alive.
    pub(crate) fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(inner: &Weak<Inner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    /// Drop entries that have had no subscribers for the retention window.
    pub fn evict_idle(&self) -> usize {
        let mut entries = self.inner.lock();
        self.inner.evict_idle_locked(&mut entries, Instant::now())
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().contains_key(key)
    }

    /// Whether a value at `key` would be refetched before a fresh read.
    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.inner
            .lock()
            .get(key)
            .map_or(true, |entry| entry.needs_refetch(Instant::now()))
    }

    pub fn subscriber_count(&self, key: &CacheKey) -> usize {
        self.inner.lock().get(key).map_or(0, |entry| entry.subscribers)
    }

    pub fn is_polling(&self, key: &CacheKey) -> bool {
        self.inner
            .lock()
            .get(key)
            .is_some_and(|entry| entry.poll.is_some())
    }

    /// Cached keys in order.
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<_> = self.inner.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of fetches started since creation.
    pub fn fetches_started(&self) -> u64 {
        self.inner.fetches.load(Ordering::SeqCst)
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("entries", &self.len())
            .field("idle_retention", &self.inner.idle_retention)
            .finish()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn entry_mut<'a>(
        &self,
        entries: &'a mut Entries,
        key: &CacheKey,
        ttl: Duration,
        now: Instant,
    ) -> &'a mut Entry {
        entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(self.next_generation(), ttl, now))
    }

    fn join_or_start(self: &Arc<Self>, key: &CacheKey, entry: &mut Entry, fetcher: Fetcher) -> FetchFuture {
        if let Some(fetch) = entry.current_fetch() {
            debug!(%key, "Joining in-flight fetch");
            return fetch;
        }

        let generation = entry.generation;
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let cache = Arc::downgrade(self);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = fetcher().await;
            if let Some(cache) = cache.upgrade() {
                cache.complete(&task_key, generation, &result);
            }
            result
        });

        let aborted_key = key.to_string();
        let fetch = async move {
            handle.await.unwrap_or_else(|_| {
                Err(ApiError::from(CacheError::FetchAborted { key: aborted_key }))
            })
        }
        .boxed()
        .shared();

        entry.in_flight = Some((generation, fetch.clone()));
        fetch
    }

    fn complete(&self, key: &CacheKey, generation: u64, result: &ApiResult<CachedValue>) {
        let mut entries = self.lock();
        match entries.get_mut(key) {
            Some(entry) if entry.generation == generation => {
                entry.in_flight = None;
                match result {
                    Ok(value) => entry.store(Arc::clone(value), Instant::now()),
                    Err(err) => {
                        debug!(%key, code = err.error_code(), "Fetch failed");
                        entry.fail(err.clone());
                    }
                }
            }
            Some(_) => warn!(%key, generation, "Discarding fetch result for invalidated entry"),
            None => debug!(%key, "Discarding fetch result for removed entry"),
        }
    }

    /// Start (or join) a fetch with the stored fetcher, ignoring TTL.
    fn refetch(self: &Arc<Self>, key: &CacheKey, entry_id: u64) -> Option<FetchFuture> {
        let mut entries = self.lock();
        let entry = entries.get_mut(key).filter(|entry| entry.id == entry_id)?;
        let fetcher = entry.fetcher.clone()?;
        Some(self.join_or_start(key, entry, fetcher))
    }

    /// What a subscriber to entry `entry_id` should see now: the last
    /// failure if the latest fetch failed, otherwise the value.
    pub(crate) fn outcome<T: Send + Sync + 'static>(
        &self,
        key: &CacheKey,
        entry_id: u64,
    ) -> Option<ApiResult<Arc<T>>> {
        let entries = self.lock();
        let entry = entries.get(key).filter(|entry| entry.id == entry_id)?;
        if let Some(err) = &entry.error {
            return Some(Err(err.clone()));
        }
        let value = entry.value.clone()?;
        Some(downcast(key, value).map_err(ApiError::from))
    }

    pub(crate) fn last_error(&self, key: &CacheKey, entry_id: u64) -> Option<ApiError> {
        self.lock()
            .get(key)
            .filter(|entry| entry.id == entry_id)
            .and_then(|entry| entry.error.clone())
    }

    fn peek<T: Send + Sync + 'static>(&self, key: &CacheKey) -> Result<Option<Arc<T>>, CacheError> {
        let value = self.lock().get(key).and_then(|entry| entry.value.clone());
        value.map(|value| downcast(key, value)).transpose()
    }

    fn invalidate_where(self: &Arc<Self>, matches: impl Fn(&CacheKey) -> bool) -> usize {
        let mut entries = self.lock();
        let matched: Vec<CacheKey> = entries.keys().filter(|key| matches(key)).cloned().collect();

        let mut refetched = 0;
        for key in &matched {
            let Some(entry) = entries.get_mut(key) else {
                continue;
            };
            if entry.subscribers == 0 {
                entries.remove(key);
                continue;
            }
            entry.stale = true;
            entry.generation = self.next_generation();
            entry.in_flight = None;
            if let Some(fetcher) = entry.fetcher.clone() {
                let _refetch = self.join_or_start(key, entry, fetcher);
                refetched += 1;
            }
        }

        if !matched.is_empty() {
            debug!(matched = matched.len(), refetched, "Invalidated cache entries");
        }
        matched.len()
    }

    pub(crate) fn unsubscribe(&self, key: &CacheKey, entry_id: u64) {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(key).filter(|entry| entry.id == entry_id) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            if entry.subscribers == 0 {
                entry.stop_polling();
                entry.idle_since = Some(Instant::now());
                debug!(%key, "Last subscriber left");
            }
        }
    }

    fn evict_idle_locked(&self, entries: &mut Entries, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_idle_past(self.idle_retention, now));
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "Evicted idle cache entries");
        }
        evicted
    }
}

/// Self-rescheduling refetch for one subscribed entry. Aborted when the
/// last subscriber leaves.
async fn poll_loop(cache: Weak<Inner>, key: CacheKey, entry_id: u64, interval: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(fetch) = cache.upgrade().and_then(|cache| cache.refetch(&key, entry_id)) else {
            break;
        };
        if let Err(err) = fetch.await {
            debug!(%key, code = err.error_code(), "Poll fetch failed");
        }
    }
}

fn erase<T, F, Fut>(fetch: F) -> Fetcher
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
{
    Arc::new(move || {
        let pending = fetch();
        async move { pending.await.map(|value| Arc::new(value) as CachedValue) }.boxed()
    })
}

fn downcast<T: Send + Sync + 'static>(key: &CacheKey, value: CachedValue) -> Result<Arc<T>, CacheError> {
    value.downcast::<T>().map_err(|_| CacheError::TypeMismatch {
        key: key.to_string(),
        expected: std::any::type_name::<T>(),
    })
}
