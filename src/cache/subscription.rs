use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use tokio::sync::watch;

use super::error::CacheError;
use crate::error::{ApiError, ApiResult};
use super::key::CacheKey;
use super::Inner;

/// An active observer of one cache key.
///
/// While at least one subscription to a key exists the entry is kept, its
/// poll task (if any) runs, and invalidation refetches it in place.
/// Dropping the last subscription stops polling and starts the idle
/// retention clock.
pub struct Subscription<T> {
    cache: Weak<Inner>,
    key: CacheKey,
    entry_id: u64,
    updates: watch::Receiver<u64>,
    _value: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    pub(crate) fn new(
        cache: &Arc<Inner>,
        key: CacheKey,
        entry_id: u64,
        updates: watch::Receiver<u64>,
    ) -> Self {
        Self {
            cache: Arc::downgrade(cache),
            key,
            entry_id,
            updates,
            _value: PhantomData,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// The most recent value, fresh or not.
    pub fn latest(&self) -> Result<Option<Arc<T>>, CacheError> {
        match self.cache.upgrade() {
            Some(cache) => cache.peek::<T>(&self.key),
            None => Ok(None),
        }
    }

    pub(crate) fn mark_seen(&mut self) {
        self.updates.borrow_and_update();
    }

    /// The failure of the latest fetch, if it failed. Cleared by the next
    /// successful fetch.
    pub fn last_error(&self) -> Option<ApiError> {
        self.cache
            .upgrade()
            .and_then(|cache| cache.last_error(&self.key, self.entry_id))
    }

    /// Wait until a fetch of the entry completes, successfully or not.
    /// Returns `false` once the entry is gone (the cache was cleared or
    /// dropped).
    pub async fn changed(&mut self) -> bool {
        self.updates.changed().await.is_ok()
    }

    /// Wait for the next fetch outcome: the new value, or the error the
    /// refetch failed with. `None` once the entry is gone.
    pub async fn next(&mut self) -> Option<ApiResult<Arc<T>>> {
        if !self.changed().await {
            return None;
        }
        self.cache.upgrade()?.outcome::<T>(&self.key, self.entry_id)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(cache) = self.cache.upgrade() {
            cache.unsubscribe(&self.key, self.entry_id);
        }
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("version", &*self.updates.borrow())
            .finish()
    }
}
