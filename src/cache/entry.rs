//! A single cached query and its bookkeeping.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::ApiError;

/// A cached value with its concrete type erased.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// Re-runnable fetch for one key.
pub type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<CachedValue, ApiError>> + Send + Sync>;

pub(crate) type FetchFuture = Shared<BoxFuture<'static, Result<CachedValue, ApiError>>>;

pub(crate) struct Entry {
    /// Distinguishes this entry from a later one under the same key
    pub(crate) id: u64,
    pub(crate) value: Option<CachedValue>,
    pub(crate) fetched_at: Option<Instant>,
    pub(crate) ttl: Duration,
    /// Set by invalidation, cleared by the next successful fetch
    pub(crate) stale: bool,
    pub(crate) subscribers: usize,
    /// Fetch results tagged with an older generation are discarded
    pub(crate) generation: u64,
    pub(crate) in_flight: Option<(u64, FetchFuture)>,
    pub(crate) fetcher: Option<Fetcher>,
    pub(crate) poll: Option<JoinHandle<()>>,
    pub(crate) poll_interval: Option<Duration>,
    /// Outcome of the latest completed fetch when it failed
    pub(crate) error: Option<ApiError>,
    /// Bumped on every completed fetch, successful or not
    pub(crate) updates: watch::Sender<u64>,
    pub(crate) idle_since: Option<Instant>,
}

impl Entry {
    pub(crate) fn new(generation: u64, ttl: Duration, now: Instant) -> Self {
        let (updates, _) = watch::channel(0);
        Self {
            id: generation,
            value: None,
            fetched_at: None,
            ttl,
            stale: false,
            subscribers: 0,
            generation,
            in_flight: None,
            fetcher: None,
            poll: None,
            poll_interval: None,
            error: None,
            updates,
            idle_since: Some(now),
        }
    }

    /// The value, if present, not invalidated and younger than the TTL.
    pub(crate) fn fresh_value(&self, now: Instant) -> Option<CachedValue> {
        if self.stale {
            return None;
        }
        match (&self.value, self.fetched_at) {
            (Some(value), Some(fetched_at)) if now.duration_since(fetched_at) < self.ttl => {
                Some(Arc::clone(value))
            }
            _ => None,
        }
    }

    pub(crate) fn needs_refetch(&self, now: Instant) -> bool {
        self.fresh_value(now).is_none()
    }

    /// The in-flight fetch for the current generation.
    pub(crate) fn current_fetch(&self) -> Option<FetchFuture> {
        self.in_flight
            .as_ref()
            .filter(|(generation, _)| *generation == self.generation)
            .map(|(_, fetch)| fetch.clone())
    }

    pub(crate) fn store(&mut self, value: CachedValue, now: Instant) {
        self.value = Some(value);
        self.fetched_at = Some(now);
        self.stale = false;
        self.error = None;
        self.updates.send_modify(|version| *version += 1);
    }

    /// Record a failed fetch. The previous value, if any, is kept.
    pub(crate) fn fail(&mut self, err: ApiError) {
        self.error = Some(err);
        self.updates.send_modify(|version| *version += 1);
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        if self.subscribers == 0 {
            self.idle_since = Some(now);
        }
    }

    pub(crate) fn is_idle_past(&self, retention: Duration, now: Instant) -> bool {
        self.subscribers == 0
            && self
                .idle_since
                .is_some_and(|since| now.duration_since(since) >= retention)
    }

    pub(crate) fn stop_polling(&mut self) {
        self.poll_interval = None;
        if let Some(handle) = self.poll.take() {
            handle.abort();
        }
    }
}

impl Drop for Entry {
    fn drop(&mut self) {
        self.stop_polling();
    }
}
