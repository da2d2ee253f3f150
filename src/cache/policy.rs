//! How long cached values stay fresh and which keys poll.

use std::time::Duration;

/// Time-to-live for metadata (teams, projects, users, domains).
pub const DEFAULT_METADATA_TTL: Duration = Duration::from_secs(5 * 60);

/// Poll interval for a service's status.
pub const DEFAULT_SERVICE_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Poll interval for a service's logs.
pub const DEFAULT_LOGS_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How long an entry without subscribers is retained.
pub const DEFAULT_IDLE_RETENTION: Duration = Duration::from_secs(5 * 60);

/// Freshness requirements of one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    /// Age after which a value must be refetched before it is served fresh
    pub ttl: Duration,
    /// While subscribed, refetch on this interval regardless of `ttl`
    pub poll_interval: Option<Duration>,
}

impl Freshness {
    /// Refetch only when older than `ttl` or invalidated.
    pub fn ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            poll_interval: None,
        }
    }

    /// Refetch every `interval` while subscribed. Values older than one
    /// interval are stale.
    pub fn polling(interval: Duration) -> Self {
        Self {
            ttl: interval,
            poll_interval: Some(interval),
        }
    }

    pub fn metadata() -> Self {
        Self::ttl(DEFAULT_METADATA_TTL)
    }

    pub fn service_status() -> Self {
        Self::polling(DEFAULT_SERVICE_POLL_INTERVAL)
    }

    pub fn logs() -> Self {
        Self::polling(DEFAULT_LOGS_POLL_INTERVAL)
    }

    pub fn polls(&self) -> bool {
        self.poll_interval.is_some()
    }
}

impl Default for Freshness {
    fn default() -> Self {
        Self::metadata()
    }
}
