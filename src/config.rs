//! Client configuration.

use std::time::Duration;

use tracing::warn;

use crate::cache::{
    Freshness, DEFAULT_IDLE_RETENTION, DEFAULT_LOGS_POLL_INTERVAL, DEFAULT_METADATA_TTL,
    DEFAULT_SERVICE_POLL_INTERVAL,
};

/// Default API root of a local control plane.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/v1";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable overriding the API root.
pub const ENV_API_URL: &str = "PODORU_API_URL";

/// Environment variable overriding the request timeout, in seconds.
pub const ENV_REQUEST_TIMEOUT: &str = "PODORU_REQUEST_TIMEOUT_SECS";

/// Configuration for [`ControlPlane`](crate::api::ControlPlane).
///
/// Use the builder pattern to customize it.
///
/// # Example
///
/// ```ignore
/// use podoru::ClientConfig;
///
/// let config = ClientConfig::default()
///     .with_base_url("https://deploy.example.com/api/v1")
///     .with_service_poll_interval(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API root, including the version prefix
    pub base_url: String,
    pub request_timeout: Duration,
    /// TTL of teams, projects, users, members and domains
    pub metadata_ttl: Duration,
    pub service_poll_interval: Duration,
    pub logs_poll_interval: Duration,
    /// How long an unobserved cache entry is kept
    pub idle_retention: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            metadata_ttl: DEFAULT_METADATA_TTL,
            service_poll_interval: DEFAULT_SERVICE_POLL_INTERVAL,
            logs_poll_interval: DEFAULT_LOGS_POLL_INTERVAL,
            idle_retention: DEFAULT_IDLE_RETENTION,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API root. A trailing slash is dropped.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_metadata_ttl(mut self, ttl: Duration) -> Self {
        self.metadata_ttl = ttl;
        self
    }

    pub fn with_service_poll_interval(mut self, interval: Duration) -> Self {
        self.service_poll_interval = interval;
        self
    }

    pub fn with_logs_poll_interval(mut self, interval: Duration) -> Self {
        self.logs_poll_interval = interval;
        self
    }

    pub fn with_idle_retention(mut self, retention: Duration) -> Self {
        self.idle_retention = retention;
        self
    }

    /// Defaults overridden by `PODORU_API_URL` and
    /// `PODORU_REQUEST_TIMEOUT_SECS`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                config = config.with_base_url(url.trim());
            }
        }

        if let Ok(raw) = std::env::var(ENV_REQUEST_TIMEOUT) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => {
                    config = config.with_request_timeout(Duration::from_secs(secs));
                }
                _ => warn!(value = %raw, "Ignoring invalid {}", ENV_REQUEST_TIMEOUT),
            }
        }

        config
    }

    pub fn metadata_freshness(&self) -> Freshness {
        Freshness::ttl(self.metadata_ttl)
    }

    pub fn service_freshness(&self) -> Freshness {
        Freshness::polling(self.service_poll_interval)
    }

    pub fn logs_freshness(&self) -> Freshness {
        Freshness::polling(self.logs_poll_interval)
    }
}
