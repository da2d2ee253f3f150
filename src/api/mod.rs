//! Typed access to the control plane.
//!
//! [`ControlPlane`] wires the session store, renewal coordinator, request
//! gateway and resource cache together. Reads go through the cache under
//! the resource's hierarchical key; writes go through the gateway and, on
//! success, invalidate whatever the mutation touched.

mod auth;
mod projects;
mod services;
mod teams;
mod users;

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::adapters::ReqwestHttpClient;
use crate::auth::{RenewalCoordinator, SessionEvent, SessionStore};
use crate::cache::{CacheKey, Freshness, ResourceCache, Subscription};
use crate::config::ClientConfig;
use crate::error::ApiResult;
use crate::gateway::{ApiRequest, RequestGateway};
use crate::invalidation::{affected_prefixes, Mutation};
use crate::traits::HttpClient;

/// Client for one control-plane deployment.
///
/// Cheap to clone; clones share the session and the cache.
#[derive(Clone)]
pub struct ControlPlane {
    config: ClientConfig,
    store: Arc<SessionStore>,
    gateway: Arc<RequestGateway>,
    cache: ResourceCache,
}

impl ControlPlane {
    /// Client talking HTTP through reqwest.
    pub fn new(config: ClientConfig) -> Self {
        let http = Arc::new(ReqwestHttpClient::with_timeout(config.request_timeout));
        Self::with_http_client(config, http)
    }

    /// Client over any transport.
    pub fn with_http_client(config: ClientConfig, http: Arc<dyn HttpClient>) -> Self {
        let store = Arc::new(SessionStore::new());
        let cache = ResourceCache::with_idle_retention(config.idle_retention);
        // A forced logout ends every subscription and drops the previous
        // user's data, like an explicit logout.
        let weak_cache = cache.downgrade();
        let renewal = Arc::new(
            RenewalCoordinator::new(Arc::clone(&store), Arc::clone(&http), &config.base_url)
                .on_session_lost(move || {
                    if let Some(cache) = ResourceCache::upgrade(&weak_cache) {
                        warn!(entries = cache.len(), "Session lost; clearing cached resources");
                        cache.clear();
                    }
                }),
        );
        let gateway = Arc::new(RequestGateway::new(
            http,
            Arc::clone(&store),
            renewal,
            config.base_url.clone(),
        ));

        Self {
            config,
            store,
            gateway,
            cache,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session_store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn gateway(&self) -> &Arc<RequestGateway> {
        &self.gateway
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Session transitions: login, renewal and forced or explicit logout.
    pub fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.store.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    /// Cached read of metadata under the configured TTL.
    async fn query<T>(&self, key: CacheKey, request: ApiRequest) -> ApiResult<Arc<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.query_within(key, self.config.metadata_ttl, request).await
    }

    async fn query_within<T>(&self, key: CacheKey, ttl: Duration, request: ApiRequest) -> ApiResult<Arc<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.cache.read(key, ttl, self.fetcher::<T>(request)).await
    }

    /// Long-lived observation of `key`.
    async fn watch<T>(
        &self,
        key: CacheKey,
        freshness: Freshness,
        request: ApiRequest,
    ) -> ApiResult<Subscription<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.cache
            .subscribe(key, freshness, self.fetcher::<T>(request))
            .await
    }

    fn fetcher<T>(
        &self,
        request: ApiRequest,
    ) -> impl Fn() -> BoxFuture<'static, ApiResult<T>> + Send + Sync + 'static
    where
        T: DeserializeOwned + Send + 'static,
    {
        let gateway = Arc::clone(&self.gateway);
        move || {
            let gateway = Arc::clone(&gateway);
            let request = request.clone();
            async move { gateway.call::<T>(&request).await }.boxed()
        }
    }

    /// Send a write and invalidate what it affected.
    async fn mutate<T>(&self, request: ApiRequest, mutation: Mutation) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let value = self.gateway.call::<T>(&request).await?;
        self.invalidate_for(&mutation);
        Ok(value)
    }

    /// Like [`mutate`](Self::mutate) for endpoints answering 204.
    async fn mutate_empty(&self, request: ApiRequest, mutation: Mutation) -> ApiResult<()> {
        self.gateway.call_empty(&request).await?;
        self.invalidate_for(&mutation);
        Ok(())
    }

    fn invalidate_for(&self, mutation: &Mutation) {
        let targets = affected_prefixes(mutation);
        let invalidated = self.cache.apply(&targets);
        debug!(mutation = %mutation.kind(), targets = targets.len(), invalidated, "Applied mutation");
    }
}

impl std::fmt::Debug for ControlPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlane")
            .field("base_url", &self.config.base_url)
            .field("authenticated", &self.store.is_authenticated())
            .field("cached_entries", &self.cache.len())
            .finish()
    }
}
