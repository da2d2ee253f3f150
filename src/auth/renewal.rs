//! Single-flight credential renewal.
//!
//! At most one refresh request is outstanding at any time. Every caller that
//! asks for a renewal while one is running awaits that same attempt and
//! receives the same outcome. Refresh tokens are single-use on the server,
//! so a second concurrent refresh would invalidate the first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use super::session::{ClearReason, Session, SessionStore};
use crate::error::RenewalError;
use crate::models::{ApiResponse, RefreshRequest, TokenResponse};
use crate::traits::{HttpClient, HttpRequest, Method};

type RenewalFuture = Shared<BoxFuture<'static, Result<Session, RenewalError>>>;
type Slot = Arc<Mutex<Option<(u64, RenewalFuture)>>>;

/// Called once when a failed renewal ends the session.
pub type SessionLostHook = Arc<dyn Fn() + Send + Sync>;

enum Join {
    /// Someone already renewed past the rejected credential.
    Current(Session),
    /// Await this attempt, then release the slot if it is still ours.
    Wait(u64, RenewalFuture),
    Failed(RenewalError),
}

/// Coordinates credential renewal across concurrent requests.
pub struct RenewalCoordinator {
    store: Arc<SessionStore>,
    http: Arc<dyn HttpClient>,
    refresh_url: String,
    in_flight: Slot,
    next_generation: AtomicU64,
    started: AtomicU64,
    on_session_lost: Option<SessionLostHook>,
}

impl RenewalCoordinator {
    /// `base_url` is the API root, e.g. `http://localhost:8080/api/v1`.
    pub fn new(store: Arc<SessionStore>, http: Arc<dyn HttpClient>, base_url: &str) -> Self {
        Self {
            store,
            http,
            refresh_url: format!("{}/auth/refresh", base_url.trim_end_matches('/')),
            in_flight: Arc::new(Mutex::new(None)),
            next_generation: AtomicU64::new(0),
            started: AtomicU64::new(0),
            on_session_lost: None,
        }
    }

    /// Run `hook` after a failed renewal has cleared the session, before
    /// any waiter sees the failure.
    pub fn on_session_lost(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_session_lost = Some(Arc::new(hook));
        self
    }

    /// Renew the session, joining an attempt already in progress.
    pub async fn renew(&self) -> Result<Session, RenewalError> {
        self.run_joined(None).await
    }

    /// Renew after `used_access` was rejected.
    ///
    /// Returns the current session without a network call when it already
    /// carries a different access token.
    pub async fn renew_stale(&self, used_access: &str) -> Result<Session, RenewalError> {
        self.run_joined(Some(used_access)).await
    }

    /// Number of refresh requests issued so far.
    pub fn renewals_started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    /// Whether an attempt is currently outstanding.
    pub fn is_renewing(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    async fn run_joined(&self, used_access: Option<&str>) -> Result<Session, RenewalError> {
        match self.join_or_start(used_access) {
            Join::Current(session) => Ok(session),
            Join::Failed(err) => Err(err),
            Join::Wait(generation, attempt) => {
                let outcome = attempt.await;
                self.release(generation);
                outcome
            }
        }
    }

    fn join_or_start(&self, used_access: Option<&str>) -> Join {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some((generation, attempt)) = slot.as_ref() {
            debug!(generation, "Joining in-flight renewal");
            return Join::Wait(*generation, attempt.clone());
        }

        let Some(session) = self.store.get() else {
            return Join::Failed(RenewalError::NoSession);
        };
        if let Some(used) = used_access {
            if session.access_token() != used {
                debug!("Credential already renewed by another request");
                return Join::Current(session);
            }
        }

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.started.fetch_add(1, Ordering::SeqCst);

        let task = tokio::spawn(exchange_and_store(
            Arc::clone(&self.store),
            Arc::clone(&self.http),
            self.refresh_url.clone(),
            session.refresh_token().to_string(),
            Arc::clone(&self.in_flight),
            generation,
            self.on_session_lost.clone(),
        ));
        let attempt = async move { task.await.unwrap_or(Err(RenewalError::Aborted)) }
            .boxed()
            .shared();

        *slot = Some((generation, attempt.clone()));
        Join::Wait(generation, attempt)
    }

    fn release(&self, generation: u64) {
        release(&self.in_flight, generation);
    }
}

/// Empty the slot if it still holds attempt `generation`.
fn release(slot: &Slot, generation: u64) {
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.as_ref().is_some_and(|(current, _)| *current == generation) {
        *slot = None;
    }
}

impl std::fmt::Debug for RenewalCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenewalCoordinator")
            .field("refresh_url", &self.refresh_url)
            .field("renewals_started", &self.renewals_started())
            .finish()
    }
}

/// Runs detached so the store is updated exactly once even if every waiter
/// is cancelled. The slot is emptied only after the store reflects the
/// outcome, so a caller that finds it empty can trust the store.
async fn exchange_and_store(
    store: Arc<SessionStore>,
    http: Arc<dyn HttpClient>,
    refresh_url: String,
    refresh_token: String,
    slot: Slot,
    generation: u64,
    on_session_lost: Option<SessionLostHook>,
) -> Result<Session, RenewalError> {
    info!(generation, "Renewing access credential");

    let exchanged = exchange(http.as_ref(), &refresh_url, &refresh_token).await;
    let outcome = store_outcome(&store, &refresh_token, exchanged, on_session_lost.as_deref());
    release(&slot, generation);
    outcome
}

fn store_outcome(
    store: &SessionStore,
    refresh_token: &str,
    outcome: Result<Session, RenewalError>,
    on_session_lost: Option<&(dyn Fn() + Send + Sync)>,
) -> Result<Session, RenewalError> {
    match outcome {
        Ok(session) => {
            if store.replace_if_current(refresh_token, session.clone()) {
                info!(user_id = %session.identity().user_id, "Access credential renewed");
                return Ok(session);
            }
            // Logged out or logged in again while the refresh was in flight.
            match store.get() {
                Some(current) => Ok(current),
                None => Err(RenewalError::NoSession),
            }
        }
        Err(err) => {
            warn!(error = %err, code = err.error_code(), "Credential renewal failed; clearing session");
            if store.clear_if_current(refresh_token, ClearReason::RenewalFailed) {
                if let Some(hook) = on_session_lost {
                    hook();
                }
            }
            Err(err)
        }
    }
}

async fn exchange(
    http: &dyn HttpClient,
    refresh_url: &str,
    refresh_token: &str,
) -> Result<Session, RenewalError> {
    let body = serde_json::to_string(&RefreshRequest {
        refresh_token: refresh_token.to_string(),
    })
    .map_err(|e| RenewalError::InvalidResponse {
        message: e.to_string(),
    })?;

    let response = http
        .send(HttpRequest::new(Method::Post, refresh_url).json_body(body))
        .await
        .map_err(|e| RenewalError::Transport {
            message: e.to_string(),
        })?;

    if !response.is_success() {
        let message = serde_json::from_slice::<ApiResponse<serde_json::Value>>(&response.body)
            .ok()
            .and_then(|envelope| envelope.error)
            .map(|info| info.message)
            .unwrap_or_else(|| format!("HTTP {}", response.status));
        return Err(RenewalError::Rejected {
            status: response.status,
            message,
        });
    }

    let envelope: ApiResponse<TokenResponse> =
        response.json().map_err(|e| RenewalError::InvalidResponse {
            message: e.to_string(),
        })?;
    let tokens = envelope.data.ok_or_else(|| RenewalError::InvalidResponse {
        message: "response carried no token pair".to_string(),
    })?;

    Ok(Session::from_tokens(&tokens)?)
}
