//! The in-memory session and the store every component reads it through.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::info;

use super::jwt::decode_claims;
use crate::error::SessionError;
use crate::models::TokenResponse;

/// Capacity of the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Who is signed in, as derived from the access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

/// A complete credential pair and the identity it belongs to.
///
/// Construction decodes the access token, so a `Session` value always has
/// both credentials and a valid identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    access_token: String,
    refresh_token: String,
    identity: Identity,
    expires_at: DateTime<Utc>,
    issued_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let access_token = access_token.into();
        let claims = decode_claims(&access_token)?;

        Ok(Self {
            expires_at: claims.expires_at(),
            issued_at: claims.issued_at(),
            identity: Identity {
                user_id: claims.user_id,
                email: claims.email,
            },
            access_token,
            refresh_token: refresh_token.into(),
        })
    }

    pub fn from_tokens(tokens: &TokenResponse) -> Result<Self, SessionError> {
        Self::new(tokens.access_token.clone(), tokens.refresh_token.clone())
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    /// Whether the access token's `exp` has passed on the local clock.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    /// The user signed out.
    Logout,
    /// The renewal credential was refused or could not be used.
    RenewalFailed,
}

/// Session transitions, broadcast to collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Established(Identity),
    Renewed(Identity),
    Cleared { reason: ClearReason },
}

/// Holder of the current session.
///
/// Reads return snapshots; the lock is never held across an `.await`.
pub struct SessionStore {
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            current: RwLock::new(None),
            events,
        }
    }

    /// Snapshot of the current session.
    pub fn get(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install a session after login or registration.
    pub fn set(&self, session: Session) {
        let identity = session.identity().clone();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        info!(user_id = %identity.user_id, "Session established");
        self.emit(SessionEvent::Established(identity));
    }

    /// Remove the session. Returns whether there was one.
    pub fn clear(&self) -> bool {
        self.clear_with(ClearReason::Logout)
    }

    pub fn clear_with(&self, reason: ClearReason) -> bool {
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            info!(?reason, "Session cleared");
            self.emit(SessionEvent::Cleared { reason });
        }
        previous.is_some()
    }

    /// Replace the session only if it still carries `refresh_token`.
    ///
    /// A renewal that finishes after a logout, or after a different login,
    /// must not overwrite what is there now.
    pub fn replace_if_current(&self, refresh_token: &str, session: Session) -> bool {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        match current.as_ref() {
            Some(existing) if existing.refresh_token() == refresh_token => {
                let identity = session.identity().clone();
                *current = Some(session);
                drop(current);
                self.emit(SessionEvent::Renewed(identity));
                true
            }
            _ => false,
        }
    }

    /// Clear the session only if it still carries `refresh_token`.
    pub fn clear_if_current(&self, refresh_token: &str, reason: ClearReason) -> bool {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        match current.as_ref() {
            Some(existing) if existing.refresh_token() == refresh_token => {
                *current = None;
                drop(current);
                info!(?reason, "Session cleared");
                self.emit(SessionEvent::Cleared { reason });
                true
            }
            _ => false,
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.get().map(|s| s.access_token)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.get().map(|s| s.refresh_token)
    }

    pub fn identity(&self) -> Option<Identity> {
        self.get().map(|s| s.identity)
    }

    pub fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Receive session transitions from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("current", &self.get())
            .finish()
    }
}
