//! Session lifecycle: the session store, access-token claims, and
//! single-flight renewal.

pub mod jwt;
mod renewal;
mod session;

pub use jwt::{decode_claims, expires_in, Claims};
pub use renewal::{RenewalCoordinator, SessionLostHook};
pub use session::{ClearReason, Identity, Session, SessionEvent, SessionStore};
