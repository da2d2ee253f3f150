//! Podoru client - session handling and a consistent resource cache for the
//! Podoru deployment control plane.
//!
//! [`ControlPlane`] is the entry point. It keeps one authenticated session,
//! renews it transparently when the server rejects an expired access token,
//! and serves teams, projects, services, domains and logs from a cache that
//! mutations invalidate by key prefix.

pub mod adapters;
pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod invalidation;
pub mod models;
pub mod preferences;
pub mod traits;

pub use api::ControlPlane;
pub use auth::{ClearReason, Identity, Session, SessionEvent, SessionStore};
pub use cache::{CacheKey, Freshness, ResourceCache, Subscription};
pub use config::ClientConfig;
pub use error::{ApiError, ApiResult, ErrorCategory};
pub use gateway::{ApiRequest, RequestGateway};
pub use invalidation::{affected_prefixes, InvalidationTarget, Mutation, MutationKind};
pub use preferences::{Preferences, PreferencesManager, Theme};
