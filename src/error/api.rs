//! The typed failure returned by every control-plane call.

use std::collections::BTreeMap;

use thiserror::Error;

use super::auth::RenewalError;
use super::category::ErrorCategory;
use crate::cache::CacheError;
use crate::models::ApiResponse;
use crate::traits::HttpError;

/// Field name to message, as reported by the control plane's validator.
pub type FieldErrors = BTreeMap<String, String>;

/// Longest slice of a non-envelope body kept as an error message.
const MAX_RAW_MESSAGE_CHARS: usize = 200;

/// Failure of a control-plane call.
///
/// `AuthExpired` is normally absorbed by the request gateway (renew, then
/// replay once). It only reaches callers for requests sent without a
/// credential or for a replay that was rejected again. A failed renewal
/// surfaces as `SessionExpired` and means the session is gone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No response reached the client.
    #[error("network error: {message}")]
    Network { message: String },

    /// HTTP 401.
    #[error("credential expired: {message}")]
    AuthExpired { message: String },

    /// Renewal failed; the session was cleared.
    #[error("session expired: {0}")]
    SessionExpired(#[from] RenewalError),

    /// HTTP 422, or 400 carrying the `VALIDATION_ERROR` code.
    #[error("validation failed: {message}")]
    Validation { message: String, fields: FieldErrors },

    /// Any other HTTP 400.
    #[error("bad request ({code}): {message}")]
    BadRequest { code: String, message: String },

    /// HTTP 403.
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// HTTP 404.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// HTTP 409, e.g. a duplicate slug.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// HTTP 5xx.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// A status outside the classes above (429, 3xx, ...).
    #[error("unexpected response ({status}): {message}")]
    Unexpected { status: u16, message: String },

    /// The body did not match the envelope or the expected payload.
    #[error("invalid response body: {message}")]
    Decode { message: String },

    /// The resource cache was asked for a value under the wrong type.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl ApiError {
    /// Classify a non-success response.
    ///
    /// The envelope's `error` block supplies the message and field details
    /// when present; otherwise the raw body (truncated) is used.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let info = serde_json::from_slice::<ApiResponse<serde_json::Value>>(body)
            .ok()
            .and_then(|envelope| envelope.error);

        let (code, message, fields) = match info {
            Some(info) => (info.code, info.message, info.details.unwrap_or_default()),
            None => (String::new(), raw_message(status, body), FieldErrors::new()),
        };

        match status {
            401 => ApiError::AuthExpired { message },
            403 => ApiError::Forbidden { message },
            404 => ApiError::NotFound { message },
            409 => ApiError::Conflict { message },
            422 => ApiError::Validation { message, fields },
            400 if code == "VALIDATION_ERROR" => ApiError::Validation { message, fields },
            400 => ApiError::BadRequest { code, message },
            500..=599 => ApiError::Server { status, message },
            _ => ApiError::Unexpected { status, message },
        }
    }

    /// HTTP status behind this error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::AuthExpired { .. } => Some(401),
            ApiError::Validation { .. } => Some(422),
            ApiError::BadRequest { .. } => Some(400),
            ApiError::Forbidden { .. } => Some(403),
            ApiError::NotFound { .. } => Some(404),
            ApiError::Conflict { .. } => Some(409),
            ApiError::Server { status, .. } | ApiError::Unexpected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Network { .. } => ErrorCategory::Network,
            ApiError::AuthExpired { .. } | ApiError::SessionExpired(_) => ErrorCategory::Auth,
            ApiError::Validation { .. }
            | ApiError::BadRequest { .. }
            | ApiError::Forbidden { .. }
            | ApiError::NotFound { .. }
            | ApiError::Conflict { .. } => ErrorCategory::User,
            ApiError::Server { .. } => ErrorCategory::Server,
            ApiError::Unexpected { status, .. } if *status == 429 => ErrorCategory::Server,
            ApiError::Unexpected { .. } | ApiError::Decode { .. } | ApiError::Cache(_) => {
                ErrorCategory::Client
            }
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// True when the caller has to sign in again.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, ApiError::AuthExpired { .. } | ApiError::SessionExpired(_))
    }

    /// Field-level validation messages, empty for other variants.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ApiError::Validation { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Network { .. } => "E_NET",
            ApiError::AuthExpired { .. } => "E_AUTH_EXPIRED",
            ApiError::SessionExpired(err) => err.error_code(),
            ApiError::Validation { .. } => "E_VALIDATION",
            ApiError::BadRequest { .. } => "E_BAD_REQUEST",
            ApiError::Forbidden { .. } => "E_FORBIDDEN",
            ApiError::NotFound { .. } => "E_NOT_FOUND",
            ApiError::Conflict { .. } => "E_CONFLICT",
            ApiError::Server { .. } => "E_SERVER",
            ApiError::Unexpected { .. } => "E_UNEXPECTED",
            ApiError::Decode { .. } => "E_DECODE",
            ApiError::Cache(_) => "E_CACHE",
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::SessionExpired(err) => err.user_message(),
            ApiError::AuthExpired { .. } => "You are not signed in. Please sign in to continue.".to_string(),
            ApiError::Validation { message, .. }
            | ApiError::Forbidden { message }
            | ApiError::NotFound { message }
            | ApiError::Conflict { message }
            | ApiError::BadRequest { message, .. } => message.clone(),
            other => format!("{} ({})", other.category().description(), other),
        }
    }
}

impl From<HttpError> for ApiError {
    fn from(err: HttpError) -> Self {
        ApiError::Network {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode {
            message: err.to_string(),
        }
    }
}

fn raw_message(status: u16, body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        format!("HTTP {}", status)
    } else {
        text.chars().take(MAX_RAW_MESSAGE_CHARS).collect()
    }
}
