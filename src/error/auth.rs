//! Authentication-related error types.
//!
//! [`SessionError`] covers credentials that cannot be turned into a
//! session; [`RenewalError`] covers every way a credential renewal can fail.
//! Both are `Clone` because one renewal outcome is handed to every caller
//! that joined it.

use thiserror::Error;

/// An access credential could not be turned into a session identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The token is not a three-part JWT or its payload is not valid
    /// base64url JSON.
    #[error("malformed access token: {reason}")]
    MalformedAccessToken { reason: String },

    /// The JWT payload decoded but lacks a claim the identity needs.
    #[error("access token is missing the '{0}' claim")]
    MissingClaim(&'static str),
}

/// A credential renewal failed. Every variant is terminal for the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenewalError {
    /// There was no session (and so no renewal credential) to renew.
    #[error("no session to renew")]
    NoSession,

    /// The control plane refused the renewal credential.
    #[error("renewal credential rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The renewal request never got a response.
    #[error("renewal request failed: {message}")]
    Transport { message: String },

    /// The renewal response could not be decoded.
    #[error("invalid renewal response: {message}")]
    InvalidResponse { message: String },

    /// The renewed access credential does not carry a usable identity.
    #[error("renewed credential unusable: {0}")]
    InvalidCredential(#[from] SessionError),

    /// The renewal task stopped before producing an outcome.
    #[error("renewal task aborted")]
    Aborted,
}

impl RenewalError {
    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            RenewalError::NoSession => "You are not signed in. Please sign in to continue.".to_string(),
            RenewalError::Transport { .. } => {
                "Your session could not be renewed because the server was unreachable. Please sign in again."
                    .to_string()
            }
            _ => "Your session has expired. Please sign in again.".to_string(),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            RenewalError::NoSession => "E_RENEW_NO_SESSION",
            RenewalError::Rejected { .. } => "E_RENEW_REJECTED",
            RenewalError::Transport { .. } => "E_RENEW_TRANSPORT",
            RenewalError::InvalidResponse { .. } => "E_RENEW_RESPONSE",
            RenewalError::InvalidCredential(_) => "E_RENEW_CREDENTIAL",
            RenewalError::Aborted => "E_RENEW_ABORTED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_display() {
        let err = SessionError::MissingClaim("user_id");
        assert_eq!(err.to_string(), "access token is missing the 'user_id' claim");

        let err = SessionError::MalformedAccessToken {
            reason: "expected 3 segments".to_string(),
        };
        assert!(err.to_string().contains("expected 3 segments"));
    }

    #[test]
    fn test_renewal_error_codes_are_distinct() {
        let errors = [
            RenewalError::NoSession,
            RenewalError::Rejected {
                status: 401,
                message: "invalid".to_string(),
            },
            RenewalError::Transport {
                message: "refused".to_string(),
            },
            RenewalError::InvalidResponse {
                message: "bad json".to_string(),
            },
            RenewalError::InvalidCredential(SessionError::MissingClaim("exp")),
            RenewalError::Aborted,
        ];

        let codes: std::collections::HashSet<_> = errors.iter().map(|e| e.error_code()).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_renewal_error_from_session_error() {
        let err: RenewalError = SessionError::MissingClaim("exp").into();
        assert!(matches!(err, RenewalError::InvalidCredential(_)));
        assert!(err.user_message().contains("sign in"));
    }
}
