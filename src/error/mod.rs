//! Error handling for the control-plane client.
//!
//! - **Error Categories**: coarse classification for presentation and retry
//! - **`ApiError`**: the taxonomy every call fails with (network, expired
//!   credential, validation, forbidden, not found, conflict, server, ...)
//! - **Auth errors**: `SessionError` for unusable credentials and
//!   `RenewalError` for failed renewals
//! - **Result Type Alias**: `ApiResult<T>`
//!
//! # Error Categories
//!
//! | Category | Description | Retryable |
//! |----------|-------------|-----------|
//! | Network | No response reached the client | Yes |
//! | Auth | Expired credential or forced logout | No |
//! | Server | Control plane 5xx | Yes |
//! | Client | Undecodable body, cache misuse | No |
//! | User | Validation, forbidden, not found, conflict | No |

mod api;
mod auth;
mod category;
mod result;

pub use api::{ApiError, FieldErrors};
pub use auth::{RenewalError, SessionError};
pub use category::ErrorCategory;
pub use result::ApiResult;

#[cfg(test)]
mod integration_tests {
    use super::*;

    /// Renewal failures fold into the API taxonomy as forced logouts.
    #[test]
    fn test_renewal_failure_unification() {
        let err: ApiError = RenewalError::Rejected {
            status: 401,
            message: "refresh token revoked".to_string(),
        }
        .into();

        assert_eq!(err.category(), ErrorCategory::Auth);
        assert!(err.requires_reauth());
        assert!(!err.is_retryable());
        assert_eq!(err.error_code(), "E_RENEW_REJECTED");
        assert!(err.to_string().contains("refresh token revoked"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: ApiError = json_err.into();
        assert!(matches!(err, ApiError::Decode { .. }));
        assert_eq!(err.category(), ErrorCategory::Client);
    }

    #[test]
    fn test_every_error_has_user_message() {
        let errors = vec![
            ApiError::Network {
                message: "refused".to_string(),
            },
            ApiError::AuthExpired {
                message: "expired".to_string(),
            },
            ApiError::SessionExpired(RenewalError::NoSession),
            ApiError::Server {
                status: 500,
                message: "boom".to_string(),
            },
            ApiError::Decode {
                message: "eof".to_string(),
            },
        ];

        for err in errors {
            assert!(!err.user_message().is_empty(), "{:?}", err);
            assert!(!err.error_code().is_empty(), "{:?}", err);
        }
    }
}
