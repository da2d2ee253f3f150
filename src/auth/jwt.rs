//! Access-token claim decoding.
//!
//! Tokens are not verified here; the control plane is the authority on
//! signatures. The client only reads the payload to learn who is signed in
//! and when the credential lapses.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::error::SessionError;

/// Claims the control plane puts in every access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub user_id: String,
    pub email: String,
    /// Expiry as Unix seconds
    pub exp: i64,
    /// Issue time as Unix seconds
    pub iat: Option<i64>,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(|iat| Utc.timestamp_opt(iat, 0).single())
    }
}

#[derive(Deserialize)]
struct RawClaims {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    iat: Option<i64>,
}

/// Decode the payload segment of a JWT access token.
pub fn decode_claims(access_token: &str) -> Result<Claims, SessionError> {
    let parts: Vec<&str> = access_token.split('.').collect();
    if parts.len() != 3 {
        return Err(SessionError::MalformedAccessToken {
            reason: format!("expected 3 segments, found {}", parts.len()),
        });
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| SessionError::MalformedAccessToken {
            reason: format!("payload is not base64url: {}", e),
        })?;
    let raw: RawClaims =
        serde_json::from_slice(&payload).map_err(|e| SessionError::MalformedAccessToken {
            reason: format!("payload is not a JSON object: {}", e),
        })?;

    Ok(Claims {
        user_id: raw.user_id.ok_or(SessionError::MissingClaim("user_id"))?,
        email: raw.email.ok_or(SessionError::MissingClaim("email"))?,
        exp: raw.exp.ok_or(SessionError::MissingClaim("exp"))?,
        iat: raw.iat,
    })
}

/// Seconds until the access token expires, zero if it already has.
pub fn expires_in(access_token: &str) -> Option<u32> {
    let claims = decode_claims(access_token).ok()?;
    let now = Utc::now().timestamp();
    Some((claims.exp - now).clamp(0, u32::MAX as i64) as u32)
}

/// Build an unsigned token carrying the given claims. Test helper.
#[cfg(test)]
pub(crate) fn encode_unsigned(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
    let signature = URL_SAFE_NO_PAD.encode("fake-signature");
    format!("{}.{}.{}", header, payload, signature)
}
