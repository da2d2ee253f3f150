use tracing::{info, warn};

use super::ControlPlane;
use crate::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::gateway::ApiRequest;
use crate::invalidation::Mutation;
use crate::models::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, User};

impl ControlPlane {
    /// Exchange email and password for a session.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<User> {
        let request = ApiRequest::post("/auth/login")
            .without_credential()
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })?;

        let response: AuthResponse = self.gateway.call(&request).await?;
        self.establish(response, Mutation::Login)
    }

    /// Create an account and sign in to it.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> ApiResult<User> {
        let request = ApiRequest::post("/auth/register")
            .without_credential()
            .json(&RegisterRequest {
                email: email.to_string(),
                password: password.to_string(),
                name: name.to_string(),
            })?;

        let response: AuthResponse = self.gateway.call(&request).await?;
        self.establish(response, Mutation::Register)
    }

    /// End the session.
    ///
    /// Local state is discarded whatever the server answers: the session is
    /// cleared and every cached entry dropped, ending all subscriptions. The
    /// server's verdict on revoking the refresh token is still returned.
    pub async fn logout(&self) -> ApiResult<()> {
        let revoked = match self.store.refresh_token() {
            Some(refresh_token) => self.revoke(refresh_token).await,
            None => Ok(()),
        };

        self.store.clear();
        self.cache.clear();

        match &revoked {
            Ok(()) => info!("Logged out"),
            Err(err) => warn!(code = err.error_code(), error = %err, "Server-side logout failed"),
        }
        revoked
    }

    async fn revoke(&self, refresh_token: String) -> ApiResult<()> {
        let request = ApiRequest::post("/auth/logout")
            .without_credential()
            .json(&RefreshRequest { refresh_token })?;
        self.gateway.call_empty(&request).await
    }

    fn establish(&self, response: AuthResponse, mutation: Mutation) -> ApiResult<User> {
        let session = Session::from_tokens(&response.tokens).map_err(|err| ApiError::Decode {
            message: format!("unusable access token: {}", err),
        })?;

        info!(user_id = %session.identity().user_id, "Session established");
        self.store.set(session);
        self.invalidate_for(&mutation);
        Ok(response.user)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use crate::adapters::{MockHttpClient, MockResponse};
    use crate::api::ControlPlane;
    use crate::auth::jwt::encode_unsigned;
    use crate::cache::CacheKey;
    use crate::config::ClientConfig;
    use crate::error::ApiError;
    use crate::traits::Method;

    const BASE: &str = "http://cp.test/api/v1";

    fn token(user_id: &str) -> String {
        encode_unsigned(&json!({
            "user_id": user_id,
            "email": "ada@example.com",
            "exp": chrono::Utc::now().timestamp() + 900,
        }))
    }

    fn auth_body(access: &str, refresh: &str) -> serde_json::Value {
        json!({
            "user": {
                "id": "u-1",
                "email": "ada@example.com",
                "name": "Ada",
                "role": "user",
                "is_active": true,
                "created_at": "2026-01-01T00:00:00Z",
                "updated_at": "2026-01-01T00:00:00Z"
            },
            "tokens": {
                "access_token": access,
                "refresh_token": refresh,
                "expires_in": 900,
                "token_type": "Bearer"
            }
        })
    }

    fn create_client(mock: &Arc<MockHttpClient>) -> ControlPlane {
        ControlPlane::with_http_client(ClientConfig::new().with_base_url(BASE), mock.clone())
    }

    #[tokio::test]
    async fn test_login_establishes_session() {
        let mock = Arc::new(MockHttpClient::new());
        mock.set_response(
            &format!("{}/auth/login", BASE),
            MockResponse::data(auth_body(&token("u-1"), "refresh-1")),
        );
        let client = create_client(&mock);
        let mut events = client.session_events();

        let user = client.login("ada@example.com", "hunter2").await.unwrap();

        assert_eq!(user.id, "u-1");
        assert!(client.is_authenticated());
        assert_eq!(client.session_store().refresh_token().as_deref(), Some("refresh-1"));
        assert!(matches!(
            events.try_recv().unwrap(),
            crate::auth::SessionEvent::Established(identity) if identity.user_id == "u-1"
        ));

        let requests = mock.get_requests();
        assert_eq!(requests[0].method, Method::Post);
        assert!(requests[0].bearer_token().is_none());
        assert!(requests[0].body.as_deref().unwrap().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_login_rejected_leaves_store_empty() {
        let mock = Arc::new(MockHttpClient::new());
        mock.set_response(
            &format!("{}/auth/login", BASE),
            MockResponse::api_error(401, "UNAUTHORIZED", "invalid credentials"),
        );
        let client = create_client(&mock);

        let err = client.login("ada@example.com", "wrong").await.unwrap_err();

        assert!(matches!(err, ApiError::AuthExpired { .. }));
        assert!(!client.is_authenticated());
        assert_eq!(mock.request_count(&format!("{}/auth/refresh", BASE)), 0);
    }

    #[tokio::test]
    async fn test_login_with_garbage_token_is_decode_error() {
        let mock = Arc::new(MockHttpClient::new());
        mock.set_response(
            &format!("{}/auth/login", BASE),
            MockResponse::data(auth_body("not-a-jwt", "refresh-1")),
        );
        let client = create_client(&mock);

        let err = client.login("ada@example.com", "hunter2").await.unwrap_err();

        assert!(matches!(err, ApiError::Decode { .. }));
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_fails() {
        let mock = Arc::new(MockHttpClient::new());
        mock.set_response(
            &format!("{}/auth/login", BASE),
            MockResponse::data(auth_body(&token("u-1"), "refresh-1")),
        );
        mock.set_response(
            &format!("{}/auth/logout", BASE),
            MockResponse::api_error(500, "INTERNAL_ERROR", "boom"),
        );
        let client = create_client(&mock);
        client.login("ada@example.com", "hunter2").await.unwrap();
        client
            .cache()
            .read(CacheKey::teams(), Duration::from_secs(60), || async { Ok(3u32) })
            .await
            .unwrap();
        assert_eq!(client.cache().len(), 1);

        let result = client.logout().await;

        assert!(matches!(result, Err(ApiError::Server { status: 500, .. })));
        assert!(!client.is_authenticated());
        assert!(client.cache().is_empty());

        let logout = mock
            .get_requests()
            .into_iter()
            .find(|r| r.url.ends_with("/auth/logout"))
            .unwrap();
        assert!(logout.body.unwrap().contains("refresh-1"));
    }

    #[tokio::test]
    async fn test_logout_without_session_skips_server() {
        let mock = Arc::new(MockHttpClient::new());
        let client = create_client(&mock);

        client.logout().await.unwrap();

        assert!(mock.get_requests().is_empty());
    }
}
