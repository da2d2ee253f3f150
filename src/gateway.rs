//! Request gateway: every control-plane call goes through here.
//!
//! The gateway attaches the current access token, classifies responses
//! into [`ApiError`], and absorbs a 401 by renewing the session and
//! replaying the request once.

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::auth::{RenewalCoordinator, SessionStore};
use crate::error::{ApiError, ApiResult};
use crate::models::ApiResponse;
use crate::traits::{HttpClient, HttpRequest, Method, Response};

/// Correlates a call with the server's access log.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// One outbound call, described relative to the API root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<String>,
    with_credential: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            with_credential: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Append a query parameter. Values are percent-encoded.
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Serialize `body` as the JSON payload.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> ApiResult<Self> {
        self.body = Some(serde_json::to_string(body)?);
        Ok(self)
    }

    /// Send without an `Authorization` header (login, register).
    pub fn without_credential(mut self) -> Self {
        self.with_credential = false;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Absolute URL under `base_url`.
    pub fn url(&self, base_url: &str) -> String {
        let mut url = format!("{}{}", base_url.trim_end_matches('/'), self.path);
        for (i, (key, value)) in self.query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(&urlencoding::encode(key));
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }
}

/// Sends requests with the session's credential and recovers from expiry.
pub struct RequestGateway {
    http: Arc<dyn HttpClient>,
    store: Arc<SessionStore>,
    renewal: Arc<RenewalCoordinator>,
    base_url: String,
}

impl RequestGateway {
    pub fn new(
        http: Arc<dyn HttpClient>,
        store: Arc<SessionStore>,
        renewal: Arc<RenewalCoordinator>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            store,
            renewal,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session_store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn renewal(&self) -> &Arc<RenewalCoordinator> {
        &self.renewal
    }

    /// Send `request` and return the successful response.
    ///
    /// A 401 to a request that carried a credential triggers one renewal
    /// and one replay. A 401 to the replay, or to a request sent without a
    /// credential, is returned as [`ApiError::AuthExpired`]. A failed
    /// renewal is returned as [`ApiError::SessionExpired`].
    pub async fn execute(&self, request: &ApiRequest) -> ApiResult<Response> {
        let mut credential = if request.with_credential {
            self.store.access_token()
        } else {
            None
        };
        let mut retried = false;

        loop {
            let response = self.send_once(request, credential.as_deref()).await?;

            if response.status == 401 {
                if let (Some(used), false) = (credential.as_deref(), retried) {
                    debug!(path = %request.path, "Credential rejected; renewing before replay");
                    retried = true;
                    let session = self.renewal.renew_stale(used).await?;
                    credential = Some(session.access_token().to_string());
                    continue;
                }
            }

            if !response.is_success() {
                let err = ApiError::from_response(response.status, &response.body);
                debug!(
                    method = %request.method,
                    path = %request.path,
                    code = err.error_code(),
                    "Request failed"
                );
                return Err(err);
            }

            return Ok(response);
        }
    }

    /// Send `request` and decode the envelope's `data` as `T`.
    pub async fn call<T: DeserializeOwned>(&self, request: &ApiRequest) -> ApiResult<T> {
        let response = self.execute(request).await?;
        let envelope: ApiResponse<T> = serde_json::from_slice(&response.body)?;

        if !envelope.success {
            return Err(ApiError::from_response(response.status, &response.body));
        }
        envelope.data.ok_or_else(|| ApiError::Decode {
            message: format!("{} {}: response carried no data", request.method, request.path),
        })
    }

    /// Send `request` and ignore any payload.
    pub async fn call_empty(&self, request: &ApiRequest) -> ApiResult<()> {
        self.execute(request).await.map(|_| ())
    }

    async fn send_once(&self, request: &ApiRequest, credential: Option<&str>) -> ApiResult<Response> {
        let url = request.url(&self.base_url);
        let request_id = Uuid::new_v4().to_string();
        let mut outbound = HttpRequest::new(request.method, url)
            .header("Accept", "application/json")
            .header(REQUEST_ID_HEADER, request_id.clone());
        if let Some(body) = &request.body {
            outbound = outbound.json_body(body.clone());
        }
        if let Some(token) = credential {
            outbound = outbound.header("Authorization", format!("Bearer {}", token));
        }

        let started = Instant::now();
        let result = self.http.send(outbound).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(response) => debug!(
                %request_id,
                method = %request.method,
                path = %request.path,
                status = response.status,
                elapsed_ms,
                authenticated = credential.is_some(),
                "Request completed"
            ),
            Err(err) => debug!(
                %request_id,
                method = %request.method,
                path = %request.path,
                error = %err,
                elapsed_ms,
                "Request got no response"
            ),
        }

        Ok(result?)
    }
}

impl std::fmt::Debug for RequestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGateway")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.store.is_authenticated())
            .finish()
    }
}
