//! The transport seam under the gateway and the renewal coordinator.
//!
//! A transport turns one [`HttpRequest`] into one [`Response`]. Any status
//! code is a response; `Err` is reserved for exchanges that produced none.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub type Headers = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Whether requests with this method carry a body.
    pub fn has_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    /// JSON payload; `None` for GET and DELETE
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    /// Attach a JSON payload and its content type.
    pub fn json_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self.header("Content-Type", "application/json")
    }

    /// The token presented in the `Authorization: Bearer` header, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get("Authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, headers: Headers, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A response carrying `value` serialized as JSON.
    pub fn json_body(status: u16, value: &serde_json::Value) -> Self {
        let headers = Headers::from([("content-type".to_string(), "application/json".to_string())]);
        Self::new(status, headers, Bytes::from(value.to_string()))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// No HTTP response was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("I/O error: {0}")]
    Io(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("transport error: {0}")]
    Other(String),
}

/// Sends requests to the control plane.
///
/// Implementations must not interpret status codes: a 401 or a 500 is a
/// successful exchange here and is classified by the gateway.
///
/// # Example
///
/// ```ignore
/// use podoru::traits::{HttpClient, HttpRequest, Method};
///
/// let response = client
///     .send(HttpRequest::new(Method::Get, "http://localhost:8080/health"))
///     .await?;
/// assert!(response.is_success());
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<Response, HttpError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = HttpRequest::new(Method::Post, "http://cp.test/api/v1/auth/refresh")
            .header("Authorization", "Bearer abc")
            .json_body(r#"{"refresh_token":"r1"}"#);

        assert_eq!(request.bearer_token(), Some("abc"));
        assert_eq!(
            request.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert!(request.body.as_deref().unwrap().contains("r1"));
    }

    #[test]
    fn test_bearer_token_requires_scheme() {
        let request = HttpRequest::new(Method::Get, "http://cp.test/").header("Authorization", "Basic Zm9v");
        assert!(request.bearer_token().is_none());
    }

    #[test]
    fn test_json_response() {
        let response = Response::json_body(201, &serde_json::json!({"success": true}));
        assert!(response.is_success());
        assert_eq!(
            response.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["success"], true);
    }

    #[test]
    fn test_success_range() {
        for status in [200, 201, 204] {
            assert!(Response::new(status, Headers::new(), Bytes::new()).is_success());
        }
        for status in [301, 401, 422, 500] {
            assert!(!Response::new(status, Headers::new(), Bytes::new()).is_success());
        }
    }

    #[test]
    fn test_method_body() {
        assert!(Method::Post.has_body());
        assert!(Method::Put.has_body());
        assert!(!Method::Get.has_body());
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }
}
