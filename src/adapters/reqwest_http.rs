//! Production transport over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::traits::{Headers, HttpClient, HttpError, HttpRequest, Method, Response};

/// [`HttpClient`] backed by a shared `reqwest::Client` (rustls, connection
/// pooling).
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests taking longer than `timeout` fail with
    /// [`HttpError::Timeout`].
    pub fn with_timeout(timeout: Duration) -> Self {
        match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => Self { client },
            Err(err) => {
                warn!(error = %err, "Falling back to an HTTP client without timeout");
                Self::default()
            }
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn classify(err: reqwest::Error) -> HttpError {
    let message = err.to_string();
    if err.is_timeout() {
        HttpError::Timeout(message)
    } else if err.is_connect() {
        HttpError::ConnectionFailed(message)
    } else if err.is_builder() {
        HttpError::InvalidUrl(message)
    } else if err.is_body() || err.is_decode() {
        HttpError::Io(message)
    } else {
        HttpError::Other(message)
    }
}

fn collect_headers(map: &reqwest::header::HeaderMap) -> Headers {
    map.iter()
        .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
        .collect()
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<Response, HttpError> {
        let mut builder = self.client.request(method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response.bytes().await.map_err(classify)?;

        Ok(Response::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_headers_skips_non_utf8() {
        let mut map = reqwest::header::HeaderMap::new();
        map.insert(reqwest::header::CONTENT_TYPE, "application/json".parse().unwrap());
        map.insert(
            "x-binary",
            reqwest::header::HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap(),
        );

        let headers = collect_headers(&map);

        assert_eq!(headers.get("content-type").map(String::as_str), Some("application/json"));
        assert!(!headers.contains_key("x-binary"));
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(method(Method::Put), reqwest::Method::PUT);
        assert_eq!(method(Method::Delete), reqwest::Method::DELETE);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let client = ReqwestHttpClient::with_timeout(Duration::from_secs(2));
        let result = client
            .send(HttpRequest::new(Method::Get, "http://127.0.0.1:59999/api/v1/teams"))
            .await;

        assert!(matches!(
            result,
            Err(HttpError::ConnectionFailed(_)) | Err(HttpError::Other(_))
        ));
    }
}
