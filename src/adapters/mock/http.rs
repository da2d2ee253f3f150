//! Scriptable in-memory transport.
//!
//! Routes answer with a fixed response, a one-shot queue, or a handler that
//! looks at the request (useful for "401 unless this token is presented").

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::traits::{HttpClient, HttpError, HttpRequest, Method, Response};

/// Every request the mock saw, in arrival order.
pub type RecordedRequest = HttpRequest;

#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Any status code, including errors
    Success(Response),
    /// No response at all
    Error(HttpError),
}

impl MockResponse {
    pub fn json(status: u16, value: Value) -> Self {
        MockResponse::Success(Response::json_body(status, &value))
    }

    /// `200 {success: true, data}`
    pub fn data(data: Value) -> Self {
        Self::json(200, json!({ "success": true, "data": data }))
    }

    /// `{success: false, error: {code, message}}`
    pub fn api_error(status: u16, code: &str, message: &str) -> Self {
        Self::json(
            status,
            json!({ "success": false, "error": { "code": code, "message": message } }),
        )
    }
}

type Handler = Arc<dyn Fn(&HttpRequest) -> MockResponse + Send + Sync>;

enum Answer {
    Fixed(MockResponse),
    Queue(VecDeque<MockResponse>),
    Handler(Handler),
}

impl Answer {
    /// `None` once a queue has drained.
    fn next(&mut self, request: &HttpRequest) -> Option<MockResponse> {
        match self {
            Answer::Fixed(response) => Some(response.clone()),
            Answer::Queue(queue) => queue.pop_front(),
            Answer::Handler(handler) => Some(handler(request)),
        }
    }
}

struct Route {
    method: Option<Method>,
    url: String,
    answer: Answer,
}

impl Route {
    fn accepts(&self, request: &HttpRequest, exact: bool) -> bool {
        let method_ok = self.method.map_or(true, |method| method == request.method);
        let url_ok = if exact {
            request.url == self.url
        } else {
            request.url.starts_with(&self.url)
        };
        method_ok && url_ok
    }
}

#[derive(Default)]
struct State {
    routes: Vec<Route>,
    fallback: Option<MockResponse>,
    requests: Vec<HttpRequest>,
    delay: Option<Duration>,
}

/// In-memory [`HttpClient`] for tests.
///
/// Exact URL routes are tried before prefix routes, and the newest route
/// wins within each pass. Drained queues fall through to older routes.
///
/// ```ignore
/// let mock = MockHttpClient::new();
/// mock.set_response(url, MockResponse::data(json!([])));
/// mock.push_response(url, MockResponse::api_error(401, "UNAUTHORIZED", "expired"));
/// // 401 once, then the empty listing forever.
/// ```
#[derive(Clone, Default)]
pub struct MockHttpClient {
    state: Arc<Mutex<State>>,
}

impl std::fmt::Debug for MockHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("MockHttpClient")
            .field("routes", &state.routes.len())
            .field("requests", &state.requests.len())
            .finish()
    }
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn route(&self, method: Option<Method>, url: &str, answer: Answer) {
        self.state.lock().unwrap().routes.push(Route {
            method,
            url: url.to_string(),
            answer,
        });
    }

    pub fn set_response(&self, url: &str, response: MockResponse) {
        self.route(None, url, Answer::Fixed(response));
    }

    pub fn set_method_response(&self, method: Method, url: &str, response: MockResponse) {
        self.route(Some(method), url, Answer::Fixed(response));
    }

    /// Append a one-shot response to the newest queue for `url`, creating
    /// the queue if there is none.
    pub fn push_response(&self, url: &str, response: MockResponse) {
        let mut state = self.state.lock().unwrap();
        let existing = state.routes.iter().rposition(|route| {
            route.method.is_none() && route.url == url && matches!(route.answer, Answer::Queue(_))
        });
        if let Some(index) = existing {
            if let Answer::Queue(queue) = &mut state.routes[index].answer {
                queue.push_back(response);
                return;
            }
        }
        state.routes.push(Route {
            method: None,
            url: url.to_string(),
            answer: Answer::Queue(VecDeque::from([response])),
        });
    }

    pub fn set_handler<F>(&self, url: &str, handler: F)
    where
        F: Fn(&HttpRequest) -> MockResponse + Send + Sync + 'static,
    {
        self.route(None, url, Answer::Handler(Arc::new(handler)));
    }

    /// Answer for requests no route accepts.
    pub fn set_default_response(&self, response: MockResponse) {
        self.state.lock().unwrap().fallback = Some(response);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.requests.iter().filter(|request| request.url == url).count()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }

    pub fn clear_responses(&self) {
        self.state.lock().unwrap().routes.clear();
    }

    fn answer(&self, request: &HttpRequest) -> Option<MockResponse> {
        let mut state = self.state.lock().unwrap();
        for exact in [true, false] {
            let answered = state
                .routes
                .iter_mut()
                .rev()
                .filter(|route| route.accepts(request, exact))
                .find_map(|route| route.answer.next(request));
            if answered.is_some() {
                return answered;
            }
        }
        state.fallback.clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<Response, HttpError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.requests.push(request.clone());
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.answer(&request) {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            None => Err(HttpError::Other(format!("unrouted {} {}", request.method, request.url))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://cp.test/api/v1";

    fn get(path: &str) -> HttpRequest {
        HttpRequest::new(Method::Get, format!("{}{}", BASE, path))
    }

    #[tokio::test]
    async fn test_fixed_route_records_request() {
        let mock = MockHttpClient::new();
        mock.set_response(&format!("{}/teams", BASE), MockResponse::data(json!([])));

        let response = mock.send(get("/teams")).await.unwrap();

        assert_eq!(response.status, 200);
        let requests = mock.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(requests[0].url, format!("{}/teams", BASE));
    }

    #[tokio::test]
    async fn test_queue_drains_into_older_fixed_route() {
        let mock = MockHttpClient::new();
        let teams = format!("{}/teams", BASE);
        mock.set_response(&teams, MockResponse::data(json!([])));
        mock.push_response(&teams, MockResponse::api_error(401, "UNAUTHORIZED", "expired"));
        mock.push_response(&teams, MockResponse::api_error(503, "UNAVAILABLE", "busy"));

        let mut statuses = Vec::new();
        for _ in 0..4 {
            statuses.push(mock.send(get("/teams")).await.unwrap().status);
        }

        assert_eq!(statuses, vec![401, 503, 200, 200]);
    }

    #[tokio::test]
    async fn test_handler_inspects_bearer() {
        let mock = MockHttpClient::new();
        mock.set_handler(&format!("{}/users/me", BASE), |request| match request.bearer_token() {
            Some("good") => MockResponse::data(json!({})),
            _ => MockResponse::api_error(401, "UNAUTHORIZED", "bad token"),
        });

        let ok = mock
            .send(get("/users/me").header("Authorization", "Bearer good"))
            .await
            .unwrap();
        let denied = mock.send(get("/users/me")).await.unwrap();

        assert_eq!(ok.status, 200);
        assert_eq!(denied.status, 401);
    }

    #[tokio::test]
    async fn test_exact_method_route_beats_prefix() {
        let mock = MockHttpClient::new();
        let service = format!("{}/services/s-1", BASE);
        mock.set_response(&format!("{}/services/", BASE), MockResponse::data(json!(1)));
        mock.set_method_response(Method::Delete, &service, MockResponse::json(204, json!(null)));

        let read = mock.send(get("/services/s-1")).await.unwrap();
        let delete = mock
            .send(HttpRequest::new(Method::Delete, service.clone()))
            .await
            .unwrap();

        assert_eq!(read.status, 200);
        assert_eq!(delete.status, 204);
        assert_eq!(mock.request_count(&service), 2);
    }

    #[tokio::test]
    async fn test_unrouted_and_transport_failures() {
        let mock = MockHttpClient::new();
        assert!(matches!(mock.send(get("/nothing")).await, Err(HttpError::Other(_))));

        mock.set_default_response(MockResponse::Error(HttpError::ConnectionFailed(
            "refused".to_string(),
        )));
        let result = mock
            .send(HttpRequest::new(Method::Post, format!("{}/auth/login", BASE)).json_body("{}"))
            .await;
        assert_eq!(result.unwrap_err(), HttpError::ConnectionFailed("refused".to_string()));
    }
}
