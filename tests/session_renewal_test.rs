//! Session lifecycle end to end.
//!
//! Covers:
//! - login, then a 401 on an expired access token, renewal and replay
//! - concurrent 401s sharing a single renewal
//! - a rejected renewal clearing the session for every waiter

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{access_token, envelope, signed_in_client, token_pair, url, user_json};
use podoru::adapters::{MockHttpClient, MockResponse};
use podoru::error::RenewalError;
use podoru::{ApiError, ApiRequest, ClearReason, ClientConfig, ControlPlane, SessionEvent};

fn client_for(server: &MockServer) -> ControlPlane {
    ControlPlane::new(
        ClientConfig::new()
            .with_base_url(format!("{}/api/v1", server.uri()))
            .with_request_timeout(Duration::from_secs(5)),
    )
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

async fn mount_login(server: &MockServer, access: &str, refresh: &str) {
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(serde_json::json!({
            "user": user_json("u-1"),
            "tokens": token_pair(access, refresh),
        }))))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_expired_access_renews_and_replays() {
    let server = MockServer::start().await;
    let stale = access_token("u-1", 900, "stale");
    let fresh = access_token("u-1", 900, "fresh");
    mount_login(&server, &stale, "refresh-1").await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/me"))
        .and(header("Authorization", bearer(&stale).as_str()))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "success": false,
            "error": {"code": "UNAUTHORIZED", "message": "token expired"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/me"))
        .and(header("Authorization", bearer(&fresh).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(user_json("u-1"))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .and(body_json(serde_json::json!({"refresh_token": "refresh-1"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope(token_pair(&fresh, "refresh-2"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut events = client.session_events();
    client.login("u-1@example.com", "hunter2").await.unwrap();

    let me = client.current_user().await.unwrap();

    assert_eq!(me.id, "u-1");
    let session = client.session_store().get().unwrap();
    assert_eq!(session.access_token(), fresh);
    assert_eq!(session.refresh_token(), "refresh-2");
    assert!(matches!(events.recv().await.unwrap(), SessionEvent::Established(_)));
    assert!(matches!(events.recv().await.unwrap(), SessionEvent::Renewed(_)));
}

#[tokio::test]
async fn test_concurrent_401s_share_one_renewal() {
    let server = MockServer::start().await;
    let stale = access_token("u-1", 900, "stale");
    let fresh = access_token("u-1", 900, "fresh");
    mount_login(&server, &stale, "refresh-1").await;

    Mock::given(method("GET"))
        .and(header("Authorization", bearer(&stale).as_str()))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("Authorization", bearer(&fresh).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(serde_json::json!([]))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(token_pair(&fresh, "refresh-2")))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.login("u-1@example.com", "hunter2").await.unwrap();

    let gateway = client.gateway();
    let requests: Vec<ApiRequest> = (0..8)
        .map(|i| ApiRequest::get(format!("/projects/p-{}/services", i)))
        .collect();
    let results = join_all(requests.iter().map(|r| gateway.call::<Vec<Value>>(r))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(gateway.renewal().renewals_started(), 1);

    let received = server.received_requests().await.unwrap();
    let replays = received
        .iter()
        .filter(|r| {
            r.headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                == Some(bearer(&fresh).as_str())
        })
        .count();
    assert_eq!(replays, 8);
}

/// Scripted transport under paused time: every request takes exactly 100ms
/// of virtual time, so all five 401s arrive together while the refresh is
/// still outstanding.
#[tokio::test(start_paused = true)]
async fn test_rejected_renewal_fails_every_waiter_once() {
    let mock = Arc::new(MockHttpClient::new());
    mock.set_default_response(MockResponse::api_error(401, "UNAUTHORIZED", "token expired"));
    mock.set_response(
        &url("/auth/refresh"),
        MockResponse::api_error(401, "UNAUTHORIZED", "Invalid refresh token"),
    );
    mock.set_delay(Duration::from_millis(100));
    let client = signed_in_client(&mock);
    let mut events = client.session_events();

    let gateway = client.gateway();
    let requests: Vec<ApiRequest> = (0..5)
        .map(|i| ApiRequest::get(format!("/services/s-{}", i)))
        .collect();
    let started = tokio::time::Instant::now();
    let results = join_all(requests.iter().map(|r| gateway.call_empty(r))).await;

    // One round trip for the 401s and one for the shared refresh.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(200) && elapsed < Duration::from_millis(300));
    let expected = ApiError::SessionExpired(RenewalError::Rejected {
        status: 401,
        message: "Invalid refresh token".to_string(),
    });
    for result in results {
        assert_eq!(result.unwrap_err(), expected);
    }
    assert_eq!(mock.request_count(&url("/auth/refresh")), 1);
    assert!(!client.is_authenticated());
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::Cleared {
            reason: ClearReason::RenewalFailed
        }
    ));

    // Without a session nothing is renewed; the 401 surfaces directly.
    let err = gateway
        .call_empty(&ApiRequest::get("/services/s-0"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::AuthExpired { .. }));
    assert_eq!(gateway.renewal().renewals_started(), 1);
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let server = MockServer::start().await;
    let access = access_token("u-1", 900, "a");
    mount_login(&server, &access, "refresh-1").await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/logout"))
        .and(body_json(serde_json::json!({"refresh_token": "refresh-1"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.login("u-1@example.com", "hunter2").await.unwrap();

    client.logout().await.unwrap();

    assert!(!client.is_authenticated());
    assert!(client.cache().is_empty());
}
