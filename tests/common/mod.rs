//! Common fixtures for integration tests.
//!
//! Builds unsigned access tokens the client can decode and JSON payloads in
//! the shape the control plane returns.

#![allow(dead_code)]

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{json, Value};

use podoru::adapters::MockHttpClient;
use podoru::{ClientConfig, ControlPlane, Session};

pub const TEST_BASE: &str = "http://cp.test/api/v1";

/// An unsigned JWT for `user_id` expiring `ttl_secs` from now.
///
/// `tag` makes otherwise identical tokens distinct.
pub fn access_token(user_id: &str, ttl_secs: i64, tag: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = json!({
        "user_id": user_id,
        "email": format!("{}@example.com", user_id),
        "iat": chrono::Utc::now().timestamp(),
        "exp": chrono::Utc::now().timestamp() + ttl_secs,
        "jti": tag,
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.test-signature", header, payload)
}

/// `{success: true, data}`.
pub fn envelope(data: Value) -> Value {
    json!({ "success": true, "data": data })
}

pub fn token_pair(access: &str, refresh: &str) -> Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": 900,
        "token_type": "Bearer"
    })
}

pub fn user_json(id: &str) -> Value {
    json!({
        "id": id,
        "email": format!("{}@example.com", id),
        "name": "Test User",
        "role": "user",
        "is_active": true,
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z"
    })
}

pub fn team_json(id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Team {}", id),
        "slug": id,
        "owner_id": "u-1",
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z"
    })
}

pub fn team_with_role_json(id: &str, role: &str) -> Value {
    let mut team = team_json(id);
    team["role"] = json!(role);
    team
}

pub fn project_json(id: &str, team_id: &str) -> Value {
    json!({
        "id": id,
        "team_id": team_id,
        "name": format!("Project {}", id),
        "slug": id,
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z"
    })
}

pub fn service_json(id: &str, project_id: &str, status: &str, replicas: u32) -> Value {
    json!({
        "id": id,
        "project_id": project_id,
        "name": format!("svc-{}", id),
        "slug": id,
        "deploy_type": "image",
        "image": "nginx:1.27",
        "replicas": replicas,
        "status": status,
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z"
    })
}

/// A client over `mock` with a valid session already in place.
pub fn signed_in_client(mock: &Arc<MockHttpClient>) -> ControlPlane {
    let client =
        ControlPlane::with_http_client(ClientConfig::new().with_base_url(TEST_BASE), mock.clone());
    let session = Session::new(access_token("u-1", 900, "initial"), "refresh-initial")
        .expect("fixture token decodes");
    client.session_store().set(session);
    client
}

pub fn url(path: &str) -> String {
    format!("{}{}", TEST_BASE, path)
}
