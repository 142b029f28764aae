//! Fake Google/GitHub token and profile endpoints
//!
//! Behavior is keyed on the authorization code:
//! - `good-code`    -> token for a regular profile
//! - `xss-code`     -> token for a profile whose name is a script tag
//! - `slow-code`    -> answers after the client timeout
//! - `server-error` -> HTTP 500
//! - `denied-code`  -> `access_denied` error body
//! - anything else  -> rejected as an invalid grant

use std::collections::HashMap;
use std::time::Duration;

use axum::{
    Form, Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tokio::net::TcpListener;

pub const CLIENT_SECRET: &str = "test-client-secret";

/// Start the fake provider and return its base URL
pub async fn spawn() -> String {
    let app = Router::new()
        .route("/:provider/token", post(token))
        .route("/google/userinfo", get(google_userinfo))
        .route("/github/user", get(github_user));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

async fn token(
    Path(provider): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let expected_client_id = format!("{provider}-client-id");
    if form.get("client_id") != Some(&expected_client_id)
        || form.get("client_secret").map(String::as_str) != Some(CLIENT_SECRET)
    {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid_client" })))
            .into_response();
    }

    match form.get("code").map(String::as_str) {
        Some("good-code") => Json(json!({ "access_token": "tok-good", "token_type": "bearer" }))
            .into_response(),
        Some("xss-code") => Json(json!({ "access_token": "tok-xss", "token_type": "bearer" }))
            .into_response(),
        Some("slow-code") => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({ "access_token": "tok-good", "token_type": "bearer" })).into_response()
        }
        Some("server-error") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Some("denied-code") => Json(json!({ "error": "access_denied" })).into_response(),
        // GitHub reports a bad code with 200 and an error body; Google with 400
        _ if provider == "github" => {
            Json(json!({ "error": "bad_verification_code" })).into_response()
        }
        _ => (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_grant" }))).into_response(),
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn google_userinfo(headers: HeaderMap) -> Response {
    match bearer(&headers) {
        Some("tok-good") => Json(json!({
            "sub": "1001",
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "picture": "https://example.com/ada.png"
        }))
        .into_response(),
        Some("tok-xss") => Json(json!({
            "sub": "1002",
            "name": "<script>alert(1)</script>"
        }))
        .into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn github_user(headers: HeaderMap) -> Response {
    if headers.get("user-agent").is_none() {
        return StatusCode::FORBIDDEN.into_response();
    }

    match bearer(&headers) {
        Some("tok-good") => Json(json!({
            "login": "octocat",
            "id": 1,
            "name": "The Octocat",
            "avatar_url": "https://avatars.example.com/u/1"
        }))
        .into_response(),
        Some("tok-xss") => Json(json!({
            "login": "<img src=x onerror=alert(1)>",
            "id": 2,
            "name": null,
            "avatar_url": ""
        }))
        .into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}
