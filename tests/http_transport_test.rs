//! HTTP transport integration tests
//!
//! Drives the axum router from `src/server/http.rs` in-process with
//! `tower::ServiceExt::oneshot`, with the identity provider and GitLab
//! mocked by wiremock:
//!
//! - `/health` reports the application name and environment.
//! - Without user OAuth, MCP requests use the static token.
//! - With user OAuth, MCP requests without a session get 401 and a
//!   `Location` pointing at `/oauth/authorize`.
//! - The full login: authorize redirect, callback, session cookie, then an
//!   authenticated tool call with the user's bearer token.
//! - Callback failures: provider error, missing parameters, unknown state.
//! - Logout clears the cookie and the session.
//! - The optional shared bearer token guards the MCP route.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kepler_mcp_gitlab::config::Config;
use kepler_mcp_gitlab::security::SecretString;
use kepler_mcp_gitlab::server::http::{router, AppState, HttpSettings};
use kepler_mcp_gitlab::server::ServerComponents;

use common::{mount_token_endpoint, static_token_config, user_auth_config};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn app(config: &Config) -> Router {
    let components = ServerComponents::from_config(config).unwrap();
    router(AppState::new(components, HttpSettings::from_config(config)))
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn mcp_post(body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn location(response: &Response) -> String {
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

fn current_user_call() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": {"name": "get_current_user", "arguments": {}}
    })
}

/// Runs authorize and callback against `app`, returning the `Set-Cookie`
/// header of the callback response.
async fn login(app: &Router) -> String {
    let authorize = app.clone().oneshot(get("/oauth/authorize")).await.unwrap();
    assert_eq!(authorize.status(), StatusCode::FOUND);

    let redirect = Url::parse(&location(&authorize)).unwrap();
    let state = redirect
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .unwrap();

    let callback = app
        .clone()
        .oneshot(get(&format!("/oauth/callback?code=CODE1&state={state}")))
        .await
        .unwrap();
    assert_eq!(callback.status(), StatusCode::FOUND);
    assert_eq!(location(&callback), "/mcp");

    callback.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .to_string()
}

/// `name=value` from a `Set-Cookie` header.
fn cookie_pair(set_cookie: &str) -> &str {
    set_cookie.split(';').next().unwrap()
}

async fn mount_identity_provider(server: &MockServer) {
    mount_token_endpoint(server, "AT1", "RT1").await;
    Mock::given(method("GET"))
        .and(path("/oauth/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "username": "dev"
        })))
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// Health and static token
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_reports_app_and_environment() {
    let app = app(&Config::default());

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["app_name"], "Kepler MCP GitLab");
    assert_eq!(body["environment"], "local");
}

#[tokio::test]
async fn test_mcp_request_without_user_auth_uses_static_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/user"))
        .and(wiremock::matchers::header("PRIVATE-TOKEN", "glpat-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "bot"})))
        .expect(1)
        .mount(&server)
        .await;

    let app = app(&static_token_config(&server.uri()));
    let response = app.oneshot(mcp_post(current_user_call(), None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], 1);
    assert_eq!(body["result"]["isError"], false);
    assert!(body["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("bot"));
}

#[tokio::test]
async fn test_notification_is_accepted_without_body() {
    let app = app(&Config::default());

    let response = app
        .oneshot(mcp_post(
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_oauth_routes_absent_without_user_auth() {
    let app = app(&Config::default());

    let response = app.oneshot(get("/oauth/authorize")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_shared_bearer_token_guards_mcp_route() {
    let mut config = Config::default();
    config.server.auth_token = Some(SecretString::new("shared-secret"));
    let app = app(&config);

    let ping = json!({"jsonrpc": "2.0", "id": 3, "method": "ping"});

    let rejected = app.clone().oneshot(mcp_post(ping.clone(), None)).await.unwrap();
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);

    let mut request = mcp_post(ping, None);
    request.headers_mut().insert(
        header::AUTHORIZATION,
        "Bearer shared-secret".parse().unwrap(),
    );
    let accepted = app.oneshot(request).await.unwrap();
    assert_eq!(accepted.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// User OAuth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_mcp_request_without_session_requires_login() {
    let server = MockServer::start().await;
    let app = app(&user_auth_config(&server.uri(), &server.uri()));

    let response = app
        .clone()
        .oneshot(mcp_post(current_user_call(), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(location(&response), "/oauth/authorize");
    let body = body_json(response).await;
    assert_eq!(body["error"], "authentication_required");

    let stale = app
        .oneshot(mcp_post(current_user_call(), Some("session_id=unknown")))
        .await
        .unwrap();
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_authorize_redirects_to_provider_with_pkce() {
    let server = MockServer::start().await;
    let app = app(&user_auth_config(&server.uri(), &server.uri()));

    let response = app.oneshot(get("/oauth/authorize")).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let target = location(&response);
    assert!(target.starts_with(&format!("{}/oauth/authorize?", server.uri())));
    assert!(target.contains("code_challenge_method=S256"));
    assert!(target.contains("client_id=kepler-client"));
    assert!(target.contains("state="));
}

#[tokio::test]
async fn test_full_login_then_authenticated_tool_call() {
    let server = MockServer::start().await;
    mount_identity_provider(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v4/user"))
        .and(wiremock::matchers::header("authorization", "Bearer AT1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "dev"})))
        .expect(1)
        .mount(&server)
        .await;

    let app = app(&user_auth_config(&server.uri(), &server.uri()));
    let set_cookie = login(&app).await;

    assert!(set_cookie.starts_with("session_id="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(!set_cookie.contains("Secure"));

    let response = app
        .oneshot(mcp_post(current_user_call(), Some(cookie_pair(&set_cookie))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["result"]["isError"], false);
    assert!(body["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("dev"));
}

#[tokio::test]
async fn test_callback_sends_pkce_verifier_to_token_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("code_verifier="))
        .and(body_string_contains("code=CODE1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "AT1",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sub": "abc"})))
        .mount(&server)
        .await;

    let app = app(&user_auth_config(&server.uri(), &server.uri()));
    login(&app).await;
}

#[tokio::test]
async fn test_callback_state_is_single_use() {
    let server = MockServer::start().await;
    mount_identity_provider(&server).await;
    let app = app(&user_auth_config(&server.uri(), &server.uri()));

    let authorize = app.clone().oneshot(get("/oauth/authorize")).await.unwrap();
    let redirect = Url::parse(&location(&authorize)).unwrap();
    let state = redirect
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .unwrap();
    let callback = format!("/oauth/callback?code=CODE1&state={state}");

    let first = app.clone().oneshot(get(&callback)).await.unwrap();
    assert_eq!(first.status(), StatusCode::FOUND);

    let replay = app.oneshot(get(&callback)).await.unwrap();
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(replay).await["error"], "Invalid or expired state");
}

#[tokio::test]
async fn test_callback_error_cases() {
    let server = MockServer::start().await;
    let app = app(&user_auth_config(&server.uri(), &server.uri()));

    let denied = app
        .clone()
        .oneshot(get(
            "/oauth/callback?error=access_denied&error_description=User%20denied",
        ))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::BAD_REQUEST);
    let body = body_json(denied).await;
    assert_eq!(body["error"], "access_denied");
    assert_eq!(body["description"], "User denied");

    let missing = app
        .clone()
        .oneshot(get("/oauth/callback?code=CODE1"))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(missing).await["error"],
        "Missing code or state parameter"
    );

    let unknown = app
        .oneshot(get("/oauth/callback?code=CODE1&state=never-issued"))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(unknown).await["error"], "Invalid or expired state");
}

#[tokio::test]
async fn test_failed_token_exchange_is_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;
    let app = app(&user_auth_config(&server.uri(), &server.uri()));

    let authorize = app.clone().oneshot(get("/oauth/authorize")).await.unwrap();
    let redirect = Url::parse(&location(&authorize)).unwrap();
    let state = redirect
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .unwrap();

    let response = app
        .oneshot(get(&format!("/oauth/callback?code=bad&state={state}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "Authentication failed");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let server = MockServer::start().await;
    mount_identity_provider(&server).await;
    let app = app(&user_auth_config(&server.uri(), &server.uri()));

    let set_cookie = login(&app).await;
    let cookie = cookie_pair(&set_cookie).to_string();

    let logout = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/oauth/logout")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(logout.status(), StatusCode::OK);
    let cleared = logout.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));
    assert_eq!(body_json(logout).await["success"], true);

    let after = app
        .oneshot(mcp_post(current_user_call(), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}
