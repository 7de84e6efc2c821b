//! OAuth flow integration tests using wiremock
//!
//! Verifies `src/oauth/flow.rs` and `src/oauth/client_credentials.rs`:
//!
//! - The authorization URL carries the state and an S256 PKCE challenge.
//! - The code exchange sends the PKCE verifier and yields a fresh token set.
//! - A refresh response without a refresh token keeps the old one.
//! - `refresh_if_needed` falls back to the stored token when the provider is
//!   unreachable and the token is still valid.
//! - Client credentials tokens are cached between calls.
//! - Token endpoint errors surface as OAuth errors.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kepler_mcp_gitlab::error::KeplerError;
use kepler_mcp_gitlab::oauth::client_credentials::{ClientCredentialsConfig, ClientCredentialsFlow};
use kepler_mcp_gitlab::oauth::flow::{AuthorizationCodeFlow, TokenRefresher};
use kepler_mcp_gitlab::oauth::pkce::generate_code_challenge;
use kepler_mcp_gitlab::oauth::token::TokenSet;
use kepler_mcp_gitlab::oauth::token_store::{InMemoryTokenStore, TokenStore};
use kepler_mcp_gitlab::security::SecretString;

use common::auth_code_config;

// ---------------------------------------------------------------------------
// Authorization code flow
// ---------------------------------------------------------------------------

#[test]
fn test_authorization_url_contains_state_and_challenge() {
    let flow = AuthorizationCodeFlow::new(auth_code_config("https://idp.example.com"));

    let (url, pkce) = flow.create_authorization_url("state-1").unwrap();

    assert!(url.starts_with("https://idp.example.com/oauth/authorize?"));
    assert!(url.contains("response_type=code"));
    assert!(url.contains("client_id=kepler-client"));
    assert!(url.contains("state=state-1"));
    assert!(url.contains("code_challenge_method=S256"));
    assert!(url.contains(&format!("code_challenge={}", pkce.code_challenge)));
    assert_eq!(pkce.code_challenge, generate_code_challenge(&pkce.code_verifier));
}

#[test]
fn test_each_authorization_url_gets_a_new_verifier() {
    let flow = AuthorizationCodeFlow::new(auth_code_config("https://idp.example.com"));

    let (_, first) = flow.create_authorization_url("a").unwrap();
    let (_, second) = flow.create_authorization_url("b").unwrap();

    assert_ne!(first.code_verifier, second.code_verifier);
}

#[tokio::test]
async fn test_exchange_code_sends_verifier_and_parses_tokens() {
    let server = MockServer::start().await;
    let flow = AuthorizationCodeFlow::new(auth_code_config(&server.uri()));
    let (_, pkce) = flow.create_authorization_url("state-1").unwrap();

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=CODE1"))
        .and(body_string_contains(format!(
            "code_verifier={}",
            pkce.code_verifier
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "AT1",
            "refresh_token": "RT1",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = flow
        .exchange_code_for_tokens("CODE1", &pkce.code_verifier)
        .await
        .unwrap();

    assert_eq!(tokens.access_token, "AT1");
    assert_eq!(tokens.refresh_token.as_deref(), Some("RT1"));
    assert!(!tokens.is_expired());
    assert!(!tokens.needs_refresh());
    assert_eq!(tokens.authorization_value(), "Bearer AT1");
}

#[tokio::test]
async fn test_exchange_code_error_status_is_oauth_error() {
    let server = MockServer::start().await;
    let flow = AuthorizationCodeFlow::new(auth_code_config(&server.uri()));

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant"
        })))
        .mount(&server)
        .await;

    let err = flow
        .exchange_code_for_tokens("bad-code", "verifier")
        .await
        .unwrap_err();

    assert!(matches!(err, KeplerError::OAuth(_)));
    assert!(err.to_string().contains("invalid_grant"));
}

#[tokio::test]
async fn test_refresh_keeps_refresh_token_when_not_rotated() {
    let server = MockServer::start().await;
    let flow = AuthorizationCodeFlow::new(auth_code_config(&server.uri()));

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=RT1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "AT2",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = flow.refresh_access_token("RT1").await.unwrap();

    assert_eq!(tokens.access_token, "AT2");
    assert_eq!(tokens.refresh_token.as_deref(), Some("RT1"));
    assert_eq!(tokens.token_type, "Bearer");
}

#[tokio::test]
async fn test_userinfo_is_fetched_with_bearer_token() {
    let server = MockServer::start().await;
    let flow = AuthorizationCodeFlow::new(auth_code_config(&server.uri()));

    Mock::given(method("GET"))
        .and(path("/oauth/userinfo"))
        .and(header("authorization", "Bearer AT1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "42",
            "email": "dev@example.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let info = flow.get_user_info("AT1").await.unwrap();
    assert_eq!(info["sub"], "42");
}

#[tokio::test]
async fn test_userinfo_without_endpoint_is_an_error() {
    let mut config = auth_code_config("https://idp.example.com");
    config.userinfo_url = None;
    let flow = AuthorizationCodeFlow::new(config);

    let err = flow.get_user_info("AT1").await.unwrap_err();
    assert!(matches!(err, KeplerError::OAuth(_)));
}

// ---------------------------------------------------------------------------
// refresh_if_needed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_refresh_if_needed_stores_refreshed_tokens() {
    let server = MockServer::start().await;
    common::mount_token_endpoint(&server, "AT2", "RT2").await;
    let flow = AuthorizationCodeFlow::new(auth_code_config(&server.uri()));

    let store = InMemoryTokenStore::new();
    let mut stale = TokenSet::new("AT1", Utc::now() + Duration::seconds(60));
    stale.refresh_token = Some("RT1".to_string());
    store.store_tokens("u1", &stale).await.unwrap();

    let tokens = store.refresh_if_needed("u1", &flow).await.unwrap().unwrap();

    assert_eq!(tokens.access_token, "AT2");
    let stored = store.get_tokens("u1").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "AT2");
    assert_eq!(stored.refresh_token.as_deref(), Some("RT2"));
}

#[tokio::test]
async fn test_refresh_if_needed_falls_back_when_provider_unreachable() {
    // Nothing listens on port 9; the refresh fails at the transport level.
    let flow = AuthorizationCodeFlow::new(auth_code_config("http://127.0.0.1:9"));

    let store = InMemoryTokenStore::new();
    let mut stale = TokenSet::new("AT1", Utc::now() + Duration::seconds(60));
    stale.refresh_token = Some("RT1".to_string());
    store.store_tokens("u1", &stale).await.unwrap();

    let tokens = store.refresh_if_needed("u1", &flow).await.unwrap().unwrap();

    assert_eq!(tokens, stale);
}

#[tokio::test]
async fn test_refresh_if_needed_returns_none_for_expired_token_on_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let flow = AuthorizationCodeFlow::new(auth_code_config(&server.uri()));

    let store = InMemoryTokenStore::new();
    let mut expired = TokenSet::new("AT1", Utc::now() - Duration::seconds(10));
    expired.refresh_token = Some("RT1".to_string());
    store.store_tokens("u1", &expired).await.unwrap();

    assert!(store.refresh_if_needed("u1", &flow).await.unwrap().is_none());
}

#[tokio::test]
async fn test_refresh_if_needed_skips_fresh_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let flow = AuthorizationCodeFlow::new(auth_code_config(&server.uri()));

    let store = InMemoryTokenStore::new();
    let mut fresh = TokenSet::new("AT1", Utc::now() + Duration::hours(1));
    fresh.refresh_token = Some("RT1".to_string());
    store.store_tokens("u1", &fresh).await.unwrap();

    let tokens = store.refresh_if_needed("u1", &flow).await.unwrap().unwrap();
    assert_eq!(tokens.access_token, "AT1");
}

// ---------------------------------------------------------------------------
// Client credentials
// ---------------------------------------------------------------------------

fn service_config(uri: &str) -> ClientCredentialsConfig {
    ClientCredentialsConfig {
        token_url: format!("{uri}/oauth/token"),
        client_id: "svc".to_string(),
        client_secret: SecretString::new("svc-secret"),
        scope: Some("api".to_string()),
    }
}

#[tokio::test]
async fn test_client_credentials_token_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=svc"))
        .and(body_string_contains("scope=api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "SVC1",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let flow = Arc::new(ClientCredentialsFlow::new(service_config(&server.uri())));

    let first = flow.get_access_token().await.unwrap();
    let second = flow.get_access_token().await.unwrap();

    assert_eq!(first.access_token, "SVC1");
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_client_credentials_clear_cache_fetches_again() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "SVC1",
            "expires_in": 3600
        })))
        .expect(2)
        .mount(&server)
        .await;

    let flow = ClientCredentialsFlow::new(service_config(&server.uri()));

    flow.get_access_token().await.unwrap();
    flow.clear_cache();
    flow.get_access_token().await.unwrap();
}

#[tokio::test]
async fn test_client_credentials_error_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad client"))
        .mount(&server)
        .await;

    let flow = ClientCredentialsFlow::new(service_config(&server.uri()));

    assert!(matches!(
        flow.get_access_token().await.unwrap_err(),
        KeplerError::OAuth(_)
    ));
    assert!(flow.get_access_token().await.is_err());
}
