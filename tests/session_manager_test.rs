//! Session manager integration tests
//!
//! Verifies `src/oauth/session.rs` together with a real refresher and the
//! encrypted token store:
//!
//! - Auth headers for a session with near-expiry tokens trigger a refresh.
//! - Sessions idle past the timeout are evicted and swept.
//! - A new login replaces the user's previous session.
//! - Tokens outlive the in-memory session table when the file store is used.
//! - Pending login states are single use.

mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use kepler_mcp_gitlab::error::KeplerError;
use kepler_mcp_gitlab::oauth::flow::{AuthorizationCodeFlow, TokenRefresher};
use kepler_mcp_gitlab::oauth::pending::PendingAuthState;
use kepler_mcp_gitlab::oauth::token::TokenSet;
use kepler_mcp_gitlab::oauth::token_store::{
    generate_encryption_key, EncryptedFileTokenStore, InMemoryTokenStore, TokenStore,
};
use kepler_mcp_gitlab::SessionManager;

use common::{auth_code_config, mount_token_endpoint};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn tokens_expiring_in(access: &str, seconds: i64) -> TokenSet {
    let mut tokens = TokenSet::new(access, Utc::now() + Duration::seconds(seconds));
    tokens.refresh_token = Some(format!("{access}-rt"));
    tokens
}

fn plain_manager() -> SessionManager {
    SessionManager::new(Arc::new(InMemoryTokenStore::new()), None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_auth_headers_refresh_near_expiry_tokens() {
    let server = wiremock::MockServer::start().await;
    mount_token_endpoint(&server, "AT2", "RT2").await;

    let refresher: Arc<dyn TokenRefresher> =
        Arc::new(AuthorizationCodeFlow::new(auth_code_config(&server.uri())));
    let store = Arc::new(InMemoryTokenStore::new());
    let manager = SessionManager::new(store.clone(), Some(refresher));

    let session_id = manager
        .create_session("u1", &tokens_expiring_in("AT1", 60))
        .await
        .unwrap();

    let headers = manager.get_auth_headers_for_session(&session_id).await.unwrap();

    assert_eq!(headers["Authorization"], "Bearer AT2");
    let stored = store.get_tokens("u1").await.unwrap().unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some("RT2"));
}

#[tokio::test]
async fn test_auth_headers_for_expired_tokens_without_refresher() {
    let manager = plain_manager();
    let session_id = manager
        .create_session("u1", &tokens_expiring_in("AT1", -5))
        .await
        .unwrap();

    let err = manager
        .get_auth_headers_for_session(&session_id)
        .await
        .unwrap_err();

    assert!(matches!(err, KeplerError::Session(_)));
    assert!(err.requires_reauthentication());
}

#[tokio::test]
async fn test_unknown_session_is_rejected() {
    let manager = plain_manager();

    let err = manager
        .get_auth_headers_for_session("no-such-session")
        .await
        .unwrap_err();

    assert!(matches!(err, KeplerError::Session(_)));
}

#[tokio::test]
async fn test_idle_sessions_expire_and_are_swept() {
    let manager = plain_manager().with_timeout(Duration::milliseconds(50));

    let idle = manager
        .create_session("idle", &tokens_expiring_in("AT1", 3600))
        .await
        .unwrap();
    manager
        .create_session("other", &tokens_expiring_in("AT2", 3600))
        .await
        .unwrap();

    tokio::time::sleep(StdDuration::from_millis(120)).await;

    assert!(manager.get_session(&idle).await.is_none());
    assert_eq!(manager.cleanup_expired().await, 1);
    assert_eq!(manager.get_session_count().await, 0);
}

#[tokio::test]
async fn test_new_login_replaces_previous_session() {
    let manager = plain_manager();

    let first = manager
        .create_session("u1", &tokens_expiring_in("AT1", 3600))
        .await
        .unwrap();
    let second = manager
        .create_session("u1", &tokens_expiring_in("AT2", 3600))
        .await
        .unwrap();

    assert_ne!(first, second);
    assert!(manager.get_session(&first).await.is_none());
    assert_eq!(manager.get_session(&second).await.unwrap().user_id, "u1");
    assert_eq!(manager.get_session_count().await, 1);

    let headers = manager.get_auth_headers_for_session(&second).await.unwrap();
    assert_eq!(headers["Authorization"], "Bearer AT2");
}

#[tokio::test]
async fn test_logout_keeps_tokens_in_file_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tokens.enc");
    let key = generate_encryption_key();

    let store = Arc::new(EncryptedFileTokenStore::new(&path, &key).unwrap());
    let manager = SessionManager::new(store, None);
    let session_id = manager
        .create_session("u1", &tokens_expiring_in("AT1", 3600))
        .await
        .unwrap();

    manager.invalidate_session(&session_id).await;
    assert!(manager.get_session(&session_id).await.is_none());

    let reopened = EncryptedFileTokenStore::new(&path, &key).unwrap();
    let tokens = reopened.get_tokens("u1").await.unwrap().unwrap();
    assert_eq!(tokens.access_token, "AT1");
}

#[test]
fn test_pending_state_is_single_use() {
    let pending = PendingAuthState::new();
    pending.create_state("state-1", "verifier-1");

    assert_eq!(pending.consume_state("state-1").as_deref(), Some("verifier-1"));
    assert!(pending.consume_state("state-1").is_none());
    assert!(pending.consume_state("never-issued").is_none());
}

#[tokio::test]
async fn test_pending_state_expires() {
    let pending = PendingAuthState::with_timeout(StdDuration::from_millis(50));
    pending.create_state("stale", "v1");

    tokio::time::sleep(StdDuration::from_millis(120)).await;
    pending.create_state("fresh", "v2");

    assert_eq!(pending.cleanup_expired(), 1);
    assert!(pending.consume_state("stale").is_none());
    assert_eq!(pending.consume_state("fresh").as_deref(), Some("v2"));
}
