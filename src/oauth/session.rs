//! Session management binding opaque session ids to user tokens
//!
//! A [`SessionManager`] owns the session table and the user to session reverse
//! index. It holds shared references to a [`TokenStore`] and, optionally, a
//! [`TokenRefresher`] used to renew tokens on access.
//!
//! # Session lifecycle
//!
//! ```text
//! no session --create_session--> active --get_session (touch)--> active
//!                                   |
//!                                   +--timeout / invalidate / new login--> gone
//! ```
//!
//! Each user has at most one live session. Logging in again replaces the old
//! session but leaves the stored tokens alone.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::error::{KeplerError, Result};
use crate::oauth::flow::TokenRefresher;
use crate::oauth::token::TokenSet;
use crate::oauth::token_store::TokenStore;
use crate::security::generate_secure_token;

/// Sessions expire after this long without access.
pub const DEFAULT_SESSION_TIMEOUT_SECS: i64 = 24 * 60 * 60;

const SESSION_ID_BYTES: usize = 32;

/// First eight characters of a session id, for logs.
pub(crate) fn short_id(session_id: &str) -> &str {
    session_id.get(..8).unwrap_or(session_id)
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A server-side session bound to one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque URL-safe identifier with 32 bytes of entropy.
    pub session_id: String,
    /// User identity from the identity provider.
    pub user_id: String,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Last successful lookup.
    pub last_accessed: DateTime<Utc>,
}

impl Session {
    fn new(user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            session_id: generate_secure_token(SESSION_ID_BYTES),
            user_id: user_id.to_string(),
            created_at: now,
            last_accessed: now,
        }
    }

    /// Returns `true` when the session has been idle longer than `timeout`.
    pub fn is_expired(&self, timeout: Duration) -> bool {
        Utc::now() > self.last_accessed + timeout
    }

    fn touch(&mut self) {
        self.last_accessed = Utc::now();
    }
}

#[derive(Debug, Default)]
struct SessionTable {
    sessions: HashMap<String, Session>,
    user_sessions: HashMap<String, String>,
}

impl SessionTable {
    /// Removes a session and its reverse index entry if it still points here.
    fn evict(&mut self, session_id: &str) -> Option<Session> {
        let session = self.sessions.remove(session_id)?;
        if self.user_sessions.get(&session.user_id).map(String::as_str) == Some(session_id) {
            self.user_sessions.remove(&session.user_id);
        }
        Some(session)
    }
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// Coordinates sessions, token storage and token refresh.
///
/// All table mutations run under one lock. Header resolution releases that
/// lock before calling into the token store, so an invalidation racing a
/// header lookup may let that lookup finish with the old tokens.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use chrono::{Duration, Utc};
/// use kepler_mcp_gitlab::oauth::session::SessionManager;
/// use kepler_mcp_gitlab::oauth::token::TokenSet;
/// use kepler_mcp_gitlab::oauth::token_store::InMemoryTokenStore;
///
/// # async fn example() -> kepler_mcp_gitlab::error::Result<()> {
/// let manager = SessionManager::new(Arc::new(InMemoryTokenStore::new()), None);
/// let tokens = TokenSet::new("at", Utc::now() + Duration::hours(1));
/// let session_id = manager.create_session("42", &tokens).await?;
///
/// let headers = manager.get_auth_headers_for_session(&session_id).await?;
/// assert_eq!(headers["Authorization"], "Bearer at");
/// # Ok(())
/// # }
/// ```
pub struct SessionManager {
    token_store: Arc<dyn TokenStore>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    timeout: Duration,
    table: Mutex<SessionTable>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("timeout", &self.timeout)
            .field("refresh_enabled", &self.refresher.is_some())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates a manager with the default 24 hour idle timeout.
    ///
    /// # Arguments
    ///
    /// * `token_store` - Shared token storage
    /// * `refresher` - When set, tokens are refreshed on header lookup
    pub fn new(
        token_store: Arc<dyn TokenStore>,
        refresher: Option<Arc<dyn TokenRefresher>>,
    ) -> Self {
        Self {
            token_store,
            refresher,
            timeout: Duration::seconds(DEFAULT_SESSION_TIMEOUT_SECS),
            table: Mutex::new(SessionTable::default()),
        }
    }

    /// Overrides the idle timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Idle timeout applied to sessions.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Shared token store.
    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.token_store
    }

    /// Creates a session for `user_id`, replacing any existing one.
    ///
    /// The tokens are always persisted. A previous session for the same user
    /// is dropped but its stored tokens are kept.
    ///
    /// # Errors
    ///
    /// Propagates token store failures; no session is created in that case.
    pub async fn create_session(&self, user_id: &str, tokens: &TokenSet) -> Result<String> {
        let mut table = self.table.lock().await;

        self.token_store.store_tokens(user_id, tokens).await?;

        if let Some(previous) = table.user_sessions.remove(user_id) {
            table.sessions.remove(&previous);
            tracing::debug!(
                user_id,
                session = short_id(&previous),
                "Replaced existing session"
            );
        }

        let session = Session::new(user_id);
        let session_id = session.session_id.clone();
        table
            .user_sessions
            .insert(user_id.to_string(), session_id.clone());
        table.sessions.insert(session_id.clone(), session);

        tracing::info!(user_id, session = short_id(&session_id), "Created session");
        Ok(session_id)
    }

    /// Looks up a session and refreshes its last access time.
    ///
    /// Expired sessions are evicted and reported as absent.
    pub async fn get_session(&self, session_id: &str) -> Option<Session> {
        let mut table = self.table.lock().await;

        let expired = table.sessions.get(session_id)?.is_expired(self.timeout);
        if expired {
            table.evict(session_id);
            tracing::debug!(session = short_id(session_id), "Evicted expired session");
            return None;
        }

        let session = table.sessions.get_mut(session_id)?;
        session.touch();
        Some(session.clone())
    }

    /// Resolves `Authorization` headers for a session.
    ///
    /// When a refresher is configured the tokens are refreshed if due.
    ///
    /// # Errors
    ///
    /// Returns [`KeplerError::Session`] for an unknown or expired session,
    /// missing tokens, or tokens that have expired. Token store failures are
    /// propagated.
    pub async fn get_auth_headers_for_session(
        &self,
        session_id: &str,
    ) -> Result<HashMap<String, String>> {
        let session = self
            .get_session(session_id)
            .await
            .ok_or_else(|| KeplerError::Session("Invalid or expired session".to_string()))?;

        let tokens = match &self.refresher {
            Some(refresher) => {
                self.token_store
                    .refresh_if_needed(&session.user_id, refresher.as_ref())
                    .await?
            }
            None => self.token_store.get_tokens(&session.user_id).await?,
        };

        let tokens = tokens.ok_or_else(|| {
            KeplerError::Session(format!("No tokens stored for user {}", session.user_id))
        })?;

        if tokens.is_expired() {
            return Err(KeplerError::Session(
                "Access token expired, re-authentication required".to_string(),
            ));
        }

        Ok(HashMap::from([(
            "Authorization".to_string(),
            tokens.authorization_value(),
        )]))
    }

    /// Removes a session. Unknown ids are ignored.
    pub async fn invalidate_session(&self, session_id: &str) {
        let mut table = self.table.lock().await;
        if table.evict(session_id).is_some() {
            tracing::info!(session = short_id(session_id), "Invalidated session");
        }
    }

    /// Evicts every idle-expired session and returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut table = self.table.lock().await;

        let expired: Vec<String> = table
            .sessions
            .values()
            .filter(|s| s.is_expired(self.timeout))
            .map(|s| s.session_id.clone())
            .collect();

        for session_id in &expired {
            table.evict(session_id);
        }

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Cleaned up expired sessions");
        }
        expired.len()
    }

    /// Number of sessions in the table, including not yet swept ones.
    pub async fn get_session_count(&self) -> usize {
        self.table.lock().await.sessions.len()
    }

    /// Returns the live session for `user_id` without touching it.
    pub async fn get_user_session(&self, user_id: &str) -> Option<Session> {
        let table = self.table.lock().await;
        let session_id = table.user_sessions.get(user_id)?;
        table
            .sessions
            .get(session_id)
            .filter(|s| !s.is_expired(self.timeout))
            .cloned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
