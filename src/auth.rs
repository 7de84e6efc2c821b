//! Per-request authentication strategies for outbound GitLab calls
//!
//! A strategy is picked once per request with a fixed precedence:
//! user session, then service credentials, then a static token, then none.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::oauth::client_credentials::ClientCredentialsFlow;
use crate::oauth::session::{short_id, SessionManager};
use crate::security::SecretString;

/// Header GitLab reads personal and project access tokens from.
pub const PRIVATE_TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// How outbound requests authenticate.
#[derive(Clone)]
pub enum AuthStrategy {
    /// No credentials; only public endpoints will work.
    None,
    /// A fixed token sent in `header_name`.
    StaticToken {
        /// Header carrying the token
        header_name: String,
        /// Token value
        value: SecretString,
    },
    /// Tokens of the user bound to an OAuth session.
    Session {
        /// Shared session manager
        manager: Arc<SessionManager>,
        /// Session of the current request
        session_id: String,
    },
    /// Client credentials grant for a service account.
    ServiceCredentials(Arc<ClientCredentialsFlow>),
}

impl std::fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthStrategy::None => f.write_str("None"),
            AuthStrategy::StaticToken { header_name, .. } => f
                .debug_struct("StaticToken")
                .field("header_name", header_name)
                .finish_non_exhaustive(),
            AuthStrategy::Session { session_id, .. } => f
                .debug_struct("Session")
                .field("session_id", &short_id(session_id))
                .finish_non_exhaustive(),
            AuthStrategy::ServiceCredentials(_) => f.write_str("ServiceCredentials"),
        }
    }
}

impl AuthStrategy {
    /// Static GitLab token sent as `PRIVATE-TOKEN`.
    pub fn private_token(value: impl Into<SecretString>) -> Self {
        AuthStrategy::StaticToken {
            header_name: PRIVATE_TOKEN_HEADER.to_string(),
            value: value.into(),
        }
    }

    /// Short name used in logs and `server_info`.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthStrategy::None => "none",
            AuthStrategy::StaticToken { .. } => "static_token",
            AuthStrategy::Session { .. } => "session",
            AuthStrategy::ServiceCredentials(_) => "service_credentials",
        }
    }

    /// Key under which this strategy's requests are rate limited.
    pub fn rate_limit_key(&self) -> String {
        match self {
            AuthStrategy::Session { session_id, .. } => format!("session:{session_id}"),
            AuthStrategy::ServiceCredentials(_) => "service".to_string(),
            AuthStrategy::StaticToken { .. } | AuthStrategy::None => "default".to_string(),
        }
    }

    /// Resolves the headers to attach to an outbound request.
    ///
    /// # Errors
    ///
    /// Session strategies fail with
    /// [`KeplerError::Session`](crate::error::KeplerError::Session) when the
    /// session is invalid; service credentials fail with
    /// [`KeplerError::OAuth`](crate::error::KeplerError::OAuth) when the token
    /// request fails.
    pub async fn auth_headers(&self) -> Result<HashMap<String, String>> {
        match self {
            AuthStrategy::None => Ok(HashMap::new()),
            AuthStrategy::StaticToken { header_name, value } => Ok(HashMap::from([(
                header_name.clone(),
                value.expose().to_string(),
            )])),
            AuthStrategy::Session {
                manager,
                session_id,
            } => manager.get_auth_headers_for_session(session_id).await,
            AuthStrategy::ServiceCredentials(flow) => {
                let tokens = flow.get_access_token().await?;
                Ok(HashMap::from([(
                    "Authorization".to_string(),
                    tokens.authorization_value(),
                )]))
            }
        }
    }
}

/// Picks the strategy for one request.
///
/// A session is only used when both a manager and a session id are present.
pub fn build_auth_strategy(
    session: Option<(Arc<SessionManager>, String)>,
    service_flow: Option<Arc<ClientCredentialsFlow>>,
    static_token: Option<&SecretString>,
) -> AuthStrategy {
    if let Some((manager, session_id)) = session {
        return AuthStrategy::Session {
            manager,
            session_id,
        };
    }
    if let Some(flow) = service_flow {
        return AuthStrategy::ServiceCredentials(flow);
    }
    match static_token {
        Some(token) if !token.is_empty() => AuthStrategy::private_token(token.clone()),
        _ => AuthStrategy::None,
    }
}
