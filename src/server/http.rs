//! HTTP transport
//!
//! An axum router exposing:
//!
//! - `GET /health`
//! - `POST <mcp_path>` for JSON-RPC messages
//! - `GET /oauth/authorize`, `GET /oauth/callback` and `POST /oauth/logout`
//!   when user OAuth is enabled
//!
//! With user OAuth enabled every MCP request must carry the `session_id`
//! cookie set by the callback; requests without a live session get a 401
//! pointing at `/oauth/authorize`.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::auth::{build_auth_strategy, AuthStrategy};
use crate::config::Config;
use crate::error::Result;
use crate::oauth::session::short_id;
use crate::security::{generate_secure_token, validate_shared_token, SecretString};
use crate::server::{ServerComponents, UserAuth};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session_id";

/// Login entry point clients are sent to when unauthenticated.
pub const AUTHORIZE_PATH: &str = "/oauth/authorize";

// =============================================================================
// State
// =============================================================================

/// Transport settings taken from configuration.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Reported by `/health`
    pub app_name: String,
    /// Reported by `/health`
    pub environment: String,
    /// JSON-RPC route
    pub mcp_path: String,
    /// Bearer token required on the JSON-RPC route
    pub auth_token: Option<SecretString>,
    /// Adds `Secure` to the session cookie
    pub secure_cookies: bool,
    /// Session cookie lifetime in seconds
    pub cookie_max_age: u64,
}

impl HttpSettings {
    /// Reads the transport settings from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            app_name: config.server.app_name.clone(),
            environment: config.server.environment.as_str().to_string(),
            mcp_path: config.server.mcp_path.clone(),
            auth_token: config.server.auth_token.clone().filter(|t| !t.is_empty()),
            secure_cookies: config.secure_cookies(),
            cookie_max_age: config.session.timeout_seconds,
        }
    }
}

/// State shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    components: Arc<ServerComponents>,
    settings: Arc<HttpSettings>,
}

impl AppState {
    /// Creates handler state.
    pub fn new(components: ServerComponents, settings: HttpSettings) -> Self {
        Self {
            components: Arc::new(components),
            settings: Arc::new(settings),
        }
    }
}

// =============================================================================
// Router
// =============================================================================

/// Builds the router. OAuth routes are mounted only when user OAuth is on.
pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route(&state.settings.mcp_path, post(mcp_message));

    if state.components.user_auth.is_some() {
        router = router
            .route(AUTHORIZE_PATH, get(oauth_authorize))
            .route("/oauth/callback", get(oauth_callback))
            .route("/oauth/logout", post(oauth_logout));
    }

    router.with_state(state)
}

/// Serves the router on the configured host and port until Ctrl-C.
///
/// # Errors
///
/// Returns [`KeplerError::Io`](crate::error::KeplerError::Io) if the
/// listener cannot bind or the server fails.
pub async fn serve_http(components: ServerComponents, config: &Config) -> Result<()> {
    let settings = HttpSettings::from_config(config);
    let app = router(AppState::new(components, settings));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        "Starting MCP server on http://{}{}",
        addr,
        config.server.mcp_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// =============================================================================
// Handlers
// =============================================================================

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "app_name": state.settings.app_name,
        "environment": state.settings.environment,
    }))
}

async fn mcp_message(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    if let Some(expected) = &state.settings.auth_token {
        let provided = bearer_token(&headers).unwrap_or_default();
        if !validate_shared_token(provided, Some(expected.expose())) {
            tracing::warn!("Rejected MCP request with missing or invalid bearer token");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "unauthorized"})),
            )
                .into_response();
        }
    }

    let auth = match resolve_auth(&state, &headers).await {
        Ok(auth) => auth,
        Err(response) => return response,
    };

    match state.components.server.handle_message(&body, auth).await {
        Some(response) => ([(CONTENT_TYPE, "application/json")], response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Picks the outbound auth strategy for one MCP request.
async fn resolve_auth(
    state: &AppState,
    headers: &HeaderMap,
) -> std::result::Result<AuthStrategy, Response> {
    let components = &state.components;
    let Some(user_auth) = &components.user_auth else {
        return Ok(components.default_auth());
    };

    let Some(session_id) = cookie_value(headers, SESSION_COOKIE) else {
        tracing::debug!("MCP request without session cookie");
        return Err(login_required());
    };

    if user_auth.sessions.get_session(&session_id).await.is_none() {
        tracing::debug!(session = short_id(&session_id), "MCP request with unknown or expired session");
        return Err(login_required());
    }

    Ok(build_auth_strategy(
        Some((Arc::clone(&user_auth.sessions), session_id)),
        components.service_flow.clone(),
        components.static_token.as_ref(),
    ))
}

async fn oauth_authorize(State(state): State<AppState>) -> Response {
    let Some(user_auth) = &state.components.user_auth else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let oauth_state = generate_secure_token(32);
    match user_auth.flow.create_authorization_url(&oauth_state) {
        Ok((url, pkce)) => {
            user_auth
                .pending
                .create_state(&oauth_state, &pkce.code_verifier);
            tracing::debug!(state = short_id(&oauth_state), "Redirecting to identity provider");
            redirect(&url)
        }
        Err(e) => {
            tracing::error!("Failed to build authorization URL: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "Authentication failed"}))
        }
    }
}

/// Query parameters delivered to the callback by the identity provider.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    #[serde(default)]
    pub code: Option<String>,
    /// State issued by `/oauth/authorize`
    #[serde(default)]
    pub state: Option<String>,
    /// Provider error code
    #[serde(default)]
    pub error: Option<String>,
    /// Provider error text
    #[serde(default)]
    pub error_description: Option<String>,
}

async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(user_auth) = &state.components.user_auth else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if let Some(error) = params.error {
        let description = params
            .error_description
            .unwrap_or_else(|| "Unknown error".to_string());
        tracing::error!("OAuth error: {} - {}", error, description);
        return error_response(
            StatusCode::BAD_REQUEST,
            json!({"error": error, "description": description}),
        );
    }

    let (Some(code), Some(oauth_state)) = (params.code, params.state) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            json!({"error": "Missing code or state parameter"}),
        );
    };

    let Some(code_verifier) = user_auth.pending.consume_state(&oauth_state) else {
        tracing::warn!(state = short_id(&oauth_state), "Invalid or expired OAuth state");
        return error_response(
            StatusCode::BAD_REQUEST,
            json!({"error": "Invalid or expired state"}),
        );
    };

    match complete_login(user_auth, &code, &code_verifier).await {
        Ok(session_id) => {
            let mut response = redirect(&state.settings.mcp_path);
            match session_cookie(&session_id, &state.settings).parse::<HeaderValue>() {
                Ok(cookie) => {
                    response.headers_mut().insert(SET_COOKIE, cookie);
                }
                Err(e) => tracing::error!("Failed to build session cookie: {}", e),
            }
            response
        }
        Err(e) => {
            tracing::error!("OAuth callback error: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "Authentication failed"}),
            )
        }
    }
}

/// Exchanges the code, resolves the user and opens a session.
async fn complete_login(user_auth: &UserAuth, code: &str, code_verifier: &str) -> Result<String> {
    let tokens = user_auth
        .flow
        .exchange_code_for_tokens(code, code_verifier)
        .await?;

    let user_id = if user_auth.flow.config().userinfo_url.is_some() {
        let info = user_auth.flow.get_user_info(&tokens.access_token).await?;
        user_id_from_userinfo(&info)
    } else {
        generate_secure_token(16)
    };

    let session_id = user_auth.sessions.create_session(&user_id, &tokens).await?;
    tracing::info!(user = %user_id, "OAuth flow completed");
    Ok(session_id)
}

async fn oauth_logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(user_auth) = &state.components.user_auth else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if let Some(session_id) = cookie_value(&headers, SESSION_COOKIE) {
        user_auth.sessions.invalidate_session(&session_id).await;
        tracing::info!(session = short_id(&session_id), "Session logged out");
    }

    let clear = format!("{SESSION_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax");
    (
        StatusCode::OK,
        [(SET_COOKIE, clear)],
        Json(json!({"success": true, "message": "Logged out"})),
    )
        .into_response()
}

// =============================================================================
// Helpers
// =============================================================================

/// User identity from a userinfo document: `id`, then `sub`, then `email`.
///
/// Empty strings, zero and null are skipped; `"unknown"` when none remain.
pub fn user_id_from_userinfo(info: &Map<String, Value>) -> String {
    ["id", "sub", "email"]
        .iter()
        .filter_map(|key| match info.get(*key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
            _ => None,
        })
        .next()
        .unwrap_or_else(|| "unknown".to_string())
}

fn session_cookie(session_id: &str, settings: &HttpSettings) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        settings.cookie_max_age
    );
    if settings.secure_cookies {
        cookie.push_str("; Secure");
    }
    cookie
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| key.trim() == name && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

fn login_required() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(LOCATION, AUTHORIZE_PATH)],
        Json(json!({
            "error": "authentication_required",
            "message": "Sign in to continue",
            "authorize_url": AUTHORIZE_PATH,
        })),
    )
        .into_response()
}

fn error_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}
