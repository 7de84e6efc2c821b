//! MCP server: protocol handling, transports and wiring
//!
//! [`ServerComponents::from_config`] builds every long-lived service once
//! (rate limiter, OAuth flows, session manager, tool registry) and hands
//! them to the selected transport. Nothing here is global; tests build their
//! own components.
//!
//! # Module Layout
//!
//! ```text
//! server/
//! ├── mod.rs       -- ServerComponents, maintenance task, run()
//! ├── protocol.rs  -- JSON-RPC and MCP wire types
//! ├── handler.rs   -- McpServer: initialize, ping, tools/list, tools/call
//! ├── stdio.rs     -- newline-delimited JSON-RPC over stdin/stdout
//! └── http.rs      -- axum router with OAuth login endpoints
//! ```

pub mod handler;
pub mod http;
pub mod protocol;
pub mod stdio;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::auth::{build_auth_strategy, AuthStrategy};
use crate::config::{Config, Transport};
use crate::error::Result;
use crate::gitlab::{build_http_client, GitLabClient};
use crate::oauth::client_credentials::ClientCredentialsFlow;
use crate::oauth::flow::{AuthorizationCodeFlow, TokenRefresher};
use crate::oauth::pending::PendingAuthState;
use crate::oauth::session::SessionManager;
use crate::oauth::token_store::create_token_store;
use crate::rate_limit::RateLimiter;
use crate::security::SecretString;

const MIN_MAINTENANCE_INTERVAL: Duration = Duration::from_millis(10);
use crate::tools::ToolRegistry;

pub use handler::McpServer;

/// Browser login services, present when user OAuth is enabled.
#[derive(Debug, Clone)]
pub struct UserAuth {
    /// Authorization code flow against the identity provider
    pub flow: Arc<AuthorizationCodeFlow>,
    /// Session table and token access
    pub sessions: Arc<SessionManager>,
    /// States issued by `/oauth/authorize` awaiting their callback
    pub pending: Arc<PendingAuthState>,
}

/// Long-lived services shared by every request.
#[derive(Debug, Clone)]
pub struct ServerComponents {
    /// JSON-RPC handler
    pub server: Arc<McpServer>,
    /// User login, when enabled
    pub user_auth: Option<UserAuth>,
    /// Service account flow, when enabled
    pub service_flow: Option<Arc<ClientCredentialsFlow>>,
    /// Static GitLab token, when configured
    pub static_token: Option<SecretString>,
    /// Limiter gating outbound GitLab calls
    pub rate_limiter: Arc<RateLimiter>,
}

impl ServerComponents {
    /// Builds all services described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the GitLab URL is invalid, the HTTP client cannot
    /// be built, or the token store key is malformed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit.requests_per_minute,
            config.rate_limit.burst,
        ));

        let http = build_http_client(config.gitlab.timeout())?;
        let gitlab = GitLabClient::new(&config.gitlab.url, http, AuthStrategy::None)?
            .with_rate_limiter(Arc::clone(&rate_limiter), config.gitlab.timeout());

        let user_auth = match config.authorization_code_config() {
            Some(flow_config) => {
                let flow = Arc::new(AuthorizationCodeFlow::new(flow_config));
                let store = create_token_store(
                    config.token_store.path.as_deref().map(Path::new),
                    config
                        .token_store
                        .encryption_key
                        .as_ref()
                        .map(SecretString::expose),
                )?;
                let refresher: Arc<dyn TokenRefresher> = flow.clone();
                let sessions = Arc::new(
                    SessionManager::new(store, Some(refresher))
                        .with_timeout(config.session.timeout()),
                );
                let pending = Arc::new(PendingAuthState::with_timeout(
                    config.session.pending_state_timeout(),
                ));
                tracing::info!("User OAuth enabled");
                Some(UserAuth {
                    flow,
                    sessions,
                    pending,
                })
            }
            None => None,
        };

        let service_flow = config.client_credentials_config().map(|service| {
            tracing::info!(client_id = %service.client_id, "Service OAuth enabled");
            Arc::new(ClientCredentialsFlow::new(service))
        });

        let static_token = config.gitlab.token.clone().filter(|t| !t.is_empty());

        let registry = ToolRegistry::with_default_tools();
        tracing::debug!(tools = registry.len(), "Tool registry ready");

        let server = McpServer::new(
            Arc::new(registry),
            Arc::new(config.server_metadata()),
            gitlab,
            user_auth.as_ref().map(|u| Arc::clone(&u.sessions)),
        );

        Ok(Self {
            server: Arc::new(server),
            user_auth,
            service_flow,
            static_token,
            rate_limiter,
        })
    }

    /// Strategy for requests that carry no user session.
    pub fn default_auth(&self) -> AuthStrategy {
        build_auth_strategy(None, self.service_flow.clone(), self.static_token.as_ref())
    }

    /// Starts the periodic sweep of expired sessions and login states.
    ///
    /// Returns `None` when user OAuth is disabled.
    pub fn spawn_maintenance(&self, interval: Duration) -> Option<JoinHandle<()>> {
        let user_auth = self.user_auth.clone()?;
        Some(tokio::spawn(run_maintenance(user_auth, interval)))
    }

    /// Releases the HTTP clients held by the OAuth flows.
    pub fn close(&self) {
        if let Some(user_auth) = &self.user_auth {
            user_auth.flow.close();
        }
        if let Some(flow) = &self.service_flow {
            flow.close();
        }
    }
}

async fn run_maintenance(user_auth: UserAuth, interval: Duration) {
    // tokio rejects a zero period.
    let mut ticker = tokio::time::interval(interval.max(MIN_MAINTENANCE_INTERVAL));
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let sessions = user_auth.sessions.cleanup_expired().await;
        let states = user_auth.pending.cleanup_expired();
        if sessions > 0 || states > 0 {
            tracing::info!(sessions, states, "Removed expired sessions and login states");
        } else {
            tracing::debug!("Maintenance sweep found nothing to remove");
        }
    }
}

/// Runs the server on the configured transport until it stops.
///
/// # Errors
///
/// Returns an error if components cannot be built or the transport fails.
pub async fn run(config: Config) -> Result<()> {
    let components = ServerComponents::from_config(&config)?;
    let maintenance = components.spawn_maintenance(config.session.cleanup_interval());

    let outcome = match config.server.transport {
        Transport::Stdio => {
            if components.user_auth.is_some() {
                tracing::warn!("User OAuth needs the HTTP transport; stdio requests use service or static credentials");
            }
            stdio::serve_stdio(&components.server, components.default_auth()).await
        }
        Transport::Http => http::serve_http(components.clone(), &config).await,
    };

    if let Some(handle) = maintenance {
        handle.abort();
    }
    components.close();
    outcome
}
