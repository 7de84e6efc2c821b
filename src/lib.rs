//! Kepler MCP GitLab - Model Context Protocol server for the GitLab REST API
//!
//! The library exposes GitLab projects, issues, merge requests and repository
//! content as MCP tools, authenticating outbound calls with a user's OAuth
//! session, a service account, or a static access token.
//!
//! # Architecture
//!
//! - `oauth`: PKCE, authorization code and client credentials flows, token
//!   stores, sessions and pending login state
//! - `auth`: per-request choice of outbound credentials
//! - `rate_limit`: token bucket limiter for outbound calls
//! - `gitlab`: REST client and endpoint methods
//! - `tools`: MCP tools, registry and dispatch middleware
//! - `server`: JSON-RPC handling plus stdio and HTTP transports
//! - `config`, `cli`, `logging`, `error`, `security`: ambient support
//!
//! # Example
//!
//! ```no_run
//! use kepler_mcp_gitlab::cli::ServeArgs;
//! use kepler_mcp_gitlab::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(&ServeArgs::default())?;
//!     config.validate()?;
//!     kepler_mcp_gitlab::server::run(config).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod gitlab;
pub mod logging;
pub mod oauth;
pub mod rate_limit;
pub mod security;
pub mod server;
pub mod tools;

// Re-export commonly used types
pub use auth::AuthStrategy;
pub use config::Config;
pub use error::{KeplerError, Result};
pub use oauth::{SessionManager, TokenSet};
pub use rate_limit::RateLimiter;
pub use server::McpServer;
