//! OAuth 2.0 authentication for the MCP server
//!
//! This module supplies the primitives that bind a transport connection to a
//! user's GitLab tokens:
//!
//! - PKCE verifier and challenge generation
//! - Authorization Code + PKCE and Client Credentials flows
//! - Token storage (in memory or AES-256-GCM encrypted file)
//! - Session management with automatic token refresh
//! - Pending authorization state for the redirect round trip
//!
//! # Module Layout
//!
//! ```text
//! oauth/
//! ├── mod.rs                -- this file; re-exports
//! ├── pkce.rs               -- RFC 7636 S256 verifier and challenge
//! ├── token.rs              -- TokenSet and token endpoint responses
//! ├── http.rs               -- lazily built client and token POST helper
//! ├── flow.rs               -- authorization code flow and TokenRefresher
//! ├── client_credentials.rs -- service account flow with token cache
//! ├── token_store.rs        -- TokenStore trait and backends
//! ├── session.rs            -- SessionManager
//! └── pending.rs            -- PendingAuthState
//! ```

pub mod client_credentials;
pub mod flow;
pub mod http;
pub mod pending;
pub mod pkce;
pub mod session;
pub mod token;
pub mod token_store;

pub use client_credentials::{ClientCredentialsConfig, ClientCredentialsFlow};
pub use flow::{AuthorizationCodeConfig, AuthorizationCodeFlow, TokenRefresher};
pub use pending::PendingAuthState;
pub use pkce::{create_pkce_pair, PkcePair};
pub use session::{Session, SessionManager};
pub use token::TokenSet;
pub use token_store::{
    create_token_store, generate_encryption_key, EncryptedFileTokenStore, InMemoryTokenStore,
    TokenStore,
};
