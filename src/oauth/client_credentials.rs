//! OAuth 2.0 client credentials flow for service-to-service access
//!
//! The access token is cached process-wide and reused until it enters the
//! refresh window. Concurrent callers on a cold cache may each fetch a token;
//! both results are valid and the last one written wins.

use std::sync::Mutex;

use crate::error::Result;
use crate::oauth::http::{post_token_request, LazyHttpClient};
use crate::oauth::token::TokenSet;
use crate::security::SecretString;

/// Service account configuration for the client credentials grant.
#[derive(Debug, Clone)]
pub struct ClientCredentialsConfig {
    /// Provider token endpoint.
    pub token_url: String,
    /// Service client id.
    pub client_id: String,
    /// Service client secret.
    pub client_secret: SecretString,
    /// Optional scope to request.
    pub scope: Option<String>,
}

/// Client credentials grant with a single cached token.
#[derive(Debug)]
pub struct ClientCredentialsFlow {
    config: ClientCredentialsConfig,
    http: LazyHttpClient,
    cached: Mutex<Option<TokenSet>>,
}

impl ClientCredentialsFlow {
    /// Creates a flow that builds its own HTTP client on first use.
    pub fn new(config: ClientCredentialsConfig) -> Self {
        Self {
            config,
            http: LazyHttpClient::new(),
            cached: Mutex::new(None),
        }
    }

    /// Creates a flow that uses an injected HTTP client.
    pub fn with_http_client(config: ClientCredentialsConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            http: LazyHttpClient::with_client(client),
            cached: Mutex::new(None),
        }
    }

    /// Returns the cached token, or fetches a new one when it is missing or
    /// inside the refresh window.
    ///
    /// # Errors
    ///
    /// Returns [`KeplerError::OAuth`](crate::error::KeplerError::OAuth) when the
    /// token request fails.
    pub async fn get_access_token(&self) -> Result<TokenSet> {
        if let Some(tokens) = self.cached_token() {
            if !tokens.needs_refresh() {
                return Ok(tokens);
            }
        }

        let mut params = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose()),
        ];
        if let Some(scope) = &self.config.scope {
            params.push(("scope", scope.as_str()));
        }

        let client = self.http.get()?;
        let tokens = post_token_request(&client, &self.config.token_url, &params).await?;
        tracing::debug!(client_id = %self.config.client_id, "Fetched client credentials token");

        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = Some(tokens.clone());
        Ok(tokens)
    }

    /// Drops the cached token so the next call fetches a fresh one.
    pub fn clear_cache(&self) {
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Releases the HTTP client.
    pub fn close(&self) {
        self.http.close();
    }

    fn cached_token(&self) -> Option<TokenSet> {
        self.cached.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn flow() -> ClientCredentialsFlow {
        ClientCredentialsFlow::new(ClientCredentialsConfig {
            // Unroutable so any network attempt fails fast.
            token_url: "http://127.0.0.1:9/token".to_string(),
            client_id: "svc".to_string(),
            client_secret: SecretString::new("secret"),
            scope: None,
        })
    }

    #[tokio::test]
    async fn test_valid_cached_token_is_returned_without_request() {
        let flow = flow();
        let tokens = TokenSet::new("cached", Utc::now() + Duration::hours(1));
        *flow.cached.lock().unwrap() = Some(tokens.clone());

        assert_eq!(flow.get_access_token().await.unwrap(), tokens);
    }

    #[tokio::test]
    async fn test_cached_token_inside_refresh_window_triggers_fetch() {
        let flow = flow();
        *flow.cached.lock().unwrap() =
            Some(TokenSet::new("stale", Utc::now() + Duration::minutes(1)));

        assert!(flow.get_access_token().await.is_err());
    }

    #[test]
    fn test_clear_cache() {
        let flow = flow();
        *flow.cached.lock().unwrap() = Some(TokenSet::new("x", Utc::now()));
        flow.clear_cache();
        assert!(flow.cached_token().is_none());
    }
}
