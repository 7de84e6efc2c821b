//! OAuth 2.0 authorization code flow with PKCE
//!
//! The flow object holds only static endpoint configuration and a lazily
//! created HTTP client. PKCE verifiers live in
//! [`PendingAuthState`](crate::oauth::pending::PendingAuthState) between the
//! redirect and the callback.
//!
//! # Flow overview
//!
//! 1. [`AuthorizationCodeFlow::create_authorization_url`] builds the provider
//!    redirect and returns the PKCE pair for the caller to persist.
//! 2. The provider redirects back with `code` and `state`.
//! 3. [`AuthorizationCodeFlow::exchange_code_for_tokens`] trades the code and
//!    verifier for a [`TokenSet`].
//! 4. [`AuthorizationCodeFlow::get_user_info`] resolves the user identity.
//! 5. [`TokenRefresher::refresh_access_token`] renews tokens later on.

use async_trait::async_trait;
use chrono::Duration;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{KeplerError, Result};
use crate::oauth::http::{post_token_request, LazyHttpClient, OAUTH_HTTP_TIMEOUT};
use crate::oauth::pkce::{create_pkce_pair, PkcePair, CODE_CHALLENGE_METHOD};
use crate::oauth::token::{TokenSet, DEFAULT_REFRESH_BUFFER_SECS};
use crate::security::SecretString;

// ---------------------------------------------------------------------------
// TokenRefresher
// ---------------------------------------------------------------------------

/// Anything able to exchange a refresh token for a new [`TokenSet`].
///
/// Token stores depend on this seam rather than on a concrete flow so that
/// refresh behaviour can be exercised without a live provider.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchanges `refresh_token` for a new token set.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenSet>;

    /// How long before expiry tokens should be refreshed.
    fn refresh_buffer(&self) -> Duration {
        Duration::seconds(DEFAULT_REFRESH_BUFFER_SECS)
    }
}

// ---------------------------------------------------------------------------
// AuthorizationCodeConfig
// ---------------------------------------------------------------------------

/// Static endpoint and client configuration for the authorization code flow.
#[derive(Debug, Clone)]
pub struct AuthorizationCodeConfig {
    /// Provider authorization endpoint.
    pub authorization_url: String,
    /// Provider token endpoint.
    pub token_url: String,
    /// Optional userinfo endpoint used to resolve the user identity.
    pub userinfo_url: Option<String>,
    /// Registered client id.
    pub client_id: String,
    /// Client secret for confidential clients.
    pub client_secret: Option<SecretString>,
    /// Redirect URI registered with the provider.
    pub redirect_uri: String,
    /// Space separated scopes to request.
    pub scope: String,
    /// Refresh window before token expiry.
    pub refresh_buffer: Duration,
}

// ---------------------------------------------------------------------------
// AuthorizationCodeFlow
// ---------------------------------------------------------------------------

/// Driver for the OAuth 2.0 authorization code grant with PKCE.
///
/// # Examples
///
/// ```
/// use chrono::Duration;
/// use kepler_mcp_gitlab::oauth::flow::{AuthorizationCodeConfig, AuthorizationCodeFlow};
///
/// let flow = AuthorizationCodeFlow::new(AuthorizationCodeConfig {
///     authorization_url: "https://gitlab.example.com/oauth/authorize".to_string(),
///     token_url: "https://gitlab.example.com/oauth/token".to_string(),
///     userinfo_url: None,
///     client_id: "client".to_string(),
///     client_secret: None,
///     redirect_uri: "http://localhost:8000/oauth/callback".to_string(),
///     scope: "api".to_string(),
///     refresh_buffer: Duration::minutes(5),
/// });
///
/// let (url, pkce) = flow.create_authorization_url("state-1").unwrap();
/// assert!(url.contains("state=state-1"));
/// assert!(url.contains(&pkce.code_challenge));
/// ```
#[derive(Debug)]
pub struct AuthorizationCodeFlow {
    config: AuthorizationCodeConfig,
    http: LazyHttpClient,
}

impl AuthorizationCodeFlow {
    /// Creates a flow that builds its own HTTP client on first use.
    pub fn new(config: AuthorizationCodeConfig) -> Self {
        Self {
            config,
            http: LazyHttpClient::new(),
        }
    }

    /// Creates a flow that uses an injected HTTP client.
    pub fn with_http_client(config: AuthorizationCodeConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            http: LazyHttpClient::with_client(client),
        }
    }

    /// Flow configuration.
    pub fn config(&self) -> &AuthorizationCodeConfig {
        &self.config
    }

    /// Builds the provider authorization URL for `state`.
    ///
    /// A fresh PKCE pair is generated on every call. The caller must store
    /// `state -> pkce.code_verifier` before redirecting the user.
    ///
    /// # Errors
    ///
    /// Returns [`KeplerError::OAuth`] if the configured authorization URL is
    /// not a valid absolute URL.
    pub fn create_authorization_url(&self, state: &str) -> Result<(String, PkcePair)> {
        let pkce = create_pkce_pair();

        let mut url = Url::parse(&self.config.authorization_url)
            .map_err(|e| KeplerError::OAuth(format!("invalid authorization endpoint URL: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", &self.config.redirect_uri);
            query.append_pair("scope", &self.config.scope);
            query.append_pair("state", state);
            query.append_pair("code_challenge", &pkce.code_challenge);
            query.append_pair("code_challenge_method", CODE_CHALLENGE_METHOD);
        }

        Ok((url.to_string(), pkce))
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// # Arguments
    ///
    /// * `code` - Authorization code from the provider callback
    /// * `code_verifier` - PKCE verifier stored for the callback's `state`
    ///
    /// # Errors
    ///
    /// Returns [`KeplerError::OAuth`] on a transport failure or an error status
    /// from the token endpoint.
    pub async fn exchange_code_for_tokens(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", code_verifier),
        ];
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret.expose()));
        }

        let client = self.http.get()?;
        let tokens = post_token_request(&client, &self.config.token_url, &params).await?;
        tracing::info!("Exchanged authorization code for tokens");
        Ok(tokens)
    }

    /// Fetches the user profile from the configured userinfo endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`KeplerError::OAuth`] when no userinfo endpoint is configured,
    /// on transport failure, or on an error status.
    pub async fn get_user_info(&self, access_token: &str) -> Result<Map<String, Value>> {
        let userinfo_url = self
            .config
            .userinfo_url
            .as_deref()
            .ok_or_else(|| KeplerError::OAuth("Userinfo endpoint not configured".to_string()))?;

        let client = self.http.get()?;
        let resp = client
            .get(userinfo_url)
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .header(ACCEPT, "application/json")
            .timeout(OAUTH_HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| KeplerError::OAuth(format!("userinfo request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(KeplerError::OAuth(format!(
                "userinfo endpoint returned {status}: {body}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| KeplerError::OAuth(format!("failed to parse userinfo response: {e}")))
    }

    /// Releases the HTTP client. A later call lazily creates a new one.
    pub fn close(&self) {
        self.http.close();
    }
}

#[async_trait]
impl TokenRefresher for AuthorizationCodeFlow {
    /// Refreshes tokens, keeping the old refresh token when the provider does
    /// not rotate it.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenSet> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret.expose()));
        }

        let client = self.http.get()?;
        let mut tokens = post_token_request(&client, &self.config.token_url, &params).await?;
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }

        tracing::debug!("Refreshed access token");
        Ok(tokens)
    }

    fn refresh_buffer(&self) -> Duration {
        self.config.refresh_buffer
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
