//! Shared HTTP plumbing for the OAuth flows
//!
//! Both flows talk to a token endpoint with form-encoded grants and parse the
//! same response shape, and both own a lazily built client that can be
//! released explicitly.

use std::sync::Mutex;
use std::time::Duration;

use reqwest::header::ACCEPT;

use crate::error::{KeplerError, Result};
use crate::oauth::token::{TokenResponse, TokenSet};

/// Fixed timeout applied to every identity provider request.
pub const OAUTH_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// A `reqwest::Client` slot that is filled on first use.
///
/// `reqwest::Client` is internally reference counted, so handing out clones
/// keeps a single connection pool until [`LazyHttpClient::close`] drops it.
#[derive(Debug, Default)]
pub struct LazyHttpClient {
    slot: Mutex<Option<reqwest::Client>>,
}

impl LazyHttpClient {
    /// Creates an empty slot; the client is built on first request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a slot pre-filled with an injected client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            slot: Mutex::new(Some(client)),
        }
    }

    /// Returns the shared client, building it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`KeplerError::OAuth`] if the TLS backend cannot initialise.
    pub fn get(&self) -> Result<reqwest::Client> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let client = reqwest::Client::builder()
            .timeout(OAUTH_HTTP_TIMEOUT)
            .build()
            .map_err(|e| KeplerError::OAuth(format!("failed to build HTTP client: {e}")))?;
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Drops the shared client. A later request builds a new one.
    pub fn close(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }

    /// Returns `true` while a client is held.
    pub fn is_open(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

/// POSTs a form-encoded grant to a token endpoint and parses the token set.
///
/// # Errors
///
/// Returns [`KeplerError::OAuth`] on transport failure, a non-success status
/// (the status and body are included in the message), or a malformed body.
pub(crate) async fn post_token_request(
    client: &reqwest::Client,
    token_url: &str,
    params: &[(&str, &str)],
) -> Result<TokenSet> {
    let resp = client
        .post(token_url)
        .header(ACCEPT, "application/json")
        .timeout(OAUTH_HTTP_TIMEOUT)
        .form(params)
        .send()
        .await
        .map_err(|e| KeplerError::OAuth(format!("token request failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(KeplerError::OAuth(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let raw: TokenResponse = resp
        .json()
        .await
        .map_err(|e| KeplerError::OAuth(format!("failed to parse token response: {e}")))?;

    Ok(TokenSet::from_token_response(raw))
}
