//! OAuth token sets and token endpoint responses

use chrono::{DateTime, Duration, SubsecRound as _, Utc};
use serde::{Deserialize, Serialize};

/// Lifetime assumed when the provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// How long before expiry a token is considered due for refresh.
pub const DEFAULT_REFRESH_BUFFER_SECS: i64 = 300;

fn default_token_type() -> String {
    "Bearer".to_string()
}

// ---------------------------------------------------------------------------
// TokenResponse
// ---------------------------------------------------------------------------

/// The JSON body returned by an OAuth token endpoint (RFC 6749 section 5.1).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Issued access token.
    pub access_token: String,
    /// Token type, usually `"Bearer"`.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds from issue.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Refresh token, when the grant issues one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Granted scopes, space separated.
    #[serde(default)]
    pub scope: Option<String>,
}

// ---------------------------------------------------------------------------
// TokenSet
// ---------------------------------------------------------------------------

/// An immutable set of OAuth tokens with an absolute expiry.
///
/// `expires_at` is always absolute and truncated to whole seconds, so a token
/// set survives persistence as epoch seconds unchanged. Refreshing produces a
/// new `TokenSet`; existing values are never mutated.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use kepler_mcp_gitlab::oauth::token::TokenSet;
///
/// let tokens = TokenSet::new("at", Utc::now() + Duration::minutes(2));
/// assert!(!tokens.is_expired());
/// assert!(tokens.needs_refresh());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Opaque access token.
    pub access_token: String,
    /// Opaque refresh token, if the provider issued one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Absolute expiry, persisted as epoch seconds.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
    /// Token type used in the `Authorization` header.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenSet {
    /// Creates a bearer token set with no refresh token or scope.
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: expires_at.trunc_subsecs(0),
            token_type: default_token_type(),
            scope: None,
        }
    }

    /// Builds a token set from a token endpoint response.
    ///
    /// `expires_at` is computed from `expires_in` relative to now, defaulting
    /// to one hour. A missing `token_type` defaults to `"Bearer"`.
    pub fn from_token_response(response: TokenResponse) -> Self {
        let expires_in = response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: (Utc::now() + Duration::seconds(expires_in)).trunc_subsecs(0),
            token_type: response.token_type.unwrap_or_else(default_token_type),
            scope: response.scope,
        }
    }

    /// Returns `true` once the access token has passed its expiry.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns `true` within five minutes of expiry.
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh_within(Duration::seconds(DEFAULT_REFRESH_BUFFER_SECS))
    }

    /// Returns `true` when the token expires within `buffer`.
    pub fn needs_refresh_within(&self, buffer: Duration) -> bool {
        Utc::now() >= self.expires_at - buffer
    }

    /// Value for the `Authorization` header, e.g. `Bearer abc`.
    pub fn authorization_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: serde_json::Value) -> TokenResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_from_token_response_applies_defaults() {
        let before = Utc::now();
        let tokens = TokenSet::from_token_response(response(serde_json::json!({
            "access_token": "AT1"
        })));

        assert_eq!(tokens.access_token, "AT1");
        assert_eq!(tokens.token_type, "Bearer");
        assert!(tokens.refresh_token.is_none());
        let lifetime = tokens.expires_at - before;
        assert!(lifetime <= Duration::seconds(3600));
        assert!(lifetime >= Duration::seconds(3598));
    }

    #[test]
    fn test_fresh_token_neither_expired_nor_due() {
        let tokens = TokenSet::from_token_response(response(serde_json::json!({
            "access_token": "AT1",
            "refresh_token": "RT1",
            "expires_in": 3600
        })));
        assert!(!tokens.is_expired());
        assert!(!tokens.needs_refresh());
    }

    #[test]
    fn test_token_inside_buffer_needs_refresh_but_is_valid() {
        let tokens = TokenSet::new("at", Utc::now() + Duration::minutes(2));
        assert!(tokens.needs_refresh());
        assert!(!tokens.is_expired());
    }

    #[test]
    fn test_past_token_is_expired() {
        let tokens = TokenSet::new("at", Utc::now() - Duration::seconds(1));
        assert!(tokens.is_expired());
        assert!(tokens.needs_refresh());
    }

    #[test]
    fn test_custom_refresh_buffer() {
        let tokens = TokenSet::new("at", Utc::now() + Duration::minutes(2));
        assert!(!tokens.needs_refresh_within(Duration::seconds(30)));
    }

    #[test]
    fn test_serde_uses_epoch_seconds() {
        let tokens = TokenSet::new("at", DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        let json = serde_json::to_value(&tokens).unwrap();
        assert_eq!(json["expires_at"], 1_700_000_000);
        let back: TokenSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, tokens);
    }

    #[test]
    fn test_authorization_value() {
        let mut tokens = TokenSet::new("abc", Utc::now());
        tokens.token_type = "bearer".to_string();
        assert_eq!(tokens.authorization_value(), "bearer abc");
    }
}
