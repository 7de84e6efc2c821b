//! Error types for Kepler MCP GitLab
//!
//! This module defines all error types used throughout the server, using
//! `thiserror` for ergonomic error handling. Authentication, session, token
//! store and rate-limit failures are separate variants so that callers can
//! pick a recovery path (re-authenticate, fix configuration, wait) instead of
//! treating every failure the same way.

use serde_json::{json, Value};
use thiserror::Error;

/// Main error type for Kepler MCP GitLab operations
#[derive(Error, Debug)]
pub enum KeplerError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// OAuth protocol failures: provider HTTP errors, transport failures,
    /// missing endpoints.
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Unknown or expired session. Callers should restart the authorization
    /// redirect rather than report a hard failure.
    #[error("Session error: {0}")]
    Session(String),

    /// Token persistence failures
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),

    /// Outbound request budget exhausted for a key
    #[error("Rate limit exceeded, retry after {retry_after:.1}s")]
    RateLimited {
        /// Estimated seconds until a request would be admitted
        retry_after: f64,
    },

    /// Errors reported by the GitLab REST API
    #[error(transparent)]
    GitLab(#[from] GitLabError),

    /// Tool execution errors
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl KeplerError {
    /// Returns `true` when the error means the caller must authenticate again.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            KeplerError::Session(_) | KeplerError::GitLab(GitLabError::Authentication(_))
        )
    }

    /// Renders a rate-limit error as the JSON payload returned to tool callers.
    ///
    /// Returns `None` for every other variant.
    pub fn rate_limit_payload(&self) -> Option<Value> {
        let retry_after = match self {
            KeplerError::RateLimited { retry_after } => Some(*retry_after),
            KeplerError::GitLab(GitLabError::RateLimited { retry_after, .. }) => {
                Some(retry_after.unwrap_or(0.0))
            }
            _ => None,
        }?;

        Some(json!({
            "error": "rate_limit_exceeded",
            "message": self.to_string(),
            "retry_after": retry_after,
        }))
    }
}

/// Errors raised by token store backends
#[derive(Error, Debug)]
pub enum TokenStoreError {
    /// The configured encryption key is not a valid 256-bit key
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    /// The token file could not be decrypted (wrong key or corrupted data)
    #[error("Failed to decrypt token file: {0}")]
    Decryption(String),

    /// Sealing the token mapping before a write failed
    #[error("Failed to encrypt token file: {0}")]
    Encryption(String),

    /// The decrypted payload is not a well-formed token mapping
    #[error("Failed to parse token file: {0}")]
    Parse(String),

    /// Reading or atomically replacing the token file failed
    #[error("Token file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors mapped from GitLab REST API responses
#[derive(Error, Debug)]
pub enum GitLabError {
    /// 401 Unauthorized
    #[error("GitLab authentication failed: {0}")]
    Authentication(String),

    /// 403 Forbidden
    #[error("GitLab permission denied: {0}")]
    Forbidden(String),

    /// 404 Not Found
    #[error("GitLab resource not found: {0}")]
    NotFound(String),

    /// 409 Conflict
    #[error("GitLab conflict: {0}")]
    Conflict(String),

    /// 429 Too Many Requests
    #[error("GitLab rate limit exceeded: {message}")]
    RateLimited {
        /// Message from the response body
        message: String,
        /// Parsed `Retry-After` header, in seconds
        retry_after: Option<f64>,
    },

    /// 400 Bad Request
    #[error("GitLab validation error: {0}")]
    Validation(String),

    /// Any other non-success status
    #[error("GitLab API error {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message from the response body
        message: String,
    },
}

impl GitLabError {
    /// Maps a non-success HTTP status and extracted message to an error kind.
    ///
    /// # Arguments
    ///
    /// * `status` - HTTP status code returned by GitLab
    /// * `message` - Human-readable message extracted from the body
    /// * `retry_after` - Parsed `Retry-After` header, used for 429 only
    pub fn from_status(status: u16, message: String, retry_after: Option<f64>) -> Self {
        match status {
            400 => GitLabError::Validation(message),
            401 => GitLabError::Authentication(message),
            403 => GitLabError::Forbidden(message),
            404 => GitLabError::NotFound(message),
            409 => GitLabError::Conflict(message),
            429 => GitLabError::RateLimited {
                message,
                retry_after,
            },
            _ => GitLabError::Api { status, message },
        }
    }

    /// HTTP status code this error was mapped from
    pub fn status(&self) -> u16 {
        match self {
            GitLabError::Validation(_) => 400,
            GitLabError::Authentication(_) => 401,
            GitLabError::Forbidden(_) => 403,
            GitLabError::NotFound(_) => 404,
            GitLabError::Conflict(_) => 409,
            GitLabError::RateLimited { .. } => 429,
            GitLabError::Api { status, .. } => *status,
        }
    }
}

/// Result type alias for Kepler MCP GitLab operations
pub type Result<T> = std::result::Result<T, KeplerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = KeplerError::Config("missing client id".to_string());
        assert_eq!(error.to_string(), "Configuration error: missing client id");
    }

    #[test]
    fn test_oauth_error_display() {
        let error = KeplerError::OAuth("token endpoint returned 400".to_string());
        assert_eq!(error.to_string(), "OAuth error: token endpoint returned 400");
    }

    #[test]
    fn test_token_store_decryption_error_display() {
        let error: KeplerError = TokenStoreError::Decryption("aead::Error".to_string()).into();
        assert_eq!(
            error.to_string(),
            "Failed to decrypt token file: aead::Error"
        );
    }

    #[test]
    fn test_token_store_encryption_error_is_distinct_from_decryption() {
        let error: KeplerError = TokenStoreError::Encryption("aead::Error".to_string()).into();
        assert_eq!(error.to_string(), "Failed to encrypt token file: aead::Error");
        assert!(!matches!(
            error,
            KeplerError::TokenStore(TokenStoreError::Decryption(_))
        ));
    }

    #[test]
    fn test_session_error_requires_reauthentication() {
        let error = KeplerError::Session("Invalid or expired session".to_string());
        assert!(error.requires_reauthentication());
        assert!(!KeplerError::OAuth("boom".to_string()).requires_reauthentication());
    }

    #[test]
    fn test_gitlab_error_from_status_maps_known_codes() {
        assert!(matches!(
            GitLabError::from_status(401, "nope".into(), None),
            GitLabError::Authentication(_)
        ));
        assert!(matches!(
            GitLabError::from_status(404, "gone".into(), None),
            GitLabError::NotFound(_)
        ));
        assert!(matches!(
            GitLabError::from_status(502, "bad gateway".into(), None),
            GitLabError::Api { status: 502, .. }
        ));
        assert_eq!(GitLabError::from_status(409, "x".into(), None).status(), 409);
    }

    #[test]
    fn test_rate_limit_payload_contains_retry_after() {
        let error = KeplerError::RateLimited { retry_after: 2.5 };
        let payload = error.rate_limit_payload().expect("payload");
        assert_eq!(payload["error"], "rate_limit_exceeded");
        assert_eq!(payload["retry_after"], 2.5);
        assert!(KeplerError::Tool("x".into()).rate_limit_payload().is_none());
    }
}
