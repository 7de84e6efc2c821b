//! Security helpers shared by the OAuth layer and the transports
//!
//! Random token generation, constant-time comparison, and redaction of
//! credentials before they reach logs.

use base64::Engine as _;
use rand::RngCore as _;
use serde_json::Value;
use std::fmt;
use subtle::ConstantTimeEq;

/// Keys whose values are replaced by [`mask_sensitive_data`].
const SENSITIVE_KEYS: &[&str] = &[
    "access_token",
    "refresh_token",
    "token",
    "secret",
    "password",
    "client_secret",
    "authorization",
    "auth_token",
];

const MASK: &str = "***";

/// Generates a URL-safe random token from `nbytes` bytes of OS entropy.
///
/// The result is base64url encoded without padding, so 32 bytes produce a
/// 43-character string.
///
/// # Examples
///
/// ```
/// use kepler_mcp_gitlab::security::generate_secure_token;
///
/// let token = generate_secure_token(32);
/// assert_eq!(token.len(), 43);
/// ```
pub fn generate_secure_token(nbytes: usize) -> String {
    let mut bytes = vec![0u8; nbytes];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&bytes)
}

/// Returns a log-safe placeholder for a secret value.
pub fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<empty>"
    } else {
        MASK
    }
}

/// Compares two strings without short-circuiting on the first mismatch.
pub fn constant_time_equals(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Validates a shared bearer token supplied by a client.
///
/// When no token is expected, only an empty `provided` value passes.
///
/// # Examples
///
/// ```
/// use kepler_mcp_gitlab::security::validate_shared_token;
///
/// assert!(validate_shared_token("abc", Some("abc")));
/// assert!(!validate_shared_token("abc", Some("abd")));
/// assert!(validate_shared_token("", None));
/// assert!(!validate_shared_token("abc", None));
/// ```
pub fn validate_shared_token(provided: &str, expected: Option<&str>) -> bool {
    match expected {
        Some(expected) if !expected.is_empty() => constant_time_equals(provided, expected),
        _ => provided.is_empty(),
    }
}

/// Returns a copy of `value` with credential-bearing fields replaced by `***`.
///
/// Matching is case-insensitive on object keys and recurses through nested
/// objects and arrays.
pub fn mask_sensitive_data(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| {
                    let lowered = key.to_ascii_lowercase();
                    if SENSITIVE_KEYS.contains(&lowered.as_str()) {
                        (key.clone(), Value::String(MASK.to_string()))
                    } else {
                        (key.clone(), mask_sensitive_data(inner))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(mask_sensitive_data).collect()),
        other => other.clone(),
    }
}

/// A string that never prints its contents through `Debug` or `Display`.
///
/// Used for client secrets, static tokens and encryption keys carried in
/// configuration structs that are logged with `{:?}`.
#[derive(Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    /// Wraps a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the underlying secret.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `true` when the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString({})", redact(&self.0))
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(redact(&self.0))
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
