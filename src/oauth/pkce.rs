//! PKCE S256 verifier and challenge generation
//!
//! Implements the Proof Key for Code Exchange extension to OAuth 2.0
//! (RFC 7636) using the `S256` challenge method.
//!
//! # How PKCE works
//!
//! 1. The server generates a high-entropy random `code_verifier` and keeps it
//!    in [`PendingAuthState`](crate::oauth::pending::PendingAuthState) keyed
//!    by the OAuth `state`.
//! 2. The SHA-256 digest of the verifier, base64url-encoded, becomes the
//!    `code_challenge` sent on the authorization redirect.
//! 3. The token exchange sends the original verifier, which the provider
//!    hashes and compares against the challenge.
//!
//! # References
//!
//! - RFC 7636 <https://www.rfc-editor.org/rfc/rfc7636>

use base64::Engine as _;
use rand::RngCore as _;
use sha2::{Digest, Sha256};

use crate::error::{KeplerError, Result};

/// Minimum entropy for a code verifier, in bytes.
///
/// 32 bytes encode to 43 base64url characters, the RFC 7636 lower bound.
pub const MIN_VERIFIER_ENTROPY_BYTES: usize = 32;

/// The only challenge method this module produces.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

// ---------------------------------------------------------------------------
// PkcePair
// ---------------------------------------------------------------------------

/// A code verifier and its derived S256 challenge.
///
/// # Examples
///
/// ```
/// use kepler_mcp_gitlab::oauth::pkce::{create_pkce_pair, generate_code_challenge};
///
/// let pair = create_pkce_pair();
/// assert_eq!(generate_code_challenge(&pair.code_verifier), pair.code_challenge);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    /// Secret sent to the token endpoint during the code exchange.
    pub code_verifier: String,
    /// Public value sent on the authorization redirect.
    pub code_challenge: String,
}

// ---------------------------------------------------------------------------
// Public functions
// ---------------------------------------------------------------------------

/// Generates a cryptographically random code verifier.
///
/// # Arguments
///
/// * `entropy_bytes` - Number of random bytes to encode. Must be at least
///   [`MIN_VERIFIER_ENTROPY_BYTES`].
///
/// # Errors
///
/// Returns [`KeplerError::OAuth`] when `entropy_bytes` is below 32.
///
/// # Examples
///
/// ```
/// use kepler_mcp_gitlab::oauth::pkce::generate_code_verifier;
///
/// assert_eq!(generate_code_verifier(32).unwrap().len(), 43);
/// assert!(generate_code_verifier(16).is_err());
/// ```
pub fn generate_code_verifier(entropy_bytes: usize) -> Result<String> {
    if entropy_bytes < MIN_VERIFIER_ENTROPY_BYTES {
        return Err(KeplerError::OAuth(format!(
            "PKCE verifier needs at least {MIN_VERIFIER_ENTROPY_BYTES} bytes of entropy, got {entropy_bytes}"
        )));
    }

    let mut random_bytes = vec![0u8; entropy_bytes];
    rand::rng().fill_bytes(&mut random_bytes);
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes))
}

/// Computes `BASE64URL(SHA256(ASCII(verifier)))` without padding.
pub fn generate_code_challenge(code_verifier: &str) -> String {
    let digest = Sha256::digest(code_verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest.as_slice())
}

/// Generates a fresh verifier with 32 bytes of entropy and its challenge.
pub fn create_pkce_pair() -> PkcePair {
    let mut random_bytes = [0u8; MIN_VERIFIER_ENTROPY_BYTES];
    rand::rng().fill_bytes(&mut random_bytes);
    let code_verifier = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes);
    let code_challenge = generate_code_challenge(&code_verifier);

    PkcePair {
        code_verifier,
        code_challenge,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_matches_rfc7636_appendix_b() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            generate_code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_verifier_below_minimum_entropy_is_rejected() {
        let err = generate_code_verifier(16).unwrap_err();
        assert!(matches!(err, KeplerError::OAuth(_)));
        assert!(err.to_string().contains("32"));
    }

    #[test]
    fn test_verifier_length_follows_entropy() {
        assert_eq!(generate_code_verifier(32).unwrap().len(), 43);
        assert_eq!(generate_code_verifier(96).unwrap().len(), 128);
    }

    #[test]
    fn test_challenge_is_deterministic_and_distinct() {
        let a = generate_code_verifier(32).unwrap();
        let b = generate_code_verifier(32).unwrap();
        assert_eq!(generate_code_challenge(&a), generate_code_challenge(&a));
        assert_ne!(generate_code_challenge(&a), generate_code_challenge(&b));
    }

    #[test]
    fn test_pair_is_self_consistent() {
        for _ in 0..16 {
            let pair = create_pkce_pair();
            assert_eq!(pair.code_verifier.len(), 43);
            assert!(!pair.code_challenge.contains('='));
            assert_eq!(
                generate_code_challenge(&pair.code_verifier),
                pair.code_challenge
            );
        }
    }
}
