//! OAuth token persistence keyed by user identity
//!
//! Two backends implement [`TokenStore`]:
//!
//! - [`InMemoryTokenStore`] keeps tokens for the lifetime of the process.
//! - [`EncryptedFileTokenStore`] keeps an AES-256-GCM encrypted file on disk
//!   and an authoritative decrypted cache in memory.
//!
//! # On-disk format
//!
//! The file holds one base64url string encoding
//! `[version: u8 = 1][nonce: 12 bytes][ciphertext + tag]`. The plaintext is a
//! JSON object mapping user id to
//! `{access_token, refresh_token, expires_at, token_type, scope}` with
//! `expires_at` in epoch seconds. Every write re-encrypts the whole mapping
//! with a fresh nonce and atomically replaces the file.

use std::collections::{BTreeMap, HashMap};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::{alphabet, Engine as _};
use rand::RngCore as _;
use tokio::sync::Mutex;

use crate::error::{Result, TokenStoreError};
use crate::oauth::flow::TokenRefresher;
use crate::oauth::token::TokenSet;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const FORMAT_VERSION: u8 = 1;

/// URL-safe base64 that writes without padding and reads either form.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// ---------------------------------------------------------------------------
// TokenStore
// ---------------------------------------------------------------------------

/// Storage for OAuth token sets keyed by user id.
///
/// Implementations guard their state with their own lock; each call is atomic
/// with respect to other calls on the same instance.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Stores `tokens` for `user_id`, replacing any previous set.
    async fn store_tokens(&self, user_id: &str, tokens: &TokenSet) -> Result<()>;

    /// Returns the stored tokens for `user_id`, if any.
    async fn get_tokens(&self, user_id: &str) -> Result<Option<TokenSet>>;

    /// Removes the tokens for `user_id`. Missing entries are not an error.
    async fn delete_tokens(&self, user_id: &str) -> Result<()>;

    /// Returns current tokens for `user_id`, refreshing them first when they
    /// are inside the refresher's refresh window.
    ///
    /// A failed refresh is not propagated: the stored tokens are returned if
    /// they have not yet expired, otherwise `None`. A failure to persist the
    /// refreshed tokens is propagated.
    async fn refresh_if_needed(
        &self,
        user_id: &str,
        refresher: &dyn TokenRefresher,
    ) -> Result<Option<TokenSet>> {
        let Some(tokens) = self.get_tokens(user_id).await? else {
            return Ok(None);
        };

        if !tokens.needs_refresh_within(refresher.refresh_buffer()) {
            return Ok(Some(tokens));
        }

        let Some(refresh_token) = tokens.refresh_token.as_deref() else {
            return Ok(Some(tokens));
        };

        match refresher.refresh_access_token(refresh_token).await {
            Ok(refreshed) => {
                self.store_tokens(user_id, &refreshed).await?;
                tracing::debug!(user_id, "Stored refreshed tokens");
                Ok(Some(refreshed))
            }
            Err(e) if !tokens.is_expired() => {
                tracing::warn!(user_id, error = %e, "Token refresh failed, using existing token");
                Ok(Some(tokens))
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Token refresh failed and token has expired");
                Ok(None)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// InMemoryTokenStore
// ---------------------------------------------------------------------------

/// Process-local token store. Tokens are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tokens: Mutex<HashMap<String, TokenSet>>,
}

impl InMemoryTokenStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn store_tokens(&self, user_id: &str, tokens: &TokenSet) -> Result<()> {
        self.tokens
            .lock()
            .await
            .insert(user_id.to_string(), tokens.clone());
        Ok(())
    }

    async fn get_tokens(&self, user_id: &str) -> Result<Option<TokenSet>> {
        Ok(self.tokens.lock().await.get(user_id).cloned())
    }

    async fn delete_tokens(&self, user_id: &str) -> Result<()> {
        self.tokens.lock().await.remove(user_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EncryptedFileTokenStore
// ---------------------------------------------------------------------------

/// Token store persisted as a single AES-256-GCM encrypted file.
///
/// The file is read and decrypted on first access; from then on the in-memory
/// copy is authoritative. Only one process should own a given file.
///
/// # Examples
///
/// ```no_run
/// use chrono::{Duration, Utc};
/// use kepler_mcp_gitlab::oauth::token::TokenSet;
/// use kepler_mcp_gitlab::oauth::token_store::{
///     generate_encryption_key, EncryptedFileTokenStore, TokenStore,
/// };
///
/// # async fn example() -> kepler_mcp_gitlab::error::Result<()> {
/// let store = EncryptedFileTokenStore::new("/var/lib/kepler/tokens.enc", &generate_encryption_key())?;
/// store.store_tokens("42", &TokenSet::new("at", Utc::now() + Duration::hours(1))).await?;
/// assert!(store.get_tokens("42").await?.is_some());
/// # Ok(())
/// # }
/// ```
pub struct EncryptedFileTokenStore {
    path: PathBuf,
    cipher: Aes256Gcm,
    cache: Mutex<Option<BTreeMap<String, TokenSet>>>,
}

impl std::fmt::Debug for EncryptedFileTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFileTokenStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl EncryptedFileTokenStore {
    /// Creates a store backed by `path` using a base64url encoded 32-byte key.
    ///
    /// The file is not touched until the first operation.
    ///
    /// # Errors
    ///
    /// Returns [`TokenStoreError::InvalidKey`] if the key does not decode to
    /// exactly 32 bytes.
    pub fn new(path: impl Into<PathBuf>, encryption_key: &str) -> Result<Self> {
        let key = BASE64URL
            .decode(encryption_key.trim())
            .map_err(|e| TokenStoreError::InvalidKey(format!("not valid base64url: {e}")))?;

        if key.len() != KEY_LEN {
            return Err(TokenStoreError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                key.len()
            ))
            .into());
        }

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| TokenStoreError::InvalidKey(e.to_string()))?;

        Ok(Self {
            path: path.into(),
            cipher,
            cache: Mutex::new(None),
        })
    }

    /// Path of the encrypted file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the mapping from disk into `cache` if not yet loaded.
    async fn hydrate<'a>(
        &self,
        cache: &'a mut Option<BTreeMap<String, TokenSet>>,
    ) -> Result<&'a mut BTreeMap<String, TokenSet>> {
        if cache.is_none() {
            let loaded = match tokio::fs::read_to_string(&self.path).await {
                Ok(contents) => self.open(&contents)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
                Err(e) => return Err(TokenStoreError::Io(e).into()),
            };
            tracing::debug!(path = %self.path.display(), users = loaded.len(), "Loaded token file");
            *cache = Some(loaded);
        }

        Ok(cache.get_or_insert_with(BTreeMap::new))
    }

    /// Encrypts and atomically writes the full mapping.
    async fn persist(&self, tokens: &BTreeMap<String, TokenSet>) -> Result<()> {
        let plaintext = serde_json::to_vec(tokens)?;
        let sealed = self.seal(&plaintext)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, &sealed))
            .await
            .map_err(|e| TokenStoreError::Io(std::io::Error::other(e)))?
            .map_err(TokenStoreError::Io)?;
        Ok(())
    }

    fn seal(&self, plaintext: &[u8]) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| TokenStoreError::Encryption(e.to_string()))?;

        let mut blob = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        blob.push(FORMAT_VERSION);
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64URL.encode(blob))
    }

    fn open(&self, contents: &str) -> Result<BTreeMap<String, TokenSet>> {
        let blob = BASE64URL
            .decode(contents.trim())
            .map_err(|e| TokenStoreError::Decryption(format!("invalid encoding: {e}")))?;

        if blob.len() < 1 + NONCE_LEN || blob[0] != FORMAT_VERSION {
            return Err(TokenStoreError::Decryption("unrecognised file header".to_string()).into());
        }

        let (nonce_bytes, ciphertext) = blob[1..].split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| {
                TokenStoreError::Decryption("wrong key or corrupted data".to_string())
            })?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| TokenStoreError::Parse(e.to_string()).into())
    }
}

#[async_trait]
impl TokenStore for EncryptedFileTokenStore {
    async fn store_tokens(&self, user_id: &str, tokens: &TokenSet) -> Result<()> {
        let mut guard = self.cache.lock().await;
        let cache = self.hydrate(&mut guard).await?;

        let mut updated = cache.clone();
        updated.insert(user_id.to_string(), tokens.clone());
        self.persist(&updated).await?;
        *cache = updated;
        Ok(())
    }

    async fn get_tokens(&self, user_id: &str) -> Result<Option<TokenSet>> {
        let mut guard = self.cache.lock().await;
        let cache = self.hydrate(&mut guard).await?;
        Ok(cache.get(user_id).cloned())
    }

    async fn delete_tokens(&self, user_id: &str) -> Result<()> {
        let mut guard = self.cache.lock().await;
        let cache = self.hydrate(&mut guard).await?;
        if !cache.contains_key(user_id) {
            return Ok(());
        }

        let mut updated = cache.clone();
        updated.remove(user_id);
        self.persist(&updated).await?;
        *cache = updated;
        Ok(())
    }
}

fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Factories
// ---------------------------------------------------------------------------

/// Generates a random key for [`EncryptedFileTokenStore`].
pub fn generate_encryption_key() -> String {
    let mut key = [0u8; KEY_LEN];
    rand::rng().fill_bytes(&mut key);
    BASE64URL.encode(key)
}

/// Builds the configured token store.
///
/// The encrypted file backend is used only when both `path` and
/// `encryption_key` are supplied; otherwise tokens are kept in memory.
///
/// # Errors
///
/// Returns [`TokenStoreError::InvalidKey`] for a malformed key.
pub fn create_token_store(
    path: Option<&Path>,
    encryption_key: Option<&str>,
) -> Result<Arc<dyn TokenStore>> {
    match (path, encryption_key) {
        (Some(path), Some(key)) if !key.is_empty() => {
            tracing::info!(path = %path.display(), "Using encrypted file token store");
            Ok(Arc::new(EncryptedFileTokenStore::new(path, key)?))
        }
        _ => {
            tracing::info!("Using in-memory token store");
            Ok(Arc::new(InMemoryTokenStore::new()))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KeplerError;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn sample_tokens() -> TokenSet {
        TokenSet {
            refresh_token: Some("RT1".to_string()),
            scope: Some("api".to_string()),
            ..TokenSet::new("AT1", Utc::now() + Duration::hours(1))
        }
    }

    #[tokio::test]
    async fn test_in_memory_store_get_delete() {
        let store = InMemoryTokenStore::new();
        store.store_tokens("u1", &sample_tokens()).await.unwrap();
        assert_eq!(store.get_tokens("u1").await.unwrap(), Some(sample_tokens()));
        store.delete_tokens("u1").await.unwrap();
        assert!(store.get_tokens("u1").await.unwrap().is_none());
        store.delete_tokens("u1").await.unwrap();
    }

    #[test]
    fn test_invalid_keys_are_rejected() {
        let short = BASE64URL.encode([0u8; 16]);
        assert!(matches!(
            EncryptedFileTokenStore::new("/tmp/x", &short),
            Err(KeplerError::TokenStore(TokenStoreError::InvalidKey(_)))
        ));
        assert!(matches!(
            EncryptedFileTokenStore::new("/tmp/x", "not base64 !!"),
            Err(KeplerError::TokenStore(TokenStoreError::InvalidKey(_)))
        ));
    }

    #[test]
    fn test_padded_key_is_accepted() {
        let padded = base64::engine::general_purpose::URL_SAFE.encode([7u8; 32]);
        assert!(padded.ends_with('='));
        assert!(EncryptedFileTokenStore::new("/tmp/x", &padded).is_ok());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store =
            EncryptedFileTokenStore::new(dir.path().join("tokens.enc"), &generate_encryption_key())
                .unwrap();
        assert!(store.get_tokens("nobody").await.unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_file_is_not_plaintext() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.enc");
        let store = EncryptedFileTokenStore::new(&path, &generate_encryption_key()).unwrap();
        store.store_tokens("u1", &sample_tokens()).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("AT1"));
        assert!(!raw.contains("access_token"));
    }

    #[tokio::test]
    async fn test_encrypted_payload_with_bad_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.enc");
        let key = generate_encryption_key();
        let writer = EncryptedFileTokenStore::new(&path, &key).unwrap();
        let sealed = writer.seal(b"{\"u1\": {\"access_token\": \"x\"}}").unwrap();
        std::fs::write(&path, sealed).unwrap();

        let reader = EncryptedFileTokenStore::new(&path, &key).unwrap();
        assert!(matches!(
            reader.get_tokens("u1").await,
            Err(KeplerError::TokenStore(TokenStoreError::Parse(_)))
        ));
    }

    #[tokio::test]
    async fn test_corrupted_file_is_decryption_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.enc");
        std::fs::write(&path, "AAAA").unwrap();

        let store = EncryptedFileTokenStore::new(&path, &generate_encryption_key()).unwrap();
        assert!(matches!(
            store.get_tokens("u1").await,
            Err(KeplerError::TokenStore(TokenStoreError::Decryption(_)))
        ));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_unchanged() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        let path = data_dir.join("tokens.enc");
        let store = EncryptedFileTokenStore::new(&path, &generate_encryption_key()).unwrap();
        store.store_tokens("u1", &sample_tokens()).await.unwrap();

        // A regular file where the directory was makes every write fail.
        std::fs::remove_dir_all(&data_dir).unwrap();
        std::fs::write(&data_dir, "not a directory").unwrap();

        let replacement = TokenSet::new("AT2", Utc::now() + Duration::hours(1));
        assert!(store.store_tokens("u1", &replacement).await.is_err());
        assert!(store.store_tokens("u2", &replacement).await.is_err());
        assert!(store.delete_tokens("u1").await.is_err());

        assert_eq!(store.get_tokens("u1").await.unwrap(), Some(sample_tokens()));
        assert!(store.get_tokens("u2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_of_unknown_user_does_not_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.enc");
        let store = EncryptedFileTokenStore::new(&path, &generate_encryption_key()).unwrap();
        store.delete_tokens("ghost").await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_factory_falls_back_to_memory_without_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.enc");
        let store = create_token_store(Some(&path), None).unwrap();
        store.store_tokens("u1", &sample_tokens()).await.unwrap();
        assert!(!path.exists());
    }
}
