//! Short-lived storage for in-flight authorization requests
//!
//! Links the OAuth `state` parameter to its PKCE verifier between the
//! authorization redirect and the provider callback. Entries are single-use
//! and expire after a fixed window measured from creation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default lifetime of a pending authorization.
pub const DEFAULT_PENDING_STATE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug)]
struct PendingEntry {
    code_verifier: String,
    created_at: Instant,
}

/// Map of `state -> code_verifier` with a fixed expiry.
///
/// # Examples
///
/// ```
/// use kepler_mcp_gitlab::oauth::pending::PendingAuthState;
///
/// let pending = PendingAuthState::new();
/// pending.create_state("state-1", "verifier-1");
///
/// assert_eq!(pending.consume_state("state-1").as_deref(), Some("verifier-1"));
/// assert_eq!(pending.consume_state("state-1"), None);
/// ```
#[derive(Debug)]
pub struct PendingAuthState {
    timeout: Duration,
    entries: Mutex<HashMap<String, PendingEntry>>,
}

impl Default for PendingAuthState {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingAuthState {
    /// Creates a store with the default ten minute window.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_PENDING_STATE_TIMEOUT)
    }

    /// Creates a store with a custom window. A zero window expires every entry.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Records the verifier for `state`, replacing any previous entry.
    pub fn create_state(&self, state: &str, code_verifier: &str) {
        self.lock().insert(
            state.to_string(),
            PendingEntry {
                code_verifier: code_verifier.to_string(),
                created_at: Instant::now(),
            },
        );
    }

    /// Removes and returns the verifier for `state`.
    ///
    /// Returns `None` for unknown states and for expired entries; expired
    /// entries are discarded by the attempt.
    pub fn consume_state(&self, state: &str) -> Option<String> {
        let entry = self.lock().remove(state)?;
        if self.is_expired(&entry) {
            tracing::debug!("Discarded expired authorization state");
            return None;
        }
        Some(entry.code_verifier)
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.created_at.elapsed() < self.timeout);
        before - entries.len()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &PendingEntry) -> bool {
        entry.created_at.elapsed() >= self.timeout
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
