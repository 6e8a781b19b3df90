use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry of revoked token identifiers (jti).
///
/// Each entry records the natural expiry of the revoked token so `prune`
/// can drop entries that no longer matter, bounding growth. Cloning the
/// handle shares the underlying registry, which is safe for concurrent
/// insert/lookup from simultaneous requests.
///
/// This in-process implementation is suitable for single-instance
/// deployments; multi-instance deployments need the same interface backed
/// by a shared store.
#[derive(Debug, Clone, Default)]
pub struct TokenBlocklist {
    inner: Arc<RwLock<HashMap<String, i64>>>,
}

impl TokenBlocklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a jti as revoked until `expires_at` (Unix seconds).
    /// Inserting an already-present jti is a no-op.
    pub fn insert(&self, jti: &str, expires_at: i64) {
        let mut entries = self.inner.write().unwrap_or_else(|e| e.into_inner());
        entries.entry(jti.to_string()).or_insert(expires_at);
    }

    pub fn contains(&self, jti: &str) -> bool {
        let entries = self.inner.read().unwrap_or_else(|e| e.into_inner());
        entries.contains_key(jti)
    }

    /// Drops entries whose recorded expiry is at or before `now`. A token
    /// past its natural expiry fails validation anyway, so its registry
    /// entry carries no information. Returns the number of entries removed.
    pub fn prune(&self, now: i64) -> usize {
        let mut entries = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        let entries = self.inner.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
