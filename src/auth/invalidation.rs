/// Invalidation Store
///
/// Time-indexed set of revoked token ids. Every verification consults it;
/// entries only need to outlive the token's own `exp`, after which the
/// signature-expiry check rejects the token anyway and the entry is swept.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InvalidationStore {
    entries: RwLock<HashMap<Uuid, DateTime<Utc>>>,
}

impl InvalidationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a token id unusable until `expires_at`
    ///
    /// Re-invalidating keeps the later of the two expiries.
    pub fn invalidate(&self, token_id: Uuid, expires_at: DateTime<Utc>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(token_id)
            .and_modify(|existing| {
                if expires_at > *existing {
                    *existing = expires_at;
                }
            })
            .or_insert(expires_at);
    }

    pub fn is_invalidated(&self, token_id: &Uuid) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(token_id)
    }

    /// Remove entries whose expiry is at or before `now`
    ///
    /// # Returns
    /// Number of entries removed
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        entries.shrink_to_fit();
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
