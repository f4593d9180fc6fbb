/// Token Family Registry
///
/// Tracks, per refresh-token family, the single refresh token id that may
/// currently be exchanged. Presenting any other token id of a live family
/// means a superseded copy is circulating, so the family is closed for good.
///
/// All mutations run under one registry-wide lock, so two racing rotations
/// of the same family can never both succeed.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

use crate::fingerprint::Fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyState {
    Active,
    /// Reuse of a superseded token was detected
    Compromised,
    /// Closed by logout
    Terminated,
}

impl FamilyState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FamilyState::Active)
    }
}

#[derive(Debug, Clone)]
pub struct FamilyRecord {
    pub user_id: String,
    pub current_token_id: Uuid,
    pub fingerprint: Fingerprint,
    pub created_at: DateTime<Utc>,
    /// 1 for the token issued at login, incremented on each rotation
    pub generation: u32,
    pub max_lifetime_deadline: DateTime<Utc>,
    pub state: FamilyState,
}

/// Result of a rotation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    Rotated { generation: u32 },
    /// Unknown family, or a family that is already terminal
    Stale,
    /// The presented token was superseded; the family is now terminal
    Compromised,
    /// The family outlived its absolute deadline
    Expired,
}

pub struct FamilyRegistry {
    families: RwLock<HashMap<Uuid, FamilyRecord>>,
    max_lifetime: Duration,
}

impl FamilyRegistry {
    pub fn new(max_lifetime: Duration) -> Self {
        Self {
            families: RwLock::new(HashMap::new()),
            max_lifetime,
        }
    }

    /// Allocate a new family and the id of its first refresh token
    pub fn create_family(
        &self,
        user_id: &str,
        fingerprint: Fingerprint,
        now: DateTime<Utc>,
    ) -> (Uuid, Uuid) {
        let family_id = Uuid::new_v4();
        let token_id = Uuid::new_v4();
        let record = FamilyRecord {
            user_id: user_id.to_string(),
            current_token_id: token_id,
            fingerprint,
            created_at: now,
            generation: 1,
            max_lifetime_deadline: now + self.max_lifetime,
            state: FamilyState::Active,
        };

        self.families
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(family_id, record);

        (family_id, token_id)
    }

    /// Advance a family from `presented_token_id` to `new_token_id`
    pub fn rotate(
        &self,
        family_id: &Uuid,
        presented_token_id: &Uuid,
        new_token_id: Uuid,
        now: DateTime<Utc>,
    ) -> RotationOutcome {
        let mut families = self.families.write().unwrap_or_else(PoisonError::into_inner);
        let record = match families.get_mut(family_id) {
            Some(record) if !record.state.is_terminal() => record,
            _ => return RotationOutcome::Stale,
        };

        if now >= record.max_lifetime_deadline {
            return RotationOutcome::Expired;
        }

        if record.current_token_id != *presented_token_id {
            record.state = FamilyState::Compromised;
            tracing::warn!(
                family_id = %family_id,
                user_id = %record.user_id,
                generation = record.generation,
                security_event = true,
                "Superseded refresh token presented, family compromised"
            );
            return RotationOutcome::Compromised;
        }

        record.current_token_id = new_token_id;
        record.generation += 1;
        RotationOutcome::Rotated {
            generation: record.generation,
        }
    }

    /// Compare a presented fingerprint with the one bound at login
    ///
    /// Families this registry does not know are not a fingerprint problem;
    /// rotation reports them as stale.
    pub fn check_fingerprint(&self, family_id: &Uuid, presented: &Fingerprint) -> bool {
        self.families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(family_id)
            .map_or(true, |record| record.fingerprint == *presented)
    }

    /// Close a family on logout
    ///
    /// A compromised family stays compromised.
    pub fn terminate(&self, family_id: &Uuid) {
        let mut families = self.families.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(record) = families.get_mut(family_id) {
            if record.state == FamilyState::Active {
                record.state = FamilyState::Terminated;
            }
        }
    }

    /// Close a live family because one of its superseded tokens came back
    ///
    /// # Returns
    /// `true` if the family was active and is now compromised
    pub fn mark_compromised(&self, family_id: &Uuid) -> bool {
        let mut families = self.families.write().unwrap_or_else(PoisonError::into_inner);
        match families.get_mut(family_id) {
            Some(record) if record.state == FamilyState::Active => {
                record.state = FamilyState::Compromised;
                true
            }
            _ => false,
        }
    }

    pub fn state(&self, family_id: &Uuid) -> Option<FamilyState> {
        self.families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(family_id)
            .map(|record| record.state)
    }

    pub fn get(&self, family_id: &Uuid) -> Option<FamilyRecord> {
        self.families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(family_id)
            .cloned()
    }

    /// Drop families whose absolute deadline has passed
    ///
    /// # Returns
    /// Number of families removed
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut families = self.families.write().unwrap_or_else(PoisonError::into_inner);
        let before = families.len();
        families.retain(|_, record| record.max_lifetime_deadline > now);
        families.shrink_to_fit();
        before - families.len()
    }

    pub fn len(&self) -> usize {
        self.families.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
