/// Token Service
///
/// Issues, verifies, rotates and revokes session tokens by composing the
/// codec, the family registry and the invalidation store.
///
/// Family lifecycle:
/// - `Active(N) --rotate(N)-->   Active(N+1)`
/// - `Active(N) --rotate(M≠N)--> Compromised` (terminal)
/// - `Active    --terminate-->   Terminated` (terminal)
///
/// Only a fresh login leaves a terminal state, and it does so by creating an
/// unrelated family.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenType};
use crate::auth::family::{FamilyRegistry, FamilyState, RotationOutcome};
use crate::auth::invalidation::InvalidationStore;
use crate::auth::jwt::TokenCodec;
use crate::clock::Clock;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, ConfigError};
use crate::fingerprint::Fingerprint;

/// Freshly signed access/refresh pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub family_id: Uuid,
    /// Access token lifetime in seconds
    pub access_expires_in: i64,
    /// Refresh token lifetime in seconds
    pub refresh_expires_in: i64,
}

/// What a cleanup pass reclaimed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub invalidated_removed: usize,
    pub families_removed: usize,
}

pub struct TokenService {
    codec: TokenCodec,
    families: FamilyRegistry,
    invalidated: InvalidationStore,
    clock: Arc<dyn Clock>,
    config: JwtSettings,
}

impl TokenService {
    /// # Errors
    /// Returns `ConfigError` if the JWT settings are unusable
    pub fn new(config: JwtSettings, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        let codec = TokenCodec::new(&config)?;

        Ok(Self {
            codec,
            families: FamilyRegistry::new(Duration::seconds(config.family_max_lifetime)),
            invalidated: InvalidationStore::new(),
            clock,
            config,
        })
    }

    pub fn config(&self) -> &JwtSettings {
        &self.config
    }

    pub fn families(&self) -> &FamilyRegistry {
        &self.families
    }

    pub fn invalidations(&self) -> &InvalidationStore {
        &self.invalidated
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Start a new session for `user_id`
    ///
    /// Creates a new family bound to `fingerprint` and signs its first
    /// access/refresh pair.
    pub fn issue_initial_tokens(
        &self,
        user_id: &str,
        fingerprint: Fingerprint,
    ) -> Result<TokenPair, AppError> {
        let now = self.clock.now();
        let (family_id, refresh_id) = self.families.create_family(user_id, fingerprint.clone(), now);

        let pair = self
            .sign_pair(user_id, family_id, refresh_id, &fingerprint, now)
            .inspect_err(|_| {
                self.families.terminate(&family_id);
            })?;

        tracing::info!(user_id = %user_id, family_id = %family_id, "Token family created");
        Ok(pair)
    }

    /// Authenticate an access token
    ///
    /// `fingerprint`, when given, must match the one the token was issued to.
    pub fn verify_access(
        &self,
        token: &str,
        fingerprint: Option<&Fingerprint>,
    ) -> Result<Claims, AuthError> {
        let claims = self.codec.decode(token, TokenType::Access, self.clock.now())?;

        if self.invalidated.is_invalidated(&claims.jti) {
            return Err(AuthError::TokenRevoked);
        }

        match self.families.state(&claims.family_id) {
            Some(FamilyState::Compromised) => return Err(AuthError::FamilyCompromised),
            Some(FamilyState::Terminated) => return Err(AuthError::TokenRevoked),
            Some(FamilyState::Active) | None => {}
        }

        if let Some(presented) = fingerprint {
            if *presented != claims.fingerprint {
                return Err(AuthError::FingerprintMismatch);
            }
        }

        Ok(claims)
    }

    /// Exchange a refresh token for a new pair, advancing its family
    ///
    /// # Errors
    /// - codec failures (`MalformedToken`, `ExpiredToken`, `WrongTokenType`)
    /// - `FamilyCompromised`: a superseded token of a live family was presented
    /// - `TokenRevoked`: the token was revoked and its family is already closed
    /// - `FingerprintMismatch`: presented from a different client context
    /// - `InvalidTokenFamily`: the family is unknown or closed
    /// - `FamilyExpired`: the family outlived its absolute deadline
    pub fn rotate(
        &self,
        refresh_token: &str,
        fingerprint: &Fingerprint,
    ) -> Result<TokenPair, AppError> {
        let now = self.clock.now();
        let claims = self.codec.decode(refresh_token, TokenType::Refresh, now)?;

        if self.invalidated.is_invalidated(&claims.jti) {
            if self.families.mark_compromised(&claims.family_id) {
                tracing::warn!(
                    family_id = %claims.family_id,
                    user_id = %claims.sub,
                    token_id = %claims.jti,
                    security_event = true,
                    "Revoked refresh token replayed, family compromised"
                );
                return Err(AuthError::FamilyCompromised.into());
            }
            return Err(AuthError::TokenRevoked.into());
        }

        if !self.families.check_fingerprint(&claims.family_id, fingerprint) {
            tracing::warn!(
                family_id = %claims.family_id,
                user_id = %claims.sub,
                security_event = true,
                "Refresh token presented with a different fingerprint"
            );
            return Err(AuthError::FingerprintMismatch.into());
        }

        // Sign before swapping so a signing failure leaves the family untouched
        let new_refresh_id = Uuid::new_v4();
        let pair = self.sign_pair(&claims.sub, claims.family_id, new_refresh_id, fingerprint, now)?;

        match self
            .families
            .rotate(&claims.family_id, &claims.jti, new_refresh_id, now)
        {
            RotationOutcome::Rotated { generation } => {
                self.invalidated.invalidate(claims.jti, claims.expires_at());
                tracing::info!(
                    family_id = %claims.family_id,
                    user_id = %claims.sub,
                    generation,
                    "Refresh token rotated"
                );
                Ok(pair)
            }
            RotationOutcome::Stale => Err(AuthError::InvalidTokenFamily.into()),
            RotationOutcome::Compromised => Err(AuthError::FamilyCompromised.into()),
            RotationOutcome::Expired => Err(AuthError::FamilyExpired.into()),
        }
    }

    /// Revoke a token id until its natural expiry
    ///
    /// When `family_id` is given the family is terminated as well.
    pub fn invalidate(&self, token_id: Uuid, expires_at: DateTime<Utc>, family_id: Option<Uuid>) {
        self.invalidated.invalidate(token_id, expires_at);
        if let Some(family_id) = family_id {
            self.families.terminate(&family_id);
        }
    }

    /// End a session from whatever credentials the client still holds
    ///
    /// Unreadable or already expired refresh tokens are ignored. A superseded
    /// refresh token compromises its family, exactly as it would on rotation.
    ///
    /// # Returns
    /// Number of tokens revoked
    pub fn logout(&self, refresh_token: Option<&str>, access_claims: Option<&Claims>) -> usize {
        let mut revoked = 0;

        if let Some(token) = refresh_token {
            match self.codec.decode(token, TokenType::Refresh, self.clock.now()) {
                Ok(claims) => {
                    if self.is_superseded(&claims) && self.families.mark_compromised(&claims.family_id) {
                        tracing::warn!(
                            family_id = %claims.family_id,
                            user_id = %claims.sub,
                            token_id = %claims.jti,
                            security_event = true,
                            "Superseded refresh token presented at logout, family compromised"
                        );
                    }
                    self.invalidate(claims.jti, claims.expires_at(), Some(claims.family_id));
                    revoked += 1;
                }
                Err(e) => tracing::debug!(error = %e, "Ignoring unusable refresh token on logout"),
            }
        }

        if let Some(claims) = access_claims {
            self.invalidate(claims.jti, claims.expires_at(), Some(claims.family_id));
            revoked += 1;
        }

        revoked
    }

    /// Reclaim invalidation entries and families that can no longer matter
    pub fn purge_expired(&self) -> SweepReport {
        let now = self.clock.now();
        SweepReport {
            invalidated_removed: self.invalidated.sweep(now),
            families_removed: self.families.purge_expired(now),
        }
    }

    /// A refresh token that is no longer its family's current one
    fn is_superseded(&self, claims: &Claims) -> bool {
        self.invalidated.is_invalidated(&claims.jti)
            || self
                .families
                .get(&claims.family_id)
                .is_some_and(|record| record.current_token_id != claims.jti)
    }

    fn sign_pair(
        &self,
        user_id: &str,
        family_id: Uuid,
        refresh_id: Uuid,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, AppError> {
        let access_claims = Claims::new(
            user_id,
            Uuid::new_v4(),
            TokenType::Access,
            family_id,
            fingerprint.clone(),
            now,
            self.config.access_token_expiry,
            self.config.issuer.as_str(),
        );
        let refresh_claims = Claims::new(
            user_id,
            refresh_id,
            TokenType::Refresh,
            family_id,
            fingerprint.clone(),
            now,
            self.config.refresh_token_expiry,
            self.config.issuer.as_str(),
        );

        Ok(TokenPair {
            access_token: self.codec.issue(&access_claims)?,
            refresh_token: self.codec.issue(&refresh_claims)?,
            family_id,
            access_expires_in: self.config.access_token_expiry,
            refresh_expires_in: self.config.refresh_token_expiry,
        })
    }
}
