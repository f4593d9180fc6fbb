/// JWT Claims structure
///
/// Payload of access and refresh tokens: subject, a unique token id, the
/// token type, the family id, the issuing request's fingerprint and the
/// standard RFC 7519 time claims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::fingerprint::Fingerprint;

/// Declared use of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (opaque user identifier)
    pub sub: String,
    /// Unique token identifier, never reused
    pub jti: Uuid,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Family shared by every token descended from one login
    #[serde(rename = "fid")]
    pub family_id: Uuid,
    /// Fingerprint of the issuing request
    #[serde(rename = "fgp")]
    pub fingerprint: Fingerprint,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

impl Claims {
    /// Build claims valid for `ttl_seconds` starting at `now`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        subject: impl Into<String>,
        token_id: Uuid,
        token_type: TokenType,
        family_id: Uuid,
        fingerprint: Fingerprint,
        now: DateTime<Utc>,
        ttl_seconds: i64,
        issuer: impl Into<String>,
    ) -> Self {
        let iat = now.timestamp();
        Self {
            sub: subject.into(),
            jti: token_id,
            token_type,
            family_id,
            fingerprint,
            iat,
            exp: iat + ttl_seconds,
            iss: issuer.into(),
        }
    }

    /// Check expiry against the supplied instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }

    /// Expiry as a timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(now: DateTime<Utc>) -> Claims {
        Claims::new(
            "user-42",
            Uuid::new_v4(),
            TokenType::Refresh,
            Uuid::new_v4(),
            Fingerprint::from_parts("127.0.0.1", "agent"),
            now,
            3600,
            "test",
        )
    }

    #[test]
    fn test_claims_creation() {
        let now = Utc::now();
        let claims = sample(now);

        assert_eq!(claims.sub, "user-42");
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp, now.timestamp() + 3600);
        assert!(!claims.is_expired_at(now));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let claims = sample(now);

        assert!(!claims.is_expired_at(now + Duration::seconds(3599)));
        assert!(claims.is_expired_at(now + Duration::seconds(3600)));
    }

    #[test]
    fn test_wire_names() {
        let claims = sample(Utc::now());
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["typ"], "refresh");
        assert!(json.get("fid").is_some());
        assert!(json.get("fgp").is_some());
        assert!(json.get("jti").is_some());
    }
}
