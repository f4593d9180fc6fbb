/// JWT Token Codec
///
/// Signs and verifies access and refresh tokens. Each token type has its own
/// HS256 secret, and verification only ever accepts HS256: a token whose
/// header asserts any other algorithm is rejected before its claims are read.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{Claims, TokenType};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, ConfigError};

const ALGORITHM: Algorithm = Algorithm::HS256;

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(name: &str, secret: &str) -> Result<Self, ConfigError> {
        if secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired(name.to_string()));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }
}

pub struct TokenCodec {
    access: KeyPair,
    refresh: KeyPair,
    validation: Validation,
}

impl TokenCodec {
    /// Build a codec from JWT settings
    ///
    /// # Errors
    /// Returns `ConfigError` if either signing secret is unset
    pub fn new(config: &JwtSettings) -> Result<Self, ConfigError> {
        let access = KeyPair::from_secret("jwt.access_secret", &config.access_secret)?;
        let refresh = KeyPair::from_secret("jwt.refresh_secret", &config.refresh_secret)?;

        let mut validation = Validation::new(ALGORITHM);
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // Expiry is checked against the injected clock in `decode`
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            access,
            refresh,
            validation,
        })
    }

    fn keys(&self, token_type: TokenType) -> &KeyPair {
        match token_type {
            TokenType::Access => &self.access,
            TokenType::Refresh => &self.refresh,
        }
    }

    /// Sign claims with the secret matching their declared type
    pub fn issue(&self, claims: &Claims) -> Result<String, AppError> {
        encode(
            &Header::new(ALGORITHM),
            claims,
            &self.keys(claims.token_type).encoding,
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Verify a token and extract its claims
    ///
    /// # Errors
    /// - `MalformedToken`: bad structure, bad signature, foreign algorithm
    /// - `WrongTokenType`: a valid token of the other type
    /// - `ExpiredToken`: `exp` is at or before `now`
    pub fn decode(
        &self,
        token: &str,
        expected: TokenType,
        now: DateTime<Utc>,
    ) -> Result<Claims, AuthError> {
        let claims = match self.verify_with(token, expected) {
            Ok(claims) => claims,
            Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => {
                // Signed with the other type's secret
                let other = match expected {
                    TokenType::Access => TokenType::Refresh,
                    TokenType::Refresh => TokenType::Access,
                };
                if self.verify_with(token, other).is_ok() {
                    tracing::debug!(expected = %expected, "Token signed for the other type");
                    return Err(AuthError::WrongTokenType);
                }
                tracing::debug!("JWT signature rejected");
                return Err(AuthError::MalformedToken);
            }
            Err(e) => {
                tracing::debug!("JWT validation error: {}", e);
                return Err(AuthError::MalformedToken);
            }
        };

        if claims.token_type != expected {
            return Err(AuthError::WrongTokenType);
        }
        if claims.is_expired_at(now) {
            return Err(AuthError::ExpiredToken);
        }
        Ok(claims)
    }

    fn verify_with(
        &self,
        token: &str,
        token_type: TokenType,
    ) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.keys(token_type).decoding, &self.validation)
            .map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;
    use chrono::Duration;
    use uuid::Uuid;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            access_secret: "access-secret-key-at-least-32-characters".to_string(),
            refresh_secret: "refresh-secret-key-at-least-32-characters".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            family_max_lifetime: 2592000,
            issuer: "test".to_string(),
            bind_access_to_fingerprint: true,
        }
    }

    fn claims(token_type: TokenType, now: DateTime<Utc>, ttl: i64) -> Claims {
        Claims::new(
            "user-1",
            Uuid::new_v4(),
            token_type,
            Uuid::new_v4(),
            Fingerprint::from_parts("127.0.0.1", "agent"),
            now,
            ttl,
            "test",
        )
    }

    #[test]
    fn test_issue_and_decode() {
        let codec = TokenCodec::new(&get_test_config()).unwrap();
        let now = Utc::now();
        let original = claims(TokenType::Access, now, 900);

        let token = codec.issue(&original).expect("Failed to generate token");
        let decoded = codec
            .decode(&token, TokenType::Access, now)
            .expect("Failed to validate token");

        assert_eq!(decoded, original);
        // header.payload.signature
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_expired_after_ttl() {
        let codec = TokenCodec::new(&get_test_config()).unwrap();
        let now = Utc::now();
        let token = codec.issue(&claims(TokenType::Refresh, now, 60)).unwrap();

        let result = codec.decode(&token, TokenType::Refresh, now + Duration::seconds(61));

        assert_eq!(result, Err(AuthError::ExpiredToken));
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let codec = TokenCodec::new(&get_test_config()).unwrap();
        let now = Utc::now();
        let token = codec.issue(&claims(TokenType::Refresh, now, 60)).unwrap();

        assert_eq!(
            codec.decode(&token, TokenType::Access, now),
            Err(AuthError::WrongTokenType)
        );
    }

    #[test]
    fn test_mislabelled_type_under_correct_secret() {
        let config = get_test_config();
        let codec = TokenCodec::new(&config).unwrap();
        let now = Utc::now();
        // refresh claims signed with the access secret
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims(TokenType::Refresh, now, 60),
            &EncodingKey::from_secret(config.access_secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(
            codec.decode(&token, TokenType::Access, now),
            Err(AuthError::WrongTokenType)
        );
    }

    #[test]
    fn test_invalid_token() {
        let codec = TokenCodec::new(&get_test_config()).unwrap();

        assert_eq!(
            codec.decode("invalid.token.here", TokenType::Access, Utc::now()),
            Err(AuthError::MalformedToken)
        );
    }

    #[test]
    fn test_tampered_token() {
        let codec = TokenCodec::new(&get_test_config()).unwrap();
        let now = Utc::now();
        let token = codec.issue(&claims(TokenType::Access, now, 60)).unwrap();

        let tampered = format!("{}X", token);

        assert_eq!(
            codec.decode(&tampered, TokenType::Access, now),
            Err(AuthError::MalformedToken)
        );
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let config = get_test_config();
        let codec = TokenCodec::new(&config).unwrap();
        let now = Utc::now();
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims(TokenType::Access, now, 60),
            &EncodingKey::from_secret(config.access_secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(
            codec.decode(&token, TokenType::Access, now),
            Err(AuthError::MalformedToken)
        );
    }

    #[test]
    fn test_wrong_issuer() {
        let mut config = get_test_config();
        let now = Utc::now();
        let token = TokenCodec::new(&config)
            .unwrap()
            .issue(&claims(TokenType::Access, now, 60))
            .unwrap();

        config.issuer = "wrong-issuer".to_string();
        let codec = TokenCodec::new(&config).unwrap();

        assert_eq!(
            codec.decode(&token, TokenType::Access, now),
            Err(AuthError::MalformedToken)
        );
    }

    #[test]
    fn test_missing_secret_is_config_error() {
        let mut config = get_test_config();
        config.access_secret = String::new();

        assert!(matches!(
            TokenCodec::new(&config),
            Err(ConfigError::MissingRequired(_))
        ));
    }
}
