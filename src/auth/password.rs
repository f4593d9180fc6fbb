/// Password Hashing and Verification
///
/// bcrypt hashing for the credential check that precedes token issuance.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::{AppError, ValidationError};

const MAX_PASSWORD_LENGTH: usize = 72;

/// Hash a password using bcrypt
///
/// # Errors
/// Returns error if the password is empty, longer than bcrypt accepts,
/// or hashing fails
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash_password_with_cost(password, DEFAULT_COST)
}

pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, AppError> {
    check_length(password)?;

    hash(password, cost)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
///
/// # Errors
/// Returns error if the stored hash is not a bcrypt hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    if password.len() > MAX_PASSWORD_LENGTH {
        return Ok(false);
    }

    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

fn check_length(password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()).into());
    }
    // bcrypt silently truncates beyond 72 bytes
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password".to_string(), MAX_PASSWORD_LENGTH).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_password() {
        let password = "ValidPassword123";
        let hash = hash_password_with_cost(password, TEST_COST).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password_with_cost("ValidPassword123", TEST_COST).unwrap();

        assert!(verify_password("ValidPassword123", &hash).unwrap());
        assert!(!verify_password("WrongPassword123", &hash).unwrap());
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(hash_password_with_cost("", TEST_COST).is_err());
    }

    #[test]
    fn test_too_long_password() {
        let long_password = "a".repeat(MAX_PASSWORD_LENGTH + 1);

        assert!(hash_password_with_cost(&long_password, TEST_COST).is_err());
    }

    #[test]
    fn test_verify_against_garbage_hash() {
        assert!(verify_password("ValidPassword123", "not-a-hash").is_err());
    }
}
