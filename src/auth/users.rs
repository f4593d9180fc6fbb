/// User Directory
///
/// The session engine only needs two things from the user store: a
/// credential lookup at login and the role of an authenticated subject.
/// `InMemoryUserDirectory` serves both from accounts seeded at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::configuration::SeedUser;
use crate::error::{AppError, AuthError, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Supplier,
    Admin,
}

impl Role {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "supplier" => Ok(Role::Supplier),
            "admin" => Ok(Role::Admin),
            _ => Err(ValidationError::InvalidFormat(format!("role '{}'", value))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Supplier => write!(f, "supplier"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

pub trait UserDirectory: Send + Sync {
    fn find_by_email(&self, email: &str) -> Option<User>;
    fn role_of(&self, user_id: &str) -> Option<Role>;
}

#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    by_email: HashMap<String, User>,
    roles: HashMap<String, Role>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from configured accounts
    ///
    /// # Errors
    /// Returns a validation error for an unknown role
    pub fn from_seed(users: &[SeedUser]) -> Result<Self, ValidationError> {
        let mut directory = Self::new();
        for seed in users {
            directory.insert(&seed.email, &seed.password_hash, Role::parse(&seed.role)?);
        }
        Ok(directory)
    }

    /// Add an account, returning its generated id
    pub fn insert(&mut self, email: &str, password_hash: &str, role: Role) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            password_hash: password_hash.to_string(),
            role,
        };
        let id = user.id;
        self.roles.insert(id.to_string(), role);
        self.by_email.insert(user.email.clone(), user);
        id
    }

    pub fn len(&self) -> usize {
        self.by_email.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn find_by_email(&self, email: &str) -> Option<User> {
        self.by_email.get(&normalize_email(email)).cloned()
    }

    fn role_of(&self, user_id: &str) -> Option<Role> {
        self.roles.get(user_id).copied()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Check credentials against the directory
///
/// Unknown emails and wrong passwords fail identically.
pub fn authenticate(
    directory: &dyn UserDirectory,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    if email.trim().is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()).into());
    }
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()).into());
    }

    let Some(user) = directory.find_by_email(email) else {
        // unknown emails cost one bcrypt verify, like known ones
        if let Some(hash) = dummy_hash() {
            let _ = verify_password(password, hash);
        }
        return Err(AuthError::InvalidCredentials.into());
    };

    if !verify_password(password, &user.password_hash)? {
        return Err(AuthError::InvalidCredentials.into());
    }
    Ok(user)
}

fn dummy_hash() -> Option<&'static str> {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    DUMMY_HASH
        .get_or_init(|| hash_password("unknown-account-placeholder").ok())
        .as_deref()
}
