/// Authentication module
///
/// Session token issuance, verification, rotation and revocation, plus
/// credential checks against the user directory.

mod claims;
mod family;
mod invalidation;
mod jwt;
mod password;
mod service;
mod users;

pub use claims::{Claims, TokenType};
pub use family::{FamilyRecord, FamilyRegistry, FamilyState, RotationOutcome};
pub use invalidation::InvalidationStore;
pub use jwt::TokenCodec;
pub use password::{hash_password, hash_password_with_cost, verify_password};
pub use service::{SweepReport, TokenPair, TokenService};
pub use users::{authenticate, InMemoryUserDirectory, Role, User, UserDirectory};
