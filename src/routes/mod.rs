mod auth;
mod cookies;
mod health_check;

pub use auth::{get_current_user, login, logout, refresh, AccessTokenResponse, LoginRequest};
pub use cookies::{refresh_cookie, removal_cookie};
pub use health_check::health_check;
