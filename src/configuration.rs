use serde::Deserialize;
use std::net::IpAddr;

use crate::error::ConfigError;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub cookie: CookieSettings,
    #[serde(default)]
    pub cleanup: CleanupSettings,
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// Reverse proxies whose forwarding headers name the client address
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

impl ApplicationSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// JWT signing and session lifetime settings
///
/// Access and refresh tokens are signed with distinct secrets.
#[derive(Deserialize, Clone)]
pub struct JwtSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    #[serde(default = "default_access_expiry")]
    pub access_token_expiry: i64, // seconds (e.g., 900 for 15 minutes)
    #[serde(default = "default_refresh_expiry")]
    pub refresh_token_expiry: i64, // seconds (e.g., 604800 for 7 days)
    #[serde(default = "default_family_lifetime")]
    pub family_max_lifetime: i64, // seconds, absolute cap on a login session
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_true")]
    pub bind_access_to_fingerprint: bool,
}

impl JwtSettings {
    /// Reject settings the token engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.access_secret".to_string()));
        }
        if self.refresh_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.refresh_secret".to_string()));
        }
        if self.access_secret == self.refresh_secret {
            return Err(ConfigError::InvalidValue(
                "jwt.access_secret and jwt.refresh_secret must differ".to_string(),
            ));
        }
        if self.access_token_expiry <= 0
            || self.refresh_token_expiry <= 0
            || self.family_max_lifetime <= 0
        {
            return Err(ConfigError::InvalidValue(
                "jwt token lifetimes must be positive".to_string(),
            ));
        }
        if self.access_token_expiry >= self.refresh_token_expiry {
            return Err(ConfigError::InvalidValue(
                "jwt.access_token_expiry must be shorter than jwt.refresh_token_expiry"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Refresh cookie attributes
///
/// The same attributes are used to set and to clear the cookie.
#[derive(Deserialize, Clone)]
pub struct CookieSettings {
    #[serde(default = "default_cookie_name")]
    pub name: String,
    pub domain: Option<String>,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default = "default_true")]
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            domain: None,
            path: default_cookie_path(),
            secure: true,
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct CleanupSettings {
    #[serde(default = "default_cleanup_interval")]
    pub interval_seconds: u64,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            interval_seconds: default_cleanup_interval(),
        }
    }
}

/// Account loaded into the in-memory user directory at startup
#[derive(Deserialize, Clone)]
pub struct SeedUser {
    pub email: String,
    pub password_hash: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_access_expiry() -> i64 {
    900
}

fn default_refresh_expiry() -> i64 {
    604_800
}

fn default_family_lifetime() -> i64 {
    2_592_000
}

fn default_issuer() -> String {
    "session_guard".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cookie_name() -> String {
    "refresh_token".to_string()
}

fn default_cookie_path() -> String {
    "/auth".to_string()
}

fn default_cleanup_interval() -> u64 {
    300
}

fn default_role() -> String {
    "customer".to_string()
}

/// Load settings from `configuration.{yaml,toml,json}` and `APP__*` env vars
///
/// e.g. `APP__JWT__ACCESS_SECRET=...` overrides `jwt.access_secret`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;
    settings.jwt.validate()?;
    Ok(settings)
}
