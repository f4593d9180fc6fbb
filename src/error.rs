/// Error Handling Module
///
/// Unified error handling for the session engine and its HTTP surface:
/// 1. Domain-specific error types (validation, configuration, token/session)
/// 2. A single `AppError` used for control flow
/// 3. HTTP response mapping with stable machine-readable tags
/// 4. Structured error logging with context
///
/// Token verification failures all share one user-visible message. Only the
/// `code` tag and the logs record which check failed.

use actix_web::{
    error::{JsonPayloadError, ResponseError},
    http::StatusCode,
    HttpRequest, HttpResponse,
};
use std::error::Error as StdError;
use std::fmt;

/// Message returned for every token verification failure
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid or expired token";

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for request input
#[derive(Debug, Clone)]
pub enum ValidationError {
    EmptyField(String),
    TooLong(String, usize),
    InvalidFormat(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
        }
    }
}

impl StdError for ValidationError {}

/// Configuration errors. Fatal at startup, never produced per request.
#[derive(Debug, Clone)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
    ParseError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(msg) => write!(f, "Missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Authentication and session errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    InvalidCredentials,
    NoTokenProvided,
    MalformedToken,
    ExpiredToken,
    WrongTokenType,
    TokenRevoked,
    FingerprintMismatch,
    InvalidTokenFamily,
    FamilyCompromised,
    FamilyExpired,
}

impl AuthError {
    /// Stable machine-readable tag
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::NoTokenProvided => "NO_TOKEN_PROVIDED",
            AuthError::MalformedToken => "MALFORMED_TOKEN",
            AuthError::ExpiredToken => "EXPIRED_TOKEN",
            AuthError::WrongTokenType => "WRONG_TOKEN_TYPE",
            AuthError::TokenRevoked => "TOKEN_REVOKED",
            AuthError::FingerprintMismatch => "FINGERPRINT_MISMATCH",
            AuthError::InvalidTokenFamily => "INVALID_TOKEN_FAMILY",
            AuthError::FamilyCompromised => "FAMILY_COMPROMISED",
            AuthError::FamilyExpired => "FAMILY_EXPIRED",
        }
    }

    /// Failures that indicate a stolen or replayed credential
    pub fn is_security_event(&self) -> bool {
        matches!(
            self,
            AuthError::FingerprintMismatch | AuthError::FamilyCompromised
        )
    }

    fn public_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "Invalid email or password",
            AuthError::NoTokenProvided => "Missing authentication token",
            _ => INVALID_TOKEN_MESSAGE,
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::NoTokenProvided => write!(f, "Missing authentication token"),
            AuthError::MalformedToken => write!(f, "Token is malformed or its signature is invalid"),
            AuthError::ExpiredToken => write!(f, "Token has expired"),
            AuthError::WrongTokenType => write!(f, "Token type does not match its use"),
            AuthError::TokenRevoked => write!(f, "Token has been revoked"),
            AuthError::FingerprintMismatch => {
                write!(f, "Token presented from a different client context")
            }
            AuthError::InvalidTokenFamily => write!(f, "Token family is unknown or closed"),
            AuthError::FamilyCompromised => {
                write!(f, "Refresh token reuse detected, token family compromised")
            }
            AuthError::FamilyExpired => write!(f, "Token family exceeded its maximum lifetime"),
        }
    }
}

impl StdError for AuthError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Auth(AuthError),
    Config(ConfigError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Config(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl AppError {
    /// The authentication failure kind, if this is one
    pub fn auth_kind(&self) -> Option<AuthError> {
        match self {
            AppError::Auth(e) => Some(*e),
            _ => None,
        }
    }
}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    /// Unique error ID for correlating with logs
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Stable error tag for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (code, message) = match self {
            AppError::Validation(e) => ("VALIDATION_ERROR", e.to_string()),
            AppError::Auth(e) => (e.code(), e.public_message().to_string()),
            AppError::Config(_) => ("CONFIG_ERROR", "Server configuration error".to_string()),
            AppError::Internal(_) => ("INTERNAL_ERROR", "Internal server error".to_string()),
        };
        let status = self.status_code();

        let error_response = ErrorResponse::new(
            request_id.to_string(),
            message,
            code.to_string(),
            status.as_u16(),
        );

        (status, error_response)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Auth(e) if e.is_security_event() => {
                tracing::warn!(
                    request_id = request_id,
                    code = e.code(),
                    error = %e,
                    security_event = true,
                    "Session security event"
                );
            }
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!(request_id = request_id, "Invalid credentials attempt");
            }
            AppError::Auth(e) => {
                tracing::info!(
                    request_id = request_id,
                    code = e.code(),
                    error = %e,
                    "Authentication error"
                );
            }
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &request_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Turn unreadable JSON bodies into the standard validation response
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(error = %err, "Rejected request body");
    AppError::Validation(ValidationError::InvalidFormat("request body".to_string())).into()
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Request-scoped context for correlating log lines
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }
}
