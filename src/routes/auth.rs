/// Authentication Routes
///
/// Login, refresh-token rotation, logout and current-identity lookup.
/// Access tokens are returned in the response body only; refresh tokens
/// only ever travel in the refresh cookie.

use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};

use crate::auth::{authenticate, TokenPair, TokenService, UserDirectory};
use crate::configuration::CookieSettings;
use crate::error::{AppError, AuthError, ErrorContext};
use crate::fingerprint::{Fingerprint, TrustedProxies};
use crate::middleware::{bearer_token, AuthenticatedUser};
use crate::routes::cookies::{refresh_cookie, removal_cookie};

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Access token response body
#[derive(Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<&TokenPair> for AccessTokenResponse {
    fn from(pair: &TokenPair) -> Self {
        Self {
            access_token: pair.access_token.clone(),
            token_type: "Bearer".to_string(),
            expires_in: pair.access_expires_in,
        }
    }
}

fn issue_response(
    mut response: actix_web::HttpResponseBuilder,
    pair: &TokenPair,
    cookies: &CookieSettings,
) -> HttpResponse {
    response
        .cookie(refresh_cookie(
            cookies,
            pair.refresh_token.clone(),
            pair.refresh_expires_in,
        ))
        .json(AccessTokenResponse::from(pair))
}

/// POST /auth/login
///
/// Authenticate with email and password and start a new token family.
///
/// # Errors
/// - 400: Missing email or password, or an unreadable body
/// - 401: Invalid credentials (same response for unknown email and wrong password)
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    service: web::Data<TokenService>,
    directory: web::Data<dyn UserDirectory>,
    cookies: web::Data<CookieSettings>,
    proxies: web::Data<TrustedProxies>,
) -> Result<HttpResponse, AppError> {
    let user = authenticate(directory.get_ref(), &form.email, &form.password)?;
    let context = ErrorContext::new("user_login").with_user_id(user.id.to_string());

    let pair =
        service.issue_initial_tokens(&user.id.to_string(), Fingerprint::from_request(&req, &proxies))?;

    tracing::info!(
        request_id = %context.request_id,
        operation = %context.operation,
        user_id = ?context.user_id,
        family_id = %pair.family_id,
        "User logged in"
    );

    Ok(issue_response(HttpResponse::Ok(), &pair, &cookies))
}

/// POST /auth/refresh
///
/// Exchange the refresh cookie for a new access token and refresh cookie.
///
/// # Errors
/// - 401 with the failure tag. `FAMILY_COMPROMISED` also clears the refresh
///   cookie; clients must treat it as a forced logout.
pub async fn refresh(
    req: HttpRequest,
    service: web::Data<TokenService>,
    cookies: web::Data<CookieSettings>,
    proxies: web::Data<TrustedProxies>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let token = req
        .cookie(&cookies.name)
        .map(|c| c.value().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::NoTokenProvided)?;

    match service.rotate(&token, &Fingerprint::from_request(&req, &proxies)) {
        Ok(pair) => {
            tracing::debug!(
                request_id = %context.request_id,
                operation = %context.operation,
                family_id = %pair.family_id,
                "Token refreshed"
            );
            Ok(issue_response(HttpResponse::Ok(), &pair, &cookies))
        }
        Err(e) if e.auth_kind() == Some(AuthError::FamilyCompromised) => {
            // error_response logs the security event
            let mut response = ResponseError::error_response(&e);
            response
                .add_cookie(&removal_cookie(&cookies))
                .map_err(|err| AppError::Internal(format!("Failed to clear cookie: {}", err)))?;
            Ok(response)
        }
        Err(e) => Err(e),
    }
}

/// POST /auth/logout
///
/// Revoke the refresh cookie's token and, when present, the bearer access
/// token, then clear the cookie. Always answers 204.
pub async fn logout(
    req: HttpRequest,
    service: web::Data<TokenService>,
    cookies: web::Data<CookieSettings>,
) -> HttpResponse {
    let refresh_token = req.cookie(&cookies.name).map(|c| c.value().to_string());
    let access_claims = bearer_token(&req).and_then(|token| service.verify_access(&token, None).ok());

    let revoked = service.logout(refresh_token.as_deref(), access_claims.as_ref());
    tracing::info!(revoked, "User logged out");

    HttpResponse::NoContent()
        .cookie(removal_cookie(&cookies))
        .finish()
}

/// GET /api/me
///
/// **Requires valid access token**; identity is injected by the JWT middleware.
pub async fn get_current_user(user: web::ReqData<AuthenticatedUser>) -> HttpResponse {
    HttpResponse::Ok().json(user.into_inner())
}
