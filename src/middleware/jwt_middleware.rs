/// JWT Authentication Middleware
///
/// Authentication gate for protected routes. Extracts the bearer access
/// token, verifies it through the token service and injects the resulting
/// identity into request extensions for route handlers.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use serde::Serialize;
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{Role, TokenService, UserDirectory};
use crate::error::{AppError, AuthError};
use crate::fingerprint::{Fingerprint, TrustedProxies};

/// Identity attached to an authenticated request
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub token_id: Uuid,
    pub family_id: Uuid,
    pub role: Role,
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(req: &actix_web::HttpRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// JWT middleware for protecting routes
pub struct JwtMiddleware {
    service: Arc<TokenService>,
    directory: Arc<dyn UserDirectory>,
    proxies: TrustedProxies,
}

impl JwtMiddleware {
    pub fn new(
        service: Arc<TokenService>,
        directory: Arc<dyn UserDirectory>,
        proxies: TrustedProxies,
    ) -> Self {
        Self {
            service,
            directory,
            proxies,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            tokens: self.service.clone(),
            directory: self.directory.clone(),
            proxies: self.proxies.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    tokens: Arc<TokenService>,
    directory: Arc<dyn UserDirectory>,
    proxies: TrustedProxies,
}

impl<S> JwtMiddlewareService<S> {
    fn authenticate(&self, req: &ServiceRequest) -> Result<AuthenticatedUser, AuthError> {
        let token = bearer_token(req.request()).ok_or(AuthError::NoTokenProvided)?;

        let fingerprint = self
            .tokens
            .config()
            .bind_access_to_fingerprint
            .then(|| Fingerprint::from_request(req.request(), &self.proxies));

        let claims = self.tokens.verify_access(&token, fingerprint.as_ref())?;
        let role = self.directory.role_of(&claims.sub).unwrap_or(Role::Customer);

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            token_id: claims.jti,
            family_id: claims.family_id,
            role,
        })
    }
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match self.authenticate(&req) {
            Ok(user) => {
                tracing::debug!(
                    user_id = %user.user_id,
                    token_id = %user.token_id,
                    "Access token validated"
                );
                req.extensions_mut().insert(user);

                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(kind) => {
                let error = AppError::Auth(kind);
                Box::pin(async move { Err(error.into()) })
            }
        }
    }
}
