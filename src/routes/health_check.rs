use actix_web::{web, HttpResponse};

use crate::auth::TokenService;

/// GET /health_check
///
/// Reports liveness along with the size of the in-memory session state.
pub async fn health_check(service: web::Data<TokenService>) -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "token_families": service.families().len(),
        "invalidated_tokens": service.invalidations().len(),
    }))
}
