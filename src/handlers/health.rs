use actix_web::{HttpResponse, Result};

use crate::models::HealthResponse;

/// Liveness check
///
/// # Errors
/// Never fails
pub async fn health() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
    }))
}
