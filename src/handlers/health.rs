use actix_web::{HttpResponse, Result};

use super::types::HealthResponse;

/// Health check endpoint
///
/// # Errors
///
/// This function does not return errors but uses `Result` for consistency with actix-web handlers
pub async fn health() -> Result<HttpResponse> {
    let response = HealthResponse {
        status: "ok".to_string(),
        message: "Sign in with Apple service is running".to_string(),
    };
    Ok(HttpResponse::Ok().json(response))
}
