//! API key check for the `/api/v1` routes
//!
//! An empty `server.api_key` disables the check. `/health` is never guarded.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.config.auth_enabled() {
        return Ok(next.run(request).await);
    }

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if key == state.config.server.api_key => Ok(next.run(request).await),
        Some(_) => {
            println!("[RESPONSE] {} {} -> 401 Unauthorized (wrong api key)", request.method(), request.uri().path());
            tracing::warn!(path = %request.uri().path(), "Rejected request with wrong API key");
            Err(AppError::Unauthorized)
        }
        None => {
            println!("[RESPONSE] {} {} -> 401 Unauthorized (missing api key)", request.method(), request.uri().path());
            tracing::warn!(path = %request.uri().path(), "Rejected request without API key");
            Err(AppError::Unauthorized)
        }
    }
}
