pub mod auth;
pub mod dto;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::AppState;

pub fn create_router(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        // Source registry
        .route("/api/v1/sources", get(handlers::list_sources))
        .route("/api/v1/sources", post(handlers::register_source))
        // Prediction models
        .route("/api/v1/models", get(handlers::list_models))
        // Pipeline actions
        .route("/api/v1/data-enhancement", post(handlers::enhance))
        // Saved values
        .route("/api/v1/user/{user_id}/indicators", get(handlers::get_user_indicators))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .merge(protected)
}
