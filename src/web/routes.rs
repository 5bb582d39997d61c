use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// API Routes - the NLQ engine's entry points
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Generation and feedback
            .route("/nlq/query", post(handlers::api::nl_query))
            .route("/nlq/refine", post(handlers::api::refine_query))
            // Pre-flight and scoring
            .route("/nlq/validate", post(handlers::api::validate_question))
            .route("/nlq/confidence", post(handlers::api::confidence))
            .route("/nlq/suggestions", post(handlers::api::suggestions))
            // Tenant scoping of externally sourced SQL
            .route("/nlq/secure", post(handlers::api::secure_query))
            // System status
            .route("/status", get(handlers::api::system_status)),
    )
}
