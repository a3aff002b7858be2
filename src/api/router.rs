use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{AppState, discovery, health_check, soap_endpoint};

/// Creates the loan service router
///
/// - GET  /health - Health check
/// - POST /ws, POST /loan - Operation envelopes
/// - GET  /ws, GET /loan - Service description
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(discovery).post(soap_endpoint))
        .route("/loan", get(discovery).post(soap_endpoint))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
