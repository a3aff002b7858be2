use axum::{
    Router,
    routing::{any, get},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{GatewayState, health_check, proxy_loans};

/// Creates the gateway router
///
/// - GET /health - Health check
/// - /api/loans, /api/loans/* - Forwarded to the loan service
pub fn create_gateway_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/loans", any(proxy_loans))
        .route("/api/loans/*rest", any(proxy_loans))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
