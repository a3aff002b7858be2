use rusty_loan_saga::{
    config::AppConfig,
    gateway::{GatewayState, HttpLoanServiceTransport, create_gateway_router},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rusty_loan_saga=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().expect("Failed to load configuration");

    let transport = HttpLoanServiceTransport::new(
        config.gateway.loan_service_url.clone(),
        config.gateway.timeout(),
    )
    .expect("Failed to build loan service client");

    tracing::info!("Forwarding loans to {}", config.gateway.loan_service_url);

    let state = Arc::new(GatewayState {
        transport: Arc::new(transport),
    });

    let app = create_gateway_router(state);

    let addr = config.gateway.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Gateway listening on {}", addr);

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
