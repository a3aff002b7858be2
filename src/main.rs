use rusty_loan_saga::{
    adapters::http::CatalogClient,
    adapters::postgres::{PostgresLoanStore, PostgresSagaLog},
    api::{handlers::AppState, router::create_router},
    application::loan::{ServiceDependencies, recover_pending_sagas},
    config::AppConfig,
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

    // Initialize database connection pool
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // Initialize adapters
    let loan_store = Arc::new(PostgresLoanStore::new(pool.clone()));
    let saga_log = Arc::new(PostgresSagaLog::new(pool.clone()));
    let book_catalog = Arc::new(
        CatalogClient::new(config.catalog.base_urls.clone(), config.catalog.timeout())
            .expect("Failed to build catalog client"),
    );

    // Create service dependencies
    let service_deps = ServiceDependencies::new(loan_store, saga_log, book_catalog);

    // Settle sagas interrupted by a previous shutdown
    match recover_pending_sagas(&service_deps).await {
        Ok(report) => tracing::info!(
            completed = report.completed,
            compensated = report.compensated,
            left_pending = report.left_pending,
            "Saga recovery finished"
        ),
        Err(e) => tracing::error!("Saga recovery failed: {}", e),
    }

    // Create application state
    let app_state = Arc::new(AppState {
        service_deps,
        discovery_enabled: config.discovery.enabled,
        public_url: config.server.public_url.clone(),
    });

    let app = create_router(app_state);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Loan service listening on {}", addr);

    // Start server
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
