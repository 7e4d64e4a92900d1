use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailcove::config::CONFIG;
use mailcove::endpoints::create_router;
use mailcove::services::scheduler::start_scheduler;
use mailcove::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("mailcove={},tower_http=info", CONFIG.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Mailcove backend v{}", env!("CARGO_PKG_VERSION"));

    // Connect to the database and run migrations
    let db = mailcove::db::connect().await?;
    tracing::info!("Database connection established");

    // Create app state
    let state = AppState::new(db.clone());

    // Start background maintenance tasks
    start_scheduler(Arc::new(db), state.webhooks.clone());

    // Build the application
    let app = create_app(state);

    // Determine bind address
    let addr: SocketAddr = format!("{}:{}", CONFIG.server.host, CONFIG.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    // Start server; ConnectInfo feeds the per-IP rate limiter
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Create the main application router
fn create_app(state: AppState) -> Router {
    // CORS layer: restrict to configured origins, or allow any in dev
    let cors = if CONFIG.server.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = CONFIG
            .server
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
