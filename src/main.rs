use std::sync::Arc;

use linkgraph::{build_app, config::Config, store::Store, AppState};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config =
        Arc::new(Config::from_env().expect("Failed to load configuration from environment"));
    let port = config.port;

    let store = Arc::new(
        Store::connect(&config.database_path)
            .await
            .expect("Failed to open job store"),
    );

    let state = AppState::new(config, store);
    let app = build_app(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("Scraper engine starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app).await.expect("Server error");
}
