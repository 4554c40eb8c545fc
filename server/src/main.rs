use config::CONFIG;
use controller::create_manager_router;
use proxy::create_proxy_router;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod controller;
mod database;
mod proxy;
mod schema;
mod utils;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&CONFIG.log_level)),
        )
        .init();

    let addr = format!("{}:{}", &CONFIG.host, CONFIG.port);
    info!("server start at {}", &addr);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(
        listener,
        Router::new()
            .nest("/v1", create_proxy_router())
            .merge(create_manager_router())
            .fallback(controller::handle_404)
            .layer(TraceLayer::new_for_http()),
    )
    .await
    .expect("failed to start server");
}
