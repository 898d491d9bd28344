mod handlers;
mod state;

use axum::http::{header, HeaderValue};
use axum::routing::get;
use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::resolution::ResolutionService;

pub fn build_router(service: Arc<ResolutionService>) -> Router {
    let state = Arc::new(AppState { service });

    let no_store =
        SetResponseHeaderLayer::overriding(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/aqi", get(handlers::aqi).layer(no_store))
        .route("/api/forecast", get(handlers::forecast))
        .route("/api/location/{id}", get(handlers::location))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(host: &str, port: u16, service: Arc<ResolutionService>) -> std::io::Result<()> {
    let app = build_router(service);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("airsense listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
