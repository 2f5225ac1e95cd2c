use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::api;
use crate::route::RouteService;

/// Longest a single route request may run before the server gives up on it
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub fn app(service: Arc<RouteService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api::router(service.clone()))
        .merge(api::legacy_router(service))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors)
}

pub async fn run(port: u16, service: Arc<RouteService>, shutdown: CancellationToken) -> Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Web server running at http://localhost:{}", port);

    axum::serve(listener, app(service))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Web server failed")?;
    Ok(())
}
