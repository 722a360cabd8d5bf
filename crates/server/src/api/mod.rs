//! HTTP endpoints for email alerts.
//!
//! - `alerts` - Signup, confirmation, list and unsubscribe endpoints (/alerts/*)
//! - `health` - Health check endpoint (/healthz)
//! - `openapi` - OpenAPI/Utoipa configuration

pub mod alerts;
pub mod health;
pub mod openapi;

pub use alerts::ALERTS_TAG;
pub use health::MISC_TAG;

use crate::AppResources;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Builds the full application router, including the API docs at `/api-docs`.
pub fn app(app_resources: AppResources) -> axum::Router {
    // Alert routes carry their full `/alerts/...` paths, so they are merged
    // rather than nested to keep the trailing slash on the list view.
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .merge(alerts::router())
        .routes(routes!(health::health))
        .layer(axum::Extension(app_resources))
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server with all configured routes.
#[tracing::instrument(skip(app_resources))]
pub async fn start_webserver(app_resources: AppResources) -> color_eyre::Result<()> {
    let addr = app_resources.config.listen_addr.clone();
    let router = app(app_resources);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server running");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
