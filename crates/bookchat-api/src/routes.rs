//! Router setup and server startup.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::post;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use bookchat_core::config::{BookchatConfig, ServerConfig};
use bookchat_core::error::BookchatError;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with the chat route and middleware.
pub fn create_router(state: AppState) -> Router {
    let server = &state.config.server;
    let cors = cors_layer(server);

    let router = Router::new()
        .route("/chat", post(handlers::chat))
        .layer(DefaultBodyLimit::max(server.max_body_bytes))
        .layer(TraceLayer::new_for_http());

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.with_state(state)
}

/// CORS for the configured storefront origins; `None` when no origin is
/// configured. A single `*` allows any origin.
fn cors_layer(server: &ServerConfig) -> Option<CorsLayer> {
    if server.allowed_origins.is_empty() {
        return None;
    }

    let allow_origin = if server.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = server
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT]),
    )
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn start_server(config: &BookchatConfig, state: AppState) -> Result<(), BookchatError> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BookchatError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    info!(addr = %addr, "API server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| BookchatError::Api(format!("Server error: {}", e)))?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
