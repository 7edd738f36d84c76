//! HTTP server setup and configuration.

use std::sync::Arc;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use reqwest::Client;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use super::handlers;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::upstream::Upstreams;

/// Per-request correlation ID, stored in request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(pub Uuid);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub upstreams: Arc<Upstreams>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Build the HTTP client and upstream clients once, from the given config.
    pub fn from_config(config: Config) -> Result<Self> {
        let http_client = Client::builder()
            .connect_timeout(config.upstream.connect_timeout())
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            upstreams: Arc::new(Upstreams::new(http_client, &config)),
            config: Arc::new(config),
        })
    }
}

async fn assign_request_id(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(RequestId(Uuid::new_v4()));
    next.run(request).await
}

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/analyze-crypto", post(handlers::analyze_crypto))
        .route("/ask", post(handlers::ask))
        .route("/generate", post(handlers::generate))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(assign_request_id)),
        )
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

/// Run the HTTP server until Ctrl-C.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let listen_addr = config.server.listen.clone();
    let state = AppState::from_config(config)?;

    tracing::info!(
        providers = ?state.upstreams.configured(),
        timeout_secs = state.config.upstream.timeout_secs,
        "Upstreams configured"
    );

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting coinscout relay server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
