//! HTTP gateway for Parley.
//!
//! Exposes the one-shot query and stateless chat endpoints used by web
//! front-ends, plus a health check.

pub mod api;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, header};
use axum::{
    Router,
    routing::{get, post},
};
use parley_agent::TurnEngine;
use parley_config::GatewayConfig;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub engine: Arc<TurnEngine>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl GatewayState {
    pub fn new(engine: Arc<TurnEngine>) -> Self {
        Self {
            engine,
            started_at: chrono::Utc::now(),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the router with all routes and layers.
///
/// Layers applied:
/// - CORS for browser front-ends on other origins
/// - Request body size limit (`max_body_bytes`)
/// - HTTP trace logging
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(api::health))
        .route("/api/rag-query", post(api::rag_query))
        .route("/api/chat", post(api::chat))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Serve the gateway until the process is stopped.
pub async fn start(
    config: GatewayConfig,
    engine: Arc<TurnEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.host, config.port);
    let chunks = engine.retriever().index().len();
    let app = build_router(Arc::new(GatewayState::new(engine)), &config);

    info!(addr = %addr, chunks, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
