mod api;
mod auth;
mod backend;
mod bridge;
mod config;
mod core;
mod history;
mod metrics;
mod multimodal;
mod observability;
mod routing;

use axum::routing::{delete, get, post};
use axum::Router;
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_tracing();

    let cfg_path =
        std::env::var("ADK_BRIDGE_CONFIG").unwrap_or_else(|_| "config/bridge.toml".into());
    let settings = config::load(&cfg_path).await?;
    let port = settings.port;
    tracing::info!(adk_host = %settings.adk_host, app_name = %settings.app_name, "starting bridge");

    let state = routing::AppState::new(settings)?;

    let app = Router::new()
        .route("/v1/chat/completions", post(api::openai::chat_completions))
        .route("/v1/models", get(api::openai::list_models))
        .route("/v1/health", get(api::openai::health))
        .route("/v1/sessions", get(api::openai::list_sessions))
        .route(
            "/v1/sessions/:app_name/:user_id/:session_id",
            delete(api::openai::delete_session),
        )
        .route(
            "/v1/sessions/:app_name/:user_id/:session_id/reset",
            post(api::openai::reset_session),
        )
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(metrics::metrics_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("ADK bridge listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
