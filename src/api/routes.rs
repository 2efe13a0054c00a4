use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::api::handlers::{ask, session};
use crate::config::Config;
use crate::services::{AskService, Session};

/// Shared application state: the single process-wide session plus the
/// orchestration service.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
    pub ask_service: Arc<AskService>,
    pub config: Config,
}

/// Create router with application state
pub fn create_router_with_state(session: Arc<Session>, config: Config) -> Router {
    let state = AppState {
        session,
        ask_service: Arc::new(AskService::new(&config)),
        config,
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/session/connect", post(session::connect))
        .route("/api/session/disconnect", post(session::disconnect))
        .route("/api/session/status", get(session::status))
        .route("/api/ask", post(ask::ask))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
