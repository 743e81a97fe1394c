//! HTTP/SSE gateway for Wayfarer.
//!
//! Owns the session store and fronts the agent service: chat turns arrive
//! as JSON, stream back as server-sent events, and sessions/models are
//! managed through a small REST surface.
//!
//! Built on Axum; every SSE event is a single `data:` line carrying a JSON
//! object with a `type` field.

pub mod chat;
pub mod sessions;

use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{delete, get, post, put};
use axum::{extract::State, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use wayfarer_core::session::SessionStore;
use wayfarer_providers::ModelManager;
use wayfarer_service::AgentService;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub service: Arc<AgentService>,
    pub sessions: Arc<SessionStore>,
    pub models: Arc<ModelManager>,
}

pub type SharedState = Arc<GatewayState>;

/// Uniform error body: `{"success": false, "error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

pub(crate) fn error_response(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            success: false,
            error: message.into(),
        }),
    )
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/chat/stream", post(chat::chat_stream_handler))
        .route("/api/session/new", post(sessions::create_session_handler))
        .route("/api/sessions", get(sessions::list_sessions_handler))
        .route("/api/session/{id}", delete(sessions::delete_session_handler))
        .route("/api/session/{id}/name", put(sessions::rename_session_handler))
        .route(
            "/api/session/{id}/model",
            put(sessions::set_session_model_handler).get(sessions::get_session_model_handler),
        )
        .route("/api/clear/{id}", post(sessions::clear_session_handler))
        .route("/api/models", get(sessions::list_models_handler))
        .route("/api/models/{id}", get(sessions::get_model_handler))
        .route("/api/health", get(health_handler))
        .route("/api/ready", get(ready_handler))
        .route("/api/live", get(live_handler))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(
    state: SharedState,
    host: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{host}:{port}");
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// --- Health handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let health = state.service.health_check();
    Json(HealthResponse {
        status: health.status,
        version: health.version,
    })
}

#[derive(Serialize)]
struct ReadyResponse {
    ready: bool,
}

async fn ready_handler(State(state): State<SharedState>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        ready: state.service.health_check().healthy,
    })
}

#[derive(Serialize)]
struct LiveResponse {
    alive: bool,
}

async fn live_handler() -> Json<LiveResponse> {
    Json(LiveResponse { alive: true })
}
