//! Session and model management endpoints.

use crate::{error_response, ErrorBody, SharedState};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use wayfarer_core::session::SessionSummary;
use wayfarer_providers::ModelSummary;

type ApiError = (StatusCode, Json<ErrorBody>);

// ── Sessions ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
}

#[derive(Serialize)]
pub struct CreateSessionResponse {
    success: bool,
    session_id: String,
}

/// `POST /api/session/new`
pub async fn create_session_handler(
    State(state): State<SharedState>,
    payload: Option<Json<CreateSessionRequest>>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let Json(payload) = payload.unwrap_or_default();
    let session_id = state.sessions.create(payload.name, payload.model_id).await;
    info!(session_id = %session_id, "Session created");
    (
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            success: true,
            session_id,
        }),
    )
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    #[serde(default)]
    pub include_empty: bool,
}

#[derive(Serialize)]
pub struct ListSessionsResponse {
    success: bool,
    sessions: Vec<SessionSummary>,
}

/// `GET /api/sessions?include_empty=`
pub async fn list_sessions_handler(
    State(state): State<SharedState>,
    Query(query): Query<ListSessionsQuery>,
) -> Json<ListSessionsResponse> {
    let sessions = state.sessions.list(query.include_empty).await;
    Json(ListSessionsResponse {
        success: true,
        sessions,
    })
}

#[derive(Serialize)]
pub struct OkResponse {
    success: bool,
}

/// `DELETE /api/session/{id}`
pub async fn delete_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    if state.sessions.delete(&id).await {
        Ok(Json(OkResponse { success: true }))
    } else {
        Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Session not found: {id}"),
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

/// `PUT /api/session/{id}/name`
pub async fn rename_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<RenameRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .sessions
        .rename(&id, payload.name)
        .await
        .map_err(|e| error_response(StatusCode::NOT_FOUND, e.to_string()))?;
    Ok(Json(OkResponse { success: true }))
}

#[derive(Debug, Deserialize)]
pub struct SetModelRequest {
    pub model_id: String,
}

/// `PUT /api/session/{id}/model`
pub async fn set_session_model_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<SetModelRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    if state.models.describe(&payload.model_id).is_none() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Unknown model: {}", payload.model_id),
        ));
    }
    state
        .sessions
        .set_model(&id, payload.model_id)
        .await
        .map_err(|e| error_response(StatusCode::NOT_FOUND, e.to_string()))?;
    Ok(Json(OkResponse { success: true }))
}

#[derive(Serialize)]
pub struct SessionModelResponse {
    success: bool,
    model_id: String,
}

/// `GET /api/session/{id}/model`
pub async fn get_session_model_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionModelResponse>, ApiError> {
    let session = state
        .sessions
        .get(&id)
        .await
        .map_err(|e| error_response(StatusCode::NOT_FOUND, e.to_string()))?;
    Ok(Json(SessionModelResponse {
        success: true,
        model_id: session.model_id,
    }))
}

/// `POST /api/clear/{id}` — clear the message log, keep the session.
pub async fn clear_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .sessions
        .clear_messages(&id)
        .await
        .map_err(|e| error_response(StatusCode::NOT_FOUND, e.to_string()))?;
    Ok(Json(OkResponse { success: true }))
}

// ── Models ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ListModelsResponse {
    success: bool,
    models: Vec<ModelSummary>,
}

/// `GET /api/models`
pub async fn list_models_handler(State(state): State<SharedState>) -> Json<ListModelsResponse> {
    Json(ListModelsResponse {
        success: true,
        models: state.models.list(),
    })
}

#[derive(Serialize)]
pub struct ModelResponse {
    success: bool,
    model: ModelSummary,
}

/// `GET /api/models/{id}`
pub async fn get_model_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ModelResponse>, ApiError> {
    state
        .models
        .describe(&id)
        .map(|model| {
            Json(ModelResponse {
                success: true,
                model,
            })
        })
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, format!("Unknown model: {id}")))
}
