//! Chat streaming — translates the agent's RPC stream into SSE events.
//!
//! The gateway owns per-session bookkeeping around the turn: it appends
//! the user message before dispatch and the final assistant message (with
//! its reasoning trace) after `done`. A `heartbeat` event goes out after
//! every 30 seconds of upstream silence; the stream always terminates with
//! exactly one `done`.

use crate::{error_response, ErrorBody, SharedState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::Json;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};
use wayfarer_agent::ExecutionMode;
use wayfarer_core::chunk::AgentChunk;
use wayfarer_core::session::ChatMessage;
use wayfarer_service::{ChunkType, MessageRequest, StreamChunk};

/// Silence threshold before a heartbeat event is emitted.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct ChatStreamRequest {
    pub message: String,

    #[serde(default)]
    pub session_id: Option<String>,

    /// "direct" | "react" | "plan"; defaults to "react".
    #[serde(default)]
    pub mode: Option<String>,
}

/// `POST /api/chat/stream` — send a message, receive an SSE event stream.
pub async fn chat_stream_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatStreamRequest>,
) -> Result<
    Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>,
    (StatusCode, Json<ErrorBody>),
> {
    if payload.message.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "message must not be empty",
        ));
    }
    let mode = payload.mode.unwrap_or_default();
    if ExecutionMode::parse(&mode).is_none() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("unknown mode: '{mode}'"),
        ));
    }

    // Resolve or lazily create the session.
    let (session_id, is_new) = match payload.session_id {
        Some(id) if !id.trim().is_empty() => {
            let existed = state.sessions.contains(&id).await;
            if !existed {
                state.sessions.create_with_id(&id, None, None).await;
            }
            (id, !existed)
        }
        _ => (state.sessions.create(None, None).await, true),
    };

    info!(session_id = %session_id, mode = %mode, new = is_new, "Chat stream starting");

    // The user turn is appended before dispatch.
    if let Err(e) = state
        .sessions
        .append_message(&session_id, ChatMessage::user(&payload.message))
        .await
    {
        return Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
    }

    let model_id = state
        .sessions
        .get(&session_id)
        .await
        .map(|s| s.model_id)
        .unwrap_or_default();

    let upstream = state.service.stream_message(MessageRequest {
        session_id: session_id.clone(),
        user_input: payload.message.clone(),
        model_id,
        mode,
        stream: true,
    });

    let (tx, rx) = mpsc::channel::<String>(64);
    tokio::spawn(pump(state, session_id, is_new, upstream, tx));

    let stream = ReceiverStream::new(rx).map(|json| Ok(SseEvent::default().data(json)));
    // The data-level heartbeat below is the contract; the protocol-level
    // keep-alive comment is disabled in its favor.
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(3600))))
}

/// Forward upstream frames as SSE data lines, inserting heartbeats during
/// silence and sealing the assistant message after `done`.
async fn pump(
    state: SharedState,
    session_id: String,
    is_new: bool,
    mut upstream: mpsc::Receiver<StreamChunk>,
    tx: mpsc::Sender<String>,
) {
    let mut answer = String::new();
    let mut reasoning = String::new();
    let mut done_sent = false;
    let mut disconnected = false;

    if is_new {
        let event = AgentChunk::SessionId {
            session_id: session_id.clone(),
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        disconnected = tx.send(json).await.is_err();
    }

    while !disconnected {
        let frame = tokio::select! {
            frame = upstream.recv() => frame,
            // The sleep is re-armed each loop pass, so it measures silence
            // since the last event.
            _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                let json = serde_json::to_string(&AgentChunk::heartbeat_now()).unwrap_or_default();
                if tx.send(json).await.is_err() {
                    disconnected = true;
                }
                continue;
            }
        };

        let Some(frame) = frame else {
            break; // upstream finished
        };

        match frame.chunk_type {
            ChunkType::Answer => answer.push_str(&frame.content),
            ChunkType::ThinkingChunk => reasoning.push_str(&frame.content),
            _ => {}
        }
        if frame.chunk_type == ChunkType::Done {
            done_sent = true;
        }

        let event = translate(&frame);
        if tx.send(event.to_string()).await.is_err() {
            // Client disconnected; dropping the upstream receiver below
            // cancels the turn at its next suspension point. The partial
            // answer is still sealed into the session.
            debug!(session_id = %session_id, "SSE client disconnected");
            disconnected = true;
        }
        if frame.is_last {
            break;
        }
    }
    drop(upstream);

    // The stream must always terminate with exactly one done.
    if !done_sent && !disconnected {
        warn!(session_id = %session_id, "Upstream ended without done, sealing stream");
        let _ = tx
            .send(serde_json::json!({"type": "error", "message": "stream ended unexpectedly"}).to_string())
            .await;
        let _ = tx
            .send(serde_json::json!({"type": "done", "stats": {}}).to_string())
            .await;
    }

    // The assistant turn is appended after done.
    if !answer.is_empty() || !reasoning.is_empty() {
        let reasoning = (!reasoning.is_empty()).then_some(reasoning);
        if let Err(e) = state
            .sessions
            .append_message(&session_id, ChatMessage::assistant(answer, reasoning))
            .await
        {
            warn!(session_id = %session_id, error = %e, "Failed to append assistant message");
        }
    }
}

/// RPC frame → SSE data object.
fn translate(frame: &StreamChunk) -> serde_json::Value {
    match frame.chunk_type {
        ChunkType::ThinkingStart => serde_json::json!({ "type": "reasoning_start" }),
        ChunkType::ThinkingChunk => {
            serde_json::json!({ "type": "reasoning_chunk", "content": frame.content })
        }
        ChunkType::ThinkingEnd => serde_json::json!({ "type": "reasoning_end" }),
        ChunkType::AnswerStart => serde_json::json!({ "type": "answer_start" }),
        ChunkType::Answer => serde_json::json!({ "type": "chunk", "content": frame.content }),
        ChunkType::Error => serde_json::json!({ "type": "error", "message": frame.content }),
        ChunkType::Done => {
            let stats: serde_json::Value =
                serde_json::from_str(&frame.content).unwrap_or(serde_json::json!({}));
            serde_json::json!({ "type": "done", "stats": stats })
        }
    }
}
