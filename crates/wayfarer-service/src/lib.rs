//! Agent service — the RPC surface in front of the mode dispatcher.
//!
//! Three operations: `process_message` (unary, buffering), `stream_message`
//! (server-streaming over a bounded channel), and `health_check`. The
//! streaming path provides backpressure by construction: a slow consumer
//! fills the bounded channels and suspends the producing loop at its next
//! emit. Events are never dropped; ordering carries semantic meaning.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use wayfarer_agent::{ExecutionMode, LoopConfig, ModeDispatcher, TurnInput};
use wayfarer_core::chunk::{AgentChunk, TurnStats};
use wayfarer_core::thought::HistoryStep;
use wayfarer_core::tool::ToolRegistry;
use wayfarer_providers::ModelManager;

/// Capacity of each per-call chunk channel. Blocking-on-full is the
/// backpressure contract.
const CHANNEL_CAPACITY: usize = 64;

/// One turn request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub session_id: String,

    pub user_input: String,

    /// Empty selects the configured default model.
    #[serde(default)]
    pub model_id: String,

    /// Execution mode: "direct" | "react" | "plan". Empty means "react".
    #[serde(default)]
    pub mode: String,

    #[serde(default)]
    pub stream: bool,
}

/// Reasoning summary nested in the unary response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReasoningSummary {
    pub text: String,
    pub total_steps: usize,
    pub tools_used: Vec<String>,
}

/// The unary response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub answer: String,
    pub reasoning: ReasoningSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub history: Vec<HistoryStep>,
}

/// The kind of a streamed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    ThinkingStart,
    ThinkingChunk,
    ThinkingEnd,
    AnswerStart,
    Answer,
    Done,
    Error,
}

/// One frame of the server-streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub chunk_type: ChunkType,
    pub content: String,
    pub is_last: bool,
}

impl StreamChunk {
    /// Map an engine chunk onto the RPC vocabulary.
    ///
    /// `session_id` and `heartbeat` are gateway-side concerns and have no
    /// RPC frame.
    fn from_agent_chunk(chunk: AgentChunk) -> Option<Self> {
        let (chunk_type, content, is_last) = match chunk {
            AgentChunk::ReasoningStart => (ChunkType::ThinkingStart, String::new(), false),
            AgentChunk::ReasoningChunk { content } => (ChunkType::ThinkingChunk, content, false),
            AgentChunk::ReasoningEnd => (ChunkType::ThinkingEnd, String::new(), false),
            AgentChunk::AnswerStart => (ChunkType::AnswerStart, String::new(), false),
            AgentChunk::AnswerChunk { content } => (ChunkType::Answer, content, false),
            AgentChunk::Error { message } => (ChunkType::Error, message, false),
            AgentChunk::Done { stats } => (
                ChunkType::Done,
                serde_json::to_string(&stats).unwrap_or_default(),
                true,
            ),
            AgentChunk::SessionId { .. } | AgentChunk::Heartbeat { .. } => return None,
        };
        Some(Self {
            chunk_type,
            content,
            is_last,
        })
    }

    fn error_frame(message: impl Into<String>) -> Self {
        Self {
            chunk_type: ChunkType::Error,
            content: message.into(),
            is_last: false,
        }
    }

    fn done_frame(stats: &TurnStats) -> Self {
        Self {
            chunk_type: ChunkType::Done,
            content: serde_json::to_string(stats).unwrap_or_default(),
            is_last: true,
        }
    }
}

/// Liveness report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub version: String,
    pub status: String,
}

/// The agent service.
pub struct AgentService {
    models: Arc<ModelManager>,
    registry: Arc<ToolRegistry>,
    loop_config: LoopConfig,
}

impl AgentService {
    pub fn new(models: Arc<ModelManager>, registry: Arc<ToolRegistry>, loop_config: LoopConfig) -> Self {
        Self {
            models,
            registry,
            loop_config,
        }
    }

    /// Validate a request and build the dispatcher for it.
    fn dispatcher_for(
        &self,
        request: &MessageRequest,
    ) -> Result<(ModeDispatcher, ExecutionMode), String> {
        if request.user_input.trim().is_empty() {
            return Err("user_input must not be empty".into());
        }
        let mode = ExecutionMode::parse(&request.mode)
            .ok_or_else(|| format!("unknown mode: '{}'", request.mode))?;
        let (provider, entry) = self
            .models
            .resolve(&request.model_id)
            .map_err(|e| e.to_string())?;

        Ok((
            ModeDispatcher::new(
                provider,
                entry.model.clone(),
                entry.temperature,
                Some(entry.max_tokens),
                self.registry.clone(),
                self.loop_config.clone(),
            ),
            mode,
        ))
    }

    /// Unary processing: run the dispatcher with a buffering collector.
    pub async fn process_message(&self, request: MessageRequest) -> MessageResponse {
        let (dispatcher, mode) = match self.dispatcher_for(&request) {
            Ok(v) => v,
            Err(message) => {
                warn!(%message, "Rejected message request");
                return MessageResponse {
                    success: false,
                    answer: String::new(),
                    reasoning: ReasoningSummary::default(),
                    error: Some(message),
                    history: Vec::new(),
                };
            }
        };

        let turn = TurnInput {
            user_input: request.user_input.clone(),
            context: Vec::new(),
        };

        // Drain concurrently so the bounded channel never wedges the loop.
        let (tx, mut rx) = mpsc::channel::<AgentChunk>(CHANNEL_CAPACITY);
        let collector = tokio::spawn(async move {
            let mut count = 0usize;
            while rx.recv().await.is_some() {
                count += 1;
            }
            count
        });

        let outcome = dispatcher.run(mode, &turn, &tx).await;
        drop(tx);
        let _ = collector.await;

        MessageResponse {
            success: outcome.success,
            answer: outcome.answer,
            reasoning: ReasoningSummary {
                text: outcome.reasoning_text,
                total_steps: outcome.stats.steps_completed,
                tools_used: outcome.stats.tools_used.clone(),
            },
            error: outcome.error,
            history: outcome.history,
        }
    }

    /// Server-streaming processing.
    ///
    /// The returned receiver yields ordered frames ending with exactly one
    /// `done` frame marked `is_last`. Dropping the receiver cancels the
    /// turn at the loop's next suspension point.
    pub fn stream_message(&self, request: MessageRequest) -> mpsc::Receiver<StreamChunk> {
        let (out_tx, out_rx) = mpsc::channel::<StreamChunk>(CHANNEL_CAPACITY);

        let built = self.dispatcher_for(&request);
        let turn = TurnInput {
            user_input: request.user_input.clone(),
            context: Vec::new(),
        };

        tokio::spawn(async move {
            let (dispatcher, mode) = match built {
                Ok(v) => v,
                Err(message) => {
                    let _ = out_tx.send(StreamChunk::error_frame(message)).await;
                    let _ = out_tx
                        .send(StreamChunk::done_frame(&TurnStats::default()))
                        .await;
                    return;
                }
            };

            info!(session_id = %request.session_id, mode = mode.as_str(), "StreamMessage started");

            let (tx, mut rx) = mpsc::channel::<AgentChunk>(CHANNEL_CAPACITY);
            let producer = tokio::spawn(async move {
                dispatcher.run(mode, &turn, &tx).await;
            });

            // Forward in order; a full outbound channel suspends this task
            // and, transitively, the loop.
            while let Some(chunk) = rx.recv().await {
                if let Some(frame) = StreamChunk::from_agent_chunk(chunk) {
                    if out_tx.send(frame).await.is_err() {
                        break;
                    }
                }
            }
            // Closing the inner channel is what the producer observes as
            // cancellation when the consumer went away early.
            drop(rx);
            let _ = producer.await;
        });

        out_rx
    }

    /// Liveness and version.
    pub fn health_check(&self) -> HealthStatus {
        HealthStatus {
            healthy: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: "serving".into(),
        }
    }
}
