//! Engine-level streaming events.
//!
//! [`AgentChunk`] is the tagged union every execution mode emits into the
//! bounded outbound channel. The RPC server and the SSE gateway each map it
//! onto their own wire vocabulary; ordering carries semantic meaning, so
//! producers block when the channel is full rather than dropping events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary statistics attached to the terminal `done` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnStats {
    /// Whether the turn produced a usable answer.
    pub success: bool,

    /// Loop iterations completed (0 for direct mode).
    pub steps_completed: usize,

    /// Iterations whose action ended in SUCCESS.
    pub successful_steps: usize,

    /// Distinct tool names invoked this turn.
    pub tools_used: Vec<String>,

    /// Total turn duration in milliseconds.
    pub duration_ms: u64,
}

/// Events emitted over the stream for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentChunk {
    /// Session identifier, emitted exactly once and first.
    SessionId { session_id: String },

    /// The reasoning trace is about to start.
    ReasoningStart,

    /// One formatted piece of the reasoning trace.
    ReasoningChunk { content: String },

    /// The reasoning trace is complete.
    ReasoningEnd,

    /// The user-facing answer is about to start.
    AnswerStart,

    /// Partial answer text.
    AnswerChunk { content: String },

    /// Keep-alive during silence.
    Heartbeat { ts: DateTime<Utc> },

    /// A turn-level failure; followed by a terminal `done`.
    Error { message: String },

    /// Terminal event, emitted exactly once per turn.
    Done { stats: TurnStats },
}

impl AgentChunk {
    /// The wire tag for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionId { .. } => "session_id",
            Self::ReasoningStart => "reasoning_start",
            Self::ReasoningChunk { .. } => "reasoning_chunk",
            Self::ReasoningEnd => "reasoning_end",
            Self::AnswerStart => "answer_start",
            Self::AnswerChunk { .. } => "answer_chunk",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
        }
    }

    pub fn heartbeat_now() -> Self {
        Self::Heartbeat { ts: Utc::now() }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_serialization_tags() {
        let json = serde_json::to_string(&AgentChunk::ReasoningChunk {
            content: "step 1".into(),
        })
        .unwrap();
        assert!(json.contains(r#""type":"reasoning_chunk""#));
        assert!(json.contains(r#""content":"step 1""#));

        let json = serde_json::to_string(&AgentChunk::SessionId {
            session_id: "abc".into(),
        })
        .unwrap();
        assert!(json.contains(r#""type":"session_id""#));
    }

    #[test]
    fn done_carries_stats() {
        let json = serde_json::to_string(&AgentChunk::Done {
            stats: TurnStats {
                success: true,
                steps_completed: 3,
                successful_steps: 2,
                tools_used: vec!["search_cities".into()],
                duration_ms: 120,
            },
        })
        .unwrap();
        assert!(json.contains(r#""steps_completed":3"#));
        assert!(json.contains("search_cities"));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(AgentChunk::ReasoningStart.event_type(), "reasoning_start");
        assert_eq!(AgentChunk::AnswerStart.event_type(), "answer_start");
        assert_eq!(
            AgentChunk::Done {
                stats: TurnStats::default()
            }
            .event_type(),
            "done"
        );
        assert_eq!(AgentChunk::heartbeat_now().event_type(), "heartbeat");
    }

    #[test]
    fn chunk_deserialization() {
        let json = r#"{"type":"answer_chunk","content":"hi"}"#;
        let chunk: AgentChunk = serde_json::from_str(json).unwrap();
        match chunk {
            AgentChunk::AnswerChunk { content } => assert_eq!(content, "hi"),
            other => panic!("Wrong variant: {other:?}"),
        }
    }
}
