//! Direct mode — a single streaming LLM call, no tools, no loop.

use super::{stream_answer, ModeDispatcher, TurnInput, TurnOutcome};
use tokio::sync::mpsc;
use tracing::warn;
use wayfarer_core::chunk::{AgentChunk, TurnStats};

const SYSTEM_PROMPT: &str = "你是一个友好的旅行助手。直接、简洁地回答用户的问题。";

pub(super) async fn run(
    dispatcher: &ModeDispatcher,
    turn: &TurnInput,
    tx: &mpsc::Sender<AgentChunk>,
) -> TurnOutcome {
    let request = dispatcher.chat_request(SYSTEM_PROMPT, turn, true);

    match stream_answer(dispatcher.provider.as_ref(), request, tx).await {
        Ok(answer) => TurnOutcome {
            success: true,
            answer,
            reasoning_text: String::new(),
            history: Vec::new(),
            stats: TurnStats::default(),
            error: None,
        },
        Err(e) => {
            warn!(error = %e, "Direct mode LLM call failed");
            TurnOutcome::failed(e.to_string())
        }
    }
}
