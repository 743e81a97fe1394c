//! ReAct mode — drives the loop, then synthesizes the answer.
//!
//! The loop's trace chunks are wrapped in `reasoning_start`/`reasoning_end`;
//! a final streaming LLM call conditioned on the collected tool results
//! produces the user-facing answer.

use super::{stream_answer, ModeDispatcher, TurnInput, TurnOutcome};
use crate::react::{LoopState, ReactLoop};
use crate::thought_engine::ThoughtEngine;
use crate::trace;
use tokio::sync::mpsc;
use tracing::warn;
use wayfarer_core::chunk::{AgentChunk, TurnStats};
use wayfarer_core::provider::{ChatTurn, ProviderRequest};

const SYSTEM_PROMPT: &str =
    "你是一个专业的旅行助手。基于下面给出的工具查询结果，为用户生成有条理、具体的回答。\
     只使用工具结果中的信息，不要编造。";

const DIRECT_SYSTEM_PROMPT: &str = "你是一个友好的旅行助手。直接、简洁地回答用户的问题。";

pub(super) async fn run(
    dispatcher: &ModeDispatcher,
    turn: &TurnInput,
    tx: &mpsc::Sender<AgentChunk>,
) -> TurnOutcome {
    let _ = tx.send(AgentChunk::ReasoningStart).await;

    let engine = ThoughtEngine::new(
        Some(dispatcher.provider.clone()),
        dispatcher.model.clone(),
        dispatcher.temperature,
    );
    let loop_ = ReactLoop::new(
        engine,
        dispatcher.registry.clone(),
        dispatcher.loop_config.clone(),
    );

    let context_text = turn
        .context
        .iter()
        .rev()
        .take(4)
        .rev()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let outcome = loop_.run(&turn.user_input, &context_text, tx).await;
    let _ = tx.send(AgentChunk::ReasoningEnd).await;

    let reasoning_text = trace::render_history(&outcome.history);
    let stats = TurnStats {
        success: false, // the dispatcher fills this in
        steps_completed: outcome.steps_completed,
        successful_steps: outcome.successful_steps,
        tools_used: outcome.tools_used.clone(),
        duration_ms: 0,
    };

    if outcome.cancelled {
        // Partial result; the terminal done still goes out.
        return TurnOutcome {
            success: true,
            answer: String::new(),
            reasoning_text,
            history: outcome.history,
            stats,
            error: None,
        };
    }

    if outcome.state == LoopState::Error {
        return TurnOutcome {
            success: false,
            answer: "抱歉，本次查询没有得到可用的结果。".into(),
            reasoning_text,
            history: outcome.history,
            stats,
            error: Some("no successful action produced content".into()),
        };
    }

    // ── Final answer ──
    let request = if outcome.direct_answer {
        dispatcher.chat_request(DIRECT_SYSTEM_PROMPT, turn, true)
    } else {
        synthesis_request(dispatcher, turn, &outcome.history)
    };

    match stream_answer(dispatcher.provider.as_ref(), request, tx).await {
        Ok(answer) => TurnOutcome {
            success: true,
            answer,
            reasoning_text,
            history: outcome.history,
            stats,
            error: None,
        },
        Err(e) => {
            warn!(error = %e, "Answer synthesis failed");
            TurnOutcome {
                success: false,
                answer: format!("抱歉，生成回答时出现问题：{e}"),
                reasoning_text,
                history: outcome.history,
                stats,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Build the synthesis request from the successful tool results.
pub(super) fn synthesis_request(
    dispatcher: &ModeDispatcher,
    turn: &TurnInput,
    history: &[wayfarer_core::thought::HistoryStep],
) -> ProviderRequest {
    let mut results = String::new();
    for step in history {
        if let Some(action) = &step.action {
            if let Some(value) = &action.result {
                results.push_str(&format!("### {}\n{}\n", action.tool_name, value));
            }
        }
    }

    let prompt = format!(
        "用户请求: {}\n\n工具查询结果:\n{}\n请生成最终回答。",
        turn.user_input, results
    );

    ProviderRequest {
        model: dispatcher.model.clone(),
        messages: vec![ChatTurn::system(SYSTEM_PROMPT), ChatTurn::user(prompt)],
        temperature: dispatcher.temperature,
        max_tokens: dispatcher.max_tokens,
        stream: true,
        stop: vec![],
    }
}
