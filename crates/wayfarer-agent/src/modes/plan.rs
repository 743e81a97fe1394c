//! Plan mode — two-pass plan-then-execute.
//!
//! Pass 1: one non-streaming LLM call produces a JSON plan. A parse
//! failure falls back to ReAct mode. Pass 2: the steps run sequentially
//! through the registry with no LLM reasoning in between; unknown tools
//! are recorded as FAILED actions. A final streaming call synthesizes the
//! answer from the collected results.

use super::{react_mode, stream_answer, ModeDispatcher, TurnInput, TurnOutcome};
use crate::evaluate::EvaluationEngine;
use crate::thought_engine::strip_code_fences;
use serde::Deserialize;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use wayfarer_core::chunk::{AgentChunk, TurnStats};
use wayfarer_core::thought::{
    Action, Decision, HistoryStep, Phase, PlannedCall, Thought, ThoughtKind,
};

#[derive(Debug, Deserialize)]
struct PlanDoc {
    goal: String,
    steps: Vec<PlanStepDoc>,
}

#[derive(Debug, Deserialize)]
struct PlanStepDoc {
    #[serde(default)]
    #[allow(dead_code)]
    step: Option<u32>,
    action: String,
    #[serde(default)]
    params: serde_json::Value,
    #[serde(default)]
    description: String,
    #[serde(default)]
    phase: String,
}

fn parse_phase(s: &str) -> Phase {
    match s {
        "understanding" => Phase::Understanding,
        "planning" => Phase::Planning,
        "generation" => Phase::Generation,
        _ => Phase::Execution,
    }
}

fn phase_marker(phase: Phase) -> &'static str {
    match phase {
        Phase::Understanding => "理解阶段",
        Phase::Planning => "规划阶段",
        Phase::Execution => "执行阶段",
        Phase::Generation => "生成阶段",
    }
}

pub(super) async fn run(
    dispatcher: &ModeDispatcher,
    turn: &TurnInput,
    tx: &mpsc::Sender<AgentChunk>,
) -> TurnOutcome {
    // ── Pass 1: plan ──
    let plan = match request_plan(dispatcher, turn).await {
        Ok(plan) => plan,
        Err(reason) => {
            // Parse or provider failure degrades to ReAct.
            warn!(%reason, "Plan mode failed to produce a plan, falling back to ReAct");
            return react_mode::run(dispatcher, turn, tx).await;
        }
    };

    debug!(goal = %plan.goal, steps = plan.steps.len(), "Executing plan");

    // ── Pass 2: sequential execution ──
    let _ = tx.send(AgentChunk::ReasoningStart).await;
    let _ = tx
        .send(AgentChunk::ReasoningChunk {
            content: format!(
                "【{}】目标: {}（共 {} 步）\n",
                phase_marker(Phase::Planning),
                plan.goal,
                plan.steps.len()
            ),
        })
        .await;

    let calls: Vec<PlannedCall> = plan
        .steps
        .iter()
        .map(|s| PlannedCall::new(&s.action, s.params.clone()))
        .collect();
    let plan_thought = Thought::new(
        ThoughtKind::Planning,
        Phase::Planning,
        format!("计划: {}", plan.goal),
        0.75,
    )
    .with_decision(Decision {
        calls,
        rationale: None,
    });

    let mut history = vec![HistoryStep::new(0, Phase::Planning, plan_thought, None, None)];
    let evaluator = EvaluationEngine::new();
    let mut attempted: HashSet<String> = HashSet::new();

    for (index, step) in plan.steps.iter().enumerate() {
        let step_index = index + 1;
        let phase = parse_phase(&step.phase);
        let _ = tx
            .send(AgentChunk::ReasoningChunk {
                content: format!(
                    "【{}】第 {} 步: {} → {}\n",
                    phase_marker(phase),
                    step_index,
                    step.description,
                    step.action
                ),
            })
            .await;

        let call = PlannedCall::new(&step.action, step.params.clone());
        let mut action = Action::pending(&step.action, step.params.clone());

        if !attempted.insert(call.dedup_key()) {
            // Within one plan, identical (tool, params) steps coalesce.
            action.skip("重复调用，已合并");
        } else if tx.is_closed() {
            action.skip("任务已取消");
        } else {
            action.start();
            let result = dispatcher
                .registry
                .execute(&step.action, step.params.clone())
                .await;
            action.finish(&result);
        }

        let evaluation = evaluator.evaluate(&action);
        let thought = Thought::new(
            ThoughtKind::Inference,
            phase,
            if step.description.is_empty() {
                format!("执行 {}", step.action)
            } else {
                step.description.clone()
            },
            0.8,
        );
        history.push(HistoryStep::new(
            step_index,
            phase,
            thought,
            Some(action),
            Some(evaluation),
        ));
    }

    let _ = tx.send(AgentChunk::ReasoningEnd).await;

    // ── Pass 3: synthesis ──
    let steps_completed = plan.steps.len() + 1;
    let successful_steps = history
        .iter()
        .filter(|s| s.action.as_ref().is_some_and(Action::succeeded))
        .count();
    let mut tools_used: Vec<String> = Vec::new();
    for step in &history {
        if let Some(action) = &step.action {
            if action.status != wayfarer_core::thought::ActionStatus::Skipped
                && !tools_used.contains(&action.tool_name)
            {
                tools_used.push(action.tool_name.clone());
            }
        }
    }

    let reasoning_text = crate::trace::render_history(&history);
    let stats = TurnStats {
        success: false,
        steps_completed,
        successful_steps,
        tools_used,
        duration_ms: 0,
    };

    let request = react_mode::synthesis_request(dispatcher, turn, &history);
    match stream_answer(dispatcher.provider.as_ref(), request, tx).await {
        Ok(answer) => TurnOutcome {
            success: true,
            answer,
            reasoning_text,
            history,
            stats,
            error: None,
        },
        Err(e) => {
            warn!(error = %e, "Plan synthesis failed");
            TurnOutcome {
                success: false,
                answer: format!("抱歉，生成回答时出现问题：{e}"),
                reasoning_text,
                history,
                stats,
                error: Some(e.to_string()),
            }
        }
    }
}

/// One non-streaming call asking for a strict JSON plan.
async fn request_plan(
    dispatcher: &ModeDispatcher,
    turn: &TurnInput,
) -> Result<PlanDoc, String> {
    let tool_lines: Vec<String> = dispatcher
        .registry
        .list()
        .iter()
        .map(|d| {
            let params: Vec<&str> = d.params.iter().map(|p| p.name.as_str()).collect();
            format!("- {} ({}): {}", d.name, params.join(", "), d.description)
        })
        .collect();

    let prompt = format!(
        "为下面的用户请求制定一个工具执行计划，只输出一个JSON对象：\n\
         {{\"goal\": \"...\", \"steps\": [{{\"step\": 1, \"action\": \"工具名\", \
         \"params\": {{}}, \"description\": \"...\", \"phase\": \"execution\"}}]}}\n\
         可用工具:\n{}\n最后一步使用 final_answer。\n用户请求: {}",
        tool_lines.join("\n"),
        turn.user_input
    );

    let request = wayfarer_core::provider::ProviderRequest {
        model: dispatcher.model.clone(),
        messages: vec![wayfarer_core::provider::ChatTurn::user(prompt)],
        temperature: dispatcher.temperature.min(0.3),
        max_tokens: dispatcher.max_tokens,
        stream: false,
        stop: vec![],
    };

    let response = dispatcher
        .provider
        .complete(request)
        .await
        .map_err(|e| e.to_string())?;

    let plan: PlanDoc = serde_json::from_str(strip_code_fences(&response.content))
        .map_err(|e| format!("unparseable plan: {e}"))?;
    if plan.steps.is_empty() {
        return Err("plan has no steps".into());
    }
    Ok(plan)
}
