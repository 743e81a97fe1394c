//! Reasoning-trace formatting.
//!
//! The loop emits structured [`HistoryStep`] records; this module renders
//! them into the human-readable text that flows out as reasoning chunks.
//! The decorative rules are a presentation convention of the stream, not a
//! contract of the engine.

use wayfarer_core::thought::{ActionStatus, HistoryStep, Phase};

const RULE: &str = "────────────────────────────────";

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Understanding => "理解阶段",
        Phase::Planning => "规划阶段",
        Phase::Execution => "执行阶段",
        Phase::Generation => "生成阶段",
    }
}

fn status_label(status: ActionStatus) -> &'static str {
    match status {
        ActionStatus::Pending => "待执行",
        ActionStatus::Running => "执行中",
        ActionStatus::Success => "成功",
        ActionStatus::Failed => "失败",
        ActionStatus::Timeout => "超时",
        ActionStatus::Skipped => "已跳过",
    }
}

/// Render one loop iteration for the reasoning stream.
pub fn format_step(step: &HistoryStep, elapsed_ms: u64) -> String {
    let mut out = String::new();
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!(
        "【{}】第 {} 步 · {:.1}s\n",
        phase_label(step.phase),
        step.step + 1,
        elapsed_ms as f64 / 1000.0
    ));
    out.push_str(&format!(
        "[{:?}] {} (置信度 {:.2})\n",
        step.thought.kind, step.thought.content, step.thought.confidence
    ));

    if let Some(action) = &step.action {
        out.push_str(&format!(
            "→ 行动: {}({}) — {}",
            action.tool_name,
            compact_params(&action.params),
            status_label(action.status),
        ));
        if action.duration_ms > 0 {
            out.push_str(&format!(" ({}ms)", action.duration_ms));
        }
        if let Some(error) = &action.error {
            out.push_str(&format!(" — {error}"));
        }
        out.push('\n');
    }

    if let Some(eval) = &step.evaluation {
        out.push_str(&format!(
            "→ 评估: {}, 置信度变化 {:+.2}\n",
            if eval.success { "成功" } else { "未成功" },
            eval.confidence_delta
        ));
    }

    out
}

/// Render a whole task history, as stored on the assistant message.
pub fn render_history(history: &[HistoryStep]) -> String {
    history
        .iter()
        .map(|step| format_step(step, 0))
        .collect::<Vec<_>>()
        .join("")
}

/// Keep the trace readable when params are large.
fn compact_params(params: &serde_json::Value) -> String {
    let text = params.to_string();
    if text.chars().count() > 120 {
        let truncated: String = text.chars().take(117).collect();
        format!("{truncated}...")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_core::thought::{Action, Evaluation, Thought, ThoughtKind};
    use wayfarer_core::tool::ExecutionResult;

    #[test]
    fn formats_full_step() {
        let thought = Thought::new(ThoughtKind::Inference, Phase::Execution, "调用搜索", 0.8);
        let mut action = Action::pending("search_cities", serde_json::json!({"interests": ["美食"]}));
        action.start();
        action.finish(&ExecutionResult::success(serde_json::json!({"count": 3})));
        let eval = Evaluation {
            success: true,
            duration_ms: 4,
            has_result: true,
            confidence_delta: 0.05,
        };
        let step = HistoryStep::new(1, Phase::Execution, thought, Some(action), Some(eval));

        let text = format_step(&step, 1234);
        assert!(text.contains("执行阶段"));
        assert!(text.contains("第 2 步"));
        assert!(text.contains("search_cities"));
        assert!(text.contains("成功"));
        assert!(text.contains("+0.05"));
        assert!(text.starts_with(RULE));
    }

    #[test]
    fn formats_thought_only_step() {
        let thought = Thought::new(ThoughtKind::Analysis, Phase::Understanding, "意图识别", 0.7);
        let step = HistoryStep::new(0, Phase::Understanding, thought, None, None);
        let text = format_step(&step, 10);
        assert!(text.contains("理解阶段"));
        assert!(!text.contains("行动"));
    }

    #[test]
    fn long_params_truncated() {
        let big = serde_json::json!({"cities": vec!["很长的城市名称"; 40]});
        let compact = compact_params(&big);
        assert!(compact.chars().count() <= 120);
        assert!(compact.ends_with("..."));
    }
}
