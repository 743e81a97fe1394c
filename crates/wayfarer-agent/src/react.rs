//! ReAct loop — the bounded Reason-Act-Observe-Evaluate state machine.
//!
//! Iteration 0 seals two records (ANALYSIS then PLANNING) and queues the
//! plan; each later iteration observes the task memory, produces an
//! INFERENCE (or REFLECTION after a failure) thought, executes the next
//! planned tool call, evaluates the outcome, seals a [`HistoryStep`], and
//! emits a formatted trace chunk.
//!
//! Termination: a designated terminal tool succeeds, the latest thought is
//! confident with a non-empty decision, the plan runs dry, the step budget
//! is exhausted, the task deadline expires, or the client cancels. Tool
//! failures never terminate the loop; they surface as REFLECTION thoughts
//! and the failed (tool, params) pair is never retried within the task.

use crate::evaluate::EvaluationEngine;
use crate::memory::TaskMemory;
use crate::thought_engine::ThoughtEngine;
use crate::trace;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wayfarer_core::chunk::AgentChunk;
use wayfarer_core::thought::{Action, HistoryStep, Observation, Phase, PlannedCall};
use wayfarer_core::tool::ToolRegistry;

/// Loop limits and deadlines.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Hard cap on iterations.
    pub max_steps: usize,

    /// Cap on nested reasoning depth (reserved for chained engines).
    pub max_reasoning_depth: usize,

    /// Whole-task deadline; `None` means unbounded.
    pub task_deadline: Option<Duration>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            max_reasoning_depth: 5,
            task_deadline: None,
        }
    }
}

/// Coarse machine states, tracked for logging and the final outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Reasoning,
    Acting,
    Observing,
    Evaluating,
    Completed,
    Error,
}

/// Everything the loop hands back to its execution mode.
#[derive(Debug)]
pub struct LoopOutcome {
    pub history: Vec<HistoryStep>,
    pub state: LoopState,
    pub steps_completed: usize,
    pub successful_steps: usize,
    pub tools_used: Vec<String>,
    pub confidence: f32,

    /// Planning yielded zero steps: the mode answers via the LLM directly.
    pub direct_answer: bool,

    /// The client went away; partial history is still valid.
    pub cancelled: bool,

    /// The task deadline expired before the plan finished.
    pub deadline_expired: bool,
}

/// The bounded-step ReAct state machine.
pub struct ReactLoop {
    engine: ThoughtEngine,
    evaluator: EvaluationEngine,
    registry: Arc<ToolRegistry>,
    config: LoopConfig,
}

impl ReactLoop {
    pub fn new(engine: ThoughtEngine, registry: Arc<ToolRegistry>, config: LoopConfig) -> Self {
        Self {
            engine,
            evaluator: EvaluationEngine::new(),
            registry,
            config,
        }
    }

    /// Run one task to completion, emitting reasoning chunks as it goes.
    ///
    /// A closed channel is cancellation: the loop stops at the next
    /// suspension point and refuses further tool invocations.
    pub async fn run(
        &self,
        user_input: &str,
        context: &str,
        tx: &mpsc::Sender<AgentChunk>,
    ) -> LoopOutcome {
        let started = Instant::now();
        let mut memory = TaskMemory::new();
        let mut queue: VecDeque<PlannedCall> = VecDeque::new();
        let mut confidence: f32 = 0.0;
        let mut state = LoopState::Idle;
        let mut cancelled = false;
        let mut deadline_expired = false;
        let mut direct_answer = false;

        info!(max_steps = self.config.max_steps, "ReAct loop starting");

        'iterations: for step in 0..self.config.max_steps {
            // Global deadline is checked at the top of each iteration.
            if let Some(deadline) = self.config.task_deadline {
                if started.elapsed() >= deadline {
                    warn!(step, "Task deadline expired, finalizing with partial history");
                    deadline_expired = true;
                    state = LoopState::Completed;
                    break;
                }
            }
            if tx.is_closed() {
                cancelled = true;
                break;
            }

            state = LoopState::Reasoning;
            let elapsed = started.elapsed().as_millis() as u64;
            let final_step = step + 1 >= self.config.max_steps;
            debug!(step, ?state, "ReAct iteration");

            // ── Think ──
            if step == 0 {
                let (analysis_thought, analysis) =
                    self.engine.analyze_task(user_input, context).await;
                confidence = analysis_thought.confidence;

                let record =
                    HistoryStep::new(0, Phase::Understanding, analysis_thought, None, None);
                if !record_and_emit(&mut memory, record, elapsed, tx).await {
                    cancelled = true;
                    break;
                }

                let plan = self.engine.plan_actions(&analysis, &self.registry);
                confidence = confidence.max(plan.confidence);

                if !plan.has_nonempty_decision() {
                    // Zero-step plan: a single GENERATION thought, then the
                    // mode answers via the LLM directly.
                    let decision = self.engine.decide(confidence);
                    let record = HistoryStep::new(0, Phase::Generation, decision, None, None);
                    if !record_and_emit(&mut memory, record, elapsed, tx).await {
                        cancelled = true;
                    }
                    direct_answer = true;
                    state = LoopState::Completed;
                    break;
                }

                queue = plan
                    .decision
                    .as_ref()
                    .map(|d| d.calls.clone())
                    .unwrap_or_default()
                    .into();

                // The plan itself performs no call; execution starts on the
                // next iteration.
                let record = HistoryStep::new(0, Phase::Planning, plan, None, None);
                if !record_and_emit(&mut memory, record, elapsed, tx).await {
                    cancelled = true;
                    break;
                }
                continue 'iterations;
            }

            // Stop predicate over the prior step.
            let terminal_done = memory
                .last_action()
                .is_some_and(|a| a.succeeded() && self.registry.is_terminal(&a.tool_name));
            let confident_decision = memory
                .view()
                .last()
                .is_some_and(|s| s.thought.confidence > 0.9 && s.thought.has_nonempty_decision());
            let plan_exhausted =
                queue.is_empty() && !memory.last_action().is_some_and(Action::failed);

            if terminal_done || confident_decision || plan_exhausted {
                let decision = self.engine.decide(confidence);
                let record = HistoryStep::new(step, Phase::Generation, decision, None, None);
                if !record_and_emit(&mut memory, record, elapsed, tx).await {
                    cancelled = true;
                }
                state = LoopState::Completed;
                break;
            }

            state = LoopState::Observing;
            let last_failed = memory.last_action().filter(|a| a.failed()).cloned();
            let next_call = queue.front().cloned();
            let thought = {
                let observation = Observation {
                    step,
                    history: memory.view(),
                    last_action: memory.last_action(),
                    elapsed_ms: elapsed,
                };
                match &last_failed {
                    // Failures are reported, not retried; reflection
                    // carries the plan forward past the failed call.
                    Some(failed) => self.engine.reflect(failed, next_call.as_ref(), confidence),
                    None => self
                        .engine
                        .infer_step(&observation, next_call.as_ref(), confidence),
                }
            };

            // ── Act ──
            state = LoopState::Acting;
            let action = match queue.pop_front() {
                Some(call) => {
                    let mut action = Action::pending(&call.tool, call.params.clone());
                    if memory.was_attempted(&call) {
                        // Identical (tool, params) pairs coalesce: only the
                        // first is invoked.
                        action.skip("重复调用，已合并");
                    } else if tx.is_closed() {
                        cancelled = true;
                        action.skip("任务已取消");
                    } else {
                        memory.mark_attempted(&call);
                        action.start();
                        let result = self.registry.execute(&call.tool, call.params.clone()).await;
                        action.finish(&result);
                        debug!(
                            tool = %call.tool,
                            status = ?action.status,
                            duration_ms = action.duration_ms,
                            "Tool execution finished"
                        );
                    }
                    action
                }
                None => {
                    // The thought resolved to "no tool".
                    let mut action = Action::pending("none", serde_json::json!({}));
                    action.skip("无工具可调用");
                    action
                }
            };

            // ── Evaluate ──
            state = LoopState::Evaluating;
            let evaluation = self.evaluator.evaluate(&action);
            confidence = (confidence + evaluation.confidence_delta).clamp(0.0, 1.0);

            // ── Record & emit ──
            let phase = if final_step {
                Phase::Generation
            } else {
                Phase::Execution
            };
            let elapsed = started.elapsed().as_millis() as u64;
            let record = HistoryStep::new(step, phase, thought, Some(action), Some(evaluation));
            if !record_and_emit(&mut memory, record, elapsed, tx).await {
                cancelled = true;
                break;
            }

            if cancelled {
                break;
            }
        }

        // Step exhaustion is reported as successful partial completion
        // unless nothing ever succeeded.
        if state != LoopState::Completed {
            state = if memory.successful_steps() > 0 || direct_answer || cancelled {
                LoopState::Completed
            } else {
                LoopState::Error
            };
        }

        let outcome = LoopOutcome {
            steps_completed: memory.steps_completed(),
            successful_steps: memory.successful_steps(),
            tools_used: memory.tools_used(),
            confidence,
            direct_answer,
            cancelled,
            deadline_expired,
            state,
            history: memory.into_history(),
        };

        info!(
            steps = outcome.steps_completed,
            successful = outcome.successful_steps,
            state = ?outcome.state,
            cancelled = outcome.cancelled,
            "ReAct loop finished"
        );
        outcome
    }
}

/// Seal one record into memory and emit its formatted trace.
/// Returns `false` when the consumer has gone away.
async fn record_and_emit(
    memory: &mut TaskMemory,
    record: HistoryStep,
    elapsed_ms: u64,
    tx: &mpsc::Sender<AgentChunk>,
) -> bool {
    let content = trace::format_step(&record, elapsed_ms);
    memory.record(record);
    tx.send(AgentChunk::ReasoningChunk { content }).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use wayfarer_core::error::ToolError;
    use wayfarer_core::thought::{ActionStatus, ThoughtKind};
    use wayfarer_core::tool::{ParamKind, ParamSpec, Tool, ToolDescriptor};

    async fn run_loop(
        registry: ToolRegistry,
        config: LoopConfig,
        input: &str,
    ) -> (LoopOutcome, Vec<AgentChunk>) {
        let loop_ = ReactLoop::new(ThoughtEngine::rule_based(), Arc::new(registry), config);
        let (tx, mut rx) = mpsc::channel(64);
        let outcome = loop_.run(input, "", &tx).await;
        drop(tx);
        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }
        (outcome, chunks)
    }

    #[tokio::test]
    async fn city_recommendation_runs_search_then_terminal() {
        let (outcome, chunks) = run_loop(
            wayfarer_tools::default_registry(),
            LoopConfig::default(),
            "推荐适合美食游的城市",
        )
        .await;

        assert_eq!(outcome.state, LoopState::Completed);
        assert!(outcome.tools_used.contains(&"search_cities".to_string()));
        assert!(outcome.tools_used.contains(&"final_answer".to_string()));
        assert!(outcome.steps_completed <= 10);
        assert!(outcome.successful_steps >= 2);
        assert!(!outcome.direct_answer);

        // The search was invoked under an INFERENCE step and carried the
        // extracted interest.
        let search_step = outcome
            .history
            .iter()
            .find(|s| {
                s.action
                    .as_ref()
                    .is_some_and(|a| a.tool_name == "search_cities")
            })
            .unwrap();
        assert_eq!(search_step.thought.kind, ThoughtKind::Inference);
        assert_eq!(
            search_step.action.as_ref().unwrap().params["interests"][0],
            "美食"
        );

        // Final recorded thought is the DECISION.
        assert_eq!(
            outcome.history.last().unwrap().thought.kind,
            ThoughtKind::Decision
        );
        assert!(chunks
            .iter()
            .all(|c| matches!(c, AgentChunk::ReasoningChunk { .. })));
    }

    #[tokio::test]
    async fn step_zero_records_understanding_then_planning() {
        let (outcome, _) = run_loop(
            wayfarer_tools::default_registry(),
            LoopConfig::default(),
            "帮我规划北京3日游",
        )
        .await;

        assert_eq!(outcome.history[0].step, 0);
        assert_eq!(outcome.history[0].phase, Phase::Understanding);
        assert_eq!(outcome.history[0].thought.kind, ThoughtKind::Analysis);
        assert_eq!(outcome.history[1].step, 0);
        assert_eq!(outcome.history[1].phase, Phase::Planning);
        assert_eq!(outcome.history[1].thought.kind, ThoughtKind::Planning);
        assert!(outcome.history[1].action.is_none());
        // Execution starts at step 1.
        assert_eq!(outcome.history[2].step, 1);
        assert!(outcome.history[2].action.is_some());
    }

    #[tokio::test]
    async fn general_chat_is_direct_answer() {
        let (outcome, chunks) = run_loop(
            wayfarer_tools::default_registry(),
            LoopConfig::default(),
            "你好",
        )
        .await;

        assert!(outcome.direct_answer);
        assert_eq!(outcome.state, LoopState::Completed);
        assert!(outcome.tools_used.is_empty());
        // Understanding record plus the single GENERATION thought.
        assert_eq!(outcome.history.len(), 2);
        assert_eq!(outcome.history[1].phase, Phase::Generation);
        assert_eq!(chunks.len(), 2);
    }

    #[tokio::test]
    async fn max_steps_is_a_hard_stop() {
        let (outcome, _) = run_loop(
            wayfarer_tools::default_registry(),
            LoopConfig {
                max_steps: 2,
                ..Default::default()
            },
            "帮我规划北京3日游",
        )
        .await;

        assert_eq!(outcome.steps_completed, 2);
        assert_eq!(outcome.state, LoopState::Completed);
        assert!(outcome.successful_steps <= outcome.steps_completed);
        // Final step carries the GENERATION phase tag.
        assert_eq!(outcome.history.last().unwrap().phase, Phase::Generation);
    }

    /// Shadows `search_cities` with an executor that sleeps past its
    /// declared deadline.
    struct StallingTool;

    #[async_trait]
    impl Tool for StallingTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: "search_cities".into(),
                description: "stalls".into(),
                params: vec![ParamSpec::optional("interests", ParamKind::Array, "")],
                timeout: Duration::from_millis(10),
                category: "travel".into(),
                tags: vec![],
                terminal: false,
            }
        }

        async fn execute(
            &self,
            _params: serde_json::Value,
        ) -> Result<serde_json::Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(serde_json::Value::Null)
        }
    }

    #[tokio::test]
    async fn timeout_triggers_reflection_without_retry() {
        let mut registry = wayfarer_tools::default_registry();
        registry.register(Box::new(StallingTool));
        let (outcome, _) = run_loop(registry, LoopConfig::default(), "推荐适合美食游的城市").await;

        // The stalled action is TIMEOUT, exactly once.
        let timeouts = outcome
            .history
            .iter()
            .filter_map(|s| s.action.as_ref())
            .filter(|a| a.status == ActionStatus::Timeout)
            .count();
        assert_eq!(timeouts, 1);

        // The following thought is a REFLECTION.
        let timeout_index = outcome
            .history
            .iter()
            .position(|s| {
                s.action
                    .as_ref()
                    .is_some_and(|a| a.status == ActionStatus::Timeout)
            })
            .unwrap();
        assert_eq!(
            outcome.history[timeout_index + 1].thought.kind,
            ThoughtKind::Reflection
        );

        // The loop still completes through the terminal tool.
        assert_eq!(outcome.state, LoopState::Completed);
        assert!(outcome.tools_used.contains(&"final_answer".to_string()));
    }

    #[tokio::test]
    async fn no_duplicate_invocation_of_identical_pairs() {
        let (outcome, _) = run_loop(
            wayfarer_tools::default_registry(),
            LoopConfig::default(),
            "帮我规划北京3日游",
        )
        .await;

        let mut keys = std::collections::HashSet::new();
        for action in outcome.history.iter().filter_map(|s| s.action.as_ref()) {
            if action.status != ActionStatus::Skipped {
                assert!(
                    keys.insert(format!("{}:{}", action.tool_name, action.params)),
                    "duplicate invocation of {}",
                    action.tool_name
                );
            }
        }
    }

    #[tokio::test]
    async fn cancellation_stops_before_tools_run() {
        let loop_ = ReactLoop::new(
            ThoughtEngine::rule_based(),
            Arc::new(wayfarer_tools::default_registry()),
            LoopConfig::default(),
        );
        let (tx, rx) = mpsc::channel(64);
        drop(rx); // client is already gone
        let outcome = loop_.run("推荐适合美食游的城市", "", &tx).await;
        assert!(outcome.cancelled);
        assert!(outcome.tools_used.is_empty());
    }

    #[tokio::test]
    async fn deadline_expiry_returns_partial_history() {
        let (outcome, _) = run_loop(
            wayfarer_tools::default_registry(),
            LoopConfig {
                task_deadline: Some(Duration::from_nanos(1)),
                ..Default::default()
            },
            "推荐适合美食游的城市",
        )
        .await;
        assert!(outcome.deadline_expired);
        assert_eq!(outcome.state, LoopState::Completed);
        assert!(outcome.history.is_empty());
    }
}
