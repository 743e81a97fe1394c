//! Execution modes — Direct / ReAct / Plan.
//!
//! The dispatcher selects a strategy per user turn and owns the streaming
//! contract shared by all of them: zero or more reasoning events, then zero
//! or more answer events, then exactly one `done`. Answer events never
//! precede the final `reasoning_end` when reasoning events exist.

mod direct;
mod plan;
mod react_mode;

use crate::react::LoopConfig;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::info;
use wayfarer_core::chunk::{AgentChunk, TurnStats};
use wayfarer_core::error::ProviderError;
use wayfarer_core::provider::{ChatRole, ChatTurn, Provider, ProviderRequest};
use wayfarer_core::session::{ChatMessage, Role};
use wayfarer_core::thought::HistoryStep;
use wayfarer_core::tool::ToolRegistry;

/// How the dispatcher answers a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Direct,
    React,
    Plan,
}

impl ExecutionMode {
    /// Parse the client-supplied mode string. Empty means the default.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "" | "react" => Some(Self::React),
            "direct" => Some(Self::Direct),
            "plan" => Some(Self::Plan),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::React => "react",
            Self::Plan => "plan",
        }
    }
}

/// One user turn plus its conversation context.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub user_input: String,
    pub context: Vec<ChatMessage>,
}

/// The buffered result of a turn, alongside whatever was streamed.
#[derive(Debug)]
pub struct TurnOutcome {
    pub success: bool,
    pub answer: String,
    pub reasoning_text: String,
    pub history: Vec<HistoryStep>,
    pub stats: TurnStats,
    pub error: Option<String>,
}

impl TurnOutcome {
    fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            answer: format!("抱歉，处理您的请求时出现问题：{message}"),
            reasoning_text: String::new(),
            history: Vec::new(),
            stats: TurnStats::default(),
            error: Some(message),
        }
    }
}

/// Per-turn strategy dispatcher.
///
/// Holds the resolved provider and registry for this turn; the modes are
/// pure functions over this state plus the outbound channel.
pub struct ModeDispatcher {
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) model: String,
    pub(crate) temperature: f32,
    pub(crate) max_tokens: Option<u32>,
    pub(crate) registry: Arc<ToolRegistry>,
    pub(crate) loop_config: LoopConfig,
}

impl ModeDispatcher {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: Option<u32>,
        registry: Arc<ToolRegistry>,
        loop_config: LoopConfig,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens,
            registry,
            loop_config,
        }
    }

    /// Run one turn in the given mode.
    ///
    /// Emits reasoning/answer events as the strategy produces them, then an
    /// `error` event on failure, then exactly one `done`. The same outcome
    /// is returned for buffering callers.
    pub async fn run(
        &self,
        mode: ExecutionMode,
        turn: &TurnInput,
        tx: &mpsc::Sender<AgentChunk>,
    ) -> TurnOutcome {
        info!(mode = mode.as_str(), "Dispatching turn");
        let started = Instant::now();

        let mut outcome = match mode {
            ExecutionMode::Direct => direct::run(self, turn, tx).await,
            ExecutionMode::React => react_mode::run(self, turn, tx).await,
            ExecutionMode::Plan => plan::run(self, turn, tx).await,
        };

        outcome.stats.success = outcome.success;
        outcome.stats.duration_ms = started.elapsed().as_millis() as u64;

        if let Some(message) = &outcome.error {
            let _ = tx
                .send(AgentChunk::Error {
                    message: message.clone(),
                })
                .await;
        }
        let _ = tx
            .send(AgentChunk::Done {
                stats: outcome.stats.clone(),
            })
            .await;

        outcome
    }

    /// Build the chat request shared by the answer-producing calls.
    pub(crate) fn chat_request(
        &self,
        system: &str,
        turn: &TurnInput,
        stream: bool,
    ) -> ProviderRequest {
        let mut messages = vec![ChatTurn::system(system)];
        // Only the recent tail of the conversation conditions the answer.
        for message in turn.context.iter().rev().take(8).rev() {
            messages.push(ChatTurn {
                role: match message.role {
                    Role::User => ChatRole::User,
                    Role::Assistant => ChatRole::Assistant,
                },
                content: message.content.clone(),
            });
        }
        messages.push(ChatTurn::user(&turn.user_input));

        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream,
            stop: vec![],
        }
    }
}

/// Stream one LLM call as `answer_start` + `answer_chunk` events.
/// Returns the accumulated answer text.
pub(crate) async fn stream_answer(
    provider: &dyn Provider,
    request: ProviderRequest,
    tx: &mpsc::Sender<AgentChunk>,
) -> Result<String, ProviderError> {
    let mut rx = provider.stream(request).await?;

    if tx.send(AgentChunk::AnswerStart).await.is_err() {
        return Ok(String::new()); // client gone; keep what we have
    }

    let mut answer = String::new();
    while let Some(chunk) = rx.recv().await {
        let chunk = chunk?;
        if let Some(text) = chunk.content {
            if !text.is_empty() {
                answer.push_str(&text);
                if tx
                    .send(AgentChunk::AnswerChunk { content: text })
                    .await
                    .is_err()
                {
                    // Cancellation mid-stream: preserve the partial answer.
                    break;
                }
            }
        }
        if chunk.done {
            break;
        }
    }
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FailingProvider, ScriptedProvider};

    fn dispatcher(provider: Arc<dyn Provider>) -> ModeDispatcher {
        ModeDispatcher::new(
            provider,
            "mock-model",
            0.7,
            Some(512),
            Arc::new(wayfarer_tools::default_registry()),
            LoopConfig::default(),
        )
    }

    async fn collect(
        dispatcher: &ModeDispatcher,
        mode: ExecutionMode,
        input: &str,
    ) -> (TurnOutcome, Vec<AgentChunk>) {
        let (tx, mut rx) = mpsc::channel(256);
        let turn = TurnInput {
            user_input: input.into(),
            context: vec![],
        };
        let outcome = dispatcher.run(mode, &turn, &tx).await;
        drop(tx);
        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }
        (outcome, chunks)
    }

    fn event_types(chunks: &[AgentChunk]) -> Vec<&'static str> {
        chunks.iter().map(AgentChunk::event_type).collect()
    }

    #[test]
    fn mode_parsing() {
        assert_eq!(ExecutionMode::parse(""), Some(ExecutionMode::React));
        assert_eq!(ExecutionMode::parse("react"), Some(ExecutionMode::React));
        assert_eq!(ExecutionMode::parse("direct"), Some(ExecutionMode::Direct));
        assert_eq!(ExecutionMode::parse("plan"), Some(ExecutionMode::Plan));
        assert_eq!(ExecutionMode::parse("rag"), None);
    }

    #[tokio::test]
    async fn direct_mode_event_order() {
        let dispatcher = dispatcher(Arc::new(ScriptedProvider::single_text("你好！")));
        let (outcome, chunks) = collect(&dispatcher, ExecutionMode::Direct, "你好").await;

        assert!(outcome.success);
        assert_eq!(outcome.answer, "你好！");
        assert!(outcome.history.is_empty());
        assert!(outcome.stats.tools_used.is_empty());

        let types = event_types(&chunks);
        assert_eq!(types.first(), Some(&"answer_start"));
        assert_eq!(types.last(), Some(&"done"));
        assert_eq!(types.iter().filter(|t| **t == "done").count(), 1);
        assert!(types.contains(&"answer_chunk"));
        assert!(!types.contains(&"reasoning_start"));
    }

    #[tokio::test]
    async fn react_mode_event_order_and_stats() {
        let dispatcher = dispatcher(Arc::new(ScriptedProvider::new(vec![
            "not json".into(),                 // analysis round → rule fallback
            "为您推荐成都：美食之都。".into(), // synthesis
        ])));
        let (outcome, chunks) =
            collect(&dispatcher, ExecutionMode::React, "推荐适合美食游的城市").await;

        assert!(outcome.success);
        assert!(!outcome.answer.is_empty());
        assert!(outcome.stats.tools_used.contains(&"search_cities".to_string()));
        assert!(outcome.stats.steps_completed <= 10);
        assert!(outcome.stats.successful_steps <= outcome.stats.steps_completed);
        assert!(!outcome.reasoning_text.is_empty());

        let types = event_types(&chunks);
        // reasoning block precedes the answer block; exactly one done.
        let r_start = types.iter().position(|t| *t == "reasoning_start").unwrap();
        let r_end = types.iter().position(|t| *t == "reasoning_end").unwrap();
        let a_start = types.iter().position(|t| *t == "answer_start").unwrap();
        assert!(r_start < r_end && r_end < a_start);
        assert_eq!(types.iter().filter(|t| **t == "done").count(), 1);
        assert_eq!(types.last(), Some(&"done"));
    }

    #[tokio::test]
    async fn react_mode_general_chat_answers_directly() {
        let dispatcher = dispatcher(Arc::new(ScriptedProvider::new(vec![
            "not json".into(),
            "你好，有什么可以帮您？".into(),
        ])));
        let (outcome, _) = collect(&dispatcher, ExecutionMode::React, "你好").await;

        assert!(outcome.success);
        assert_eq!(outcome.stats.tools_used, Vec::<String>::new());
        assert!(outcome.answer.contains("你好"));
    }

    #[tokio::test]
    async fn plan_mode_executes_steps_sequentially() {
        let plan = serde_json::json!({
            "goal": "规划北京3日游",
            "steps": [
                {"step": 1, "action": "get_city_info", "params": {"city": "北京"},
                 "description": "查询北京概况", "phase": "execution"},
                {"step": 2, "action": "calculate_budget", "params": {"city": "北京", "days": 3},
                 "description": "估算预算", "phase": "execution"},
                {"step": 3, "action": "final_answer", "params": {"summary": "信息齐备"},
                 "description": "生成行程", "phase": "generation"}
            ]
        });
        let dispatcher = dispatcher(Arc::new(ScriptedProvider::new(vec![
            plan.to_string(),
            "北京3日游行程如下……".into(),
        ])));
        let (outcome, chunks) =
            collect(&dispatcher, ExecutionMode::Plan, "帮我规划北京3日游").await;

        assert!(outcome.success);
        assert!(outcome.stats.tools_used.len() >= 2);
        // Terminal tool appears last among executed actions.
        let executed: Vec<&str> = outcome
            .history
            .iter()
            .filter_map(|s| s.action.as_ref())
            .map(|a| a.tool_name.as_str())
            .collect();
        assert_eq!(executed.last(), Some(&"final_answer"));

        // The first reasoning chunk carries the plan phase marker.
        let first_reasoning = chunks.iter().find_map(|c| match c {
            AgentChunk::ReasoningChunk { content } => Some(content.clone()),
            _ => None,
        });
        assert!(first_reasoning.unwrap().contains("规划"));
        assert_eq!(
            event_types(&chunks).iter().filter(|t| **t == "done").count(),
            1
        );
    }

    #[tokio::test]
    async fn plan_mode_parse_failure_falls_back_to_react() {
        let dispatcher = dispatcher(Arc::new(ScriptedProvider::new(vec![
            "这不是一个JSON计划".into(), // plan parse fails
            "not json either".into(),    // react analysis fallback
            "推荐杭州。".into(),          // synthesis
        ])));
        let (outcome, chunks) =
            collect(&dispatcher, ExecutionMode::Plan, "推荐适合美食游的城市").await;

        assert!(outcome.success);
        // ReAct fallback drove tools.
        assert!(outcome.stats.tools_used.contains(&"search_cities".to_string()));
        assert_eq!(
            event_types(&chunks).iter().filter(|t| **t == "done").count(),
            1
        );
    }

    #[tokio::test]
    async fn duplicate_plan_steps_coalesce_to_skipped() {
        let plan = serde_json::json!({
            "goal": "查询北京",
            "steps": [
                {"step": 1, "action": "get_city_info", "params": {"city": "北京"},
                 "description": "查询概况", "phase": "execution"},
                {"step": 2, "action": "get_city_info", "params": {"city": "北京"},
                 "description": "重复查询", "phase": "execution"},
                {"step": 3, "action": "final_answer", "params": {}, "description": "收尾",
                 "phase": "generation"}
            ]
        });
        let dispatcher = dispatcher(Arc::new(ScriptedProvider::new(vec![
            plan.to_string(),
            "北京概况如下。".into(),
        ])));
        let (outcome, _) = collect(&dispatcher, ExecutionMode::Plan, "北京怎么样").await;

        use wayfarer_core::thought::ActionStatus;
        let statuses: Vec<ActionStatus> = outcome
            .history
            .iter()
            .filter_map(|s| s.action.as_ref())
            .filter(|a| a.tool_name == "get_city_info")
            .map(|a| a.status)
            .collect();
        assert_eq!(statuses, vec![ActionStatus::Success, ActionStatus::Skipped]);
    }

    #[tokio::test]
    async fn plan_mode_unknown_tool_recorded_as_not_found() {
        let plan = serde_json::json!({
            "goal": "test",
            "steps": [
                {"step": 1, "action": "teleport", "params": {}, "description": "瞬移", "phase": "execution"},
                {"step": 2, "action": "final_answer", "params": {}, "description": "收尾", "phase": "generation"}
            ]
        });
        let dispatcher = dispatcher(Arc::new(ScriptedProvider::new(vec![
            plan.to_string(),
            "结果如下。".into(),
        ])));
        let (outcome, _) = collect(&dispatcher, ExecutionMode::Plan, "x").await;

        let failed = outcome
            .history
            .iter()
            .filter_map(|s| s.action.as_ref())
            .find(|a| a.tool_name == "teleport")
            .unwrap();
        assert_eq!(failed.status, wayfarer_core::thought::ActionStatus::Failed);
        assert!(failed.error.as_deref().unwrap_or("").contains("not found"));
    }

    #[tokio::test]
    async fn llm_failure_surfaces_error_then_done() {
        let dispatcher = dispatcher(Arc::new(FailingProvider));
        let (outcome, chunks) = collect(&dispatcher, ExecutionMode::Direct, "你好").await;

        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        let types = event_types(&chunks);
        let error_pos = types.iter().position(|t| *t == "error").unwrap();
        let done_pos = types.iter().position(|t| *t == "done").unwrap();
        assert!(error_pos < done_pos);
        assert_eq!(types.last(), Some(&"done"));
    }
}
