//! Reasoning artifacts — the value objects of one agent task.
//!
//! A task produces a sequence of [`Thought`]s, each optionally resolving to
//! an [`Action`] against the tool registry. Every loop iteration is sealed
//! into a [`HistoryStep`] which is the append-only record consumed by the
//! trace formatter and the RPC history surface. Thoughts and actions are
//! never mutated after they are recorded.

use crate::tool::ExecutionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of reasoning a thought carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThoughtKind {
    Analysis,
    Planning,
    Inference,
    Reflection,
    Decision,
}

/// The labelled stage of a loop iteration, used for trace formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Understanding,
    Planning,
    Execution,
    Generation,
}

/// A proposed tool call inside a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedCall {
    pub tool: String,
    pub params: serde_json::Value,
}

impl PlannedCall {
    pub fn new(tool: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            tool: tool.into(),
            params,
        }
    }

    /// Canonical key for dedup: tool name plus serialized params.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.tool, self.params)
    }
}

/// Structured decision payload carried by PLANNING and DECISION thoughts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Decision {
    /// Ordered proposed tool calls. Empty means "answer directly".
    pub calls: Vec<PlannedCall>,

    /// Short rationale for the trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Decision {
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// One reasoning artifact produced by the thought engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thought {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ThoughtKind,
    pub phase: Phase,
    pub content: String,

    /// Heuristic confidence in [0, 1].
    pub confidence: f32,

    /// Structured decision, present on PLANNING/DECISION thoughts and on
    /// execution thoughts that resolve to a tool call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,

    pub timestamp: DateTime<Utc>,
}

impl Thought {
    pub fn new(kind: ThoughtKind, phase: Phase, content: impl Into<String>, confidence: f32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            phase,
            content: content.into(),
            confidence: confidence.clamp(0.0, 1.0),
            decision: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_decision(mut self, decision: Decision) -> Self {
        self.decision = Some(decision);
        self
    }

    /// Whether this thought carries at least one proposed call.
    pub fn has_nonempty_decision(&self) -> bool {
        self.decision.as_ref().is_some_and(|d| !d.is_empty())
    }
}

/// The lifecycle of a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    Pending,
    Running,
    Success,
    Failed,
    Timeout,
    Skipped,
}

impl ActionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failed | Self::Timeout | Self::Skipped
        )
    }
}

/// A tool invocation owned by the loop that produced it.
///
/// State machine: PENDING → RUNNING → {SUCCESS, FAILED, TIMEOUT};
/// SKIPPED is terminal from PENDING only. Transitions outside the machine
/// are ignored rather than panicking — the loop is the only writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub tool_name: String,
    pub params: serde_json::Value,
    pub status: ActionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Wall-clock duration in milliseconds, set on completion.
    #[serde(default, rename = "duration")]
    pub duration_ms: u64,
}

impl Action {
    pub fn pending(tool_name: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tool_name: tool_name.into(),
            params,
            status: ActionStatus::Pending,
            result: None,
            error: None,
            started_at: None,
            finished_at: None,
            duration_ms: 0,
        }
    }

    /// PENDING → RUNNING.
    pub fn start(&mut self) {
        if self.status == ActionStatus::Pending {
            self.status = ActionStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    /// RUNNING → terminal, from a registry execution result.
    pub fn finish(&mut self, outcome: &ExecutionResult) {
        if self.status != ActionStatus::Running {
            return;
        }
        let finished = Utc::now();
        match outcome {
            ExecutionResult::Success { value } => {
                self.status = ActionStatus::Success;
                self.result = Some(value.clone());
            }
            ExecutionResult::Failure { kind, message } => {
                self.status = match kind {
                    crate::tool::FailureKind::Timeout => ActionStatus::Timeout,
                    _ => ActionStatus::Failed,
                };
                self.error = Some(message.clone());
            }
        }
        if let Some(started) = self.started_at {
            self.duration_ms = (finished - started).num_milliseconds().max(0) as u64;
        }
        self.finished_at = Some(finished);
    }

    /// PENDING → SKIPPED.
    pub fn skip(&mut self, reason: impl Into<String>) {
        if self.status == ActionStatus::Pending {
            self.status = ActionStatus::Skipped;
            self.error = Some(reason.into());
            self.finished_at = Some(Utc::now());
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == ActionStatus::Success
    }

    /// Whether the action ended in FAILED or TIMEOUT.
    pub fn failed(&self) -> bool {
        matches!(self.status, ActionStatus::Failed | ActionStatus::Timeout)
    }
}

/// Snapshot fed into each think step.
#[derive(Debug, Clone)]
pub struct Observation<'a> {
    pub step: usize,
    pub history: &'a [HistoryStep],
    pub last_action: Option<&'a Action>,
    pub elapsed_ms: u64,
}

/// Assessment of an action outcome, purely derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub success: bool,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub has_result: bool,

    /// How much the action shifts the loop's confidence.
    pub confidence_delta: f32,
}

/// The append-only record of one loop iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryStep {
    pub step: usize,
    pub phase: Phase,
    pub thought: Thought,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,

    pub timestamp: DateTime<Utc>,
}

impl HistoryStep {
    pub fn new(
        step: usize,
        phase: Phase,
        thought: Thought,
        action: Option<Action>,
        evaluation: Option<Evaluation>,
    ) -> Self {
        Self {
            step,
            phase,
            thought,
            action,
            evaluation,
            timestamp: Utc::now(),
        }
    }
}
