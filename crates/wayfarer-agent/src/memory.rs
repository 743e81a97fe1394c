//! Short-term memory — the per-task record of loop iterations.
//!
//! Bounded, append-only, owned exclusively by the loop that created it.
//! Other components receive read-only views. Cleared at task boundary,
//! never shared across concurrent tasks.

use std::collections::HashSet;
use wayfarer_core::thought::{Action, ActionStatus, HistoryStep, PlannedCall};

/// The agent's scratchpad within a single task lifecycle.
#[derive(Debug, Clone, Default)]
pub struct TaskMemory {
    steps: Vec<HistoryStep>,
    /// Dedup keys of every (tool, params) pair already dispatched.
    attempted: HashSet<String>,
}

impl TaskMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one iteration record.
    pub fn record(&mut self, step: HistoryStep) {
        self.steps.push(step);
    }

    /// Read-only view of the full history.
    pub fn view(&self) -> &[HistoryStep] {
        &self.steps
    }

    /// The most recent action, if any iteration carried one.
    pub fn last_action(&self) -> Option<&Action> {
        self.steps.iter().rev().find_map(|s| s.action.as_ref())
    }

    /// Number of loop iterations recorded so far.
    ///
    /// Step 0 may seal two records (understanding + planning); iterations
    /// are counted by the highest step index, not the record count.
    pub fn steps_completed(&self) -> usize {
        self.steps.last().map(|s| s.step + 1).unwrap_or(0)
    }

    /// Records whose action ended in SUCCESS.
    pub fn successful_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.action.as_ref().is_some_and(Action::succeeded))
            .count()
    }

    /// Distinct tool names actually executed (skipped calls excluded).
    pub fn tools_used(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut tools = Vec::new();
        for step in &self.steps {
            if let Some(action) = &step.action {
                if action.status != ActionStatus::Skipped
                    && action.status != ActionStatus::Pending
                    && seen.insert(action.tool_name.clone())
                {
                    tools.push(action.tool_name.clone());
                }
            }
        }
        tools
    }

    /// Whether this exact (tool, params) pair has already been dispatched.
    pub fn was_attempted(&self, call: &PlannedCall) -> bool {
        self.attempted.contains(&call.dedup_key())
    }

    /// Mark a pair as dispatched so the loop never retries it.
    pub fn mark_attempted(&mut self, call: &PlannedCall) {
        self.attempted.insert(call.dedup_key());
    }

    /// Drop everything. Called at task boundary.
    pub fn clear(&mut self) {
        self.steps.clear();
        self.attempted.clear();
    }

    /// Detach the history, consuming the memory.
    pub fn into_history(self) -> Vec<HistoryStep> {
        self.steps
    }
}
