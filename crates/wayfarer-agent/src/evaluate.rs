//! Evaluation engine — assesses action outcomes.
//!
//! A pure function of the action: never mutates it, holds no task state.

use wayfarer_core::thought::{Action, ActionStatus, Evaluation};

/// Confidence gained per successful action.
const SUCCESS_DELTA: f32 = 0.05;
/// Confidence lost per failed or timed-out action.
const FAILURE_DELTA: f32 = -0.1;

#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationEngine;

impl EvaluationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Derive an evaluation from a finished action.
    ///
    /// Success requires both a SUCCESS status and a non-empty result.
    pub fn evaluate(&self, action: &Action) -> Evaluation {
        let has_result = action
            .result
            .as_ref()
            .is_some_and(|v| !v.is_null() && v.as_str().map_or(true, |s| !s.is_empty()));
        let success = action.status == ActionStatus::Success && has_result;

        let confidence_delta = match action.status {
            ActionStatus::Success if success => SUCCESS_DELTA,
            ActionStatus::Failed | ActionStatus::Timeout => FAILURE_DELTA,
            _ => 0.0,
        };

        Evaluation {
            success,
            duration_ms: action.duration_ms,
            has_result,
            confidence_delta,
        }
    }
}
