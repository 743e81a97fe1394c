//! The ReAct orchestration engine — the heart of Wayfarer.
//!
//! One task flows through a bounded **Reason → Act → Observe → Evaluate**
//! loop:
//!
//! 1. **Analyze** the user input (intent + entities, LLM with fallback)
//! 2. **Plan** an ordered list of tool calls ending in the terminal tool
//! 3. **Execute** one call per iteration, reflecting on failures
//! 4. **Stop** on terminal success, high confidence, or step exhaustion
//! 5. **Synthesize** the user-facing answer from the collected results
//!
//! The mode dispatcher wraps the loop (ReAct), a bare streaming call
//! (Direct), or a two-pass plan executor (Plan) behind one streaming
//! contract.

pub mod evaluate;
pub mod memory;
pub mod modes;
pub mod react;
pub mod test_support;
pub mod thought_engine;
pub mod trace;

pub use evaluate::EvaluationEngine;
pub use memory::TaskMemory;
pub use modes::{ExecutionMode, ModeDispatcher, TurnInput, TurnOutcome};
pub use react::{LoopConfig, LoopOutcome, LoopState, ReactLoop};
pub use thought_engine::{Entities, Intent, TaskAnalysis, ThoughtEngine};
