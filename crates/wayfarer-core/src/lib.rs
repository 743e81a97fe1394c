//! # Wayfarer Core
//!
//! Domain types, traits, and error definitions for the Wayfarer agent
//! runtime. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem seam is defined as a trait or value type here.
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod chunk;
pub mod error;
pub mod provider;
pub mod session;
pub mod thought;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use chunk::{AgentChunk, TurnStats};
pub use error::{Error, ProviderError, Result, SessionError, ToolError};
pub use provider::{ChatRole, ChatTurn, Provider, ProviderRequest, ProviderResponse, TokenChunk, Usage};
pub use session::{ChatMessage, Role, Session, SessionPatch, SessionStore, SessionSummary};
pub use thought::{
    Action, ActionStatus, Decision, Evaluation, HistoryStep, Observation, Phase, PlannedCall,
    Thought, ThoughtKind,
};
pub use tool::{ExecutionResult, FailureKind, ParamKind, ParamSpec, Tool, ToolDescriptor, ToolRegistry};
