//! LLM provider implementations for Wayfarer.
//!
//! Concrete [`wayfarer_core::Provider`] backends (OpenAI-compatible and
//! native Anthropic), a retry wrapper implementing the per-model
//! `max_retries` option, and the [`ModelManager`] that turns configured
//! model entries into ready-to-use providers.

pub mod anthropic;
pub mod manager;
pub mod openai_compat;
pub mod retry;

pub use anthropic::AnthropicProvider;
pub use manager::{ModelManager, ModelSummary};
pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryProvider;
