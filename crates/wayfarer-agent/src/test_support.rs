//! Scripted providers for deterministic engine and mode tests.
//!
//! Compiled into the crate (not `#[cfg(test)]`) so downstream crates can
//! drive the dispatcher in their own tests without a live LLM.

use async_trait::async_trait;
use std::sync::Mutex;
use wayfarer_core::error::ProviderError;
use wayfarer_core::provider::{Provider, ProviderRequest, ProviderResponse, TokenChunk, Usage};

/// A provider that returns a sequence of scripted responses.
///
/// Each call returns the next response in the queue; once the queue is
/// exhausted the last response repeats, so flows with a variable number of
/// LLM rounds (analysis fallback, synthesis) stay deterministic.
pub struct ScriptedProvider {
    responses: Vec<String>,
    cursor: Mutex<usize>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<String>) -> Self {
        assert!(!responses.is_empty(), "ScriptedProvider needs at least one response");
        Self {
            responses,
            cursor: Mutex::new(0),
        }
    }

    /// A provider that always answers with the same text.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![text.to_string()])
    }

    /// How many completions have been served.
    pub fn calls(&self) -> usize {
        *self.cursor.lock().unwrap()
    }

    fn next_response(&self) -> String {
        let mut cursor = self.cursor.lock().unwrap();
        let index = (*cursor).min(self.responses.len() - 1);
        *cursor += 1;
        self.responses[index].clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _request: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            content: self.next_response(),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "scripted-model".into(),
        })
    }

    async fn stream(
        &self,
        _request: ProviderRequest,
    ) -> Result<
        tokio::sync::mpsc::Receiver<Result<TokenChunk, ProviderError>>,
        ProviderError,
    > {
        let text = self.next_response();
        let (tx, rx) = tokio::sync::mpsc::channel(32);
        tokio::spawn(async move {
            // Emit per-character chunks so consumers see a real stream.
            for c in text.chars() {
                if tx
                    .send(Ok(TokenChunk {
                        content: Some(c.to_string()),
                        done: false,
                        usage: None,
                    }))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            let _ = tx
                .send(Ok(TokenChunk {
                    content: None,
                    done: true,
                    usage: None,
                }))
                .await;
        });
        Ok(rx)
    }
}

/// A provider whose every call fails.
pub struct FailingProvider;

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(
        &self,
        _request: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }

    async fn stream(
        &self,
        _request: ProviderRequest,
    ) -> Result<
        tokio::sync::mpsc::Receiver<Result<TokenChunk, ProviderError>>,
        ProviderError,
    > {
        Err(ProviderError::Network("connection refused".into()))
    }
}
