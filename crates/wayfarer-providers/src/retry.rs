//! Retry wrapper — client-side retries at the capability layer.
//!
//! Wraps another provider and retries `complete` on transient failures
//! (rate limits and network errors) up to the configured `max_retries`.
//! Streaming calls are not retried once the stream has been handed out.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use wayfarer_core::error::ProviderError;
use wayfarer_core::provider::{Provider, ProviderRequest, ProviderResponse, TokenChunk};

pub struct RetryProvider {
    inner: Arc<dyn Provider>,
    max_retries: u32,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn Provider>, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }

    fn is_transient(err: &ProviderError) -> bool {
        matches!(
            err,
            ProviderError::RateLimited { .. } | ProviderError::Network(_)
        )
    }

    fn backoff(err: &ProviderError, attempt: u32) -> Duration {
        match err {
            ProviderError::RateLimited { retry_after_secs } => {
                Duration::from_secs(*retry_after_secs)
            }
            _ => Duration::from_millis(200 * u64::from(attempt + 1)),
        }
    }
}

#[async_trait]
impl Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let mut attempt = 0u32;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if Self::is_transient(&err) && attempt < self.max_retries => {
                    let delay = Self::backoff(&err, attempt);
                    warn!(
                        provider = self.inner.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient provider error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<
        tokio::sync::mpsc::Receiver<Result<TokenChunk, ProviderError>>,
        ProviderError,
    > {
        // Retry only the stream *establishment*; mid-stream errors surface.
        let mut attempt = 0u32;
        loop {
            match self.inner.stream(request.clone()).await {
                Ok(rx) => return Ok(rx),
                Err(err) if Self::is_transient(&err) && attempt < self.max_retries => {
                    tokio::time::sleep(Self::backoff(&err, attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
