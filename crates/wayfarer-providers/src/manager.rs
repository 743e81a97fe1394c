//! Model manager — configured model entries and their providers.
//!
//! Built once at startup from the loaded configuration. Each entry gets a
//! concrete provider wrapped in the retry layer; lookups are by the stable
//! `model_id` that clients and sessions bind to.

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::RetryProvider;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use wayfarer_config::{AppConfig, ModelEntry, ProviderKind};
use wayfarer_core::error::ProviderError;
use wayfarer_core::provider::Provider;

/// Listing view of a configured model. Never exposes the key.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub model_id: String,
    pub name: String,
    pub provider: String,
    pub model: String,
}

/// Process-wide registry of configured models.
pub struct ModelManager {
    entries: Vec<ModelEntry>,
    providers: HashMap<String, Arc<dyn Provider>>,
    default_model: String,
}

impl ModelManager {
    /// Build providers for every configured entry.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut providers: HashMap<String, Arc<dyn Provider>> = HashMap::new();
        for entry in &config.models {
            providers.insert(entry.model_id.clone(), build_provider(entry));
        }
        info!(models = providers.len(), default = %config.default_model, "Model manager initialized");
        Self {
            entries: config.models.clone(),
            providers,
            default_model: config.default_model.clone(),
        }
    }

    /// Construct with an explicit provider, for tests and one-off runs.
    pub fn with_provider(
        entry: ModelEntry,
        provider: Arc<dyn Provider>,
    ) -> Self {
        let default_model = entry.model_id.clone();
        let mut providers = HashMap::new();
        providers.insert(entry.model_id.clone(), provider);
        Self {
            entries: vec![entry],
            providers,
            default_model,
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Redacted listing of all entries.
    pub fn list(&self) -> Vec<ModelSummary> {
        self.entries
            .iter()
            .map(|e| ModelSummary {
                model_id: e.model_id.clone(),
                name: e.name.clone(),
                provider: provider_kind_name(e.provider).into(),
                model: e.model.clone(),
            })
            .collect()
    }

    /// One entry's redacted summary.
    pub fn describe(&self, model_id: &str) -> Option<ModelSummary> {
        self.entries
            .iter()
            .find(|e| e.model_id == model_id)
            .map(|e| ModelSummary {
                model_id: e.model_id.clone(),
                name: e.name.clone(),
                provider: provider_kind_name(e.provider).into(),
                model: e.model.clone(),
            })
    }

    /// Full entry (with sampling options) for request shaping.
    pub fn entry(&self, model_id: &str) -> Option<&ModelEntry> {
        self.entries.iter().find(|e| e.model_id == model_id)
    }

    /// Resolve a model id (empty = default) to its provider and entry.
    pub fn resolve(
        &self,
        model_id: &str,
    ) -> Result<(Arc<dyn Provider>, &ModelEntry), ProviderError> {
        let id = if model_id.is_empty() {
            &self.default_model
        } else {
            model_id
        };
        let entry = self
            .entry(id)
            .ok_or_else(|| ProviderError::ModelNotFound(id.to_string()))?;
        let provider = self
            .providers
            .get(id)
            .cloned()
            .ok_or_else(|| ProviderError::NotConfigured(id.to_string()))?;
        Ok((provider, entry))
    }
}

fn provider_kind_name(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Openai => "openai",
        ProviderKind::Anthropic => "anthropic",
        ProviderKind::Google => "google",
        ProviderKind::OpenaiCompatible => "openai-compatible",
    }
}

/// Default API bases for kinds that speak the OpenAI dialect.
fn default_base_url(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Openai => "https://api.openai.com/v1",
        ProviderKind::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
        _ => "",
    }
}

fn build_provider(entry: &ModelEntry) -> Arc<dyn Provider> {
    let timeout = Duration::from_secs(entry.timeout);
    let inner: Arc<dyn Provider> = match entry.provider {
        ProviderKind::Anthropic => {
            let mut provider = AnthropicProvider::new(&entry.api_key, timeout);
            if let Some(base) = &entry.api_base {
                provider = provider.with_base_url(base);
            }
            if let Some(version) = &entry.api_version {
                provider = provider.with_api_version(version);
            }
            Arc::new(provider)
        }
        kind => {
            let base = entry
                .api_base
                .clone()
                .unwrap_or_else(|| default_base_url(kind).to_string());
            Arc::new(OpenAiCompatProvider::new(
                provider_kind_name(kind),
                base,
                &entry.api_key,
                timeout,
            ))
        }
    };
    Arc::new(RetryProvider::new(inner, entry.max_retries))
}
