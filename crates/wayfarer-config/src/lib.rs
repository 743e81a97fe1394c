//! Configuration loading, validation, and management for Wayfarer.
//!
//! Loads configuration from a TOML file (default `wayfarer.toml`) with
//! `WAYFARER_`-prefixed environment variable overrides. Model entries are
//! validated at load time; an invalid entry fails startup with a
//! field-level message rather than surfacing later as a provider error.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid model entry '{model_id}': {message}")]
    InvalidModel { model_id: String, message: String },

    #[error("Unknown default model: {0}")]
    UnknownDefaultModel(String),
}

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Agent loop limits.
    #[serde(default)]
    pub agent: AgentSettings,

    /// Agent service bind settings.
    #[serde(default)]
    pub service: ServiceSettings,

    /// Gateway bind settings.
    #[serde(default)]
    pub gateway: GatewaySettings,

    /// Which configured model is used when a session has no binding.
    #[serde(default = "default_model_id")]
    pub default_model: String,

    /// Configured model entries.
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

fn default_model_id() -> String {
    "gpt-4o-mini".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent: AgentSettings::default(),
            service: ServiceSettings::default(),
            gateway: GatewaySettings::default(),
            default_model: default_model_id(),
            models: Vec::new(),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("agent", &self.agent)
            .field("service", &self.service)
            .field("gateway", &self.gateway)
            .field("default_model", &self.default_model)
            .field("models", &self.models)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Hard cap on loop iterations per task.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Cap on nested reasoning depth for the thought engine.
    #[serde(default = "default_max_reasoning_depth")]
    pub max_reasoning_depth: usize,

    /// Optional whole-task deadline in seconds (0 = none).
    #[serde(default)]
    pub task_deadline_secs: u64,
}

fn default_agent_name() -> String {
    "TravelAssistant".into()
}
fn default_max_steps() -> usize {
    10
}
fn default_max_reasoning_depth() -> usize {
    5
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            max_steps: default_max_steps(),
            max_reasoning_depth: default_max_reasoning_depth(),
            task_deadline_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_service_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_service_port() -> u16 {
    50051
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_service_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Allowed CORS origins for the web frontend.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_gateway_port() -> u16 {
    8000
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_gateway_port(),
            cors_origins: Vec::new(),
        }
    }
}

/// Which wire protocol a model entry speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Openai,
    Anthropic,
    Google,
    OpenaiCompatible,
}

/// One configured model.
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Stable identifier clients select models by.
    pub model_id: String,

    /// Display name.
    pub name: String,

    pub provider: ProviderKind,

    /// The provider-side model string.
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    pub api_key: String,

    /// Anthropic API version header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout: u64,

    /// Client-side retries at the capability layer.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    2
}

impl std::fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEntry")
            .field("model_id", &self.model_id)
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &"[REDACTED]")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl ModelEntry {
    /// Field-level validation per provider kind.
    fn validate(&self) -> Result<(), ConfigError> {
        let fail = |message: &str| {
            Err(ConfigError::InvalidModel {
                model_id: self.model_id.clone(),
                message: message.into(),
            })
        };

        if self.model.trim().is_empty() {
            return fail("missing required field: model");
        }
        if self.api_key.trim().is_empty() {
            return fail("missing required field: api_key");
        }
        if let Some(base) = &self.api_base {
            if !base.starts_with("http://") && !base.starts_with("https://") {
                return fail("api_base must start with http:// or https://");
            }
        }
        if self.provider == ProviderKind::OpenaiCompatible && self.api_base.is_none() {
            return fail("openai-compatible entries require api_base");
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return fail("temperature must be within [0, 2]");
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load from a TOML file, apply env overrides, and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&text)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from the given path if it exists, otherwise fall back to
    /// defaults plus env overrides.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            let mut config = AppConfig::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Environment overrides with the `WAYFARER_` prefix.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("WAYFARER_DEFAULT_MODEL") {
            self.default_model = v;
        }
        if let Ok(v) = std::env::var("WAYFARER_MAX_STEPS") {
            if let Ok(n) = v.parse() {
                self.agent.max_steps = n;
            }
        }
        if let Ok(v) = std::env::var("WAYFARER_GATEWAY_PORT") {
            if let Ok(n) = v.parse() {
                self.gateway.port = n;
            }
        }
        if let Ok(v) = std::env::var("WAYFARER_API_KEY") {
            for entry in &mut self.models {
                if entry.api_key.trim().is_empty() {
                    entry.api_key = v.clone();
                }
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for entry in &self.models {
            entry.validate()?;
        }
        if !self.models.is_empty()
            && !self.models.iter().any(|m| m.model_id == self.default_model)
        {
            return Err(ConfigError::UnknownDefaultModel(self.default_model.clone()));
        }
        Ok(())
    }

    /// Look up a model entry by id.
    pub fn model(&self, model_id: &str) -> Option<&ModelEntry> {
        self.models.iter().find(|m| m.model_id == model_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(model_id: &str) -> ModelEntry {
        ModelEntry {
            model_id: model_id.into(),
            name: "GPT-4o mini".into(),
            provider: ProviderKind::Openai,
            model: "gpt-4o-mini".into(),
            api_base: None,
            api_key: "sk-test".into(),
            api_version: None,
            temperature: 0.7,
            max_tokens: 2000,
            timeout: 60,
            max_retries: 2,
        }
    }

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.agent.max_steps, 10);
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.default_model, "gpt-4o-mini");
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
            default_model = "mini"

            [agent]
            max_steps = 6

            [gateway]
            port = 9000

            [[models]]
            model_id = "mini"
            name = "GPT-4o mini"
            provider = "openai"
            model = "gpt-4o-mini"
            api_key = "sk-abc"

            [[models]]
            model_id = "claude"
            name = "Claude"
            provider = "anthropic"
            model = "claude-sonnet-4"
            api_key = "sk-ant"
            api_version = "2023-06-01"
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.agent.max_steps, 6);
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.models[1].provider, ProviderKind::Anthropic);
        assert_eq!(config.model("claude").unwrap().max_retries, 2);
    }

    #[test]
    fn missing_api_key_rejected() {
        let mut e = entry("m");
        e.api_key = "".into();
        assert!(matches!(e.validate(), Err(ConfigError::InvalidModel { .. })));
    }

    #[test]
    fn compatible_requires_api_base() {
        let mut e = entry("m");
        e.provider = ProviderKind::OpenaiCompatible;
        let err = e.validate().unwrap_err();
        assert!(err.to_string().contains("api_base"));

        e.api_base = Some("https://llm.internal/v1".into());
        assert!(e.validate().is_ok());
    }

    #[test]
    fn malformed_api_base_rejected() {
        let mut e = entry("m");
        e.api_base = Some("llm.internal".into());
        assert!(e.validate().is_err());
    }

    #[test]
    fn unknown_default_model_rejected() {
        let config = AppConfig {
            default_model: "missing".into(),
            models: vec![entry("present")],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownDefaultModel(_))
        ));
    }

    #[test]
    fn debug_redacts_api_key() {
        let text = format!("{:?}", entry("m"));
        assert!(!text.contains("sk-test"));
        assert!(text.contains("[REDACTED]"));
    }
}
