//! Builds the configured provider once at startup.

use super::ollama::{OllamaProvider, DEFAULT_OLLAMA_URL};
use super::openai_compat::{ApiKeySource, OpenAiCompatibleProvider, GROQ_BASE_URL, TOGETHER_BASE_URL};
use super::provider::{CompletionOptions, LlmProvider};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Ollama,
    Groq,
    Together,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::Groq => "groq",
            ProviderKind::Together => "together",
        }
    }

    /// Environment variable holding the credential, if the provider needs one.
    pub fn credential_env_var(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Ollama => None,
            ProviderKind::Groq => Some("GROQ_API_KEY"),
            ProviderKind::Together => Some("TOGETHER_API_KEY"),
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => DEFAULT_OLLAMA_URL,
            ProviderKind::Groq => GROQ_BASE_URL,
            ProviderKind::Together => TOGETHER_BASE_URL,
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(ProviderKind::Ollama),
            "groq" => Ok(ProviderKind::Groq),
            "together" => Ok(ProviderKind::Together),
            _ => Err(ProviderConfigError::UnknownProvider(s.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ProviderConfigError {
    #[error("Unknown LLM provider '{0}' (expected ollama, groq or together)")]
    UnknownProvider(String),

    #[error("Missing credential for {provider}: set {env_var} or llm.api_key")]
    MissingCredential {
        provider: &'static str,
        env_var: &'static str,
    },

    #[error("Invalid base URL '{0}'")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub api_key_command: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            base_url: None,
            api_key: None,
            api_key_command: None,
            temperature: 0.3,
            max_tokens: Some(50),
            timeout_secs: 30,
        }
    }
}

impl LlmSettings {
    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Builds the provider selected by `settings`, reading credentials and the
/// Ollama host from the process environment.
pub fn build_provider(settings: &LlmSettings) -> Result<Arc<dyn LlmProvider>, ProviderConfigError> {
    build_provider_with_env(settings, |key| std::env::var(key).ok())
}

pub(crate) fn build_provider_with_env<F>(
    settings: &LlmSettings,
    env: F,
) -> Result<Arc<dyn LlmProvider>, ProviderConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let kind: ProviderKind = settings.provider.parse()?;

    let base_url = match (&settings.base_url, kind) {
        (Some(url), _) => url.clone(),
        (None, ProviderKind::Ollama) => {
            env("OLLAMA_HOST").unwrap_or_else(|| kind.default_base_url().to_string())
        }
        (None, _) => kind.default_base_url().to_string(),
    };
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ProviderConfigError::InvalidBaseUrl(base_url));
    }

    let provider: Arc<dyn LlmProvider> = match kind {
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(base_url, &settings.model)),
        ProviderKind::Groq | ProviderKind::Together => {
            let key_source = resolve_key_source(settings, kind, &env)?;
            Arc::new(OpenAiCompatibleProvider::new(
                kind.as_str(),
                base_url,
                &settings.model,
                key_source,
            ))
        }
    };

    info!(
        provider = provider.name(),
        model = provider.model(),
        "Configured LLM provider"
    );
    Ok(provider)
}

fn resolve_key_source<F>(
    settings: &LlmSettings,
    kind: ProviderKind,
    env: &F,
) -> Result<ApiKeySource, ProviderConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(cmd) = &settings.api_key_command {
        return Ok(ApiKeySource::Command(cmd.clone()));
    }
    if let Some(key) = settings.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
        return Ok(ApiKeySource::Static(key.clone()));
    }
    let env_var = kind.credential_env_var().unwrap_or_default();
    match env(env_var).filter(|k| !k.trim().is_empty()) {
        Some(key) => Ok(ApiKeySource::Static(key)),
        None => Err(ProviderConfigError::MissingCredential {
            provider: kind.as_str(),
            env_var,
        }),
    }
}
