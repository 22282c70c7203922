//! Text-generation provider abstraction.
//!
//! One provider is selected from configuration at startup and shared behind
//! `Arc<dyn LlmProvider>`; callers never dispatch on provider names.

mod factory;
mod ollama;
mod openai_compat;
mod provider;

pub use factory::{build_provider, LlmSettings, ProviderConfigError, ProviderKind};
pub use ollama::OllamaProvider;
pub use openai_compat::{ApiKeySource, OpenAiCompatibleProvider};
pub use provider::{CompletionOptions, LlmError, LlmProvider};
