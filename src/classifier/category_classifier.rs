use super::prompt::render_prompt;
use super::retry_policy::RetryPolicy;
use crate::config::ClassifierSettings;
use crate::llm::{CompletionOptions, LlmError, LlmProvider};
use crate::news_store::Category;
use crate::server::metrics;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a classification ended. Every variant maps onto a [`Category`].
#[derive(Debug)]
pub enum ClassificationOutcome {
    /// The provider answered with a member of the category set.
    Accepted(Category),
    /// The provider answered, but not with a known category.
    Unrecognized(String),
    /// Every attempt failed.
    Failed(LlmError),
}

impl ClassificationOutcome {
    pub fn category(&self) -> Category {
        match self {
            ClassificationOutcome::Accepted(category) => *category,
            ClassificationOutcome::Unrecognized(_) | ClassificationOutcome::Failed(_) => {
                Category::Other
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ClassificationOutcome::Accepted(_) => "accepted",
            ClassificationOutcome::Unrecognized(_) => "unrecognized",
            ClassificationOutcome::Failed(_) => "failed",
        }
    }
}

pub struct CategoryClassifier {
    provider: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
    options: CompletionOptions,
    summary_max_chars: usize,
}

impl CategoryClassifier {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        settings: &ClassifierSettings,
        options: CompletionOptions,
    ) -> Self {
        Self {
            provider,
            retry: RetryPolicy::new(settings),
            options,
            summary_max_chars: settings.summary_max_chars,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Classifies a record. Never fails: anything but an accepted answer
    /// becomes [`Category::Other`].
    pub async fn classify(&self, title: &str, summary: Option<&str>) -> Category {
        self.classify_detailed(title, summary).await.category()
    }

    pub async fn classify_detailed(
        &self,
        title: &str,
        summary: Option<&str>,
    ) -> ClassificationOutcome {
        let prompt = render_prompt(title, summary, self.summary_max_chars);

        let outcome = match self.generate_with_retry(&prompt).await {
            Ok(raw) => match Category::normalize(&raw) {
                Some(category) => ClassificationOutcome::Accepted(category),
                None => ClassificationOutcome::Unrecognized(raw),
            },
            Err(err) => ClassificationOutcome::Failed(err),
        };

        match &outcome {
            ClassificationOutcome::Accepted(category) => {
                debug!(title, category = %category, "Classified record");
            }
            ClassificationOutcome::Unrecognized(raw) => {
                warn!(title, response = %raw.trim(), "Provider returned an unknown category, using other");
            }
            ClassificationOutcome::Failed(err) => {
                warn!(
                    title,
                    provider = %self.provider.name(),
                    error = %err,
                    "Classification failed, using other"
                );
            }
        }
        metrics::record_classification(outcome.label());
        outcome
    }

    async fn generate_with_retry(&self, prompt: &str) -> Result<String, LlmError> {
        let mut attempt = 1;
        loop {
            match self.provider.generate(prompt, &self.options).await {
                Ok(text) if !text.trim().is_empty() => return Ok(text),
                Ok(_) => {
                    self.on_attempt_failure(attempt, &LlmError::EmptyResponse);
                    if let Some(delay) = self.retry.delay_after(attempt) {
                        tokio::time::sleep(delay).await;
                    } else {
                        return Err(LlmError::EmptyResponse);
                    }
                }
                Err(err) => {
                    self.on_attempt_failure(attempt, &err);
                    if let Some(delay) = self.retry.delay_after(attempt) {
                        tokio::time::sleep(delay).await;
                    } else {
                        return Err(err);
                    }
                }
            }
            attempt += 1;
        }
    }

    fn on_attempt_failure(&self, attempt: u32, err: &LlmError) {
        metrics::record_llm_attempt_failure(self.provider.name());
        if self.retry.should_retry(attempt) {
            info!(
                provider = %self.provider.name(),
                attempt,
                max_attempts = self.retry.max_attempts,
                error = %err,
                "Provider attempt failed, retrying"
            );
        } else {
            warn!(
                provider = %self.provider.name(),
                attempt,
                error = %err,
                "Provider attempt failed, giving up"
            );
        }
    }
}
