//! Maps record text onto the closed [`Category`](crate::news_store::Category)
//! set through a text-generation provider.

mod backfill;
mod category_classifier;
mod classifying_enricher;
mod prompt;
mod retry_policy;

pub use backfill::{BackfillReport, CategoryBackfill};
pub use category_classifier::{CategoryClassifier, ClassificationOutcome};
pub use classifying_enricher::ClassifyingEnricher;
pub use prompt::render_prompt;
pub use retry_policy::RetryPolicy;
