use super::category_classifier::CategoryClassifier;
use crate::news_store::{Group, Item, RecordDraft};
use crate::pipeline::Enricher;
use anyhow::Result;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

/// Wraps an enricher and fills in the category of drafts that have none, so
/// that new records are filterable without a separate backfill.
///
/// Pipeline runs execute on blocking threads; the classification future is
/// driven on `runtime` from there. Calling `enrich` from async code panics.
pub struct ClassifyingEnricher {
    inner: Arc<dyn Enricher>,
    classifier: Arc<CategoryClassifier>,
    runtime: Handle,
}

impl ClassifyingEnricher {
    pub fn new(inner: Arc<dyn Enricher>, classifier: Arc<CategoryClassifier>, runtime: Handle) -> Self {
        Self {
            inner,
            classifier,
            runtime,
        }
    }
}

impl Enricher for ClassifyingEnricher {
    fn enrich(&self, group: &Group, items: &[Item]) -> Result<RecordDraft> {
        let mut draft = self.inner.enrich(group, items)?;
        if draft.category.is_none() {
            let category = self
                .runtime
                .block_on(self.classifier.classify(&draft.title, Some(&draft.narrative)));
            debug!(title = %draft.title, category = %category, "Classified new record");
            draft.category = Some(category);
        }
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::super::category_classifier::tests::{fast_settings, ScriptedProvider};
    use super::*;
    use crate::llm::CompletionOptions;
    use crate::news_store::{Category, Lean};
    use crate::pipeline::ExtractiveEnricher;
    use chrono::Utc;
    use std::sync::atomic::Ordering;

    fn items() -> Vec<Item> {
        vec![Item {
            id: 1,
            source_name: "BBC".to_string(),
            lean: Lean::International,
            title: "Glacier melt accelerates".to_string(),
            url: "https://news.example/1".to_string(),
            summary: Some("Researchers measured record ice loss.".to_string()),
            published_at: None,
            ingested_at: Utc::now(),
            record_id: None,
        }]
    }

    fn enricher(inner: Arc<dyn Enricher>, provider: Arc<ScriptedProvider>) -> Arc<ClassifyingEnricher> {
        let classifier =
            CategoryClassifier::new(provider, &fast_settings(), CompletionOptions::default());
        Arc::new(ClassifyingEnricher::new(
            inner,
            Arc::new(classifier),
            Handle::current(),
        ))
    }

    struct PresetEnricher;

    impl Enricher for PresetEnricher {
        fn enrich(&self, _group: &Group, items: &[Item]) -> Result<RecordDraft> {
            Ok(RecordDraft {
                title: items[0].title.clone(),
                narrative: "n".to_string(),
                category: Some(Category::Tech),
                ..Default::default()
            })
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fills_missing_category() {
        let provider = Arc::new(ScriptedProvider::answering(&["Science."]));
        let enricher = enricher(Arc::new(ExtractiveEnricher), provider.clone());

        let draft = tokio::task::spawn_blocking(move || {
            enricher.enrich(&Group::new(vec![1]), &items())
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(draft.category, Some(Category::Science));
        assert_eq!(draft.title, "Glacier melt accelerates");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_classification_becomes_other() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let enricher = enricher(Arc::new(ExtractiveEnricher), provider.clone());

        let draft = tokio::task::spawn_blocking(move || {
            enricher.enrich(&Group::new(vec![1]), &items())
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(draft.category, Some(Category::Other));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_keeps_existing_category() {
        let provider = Arc::new(ScriptedProvider::answering(&["sports"]));
        let enricher = enricher(Arc::new(PresetEnricher), provider.clone());

        let draft = tokio::task::spawn_blocking(move || {
            enricher.enrich(&Group::new(vec![1]), &items())
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(draft.category, Some(Category::Tech));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
