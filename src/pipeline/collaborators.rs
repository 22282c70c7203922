//! Interfaces of the external stages the coordinator drives, plus the
//! minimal implementations shipped with the server.
//!
//! Feed fetching and similarity grouping live outside this crate; embedders
//! plug their own [`Ingestor`] and [`Grouper`] in through [`Collaborators`].

use crate::news_store::{Group, Item, Lean, RecordDraft};
use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fetches new items and stores them, returning how many were new.
///
/// Implementations should bound their own network calls.
pub trait Ingestor: Send + Sync {
    fn ingest_all(&self) -> Result<usize>;
}

/// Partitions ungrouped items into topic groups. An empty result is not an
/// error.
pub trait Grouper: Send + Sync {
    fn group_pending(&self) -> Result<Vec<Group>>;
}

/// Builds the record content for one group.
pub trait Enricher: Send + Sync {
    fn enrich(&self, group: &Group, items: &[Item]) -> Result<RecordDraft>;
}

pub struct NullIngestor;

impl Ingestor for NullIngestor {
    fn ingest_all(&self) -> Result<usize> {
        debug!("No ingestor configured, nothing fetched");
        Ok(0)
    }
}

pub struct NullGrouper;

impl Grouper for NullGrouper {
    fn group_pending(&self) -> Result<Vec<Group>> {
        warn!("Ungrouped items are waiting but no grouper is configured");
        Ok(Vec::new())
    }
}

/// Deterministic enricher that assembles a record from the items themselves,
/// without calling any provider.
pub struct ExtractiveEnricher;

impl Enricher for ExtractiveEnricher {
    fn enrich(&self, group: &Group, items: &[Item]) -> Result<RecordDraft> {
        if items.is_empty() {
            bail!("Cannot enrich group {:?}: no items", group.item_ids);
        }

        let mut ordered: Vec<&Item> = items.iter().collect();
        ordered.sort_by_key(|item| (item.published_at.unwrap_or(item.ingested_at), item.id));

        let title = ordered[0].title.clone();

        let mut summaries: Vec<&str> = Vec::new();
        for summary in ordered
            .iter()
            .filter_map(|item| item.summary.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            if !summaries.contains(&summary) {
                summaries.push(summary);
            }
        }
        let narrative = if summaries.is_empty() {
            title.clone()
        } else {
            summaries.join("\n\n")
        };

        let mut sources_by_lean: BTreeMap<Lean, Vec<&str>> = BTreeMap::new();
        for item in &ordered {
            let sources = sources_by_lean.entry(item.lean).or_default();
            if !sources.contains(&item.source_name.as_str()) {
                sources.push(&item.source_name);
            }
        }
        let framing = sources_by_lean
            .into_iter()
            .map(|(lean, sources)| (lean, format!("Covered by {}.", sources.join(", "))))
            .collect();

        Ok(RecordDraft {
            title,
            narrative,
            framing,
            category: None,
        })
    }
}

/// The external stages a coordinator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub ingestor: Arc<dyn Ingestor>,
    pub grouper: Arc<dyn Grouper>,
    pub enricher: Arc<dyn Enricher>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            ingestor: Arc::new(NullIngestor),
            grouper: Arc::new(NullGrouper),
            enricher: Arc::new(ExtractiveEnricher),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn item(id: i64, source: &str, lean: Lean, minutes_ago: i64, summary: Option<&str>) -> Item {
        let now = Utc::now();
        Item {
            id,
            source_name: source.to_string(),
            lean,
            title: format!("Title {}", id),
            url: format!("https://news.example/{}", id),
            summary: summary.map(str::to_string),
            published_at: Some(now - Duration::minutes(minutes_ago)),
            ingested_at: now,
            record_id: None,
        }
    }

    #[test]
    fn test_extractive_enricher_builds_draft() {
        let items = vec![
            item(1, "NPR", Lean::Left, 10, Some("Second take")),
            item(2, "AP", Lean::Center, 30, Some("First report")),
            item(3, "Guardian", Lean::Left, 5, Some("Second take")),
            item(4, "Fox", Lean::Right, 1, None),
        ];
        let group = Group::new(vec![1, 2, 3, 4]);

        let draft = ExtractiveEnricher.enrich(&group, &items).unwrap();

        assert_eq!(draft.title, "Title 2");
        assert_eq!(draft.narrative, "First report\n\nSecond take");
        assert_eq!(draft.framing.get(&Lean::Left).unwrap(), "Covered by NPR, Guardian.");
        assert_eq!(draft.framing.get(&Lean::Right).unwrap(), "Covered by Fox.");
        assert!(!draft.framing.contains_key(&Lean::International));
        assert!(draft.category.is_none());
    }

    #[test]
    fn test_extractive_enricher_without_summaries_uses_title() {
        let items = vec![item(7, "BBC", Lean::International, 0, None)];
        let draft = ExtractiveEnricher
            .enrich(&Group::new(vec![7]), &items)
            .unwrap();
        assert_eq!(draft.narrative, "Title 7");
    }

    #[test]
    fn test_extractive_enricher_rejects_empty_group() {
        assert!(ExtractiveEnricher.enrich(&Group::default(), &[]).is_err());
    }

    #[test]
    fn test_null_collaborators_do_nothing() {
        let collaborators = Collaborators::default();
        assert_eq!(collaborators.ingestor.ingest_all().unwrap(), 0);
        assert!(collaborators.grouper.group_pending().unwrap().is_empty());
    }
}
