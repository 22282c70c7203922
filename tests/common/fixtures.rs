//! Collaborators and seed data backing the test server

use super::constants::*;
use anyhow::Result;
use lucid_server::news_store::{Group, Lean, NewItem, NewsStore};
use lucid_server::pipeline::{Grouper, Ingestor};
use std::collections::BTreeMap;
use std::sync::Arc;

pub fn fixture_items() -> Vec<NewItem> {
    FIXTURE_ITEMS
        .iter()
        .enumerate()
        .map(|(i, (topic, source, lean, title))| NewItem {
            source_name: source.to_string(),
            lean: Lean::from_tag(lean),
            title: title.to_string(),
            url: format!("https://news.example/{}/{}", topic, i),
            summary: Some(format!("{} ({})", title, source)),
            published_at: None,
        })
        .collect()
}

/// Ingests the fixture items. Repeated calls insert nothing new.
pub struct FixtureIngestor {
    pub store: Arc<dyn NewsStore>,
}

impl Ingestor for FixtureIngestor {
    fn ingest_all(&self) -> Result<usize> {
        self.store.insert_items(&fixture_items())
    }
}

/// Groups pending items by the topic segment of their url.
pub struct TopicGrouper {
    pub store: Arc<dyn NewsStore>,
}

impl Grouper for TopicGrouper {
    fn group_pending(&self) -> Result<Vec<Group>> {
        let mut by_topic: BTreeMap<String, Vec<i64>> = BTreeMap::new();
        for item in self.store.ungrouped_items(1000)? {
            let topic = item
                .url
                .trim_start_matches("https://news.example/")
                .split('/')
                .next()
                .unwrap_or_default()
                .to_string();
            by_topic.entry(topic).or_default().push(item.id);
        }
        Ok(by_topic
            .into_values()
            .map(|mut ids| {
                ids.sort();
                Group::new(ids)
            })
            .collect())
    }
}
