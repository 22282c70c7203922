//! Data model for ingested items and the records built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Coarse editorial leaning of the source an item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lean {
    Left,
    Center,
    Right,
    International,
}

impl Lean {
    pub const ALL: [Lean; 4] = [Lean::Left, Lean::Center, Lean::Right, Lean::International];

    /// Parses a lean tag, folding anything unrecognized into [`Lean::Center`].
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "left" => Lean::Left,
            "right" => Lean::Right,
            "international" => Lean::International,
            _ => Lean::Center,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Lean::Left => "left",
            Lean::Center => "center",
            Lean::Right => "right",
            Lean::International => "international",
        }
    }
}

impl fmt::Display for Lean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of labels a record can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Politics,
    Economy,
    Tech,
    Sports,
    Culture,
    World,
    Science,
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Politics,
        Category::Economy,
        Category::Tech,
        Category::Sports,
        Category::Culture,
        Category::World,
        Category::Science,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Politics => "politics",
            Category::Economy => "economy",
            Category::Tech => "tech",
            Category::Sports => "sports",
            Category::Culture => "culture",
            Category::World => "world",
            Category::Science => "science",
            Category::Other => "other",
        }
    }

    /// What the category covers, as shown to the classifier.
    pub fn description(&self) -> &'static str {
        match self {
            Category::Politics => "US politics, elections, policy, government, legislation",
            Category::Economy => "Markets, business, finance, trade, employment",
            Category::Tech => "Technology, AI, startups, social media, cybersecurity",
            Category::Sports => "All sports coverage, athletes, teams, competitions",
            Category::Culture => "Entertainment, movies, music, TV, celebrities, arts",
            Category::World => "International news, foreign affairs, diplomacy (non-US focused)",
            Category::Science => "Science, health, medicine, climate, environment, research",
            Category::Other => "Only if it truly doesn't fit any category above",
        }
    }

    /// Maps free-form model output onto the closed set.
    ///
    /// The text is lower-cased and every character outside `a-z` is dropped
    /// before the membership test. Returns `None` when the cleaned text is not
    /// a member (including when nothing is left).
    pub fn normalize(raw: &str) -> Option<Self> {
        let cleaned: String = raw
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_lowercase())
            .collect();
        cleaned.parse().ok()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown category: {0:?}")]
pub struct UnknownCategory(pub String);

/// A single ingested article.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub id: i64,
    pub source_name: String,
    pub lean: Lean,
    pub title: String,
    pub url: String,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub ingested_at: DateTime<Utc>,
    /// Record this item was grouped into; `None` while ungrouped.
    pub record_id: Option<i64>,
}

impl Item {
    pub fn is_grouped(&self) -> bool {
        self.record_id.is_some()
    }
}

/// Item as handed over by an ingestor, before it gets an id.
#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    pub source_name: String,
    pub lean: Lean,
    pub title: String,
    pub url: String,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Aggregate built from a group of related items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: i64,
    pub title: String,
    pub narrative: String,
    /// How each leaning framed the story.
    pub framing: BTreeMap<Lean, String>,
    pub category: Option<Category>,
    /// `None` when the stored timestamp is missing or cannot be parsed.
    pub created_at: Option<DateTime<Utc>>,
}

/// Enricher output, persisted by the store into a [`Record`].
#[derive(Debug, Clone, Default)]
pub struct RecordDraft {
    pub title: String,
    pub narrative: String,
    pub framing: BTreeMap<Lean, String>,
    pub category: Option<Category>,
}

/// Ids of items judged to cover the same topic. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    pub item_ids: Vec<i64>,
}

impl Group {
    pub fn new(item_ids: Vec<i64>) -> Self {
        Self { item_ids }
    }

    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_items: usize,
    pub total_records: usize,
    pub unique_sources: usize,
    pub last_item_at: Option<DateTime<Utc>>,
    pub last_record_at: Option<DateTime<Utc>>,
}
