//! Time-decaying relevance score for records.
//!
//! A record scores higher when more items contribute to it and when those
//! items come from more distinct leanings, and loses points as it ages:
//!
//! `score = base + sources * per_source + leans * per_lean - floor(hours_old * recency_per_hour)`
//!
//! clamped into `[0, 100]`. The score is never stored; it is recomputed on
//! every read so that it follows wall-clock time.

use crate::news_store::{Item, Lean, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const MIN_SCORE: i64 = 0;
pub const MAX_SCORE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelevanceWeights {
    pub base: i64,
    pub per_source: i64,
    pub per_lean: i64,
    /// Points lost per hour of age.
    pub recency_per_hour: f64,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            base: 50,
            per_source: 15,
            per_lean: 20,
            recency_per_hour: 2.0,
        }
    }
}

impl RelevanceWeights {
    /// Negative weights would break monotonicity of the score.
    pub fn is_valid(&self) -> bool {
        self.per_source >= 0
            && self.per_lean >= 0
            && self.recency_per_hour.is_finite()
            && self.recency_per_hour >= 0.0
    }
}

#[derive(Debug, Clone)]
pub struct RankedRecord {
    pub record: Record,
    pub items: Vec<Item>,
    pub score: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RelevanceRanker {
    weights: RelevanceWeights,
}

impl RelevanceRanker {
    pub fn new(weights: RelevanceWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, record: &Record, items: &[Item]) -> u32 {
        self.score_at(record, items, Utc::now())
    }

    pub fn score_at(&self, record: &Record, items: &[Item], now: DateTime<Utc>) -> u32 {
        let unique_leans: BTreeSet<Lean> = items.iter().map(|item| item.lean).collect();
        self.raw_score(items.len(), unique_leans.len(), hours_old(record, now))
            .clamp(MIN_SCORE, MAX_SCORE) as u32
    }

    fn raw_score(&self, source_count: usize, unique_lean_count: usize, hours_old: f64) -> i64 {
        let w = &self.weights;
        let recency_penalty = (hours_old * w.recency_per_hour).floor() as i64;
        w.base
            .saturating_add((source_count as i64).saturating_mul(w.per_source))
            .saturating_add((unique_lean_count as i64).saturating_mul(w.per_lean))
            .saturating_sub(recency_penalty)
    }

    pub fn rank(&self, records: Vec<(Record, Vec<Item>)>) -> Vec<RankedRecord> {
        self.rank_at(records, Utc::now())
    }

    /// Scores every record against the same `now` and sorts by descending
    /// score. The sort is stable: records with equal scores keep their input
    /// order.
    pub fn rank_at(
        &self,
        records: Vec<(Record, Vec<Item>)>,
        now: DateTime<Utc>,
    ) -> Vec<RankedRecord> {
        let mut ranked: Vec<RankedRecord> = records
            .into_iter()
            .map(|(record, items)| {
                let score = self.score_at(&record, &items, now);
                RankedRecord {
                    record,
                    items,
                    score,
                }
            })
            .collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked
    }
}

/// Age in hours, zero when the creation time is unknown or in the future.
fn hours_old(record: &Record, now: DateTime<Utc>) -> f64 {
    match record.created_at {
        Some(created_at) => {
            let millis = (now - created_at).num_milliseconds().max(0);
            millis as f64 / 3_600_000.0
        }
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::BTreeMap;

    fn record(id: i64, created_at: Option<DateTime<Utc>>) -> Record {
        Record {
            id,
            title: format!("Story {}", id),
            narrative: String::new(),
            framing: BTreeMap::new(),
            category: None,
            created_at,
        }
    }

    fn item(id: i64, lean: Lean, now: DateTime<Utc>) -> Item {
        Item {
            id,
            source_name: format!("source-{}", id),
            lean,
            title: format!("Item {}", id),
            url: format!("https://news.example/{}", id),
            summary: None,
            published_at: None,
            ingested_at: now,
            record_id: None,
        }
    }

    fn items_with_leans(leans: &[Lean], now: DateTime<Utc>) -> Vec<Item> {
        leans
            .iter()
            .enumerate()
            .map(|(i, lean)| item(i as i64, *lean, now))
            .collect()
    }

    #[test]
    fn test_score_saturates_at_upper_bound() {
        let now = Utc::now();
        let ranker = RelevanceRanker::default();
        let items = items_with_leans(
            &[Lean::Left, Lean::Right, Lean::Center, Lean::Left, Lean::Right],
            now,
        );
        let rec = record(1, Some(now - Duration::hours(1)));

        // 50 + 75 + 60 - 2 = 183
        assert_eq!(ranker.score_at(&rec, &items, now), 100);
    }

    #[test]
    fn test_score_saturates_at_lower_bound() {
        let now = Utc::now();
        let ranker = RelevanceRanker::default();
        let rec = record(1, Some(now - Duration::hours(100)));

        // 50 - 200 = -150
        assert_eq!(ranker.score_at(&rec, &[], now), 0);
    }

    #[test]
    fn test_score_within_bounds() {
        let now = Utc::now();
        let ranker = RelevanceRanker::default();
        let items = items_with_leans(&[Lean::Left], now);
        let rec = record(1, Some(now - Duration::minutes(90)));

        // 50 + 15 + 20 - floor(1.5 * 2) = 82
        assert_eq!(ranker.score_at(&rec, &items, now), 82);
    }

    #[test]
    fn test_missing_timestamp_has_no_recency_penalty() {
        let now = Utc::now();
        let ranker = RelevanceRanker::default();
        assert_eq!(ranker.score_at(&record(1, None), &[], now), 50);
    }

    #[test]
    fn test_future_timestamp_has_no_bonus() {
        let now = Utc::now();
        let ranker = RelevanceRanker::default();
        let rec = record(1, Some(now + Duration::hours(5)));
        assert_eq!(ranker.score_at(&rec, &[], now), 50);
    }

    #[test]
    fn test_duplicate_leans_count_once() {
        let now = Utc::now();
        let ranker = RelevanceRanker::new(RelevanceWeights {
            base: 0,
            per_source: 0,
            per_lean: 10,
            recency_per_hour: 0.0,
        });
        let items = items_with_leans(&[Lean::Left, Lean::Left, Lean::Center], now);
        assert_eq!(ranker.score_at(&record(1, Some(now)), &items, now), 20);
    }

    #[test]
    fn test_score_is_monotonic() {
        let now = Utc::now();
        let ranker = RelevanceRanker::new(RelevanceWeights {
            base: 0,
            per_source: 3,
            per_lean: 5,
            recency_per_hour: 1.0,
        });

        let mut previous = 0;
        for count in 0..6 {
            let items = items_with_leans(&vec![Lean::Center; count], now);
            let score = ranker.score_at(&record(1, Some(now)), &items, now);
            assert!(score >= previous);
            previous = score;
        }

        let items = items_with_leans(&[Lean::Left, Lean::Right, Lean::Center], now);
        let mut previous = u32::MAX;
        for hours in [0, 1, 5, 20, 200] {
            let rec = record(1, Some(now - Duration::hours(hours)));
            let score = ranker.score_at(&rec, &items, now);
            assert!(score <= previous);
            previous = score;
        }
    }

    #[test]
    fn test_rank_orders_descending_and_is_stable() {
        let now = Utc::now();
        let ranker = RelevanceRanker::default();
        let records = vec![
            (record(1, Some(now - Duration::hours(10))), vec![]),
            (record(2, Some(now)), items_with_leans(&[Lean::Left], now)),
            (record(3, Some(now - Duration::hours(10))), vec![]),
            (record(4, None), vec![]),
        ];

        let ranked = ranker.rank_at(records, now);
        let ids: Vec<i64> = ranked.iter().map(|r| r.record.id).collect();
        // 2 scores 85, 4 scores 50, 1 and 3 tie at 30 in input order.
        assert_eq!(ids, vec![2, 4, 1, 3]);
        assert_eq!(ranked[0].score, 85);
        assert_eq!(ranked[2].score, ranked[3].score);
    }

    #[test]
    fn test_rank_is_deterministic() {
        let now = Utc::now();
        let ranker = RelevanceRanker::default();
        let build = || {
            (1..=6)
                .map(|id| (record(id, Some(now - Duration::hours(id % 2))), vec![]))
                .collect::<Vec<_>>()
        };

        let first: Vec<i64> = ranker
            .rank_at(build(), now)
            .iter()
            .map(|r| r.record.id)
            .collect();
        let second: Vec<i64> = ranker
            .rank_at(build(), now)
            .iter()
            .map(|r| r.record.id)
            .collect();
        assert_eq!(first, second);
        assert_eq!(first, vec![2, 4, 6, 1, 3, 5]);
    }

    #[test]
    fn test_weights_validation() {
        assert!(RelevanceWeights::default().is_valid());
        let negative = RelevanceWeights {
            per_lean: -1,
            ..Default::default()
        };
        assert!(!negative.is_valid());
        let nan = RelevanceWeights {
            recency_per_hour: f64::NAN,
            ..Default::default()
        };
        assert!(!nan.is_valid());
    }
}
