//! Sequential classification of records that have no valid category yet.

use super::category_classifier::CategoryClassifier;
use crate::news_store::{Category, NewsStore};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BackfillReport {
    pub processed: usize,
    pub updated: usize,
    pub failed_updates: usize,
    pub distribution: BTreeMap<Category, usize>,
}

impl BackfillReport {
    /// Categories by descending count, ties in category order.
    pub fn sorted_distribution(&self) -> Vec<(Category, usize)> {
        let mut entries: Vec<_> = self.distribution.iter().map(|(c, n)| (*c, *n)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
    }
}

pub struct CategoryBackfill {
    store: Arc<dyn NewsStore>,
    classifier: Arc<CategoryClassifier>,
    /// Pause between provider calls.
    delay: Duration,
}

impl CategoryBackfill {
    pub fn new(
        store: Arc<dyn NewsStore>,
        classifier: Arc<CategoryClassifier>,
        delay: Duration,
    ) -> Self {
        Self {
            store,
            classifier,
            delay,
        }
    }

    /// Classifies up to `limit` records one at a time. With `dry_run` the
    /// categories are computed and reported but not written.
    pub async fn run(&self, limit: usize, dry_run: bool) -> Result<BackfillReport> {
        let records = self.store.get_records_missing_category(limit)?;
        info!(
            count = records.len(),
            provider = %self.classifier.provider_name(),
            dry_run,
            "Starting category backfill"
        );

        let mut report = BackfillReport::default();
        let total = records.len();

        for (index, record) in records.into_iter().enumerate() {
            let category = self
                .classifier
                .classify(&record.title, Some(&record.narrative))
                .await;
            report.processed += 1;
            *report.distribution.entry(category).or_insert(0) += 1;

            if !dry_run {
                match self.store.set_record_category(record.id, category) {
                    Ok(true) => report.updated += 1,
                    Ok(false) => {
                        warn!(record_id = record.id, "Record vanished before category update");
                        report.failed_updates += 1;
                    }
                    Err(err) => {
                        warn!(record_id = record.id, error = %err, "Failed to store category");
                        report.failed_updates += 1;
                    }
                }
            }

            info!(
                "[{}/{}] {} -> {}",
                index + 1,
                total,
                record.title,
                category
            );

            if index + 1 < total {
                tokio::time::sleep(self.delay).await;
            }
        }

        info!(
            processed = report.processed,
            updated = report.updated,
            failed_updates = report.failed_updates,
            "Category backfill finished"
        );
        Ok(report)
    }
}
