mod models;
mod schema;
mod sqlite_news_store;

pub use models::*;
pub use schema::NEWS_VERSIONED_SCHEMAS;
pub use sqlite_news_store::SqliteNewsStore;

use anyhow::Result;

/// Persistent storage for items and records.
///
/// Implementations must make [`NewsStore::save_record`] atomic: the record is
/// inserted and its items are marked grouped in one transaction, and items
/// that are already grouped are never reassigned.
pub trait NewsStore: Send + Sync {
    // Items
    fn insert_items(&self, items: &[NewItem]) -> Result<usize>;
    fn get_items(&self, ids: &[i64]) -> Result<Vec<Item>>;
    fn ungrouped_items(&self, limit: usize) -> Result<Vec<Item>>;
    fn count_items_since(&self, hours: u64) -> Result<usize>;
    fn has_ungrouped_items(&self) -> Result<bool>;

    // Records
    /// Returns `None` when every item in `item_ids` is already grouped.
    fn save_record(&self, draft: &RecordDraft, item_ids: &[i64]) -> Result<Option<Record>>;
    fn get_record(&self, id: i64) -> Result<Option<Record>>;
    /// Newest first.
    fn list_records(&self, limit: usize, offset: usize) -> Result<Vec<Record>>;
    fn count_records(&self) -> Result<usize>;
    fn items_for_record(&self, record_id: i64) -> Result<Vec<Item>>;
    fn set_record_category(&self, id: i64, category: Category) -> Result<bool>;
    fn get_records_missing_category(&self, limit: usize) -> Result<Vec<Record>>;

    fn get_stats(&self) -> Result<StoreStats>;
}
