use super::models::{Category, Item, Lean, NewItem, Record, RecordDraft, StoreStats};
use super::schema::NEWS_VERSIONED_SCHEMAS;
use super::NewsStore;
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

const ITEM_COLUMNS: &str =
    "id, source_name, lean, title, url, summary, published_at, ingested_at, record_id";
const RECORD_COLUMNS: &str = "id, title, narrative, framing, category, created_at";

/// SQLite-backed [`NewsStore`].
///
/// Writes go through a single connection; reads use a separate connection so
/// that listing never queues behind a pipeline write (the database runs in WAL
/// mode, giving readers a committed snapshot).
#[derive(Clone)]
pub struct SqliteNewsStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(PoisonError::into_inner)
}

fn timestamp_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn row_to_item(row: &Row) -> rusqlite::Result<Item> {
    let lean: String = row.get("lean")?;
    let published_at: Option<i64> = row.get("published_at")?;
    let ingested_at: i64 = row.get("ingested_at")?;
    Ok(Item {
        id: row.get("id")?,
        source_name: row.get("source_name")?,
        lean: Lean::from_tag(&lean),
        title: row.get("title")?,
        url: row.get("url")?,
        summary: row.get("summary")?,
        published_at: published_at.map(timestamp_to_datetime),
        ingested_at: timestamp_to_datetime(ingested_at),
        record_id: row.get("record_id")?,
    })
}

fn row_to_record(row: &Row) -> rusqlite::Result<Record> {
    let framing: String = row.get("framing")?;
    let category: Option<String> = row.get("category")?;
    let created_at: Option<String> = row.get("created_at")?;
    Ok(Record {
        id: row.get("id")?,
        title: row.get("title")?,
        narrative: row.get("narrative")?,
        framing: serde_json::from_str(&framing).unwrap_or_default(),
        category: category.and_then(|c| c.parse().ok()),
        created_at: created_at.as_deref().and_then(parse_rfc3339),
    })
}

fn known_categories_sql() -> String {
    Category::ALL
        .iter()
        .map(|c| format!("'{}'", c.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl SqliteNewsStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();

        let mut write_conn = Connection::open(path)
            .with_context(|| format!("Failed to open news database at {:?}", path))?;
        write_conn.pragma_update(None, "journal_mode", "WAL")?;
        write_conn.execute("PRAGMA foreign_keys = ON;", [])?;
        migrate_if_needed(&mut write_conn, NEWS_VERSIONED_SCHEMAS)?;

        let read_conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open read connection to news database")?;

        let store = Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        };

        let stats = store.get_stats()?;
        info!(
            "Opened news database at {:?}: {} items, {} records",
            path, stats.total_items, stats.total_records
        );
        Ok(store)
    }
}

impl NewsStore for SqliteNewsStore {
    fn insert_items(&self, items: &[NewItem]) -> Result<usize> {
        let mut conn = lock(&self.write_conn);
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO items (source_name, lean, title, url, summary, published_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for item in items {
                inserted += stmt.execute(params![
                    item.source_name,
                    item.lean.as_str(),
                    item.title,
                    item.url,
                    item.summary,
                    item.published_at.map(|dt| dt.timestamp()),
                ])?;
            }
        }
        tx.commit()?;
        debug!("Inserted {} of {} items", inserted, items.len());
        Ok(inserted)
    }

    fn get_items(&self, ids: &[i64]) -> Result<Vec<Item>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let conn = lock(&self.read_conn);
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id IN ({placeholders}) ORDER BY id"
        ))?;
        let items = stmt
            .query_map(params_from_iter(ids.iter()), row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn ungrouped_items(&self, limit: usize) -> Result<Vec<Item>> {
        let conn = lock(&self.read_conn);
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE record_id IS NULL
             ORDER BY ingested_at DESC, id DESC LIMIT ?1"
        ))?;
        let items = stmt
            .query_map(params![limit as i64], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn count_items_since(&self, hours: u64) -> Result<usize> {
        let window_secs = i64::try_from(hours)
            .unwrap_or(i64::MAX)
            .saturating_mul(3600);
        let cutoff = Utc::now().timestamp().saturating_sub(window_secs);
        let conn = lock(&self.read_conn);
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM items WHERE ingested_at >= ?1",
            params![cutoff],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn has_ungrouped_items(&self) -> Result<bool> {
        let conn = lock(&self.read_conn);
        let found = conn
            .query_row(
                "SELECT 1 FROM items WHERE record_id IS NULL LIMIT 1",
                [],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn save_record(&self, draft: &RecordDraft, item_ids: &[i64]) -> Result<Option<Record>> {
        let created_at = Utc::now();
        let framing = serde_json::to_string(&draft.framing)?;

        let mut conn = lock(&self.write_conn);
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO records (title, narrative, framing, category, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                draft.title,
                draft.narrative,
                framing,
                draft.category.map(|c| c.as_str()),
                created_at.to_rfc3339(),
            ],
        )?;
        let record_id = tx.last_insert_rowid();

        let mut assigned = 0;
        {
            let mut stmt =
                tx.prepare("UPDATE items SET record_id = ?1 WHERE id = ?2 AND record_id IS NULL")?;
            for item_id in item_ids {
                assigned += stmt.execute(params![record_id, item_id])?;
            }
        }

        if assigned == 0 {
            tx.rollback()?;
            debug!(
                "Items {:?} were already grouped, record not created",
                item_ids
            );
            return Ok(None);
        }
        tx.commit()?;

        Ok(Some(Record {
            id: record_id,
            title: draft.title.clone(),
            narrative: draft.narrative.clone(),
            framing: draft.framing.clone(),
            category: draft.category,
            created_at: Some(created_at),
        }))
    }

    fn get_record(&self, id: i64) -> Result<Option<Record>> {
        let conn = lock(&self.read_conn);
        let record = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1"),
                params![id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn list_records(&self, limit: usize, offset: usize) -> Result<Vec<Record>> {
        let conn = lock(&self.read_conn);
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM records
             ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
        ))?;
        let records = stmt
            .query_map(params![limit as i64, offset as i64], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn count_records(&self) -> Result<usize> {
        let conn = lock(&self.read_conn);
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn items_for_record(&self, record_id: i64) -> Result<Vec<Item>> {
        let conn = lock(&self.read_conn);
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE record_id = ?1 ORDER BY id"
        ))?;
        let items = stmt
            .query_map(params![record_id], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn set_record_category(&self, id: i64, category: Category) -> Result<bool> {
        let conn = lock(&self.write_conn);
        let updated = conn.execute(
            "UPDATE records SET category = ?1 WHERE id = ?2",
            params![category.as_str(), id],
        )?;
        Ok(updated > 0)
    }

    fn get_records_missing_category(&self, limit: usize) -> Result<Vec<Record>> {
        let conn = lock(&self.read_conn);
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM records
             WHERE category IS NULL OR category NOT IN ({})
             ORDER BY created_at DESC, id DESC LIMIT ?1",
            known_categories_sql()
        ))?;
        let records = stmt
            .query_map(params![limit as i64], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn get_stats(&self) -> Result<StoreStats> {
        let conn = lock(&self.read_conn);
        let (total_items, unique_sources, last_item_at): (i64, i64, Option<i64>) = conn
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT source_name), MAX(ingested_at) FROM items",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;
        let (total_records, last_record_at): (i64, Option<String>) = conn.query_row(
            "SELECT COUNT(*), MAX(created_at) FROM records",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(StoreStats {
            total_items: total_items as usize,
            total_records: total_records as usize,
            unique_sources: unique_sources as usize,
            last_item_at: last_item_at.map(timestamp_to_datetime),
            last_record_at: last_record_at.as_deref().and_then(parse_rfc3339),
        })
    }
}
