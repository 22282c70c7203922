//! SQLite schema for the news database.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const RECORDS_TABLE_V1: Table = Table {
    name: "records",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("narrative", &SqlType::Text, non_null = true),
        // JSON object keyed by lean
        sqlite_column!("framing", &SqlType::Text, non_null = true, default_value = Some("'{}'")),
        sqlite_column!("category", &SqlType::Text),
        // RFC 3339
        sqlite_column!("created_at", &SqlType::Text),
    ],
    indices: &[
        ("idx_records_created_at", "created_at DESC"),
        ("idx_records_category", "category"),
    ],
};

const RECORD_FOREIGN_KEY: ForeignKey = ForeignKey {
    foreign_table: "records",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::SetNull,
};

const ITEMS_TABLE_V1: Table = Table {
    name: "items",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("source_name", &SqlType::Text, non_null = true),
        sqlite_column!("lean", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("url", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("summary", &SqlType::Text),
        // unix seconds
        sqlite_column!("published_at", &SqlType::Integer),
        sqlite_column!(
            "ingested_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "record_id",
            &SqlType::Integer,
            foreign_key = Some(&RECORD_FOREIGN_KEY)
        ),
    ],
    indices: &[
        ("idx_items_ingested_at", "ingested_at"),
        ("idx_items_record_id", "record_id"),
    ],
};

pub const NEWS_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[RECORDS_TABLE_V1, ITEMS_TABLE_V1],
    migration: None,
}];
