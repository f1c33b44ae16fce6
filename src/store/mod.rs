//! Transactional item store backed by SQLite.
//!
//! Every record is a typed item addressed by its key path. Reads by exact
//! key, bounded prefix scans, upserts, deletes and write transactions are the
//! whole surface; callers never see SQL.

mod error;
mod transaction;

pub use error::*;
pub use transaction::*;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteExecutor};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::models::{Item, Link, Profile, StoredItem};

/// How long a writer waits for the database lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Open the store database and run migrations.
pub async fn init_store(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    let pool = open_pool(db_path, BUSY_TIMEOUT).await?;
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Connect to the database file, waiting up to `busy_timeout` for locks.
pub(crate) async fn open_pool(
    db_path: &Path,
    busy_timeout: Duration,
) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(busy_timeout);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            key_path TEXT PRIMARY KEY,
            item_type TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Per-scope counters used to allocate item ids
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sequences (
            scope TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_item_type ON items(item_type, key_path);")
        .execute(pool)
        .await?;

    Ok(())
}

/// Handle to the item store. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Read the item of type `T` stored at `key_path`.
    pub async fn get<T: StoredItem>(&self, key_path: &str) -> Result<Option<T>, StoreError> {
        fetch_item(&self.pool, key_path).await
    }

    /// Scan `prefix` and everything nested under it, in key order.
    pub async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<Item>, StoreError> {
        scan_prefix(&self.pool, prefix, limit).await
    }

    /// All items of one type, in key order.
    pub async fn list_type(&self, item_type: &str, limit: usize) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query(
            "SELECT key_path, item_type, body, created_at, updated_at FROM items WHERE item_type = ? ORDER BY key_path LIMIT ?",
        )
        .bind(item_type)
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    /// Insert or replace an item, returning it with store metadata applied.
    pub async fn put<T: StoredItem>(&self, item: &T) -> Result<T, StoreError> {
        upsert_item(&self.pool, item).await
    }

    /// Delete the item at `key_path`. Returns whether anything was removed.
    pub async fn delete(&self, key_path: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM items WHERE key_path = ?")
            .bind(key_path)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Open a write transaction. The database write lock is held until the
    /// transaction commits, rolls back or is dropped.
    pub async fn transaction(&self) -> Result<StoreTxn, StoreError> {
        StoreTxn::begin(&self.pool).await
    }
}

// Statement helpers shared by the store and its transactions

async fn fetch_item<'e, E, T>(executor: E, key_path: &str) -> Result<Option<T>, StoreError>
where
    E: SqliteExecutor<'e>,
    T: StoredItem,
{
    let row = sqlx::query(
        "SELECT key_path, item_type, body, created_at, updated_at FROM items WHERE key_path = ?",
    )
    .bind(key_path)
    .fetch_optional(executor)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let item_type: String = row.get("item_type");
    if item_type != T::ITEM_TYPE {
        tracing::debug!(
            "Item at {} is a {}, not a {}",
            key_path,
            item_type,
            T::ITEM_TYPE
        );
        return Ok(None);
    }

    decode_row::<T>(&row).map(Some)
}

async fn scan_prefix<'e, E>(executor: E, prefix: &str, limit: usize) -> Result<Vec<Item>, StoreError>
where
    E: SqliteExecutor<'e>,
{
    // Children of `prefix` sort between "{prefix}/" and "{prefix}0"
    let lower = format!("{}/", prefix);
    let upper = format!("{}0", prefix);

    let rows = sqlx::query(
        r#"SELECT key_path, item_type, body, created_at, updated_at FROM items
           WHERE key_path = ? OR (key_path >= ? AND key_path < ?)
           ORDER BY key_path LIMIT ?"#,
    )
    .bind(prefix)
    .bind(&lower)
    .bind(&upper)
    .bind(limit_param(limit))
    .fetch_all(executor)
    .await?;

    rows.iter().map(item_from_row).collect()
}

async fn upsert_item<'e, E, T>(executor: E, item: &T) -> Result<T, StoreError>
where
    E: SqliteExecutor<'e>,
    T: StoredItem,
{
    let key_path = item.key_path();
    let body = serde_json::to_string(item)?;
    let now = Utc::now().timestamp();

    let row = sqlx::query(
        r#"INSERT INTO items (key_path, item_type, body, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?)
           ON CONFLICT(key_path) DO UPDATE SET
               item_type = excluded.item_type,
               body = excluded.body,
               updated_at = excluded.updated_at
           RETURNING created_at, updated_at"#,
    )
    .bind(&key_path)
    .bind(T::ITEM_TYPE)
    .bind(&body)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await?;

    let mut stored = item.clone();
    stored.set_timestamps(row.get("created_at"), row.get("updated_at"));
    Ok(stored)
}

async fn bump_sequence<'e, E>(executor: E, scope: &str) -> Result<u64, StoreError>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(
        r#"INSERT INTO sequences (scope, value) VALUES (?, 1)
           ON CONFLICT(scope) DO UPDATE SET value = value + 1
           RETURNING value"#,
    )
    .bind(scope)
    .fetch_one(executor)
    .await?;

    let value: i64 = row.get("value");
    Ok(value as u64)
}

fn decode_row<T: StoredItem>(row: &SqliteRow) -> Result<T, StoreError> {
    let body: String = row.get("body");
    let mut item: T = serde_json::from_str(&body)?;
    item.set_timestamps(row.get("created_at"), row.get("updated_at"));
    Ok(item)
}

fn item_from_row(row: &SqliteRow) -> Result<Item, StoreError> {
    let item_type: String = row.get("item_type");
    if item_type == Profile::ITEM_TYPE {
        Ok(Item::Profile(decode_row(row)?))
    } else if item_type == Link::ITEM_TYPE {
        Ok(Item::Link(decode_row(row)?))
    } else {
        Err(StoreError::UnknownItemType {
            key_path: row.get("key_path"),
            item_type,
        })
    }
}

/// SQLite treats a negative LIMIT as unbounded.
fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(-1)
}
