//! Write transactions over the item store.

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{Sqlite, SqliteConnection, SqlitePool};

use super::{bump_sequence, fetch_item, scan_prefix, upsert_item, StoreError};
use crate::models::{Item, StoredItem};

/// A write transaction holding one pooled connection.
///
/// Begins with `BEGIN IMMEDIATE`, so the database write lock is taken before
/// the first read and concurrent transactions run one after another. A
/// transaction dropped without [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) has its connection closed, which rolls it back.
pub struct StoreTxn {
    conn: Option<PoolConnection<Sqlite>>,
}

impl StoreTxn {
    pub(super) async fn begin(pool: &SqlitePool) -> Result<Self, StoreError> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut SqliteConnection, StoreError> {
        self.conn
            .as_deref_mut()
            .ok_or(StoreError::TransactionFinished)
    }

    pub async fn get<T: StoredItem>(&mut self, key_path: &str) -> Result<Option<T>, StoreError> {
        fetch_item(self.conn()?, key_path).await
    }

    pub async fn list(&mut self, prefix: &str, limit: usize) -> Result<Vec<Item>, StoreError> {
        scan_prefix(self.conn()?, prefix, limit).await
    }

    pub async fn put<T: StoredItem>(&mut self, item: &T) -> Result<T, StoreError> {
        upsert_item(self.conn()?, item).await
    }

    /// Allocate the next id in `scope`, starting at 1. Ids are never reused.
    pub async fn next_sequence(&mut self, scope: &str) -> Result<u64, StoreError> {
        bump_sequence(self.conn()?, scope).await
    }

    pub async fn commit(mut self) -> Result<(), StoreError> {
        self.finish("COMMIT").await
    }

    pub async fn rollback(mut self) -> Result<(), StoreError> {
        self.finish("ROLLBACK").await
    }

    async fn finish(&mut self, statement: &'static str) -> Result<(), StoreError> {
        let mut conn = self.conn.take().ok_or(StoreError::TransactionFinished)?;
        if let Err(e) = sqlx::query(statement).execute(&mut *conn).await {
            // Connection state is unknown; don't hand it back to the pool
            drop(conn.detach());
            return Err(e.into());
        }
        Ok(())
    }
}

impl Drop for StoreTxn {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::debug!("Transaction dropped before commit, rolling back");
            drop(conn.detach());
        }
    }
}
