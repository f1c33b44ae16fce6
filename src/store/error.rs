//! Store error handling.

use thiserror::Error;

/// SQLite primary result codes for lock contention.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Errors raised by the item store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying database failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A record body could not be encoded or decoded
    #[error("Invalid item body: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A row carries a type tag this build does not know
    #[error("Unknown item type '{item_type}' at '{key_path}'")]
    UnknownItemType { key_path: String, item_type: String },

    /// The transaction was already committed or rolled back
    #[error("Transaction is already finished")]
    TransactionFinished,
}

impl StoreError {
    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::PoolTimedOut) => true,
            StoreError::Database(sqlx::Error::Database(db)) => db
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
                .unwrap_or(false),
            _ => false,
        }
    }
}

/// Errors raised by single-record mutations.
#[derive(Error, Debug)]
pub enum MutationError {
    /// Nothing is stored under the key
    #[error("No item found at '{key_path}'")]
    NotFound { key_path: String },

    /// An item already occupies the key
    #[error("An item already exists at '{key_path}'")]
    AlreadyExists { key_path: String },

    /// A link already holds the highest ordinal, so nothing fits after it
    #[error("No ordinal left after the last link under '{key_path}'")]
    OrdinalExhausted { key_path: String },

    /// The store failed; see [`StoreError::is_retryable`]
    #[error(transparent)]
    Store(#[from] StoreError),
}
