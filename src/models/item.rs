//! Typed items as they live in the store.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{Link, Profile};

/// A record type that can be stored under its own key path.
pub trait StoredItem: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Type tag written next to the record.
    const ITEM_TYPE: &'static str;

    /// Key this record is stored under.
    fn key_path(&self) -> String;

    /// Copy the store's creation and modification metadata onto the record.
    fn set_timestamps(&mut self, created_at: i64, updated_at: i64);
}

/// Any record a scan can return.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Profile(Profile),
    Link(Link),
}
