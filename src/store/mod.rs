pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::item::{CategorySet, Item, ItemUpdate, NewItem};

/// What happened to an ingested item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    New(i64),
    /// An item with the same title and details is already stored.
    Duplicate,
}

/// Where items live between sweeps. Could be SQLite, a document store, etc.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert(&self, item: NewItem) -> Result<Inserted>;
    async fn get(&self, id: i64) -> Result<Option<Item>>;
    /// Items that have not been given a category yet, oldest first.
    async fn fetch_pending(&self) -> Result<Vec<Item>>;
    async fn fetch_categories(&self) -> Result<CategorySet>;
    async fn update(&self, id: i64, update: &ItemUpdate) -> Result<()>;
}
