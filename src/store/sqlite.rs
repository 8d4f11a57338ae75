use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::sync::{Mutex, MutexGuard};

use super::{Inserted, Store};
use crate::item::{CategorySet, Item, ItemUpdate, NewItem};

const ITEM_COLUMNS: &str = "id, details, title, description, sent_at, saved_at, has_media";

/// SQLite-backed item store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the items table at `path`. Use `":memory:"` for tests.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open item database at {}", path))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS items (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                details     TEXT NOT NULL,
                title       TEXT,
                description TEXT,
                sent_at     TEXT NOT NULL,
                saved_at    TEXT NOT NULL,
                has_media   INTEGER NOT NULL DEFAULT 0,
                category    TEXT,
                summary     TEXT,
                reasoning   TEXT,
                cost        REAL,
                completed   INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS items_pending ON items (category) WHERE category IS NULL;",
        )
        .context("failed to create items table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("item database lock poisoned"))
    }

    fn row_to_item(row: &Row<'_>) -> rusqlite::Result<Item> {
        Ok(Item {
            id: row.get(0)?,
            details: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            sent_at: row.get::<_, DateTime<Utc>>(4)?,
            saved_at: row.get::<_, DateTime<Utc>>(5)?,
            has_media: row.get(6)?,
        })
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert(&self, item: NewItem) -> Result<Inserted> {
        let conn = self.lock()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM items WHERE title IS ?1 AND details = ?2)",
            params![item.title, item.details],
            |row| row.get(0),
        )?;
        if exists {
            return Ok(Inserted::Duplicate);
        }

        conn.execute(
            "INSERT INTO items (details, title, description, sent_at, saved_at, has_media)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                item.details,
                item.title,
                item.description,
                item.sent_at,
                Utc::now(),
                item.has_media
            ],
        )?;
        Ok(Inserted::New(conn.last_insert_rowid()))
    }

    async fn get(&self, id: i64) -> Result<Option<Item>> {
        let conn = self.lock()?;
        let item = conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"),
                [id],
                Self::row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    async fn fetch_pending(&self) -> Result<Vec<Item>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE category IS NULL ORDER BY id ASC"
        ))?;
        let items = stmt
            .query_map([], Self::row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    async fn fetch_categories(&self) -> Result<CategorySet> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT category FROM items WHERE category IS NOT NULL ORDER BY category",
        )?;
        let labels = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(labels.into_iter().collect())
    }

    async fn update(&self, id: i64, update: &ItemUpdate) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE items
             SET category = ?1, summary = ?2, reasoning = ?3, cost = ?4, completed = ?5
             WHERE id = ?6",
            params![
                update.category,
                update.summary,
                update.reasoning,
                update.cost,
                update.completed,
                id
            ],
        )?;
        if changed == 0 {
            bail!("no item with id {}", id);
        }
        Ok(())
    }
}
