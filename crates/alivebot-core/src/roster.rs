//! SQLite-backed roster of notification recipients.
//!
//! A single `users` table, ordered by insertion so `/list` style output and
//! the startup broadcast walk recipients in registration order.

use std::{path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tokio::sync::Mutex;

use crate::Result;

/// One registered recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    pub telegram_id: i64,
    pub name: Option<String>,
    pub registered_at: DateTime<Utc>,
}

/// Outcome of an add attempt. Adding an id twice is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyExists,
}

/// Outcome of a delete attempt. Deleting an unknown id is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Persistent recipient roster.
///
/// `rusqlite::Connection` is `Send` but not `Sync`, so all access goes through
/// an async mutex. Queries are synchronous and never hold the guard across an
/// await point.
pub struct RosterStore {
    conn: Arc<Mutex<Connection>>,
}

impl RosterStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                telegram_id INTEGER NOT NULL UNIQUE,
                name TEXT,
                registered_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Register a recipient. Keeps the existing row when the id is already known.
    pub async fn add(&self, telegram_id: i64, name: Option<&str>) -> Result<AddOutcome> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO users (telegram_id, name, registered_at) VALUES (?1, ?2, ?3)",
            params![telegram_id, name, Utc::now().to_rfc3339()],
        )?;
        Ok(if changed == 0 {
            AddOutcome::AlreadyExists
        } else {
            AddOutcome::Added
        })
    }

    pub async fn delete(&self, telegram_id: i64) -> Result<DeleteOutcome> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "DELETE FROM users WHERE telegram_id = ?1",
            params![telegram_id],
        )?;
        Ok(if changed == 0 {
            DeleteOutcome::NotFound
        } else {
            DeleteOutcome::Deleted
        })
    }

    pub async fn contains(&self, telegram_id: i64) -> Result<bool> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE telegram_id = ?1",
            params![telegram_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// All recipients in registration order.
    pub async fn list(&self) -> Result<Vec<Subscriber>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT telegram_id, name, registered_at FROM users ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            let raw: String = row.get(2)?;
            Ok(Subscriber {
                telegram_id: row.get(0)?,
                name: row.get(1)?,
                registered_at: DateTime::parse_from_rfc3339(&raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            })
        })?;
        let mut subscribers = Vec::new();
        for row in rows {
            subscribers.push(row?);
        }
        Ok(subscribers)
    }
}
