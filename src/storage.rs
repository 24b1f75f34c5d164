//! Preference persistence
//!
//! Preferences are append-only: every directive adds a row, nothing is
//! updated or deleted.

use crate::Result;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// A single user preference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    pub name: String,
    pub value: String,
}

impl Preference {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Append-only preference storage
pub trait PreferenceStore {
    /// Append a preference row
    fn insert(&mut self, preference: &Preference) -> Result<()>;

    /// Number of stored rows
    fn count(&self) -> Result<usize>;

    /// All stored rows in insertion order
    fn all(&self) -> Result<Vec<Preference>>;
}

/// SQLite-backed preference store
pub struct SqlitePreferenceStore {
    conn: Connection,
}

impl SqlitePreferenceStore {
    /// Open (or create) the preference database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening preference database: {}", path.display());
        Self::with_connection(Connection::open(path)?)
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS preferences (
                name TEXT,
                value TEXT
            )",
            [],
        )?;
        Ok(Self { conn })
    }
}

impl PreferenceStore for SqlitePreferenceStore {
    fn insert(&mut self, preference: &Preference) -> Result<()> {
        self.conn.execute(
            "INSERT INTO preferences (name, value) VALUES (?1, ?2)",
            params![preference.name, preference.value],
        )?;
        debug!("Stored preference {} = {}", preference.name, preference.value);
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM preferences", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn all(&self) -> Result<Vec<Preference>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, value FROM preferences ORDER BY rowid")?;

        let rows = stmt.query_map([], |row| {
            Ok(Preference {
                name: row.get(0)?,
                value: row.get(1)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }

        Ok(result)
    }
}
