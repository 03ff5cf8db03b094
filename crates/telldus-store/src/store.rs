//! SQLite-backed key-value store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::kv::{KvStore, check_batch};
use crate::schema;

/// SQLite-based store for sensor watermarks, readings and settings.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Unavailable("database connection lock poisoned".to_string()))
    }
}

impl KvStore for SqliteStore {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM entities WHERE collection = ?1 AND key = ?2",
                [collection, key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn put(&self, collection: &str, key: &str, value: &Value) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO entities (collection, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(collection, key) DO UPDATE SET
                value = ?3,
                updated_at = ?4",
            rusqlite::params![
                collection,
                key,
                value.to_string(),
                OffsetDateTime::now_utc().unix_timestamp()
            ],
        )?;
        Ok(())
    }

    fn put_multi(&self, collection: &str, entries: &[(String, Value)]) -> Result<()> {
        check_batch(entries)?;

        let mut conn = self.lock()?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO entities (collection, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(collection, key) DO UPDATE SET
                    value = ?3,
                    updated_at = ?4",
            )?;
            for (key, value) in entries {
                stmt.execute(rusqlite::params![collection, key, value.to_string(), now])?;
            }
        }
        tx.commit()?;

        debug!("Stored {} entities in {}", entries.len(), collection);
        Ok(())
    }

    fn count(&self, collection: &str) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entities WHERE collection = ?",
            [collection],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
