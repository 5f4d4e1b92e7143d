//! SQLite-backed key-value medium.
//!
//! The [`SqliteMedium`] owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation. Entries live in a single
//! `kv` table; usage accounting matches [`MemoryMedium`](crate::MemoryMedium).

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use fomz_shared::{FomzError, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::medium::KvMedium;
use crate::migrations;

/// Wrapper around a [`rusqlite::Connection`].
pub struct SqliteMedium {
    conn: Connection,
    capacity: Option<u64>,
}

pub(crate) fn sqlite_err(e: rusqlite::Error) -> FomzError {
    FomzError::Storage(e.to_string())
}

impl SqliteMedium {
    /// Platform data directory for the local store:
    /// - Linux:   `~/.local/share/fomz`
    /// - macOS:   `~/Library/Application Support/app.fomz.fomz`
    /// - Windows: `{FOLDERID_RoamingAppData}\fomz\fomz\data`
    pub fn default_data_dir() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("app", "fomz", "fomz").ok_or_else(|| {
            FomzError::Storage("could not determine application data directory".to_string())
        })?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Open (or create) `local.db` inside `data_dir`.
    pub fn open_in_dir(data_dir: &Path, capacity: Option<u64>) -> Result<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| FomzError::Storage(e.to_string()))?;
        let db_path = data_dir.join("local.db");

        tracing::info!(path = %db_path.display(), "opening local store");

        Self::open_at(&db_path, capacity)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path, capacity: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path).map_err(sqlite_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(sqlite_err)?;
        Self::init(conn, capacity)
    }

    /// Non-persistent database, mostly for tests.
    pub fn open_in_memory(capacity: Option<u64>) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(sqlite_err)?;
        Self::init(conn, capacity)
    }

    fn init(conn: Connection, capacity: Option<u64>) -> Result<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self { conn, capacity })
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }

    fn used_excluding(&self, key: &str) -> Result<u64> {
        let used: i64 = self
            .conn
            .query_row(
                "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
                 FROM kv WHERE key != ?1",
                params![key],
                |row| row.get(0),
            )
            .map_err(sqlite_err)?;
        Ok(used.max(0) as u64)
    }
}

impl KvMedium for SqliteMedium {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(sqlite_err)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if let Some(capacity) = self.capacity {
            let needed = self.used_excluding(key)? + (key.len() + value.len()) as u64;
            if needed > capacity {
                return Err(FomzError::QuotaExceeded(format!(
                    "writing {key} needs {needed} bytes, capacity is {capacity}"
                )));
            }
        }
        self.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map_err(sqlite_err)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(sqlite_err)?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM kv ORDER BY key ASC")
            .map_err(sqlite_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(sqlite_err)?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row.map_err(sqlite_err)?);
        }
        Ok(keys)
    }

    fn used_bytes(&self) -> Result<u64> {
        self.used_excluding("")
    }
}
