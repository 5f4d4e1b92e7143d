//! Schema migration runner.
//!
//! Migrations are executed in order whenever a [`SqliteMedium`](crate::SqliteMedium)
//! is opened. Each migration is guarded by the `user_version` pragma so it
//! runs exactly once.

pub mod v001_initial;

use fomz_shared::{FomzError, Result};
use rusqlite::Connection;

use crate::database::sqlite_err;

/// Current schema version.
const CURRENT_VERSION: u32 = 1;

/// Run all pending migrations against the open connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(sqlite_err)?;

    tracing::debug!(
        current_version = current,
        target_version = CURRENT_VERSION,
        "checking local store migrations"
    );

    if current < 1 {
        tracing::info!("applying migration v001_initial");
        v001_initial::up(conn).map_err(|e| FomzError::Storage(format!("migration v001: {e}")))?;
        conn.pragma_update(None, "user_version", 1)
            .map_err(sqlite_err)?;
    }

    Ok(())
}
