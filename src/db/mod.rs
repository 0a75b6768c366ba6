//! SQLite storage for the ledger and the recurrence rules
//!
//! One `LedgerDb` is opened at startup and shared as `Arc<LedgerDb>` by the
//! command handlers, the recurrence engine and the weekly broadcast. Every
//! operation takes the connection lock for a single statement or a single
//! transaction, never across network I/O.
//!
//! ## Tables
//!
//! - `ledger_entries` - realized spending entries (append-only)
//! - `recurrence_rules` - weekly rules, indexed by (weekday, hour, minute)
//! - `fire_records` - one row per rule occurrence that has fired

pub mod schema;
pub mod ledger;
pub mod rules;
pub mod fires;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::StoreError;

const DB_FILE_NAME: &str = "habit-ledger.db";

/// Shared handle to the habit-ledger database
pub struct LedgerDb {
    conn: Mutex<Connection>,
}

impl LedgerDb {
    /// Open or create the database inside `storage_dir`
    pub fn open(storage_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(storage_dir)?;
        let db_path = storage_dir.join(DB_FILE_NAME);
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        // WAL keeps command reads from waiting on the engine's writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        Ok(db)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        schema::init_schema(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Internal(format!("Lock poisoned: {}", e)))
    }

    /// Run a read or a single-statement write against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run a closure inside one transaction; it commits only if `f` succeeds
    pub fn with_tx<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T, StoreError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Row counts, for startup logging
    pub fn stats(&self) -> Result<DbStats, StoreError> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64, StoreError> {
                let n: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
                Ok(n as u64)
            };

            Ok(DbStats {
                entry_count: count("ledger_entries")?,
                rule_count: count("recurrence_rules")?,
                fire_count: count("fire_records")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub entry_count: u64,
    pub rule_count: u64,
    pub fire_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        {
            let db = LedgerDb::open(dir.path()).unwrap();
            let stats = db.stats().unwrap();
            assert_eq!(stats.entry_count, 0);
        }

        // Reopening runs schema creation again against existing tables
        let db = LedgerDb::open(dir.path()).unwrap();
        assert_eq!(db.stats().unwrap().rule_count, 0);
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let db = LedgerDb::open_in_memory().unwrap();

        let result: Result<(), StoreError> = db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO ledger_entries (user_id, task, amount, date) VALUES (1, 'x', 1.0, '2024-01-01')",
                [],
            )?;
            Err(StoreError::Internal("abort".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(db.stats().unwrap().entry_count, 0);
    }
}
