//! Database schema definitions

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::StoreError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema. Safe to run on every startup.
pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
    } else if current_version > SCHEMA_VERSION {
        return Err(StoreError::Internal(format!(
            "database schema v{} is newer than supported v{}",
            current_version, SCHEMA_VERSION
        )));
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    // Every statement is IF NOT EXISTS, so re-running is harmless
    conn.execute_batch(LEDGER_SCHEMA)?;
    conn.execute_batch(RULES_SCHEMA)?;
    conn.execute_batch(FIRES_SCHEMA)?;
    conn.execute_batch(INDEXES_SCHEMA)?;

    if current_version != SCHEMA_VERSION {
        set_schema_version(conn, SCHEMA_VERSION)?;
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let version = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StoreError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

/// Realized spending entries
const LEDGER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    task TEXT NOT NULL,
    amount REAL NOT NULL,
    date TEXT NOT NULL
);
"#;

/// Weekly recurrence rules. Weekday is Monday = 0 .. Sunday = 6.
const RULES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS recurrence_rules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    task TEXT NOT NULL,
    amount REAL NOT NULL,
    weekday INTEGER NOT NULL CHECK (weekday BETWEEN 0 AND 6),
    hour INTEGER NOT NULL CHECK (hour BETWEEN 0 AND 23),
    minute INTEGER NOT NULL CHECK (minute BETWEEN 0 AND 59)
);
"#;

/// One row per fired occurrence of a rule
const FIRES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS fire_records (
    rule_id INTEGER NOT NULL,
    weekday INTEGER NOT NULL,
    hour INTEGER NOT NULL,
    minute INTEGER NOT NULL,
    occurrence_date TEXT NOT NULL,
    entry_id INTEGER NOT NULL,
    fired_at TEXT NOT NULL,
    PRIMARY KEY (rule_id, weekday, hour, minute, occurrence_date)
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_ledger_entries_user ON ledger_entries(user_id, id);
CREATE INDEX IF NOT EXISTS idx_recurrence_rules_user ON recurrence_rules(user_id, id);
CREATE INDEX IF NOT EXISTS idx_recurrence_rules_slot ON recurrence_rules(weekday, hour, minute);
CREATE INDEX IF NOT EXISTS idx_fire_records_date ON fire_records(occurrence_date);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_twice() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('ledger_entries', 'recurrence_rules', 'fire_records')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn test_rejects_newer_schema() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        set_schema_version(&conn, SCHEMA_VERSION + 1).unwrap();

        assert!(init_schema(&conn).is_err());
    }
}
