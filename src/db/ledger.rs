//! Ledger entry storage and per-user sums

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use tracing::debug;

use super::LedgerDb;
use crate::error::StoreError;
use crate::models::{validate_amount, validate_task, LedgerEntry, UserId};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

impl LedgerEntry {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let date: String = row.get("date")?;
        Ok(Self {
            id: row.get("id")?,
            user_id: UserId(row.get("user_id")?),
            task: row.get("task")?,
            amount: row.get("amount")?,
            date: parse_date(&date)?,
        })
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Insert one entry. Works on a plain connection or inside a transaction.
pub fn append(
    conn: &Connection,
    user: UserId,
    task: &str,
    amount: f64,
    date: NaiveDate,
) -> Result<i64, StoreError> {
    validate_task(task)?;
    validate_amount(amount)?;

    conn.execute(
        "INSERT INTO ledger_entries (user_id, task, amount, date) VALUES (?1, ?2, ?3, ?4)",
        params![user.0, task.trim(), amount, date.format(DATE_FORMAT).to_string()],
    )?;
    let id = conn.last_insert_rowid();

    debug!(entry_id = id, user = %user, "Appended ledger entry");
    Ok(id)
}

pub fn list_by_user(conn: &Connection, user: UserId) -> Result<Vec<LedgerEntry>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, task, amount, date FROM ledger_entries WHERE user_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![user.0], LedgerEntry::from_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Sum of a user's amounts; 0 when the user has no entries
pub fn sum_by_user(conn: &Connection, user: UserId) -> Result<f64, StoreError> {
    // SUM over zero rows is NULL
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0.0) FROM ledger_entries WHERE user_id = ?1",
        params![user.0],
        |row| row.get(0),
    )?;
    Ok(total)
}

/// Per-user totals for every user with at least one entry, ordered by user
pub fn sum_all_grouped_by_user(conn: &Connection) -> Result<Vec<(UserId, f64)>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT user_id, SUM(amount) FROM ledger_entries GROUP BY user_id ORDER BY user_id",
    )?;
    let rows = stmt.query_map([], |row| Ok((UserId(row.get(0)?), row.get::<_, f64>(1)?)))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

impl LedgerDb {
    pub fn append_entry(
        &self,
        user: UserId,
        task: &str,
        amount: f64,
        date: NaiveDate,
    ) -> Result<i64, StoreError> {
        self.with_conn(|conn| append(conn, user, task, amount, date))
    }

    pub fn list_entries(&self, user: UserId) -> Result<Vec<LedgerEntry>, StoreError> {
        self.with_conn(|conn| list_by_user(conn, user))
    }

    pub fn sum_by_user(&self, user: UserId) -> Result<f64, StoreError> {
        self.with_conn(|conn| sum_by_user(conn, user))
    }

    pub fn sum_all_grouped_by_user(&self) -> Result<Vec<(UserId, f64)>, StoreError> {
        self.with_conn(sum_all_grouped_by_user)
    }
}
