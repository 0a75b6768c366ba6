//! Fire records: the once-per-occurrence guard for recurrence rules
//!
//! A rule occurrence is identified by (rule_id, weekday, hour, minute,
//! occurrence_date). The record and the ledger entry it produces are written
//! in the same transaction, so either both exist or neither does.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::params;
use tracing::debug;

use super::ledger::{self, DATE_FORMAT};
use super::LedgerDb;
use crate::error::StoreError;
use crate::models::RecurrenceRule;

/// Result of trying to fire one rule occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// This call claimed the occurrence and appended the entry
    Fired { entry_id: i64 },
    /// A previous call already fired this occurrence
    AlreadyFired,
}

impl LedgerDb {
    /// Claim the occurrence of `rule` on `date` and append its ledger entry.
    ///
    /// Concurrent callers for the same occurrence are serialized by the
    /// connection lock and the primary key; exactly one sees `Fired`.
    pub fn fire_rule(
        &self,
        rule: &RecurrenceRule,
        date: NaiveDate,
        fired_at: NaiveDateTime,
    ) -> Result<FireOutcome, StoreError> {
        self.with_tx(|tx| {
            let occurrence = date.format(DATE_FORMAT).to_string();

            let already: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM fire_records \
                 WHERE rule_id = ?1 AND weekday = ?2 AND hour = ?3 AND minute = ?4 AND occurrence_date = ?5)",
                params![
                    rule.id,
                    rule.slot.weekday(),
                    rule.slot.hour(),
                    rule.slot.minute(),
                    occurrence,
                ],
                |row| row.get(0),
            )?;
            if already {
                debug!(rule_id = rule.id, date = %occurrence, "Occurrence already fired");
                return Ok(FireOutcome::AlreadyFired);
            }

            let entry_id = ledger::append(tx, rule.user_id, &rule.task, rule.amount, date)?;

            tx.execute(
                "INSERT INTO fire_records (rule_id, weekday, hour, minute, occurrence_date, entry_id, fired_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    rule.id,
                    rule.slot.weekday(),
                    rule.slot.hour(),
                    rule.slot.minute(),
                    occurrence,
                    entry_id,
                    fired_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
                ],
            )?;

            Ok(FireOutcome::Fired { entry_id })
        })
    }

    /// Drop fire records for occurrences strictly before `cutoff`
    pub fn prune_fire_records(&self, cutoff: NaiveDate) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM fire_records WHERE occurrence_date < ?1",
                params![cutoff.format(DATE_FORMAT).to_string()],
            )?;
            Ok(removed)
        })
    }
}
