//! Recurrence rule CRUD and the due-slot lookup
//!
//! Edit and delete are scoped to the owning user. A request naming an id
//! owned by someone else matches zero rows and reports `false`, exactly like
//! an id that does not exist.

use rusqlite::{params, Connection, Row};
use tracing::debug;

use super::LedgerDb;
use crate::error::StoreError;
use crate::models::{RecurrenceRule, RuleFields, Slot, UserId};

const RULE_COLUMNS: &str = "id, user_id, task, amount, weekday, hour, minute";

impl RecurrenceRule {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let weekday: u8 = row.get("weekday")?;
        let hour: u8 = row.get("hour")?;
        let minute: u8 = row.get("minute")?;
        let slot = Slot::new(weekday, hour, minute).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Integer, Box::new(e))
        })?;

        Ok(Self {
            id: row.get("id")?,
            user_id: UserId(row.get("user_id")?),
            task: row.get("task")?,
            amount: row.get("amount")?,
            slot,
        })
    }
}

pub fn create(conn: &Connection, user: UserId, fields: &RuleFields) -> Result<i64, StoreError> {
    fields.validate()?;

    conn.execute(
        "INSERT INTO recurrence_rules (user_id, task, amount, weekday, hour, minute) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.0,
            fields.task.trim(),
            fields.amount,
            fields.slot.weekday(),
            fields.slot.hour(),
            fields.slot.minute(),
        ],
    )?;
    let id = conn.last_insert_rowid();

    debug!(rule_id = id, user = %user, slot = %fields.slot, "Created recurrence rule");
    Ok(id)
}

pub fn list_by_user(conn: &Connection, user: UserId) -> Result<Vec<RecurrenceRule>, StoreError> {
    let sql = format!(
        "SELECT {} FROM recurrence_rules WHERE user_id = ?1 ORDER BY id",
        RULE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user.0], RecurrenceRule::from_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Rewrite every user-controlled field of a rule. Returns whether a row matched.
pub fn update(
    conn: &Connection,
    id: i64,
    user: UserId,
    fields: &RuleFields,
) -> Result<bool, StoreError> {
    fields.validate()?;

    let changed = conn.execute(
        "UPDATE recurrence_rules \
         SET task = ?3, amount = ?4, weekday = ?5, hour = ?6, minute = ?7 \
         WHERE id = ?1 AND user_id = ?2",
        params![
            id,
            user.0,
            fields.task.trim(),
            fields.amount,
            fields.slot.weekday(),
            fields.slot.hour(),
            fields.slot.minute(),
        ],
    )?;

    debug!(rule_id = id, user = %user, matched = changed > 0, "Updated recurrence rule");
    Ok(changed > 0)
}

/// Returns whether a row matched
pub fn delete(conn: &Connection, id: i64, user: UserId) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "DELETE FROM recurrence_rules WHERE id = ?1 AND user_id = ?2",
        params![id, user.0],
    )?;

    debug!(rule_id = id, user = %user, matched = changed > 0, "Deleted recurrence rule");
    Ok(changed > 0)
}

/// Rules scheduled for exactly this slot, served by `idx_recurrence_rules_slot`
pub fn list_due_at(conn: &Connection, slot: Slot) -> Result<Vec<RecurrenceRule>, StoreError> {
    let sql = format!(
        "SELECT {} FROM recurrence_rules WHERE weekday = ?1 AND hour = ?2 AND minute = ?3 ORDER BY id",
        RULE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![slot.weekday(), slot.hour(), slot.minute()],
        RecurrenceRule::from_row,
    )?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

impl LedgerDb {
    pub fn create_rule(&self, user: UserId, fields: &RuleFields) -> Result<i64, StoreError> {
        self.with_conn(|conn| create(conn, user, fields))
    }

    pub fn list_rules(&self, user: UserId) -> Result<Vec<RecurrenceRule>, StoreError> {
        self.with_conn(|conn| list_by_user(conn, user))
    }

    pub fn update_rule(&self, id: i64, user: UserId, fields: &RuleFields) -> Result<bool, StoreError> {
        self.with_conn(|conn| update(conn, id, user, fields))
    }

    pub fn delete_rule(&self, id: i64, user: UserId) -> Result<bool, StoreError> {
        self.with_conn(|conn| delete(conn, id, user))
    }

    pub fn list_due_at(&self, slot: Slot) -> Result<Vec<RecurrenceRule>, StoreError> {
        self.with_conn(|conn| list_due_at(conn, slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(weekday: u8, hour: u8, minute: u8) -> Slot {
        Slot::new(weekday, hour, minute).unwrap()
    }

    #[test]
    fn test_create_and_list_in_id_order() {
        let db = LedgerDb::open_in_memory().unwrap();
        let user = UserId(10);
        let a = db.create_rule(user, &RuleFields::new("Gym", 5.0, slot(6, 20, 0))).unwrap();
        // Same slot twice is allowed
        let b = db.create_rule(user, &RuleFields::new("Gym", 5.0, slot(6, 20, 0))).unwrap();
        db.create_rule(UserId(11), &RuleFields::new("Other", 1.0, slot(0, 0, 0))).unwrap();

        let rules = db.list_rules(user).unwrap();
        assert_eq!(rules.iter().map(|r| r.id).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(rules[0].slot, slot(6, 20, 0));
        assert_eq!(rules[0].user_id, user);
    }

    #[test]
    fn test_due_lookup_is_exact() {
        let db = LedgerDb::open_in_memory().unwrap();
        let id = db
            .create_rule(UserId(1), &RuleFields::new("Weekly review", 0.0, slot(6, 20, 0)))
            .unwrap();

        let due = db.list_due_at(slot(6, 20, 0)).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, id);

        assert!(db.list_due_at(slot(6, 20, 1)).unwrap().is_empty());
        assert!(db.list_due_at(slot(5, 20, 0)).unwrap().is_empty());
        assert!(db.list_due_at(slot(6, 21, 0)).unwrap().is_empty());
    }

    #[test]
    fn test_update_rewrites_all_fields() {
        let db = LedgerDb::open_in_memory().unwrap();
        let user = UserId(3);
        let id = db.create_rule(user, &RuleFields::new("Gym", 5.0, slot(0, 7, 15))).unwrap();

        let updated = RuleFields::new("Swimming", 12.5, slot(3, 18, 45));
        assert!(db.update_rule(id, user, &updated).unwrap());

        let rules = db.list_rules(user).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, id);
        assert_eq!(rules[0].task, "Swimming");
        assert_eq!(rules[0].amount, 12.5);
        assert_eq!(rules[0].slot, slot(3, 18, 45));
        assert!(db.list_due_at(slot(0, 7, 15)).unwrap().is_empty());
    }

    #[test]
    fn test_foreign_delete_and_update_are_no_ops() {
        let db = LedgerDb::open_in_memory().unwrap();
        let owner = UserId(1);
        let intruder = UserId(2);
        let id = db.create_rule(owner, &RuleFields::new("Gym", 5.0, slot(1, 9, 0))).unwrap();

        assert!(!db.delete_rule(id, intruder).unwrap());
        assert!(!db
            .update_rule(id, intruder, &RuleFields::new("Hijack", 99.0, slot(1, 9, 0)))
            .unwrap());

        let rules = db.list_rules(owner).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].task, "Gym");

        assert!(db.delete_rule(id, owner).unwrap());
        assert!(db.list_rules(owner).unwrap().is_empty());
        assert!(!db.delete_rule(id, owner).unwrap());
    }

    #[test]
    fn test_create_rejects_blank_task() {
        let db = LedgerDb::open_in_memory().unwrap();
        let err = db.create_rule(UserId(1), &RuleFields::new("", 1.0, slot(0, 0, 0)));
        assert!(matches!(err, Err(StoreError::Validation(_))));
    }
}
