//! Command handling: parse a chat message, touch the stores, build a reply
//!
//! Text that does not start with `/` is ignored. Usage errors become usage
//! hints. A storage failure becomes a generic failure reply and an error log
//! line. Neither escapes as an error.

pub mod parse;

use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate};
use tracing::{debug, error};

use crate::aggregation::AggregationService;
use crate::clock::Clock;
use crate::db::LedgerDb;
use crate::error::StoreError;
use crate::models::{RuleFields, UserId};
use crate::replies;

pub use parse::{parse_command, Command, UsageError};

/// Executes chat commands on behalf of a user
pub struct CommandHandler {
    db: Arc<LedgerDb>,
    aggregation: AggregationService,
    clock: Arc<dyn Clock>,
}

impl CommandHandler {
    pub fn new(db: Arc<LedgerDb>, clock: Arc<dyn Clock>) -> Self {
        Self {
            aggregation: AggregationService::new(db.clone()),
            db,
            clock,
        }
    }

    /// Handle one message and return the reply text, or `None` when the
    /// message is not a command
    pub fn handle(&self, user: UserId, text: &str) -> Option<String> {
        let command = match parse_command(text) {
            Ok(Some(command)) => command,
            Ok(None) => return None,
            Err(usage) => {
                debug!(user = %user, error = ?usage, "Rejected command");
                return Some(usage.to_string());
            }
        };

        let reply = match self.execute(user, command) {
            Ok(reply) => reply,
            Err(e) => {
                error!(user = %user, error = %e, "Command failed");
                replies::STORAGE_FAILURE.to_string()
            }
        };
        Some(reply)
    }

    fn execute(&self, user: UserId, command: Command) -> Result<String, StoreError> {
        match command {
            Command::Start => Ok(replies::HELP.to_string()),
            Command::Add {
                task,
                amount,
                weekday,
            } => {
                let today = self.clock.now().date_naive();
                let date = match weekday {
                    Some(day) => most_recent_weekday(today, day),
                    None => today,
                };
                self.db.append_entry(user, &task, amount, date)?;
                Ok(replies::entry_added(&task, amount, date))
            }
            Command::Schedule(fields) => {
                let id = self.db.create_rule(user, &fields)?;
                Ok(replies::schedule_created(id, &fields.task, fields.amount, fields.slot))
            }
            Command::ScheduleList => {
                let rules = self.db.list_rules(user)?;
                Ok(replies::schedule_list(&rules))
            }
            Command::DeleteSchedule { id } => {
                if self.db.delete_rule(id, user)? {
                    Ok(replies::schedule_deleted(id))
                } else {
                    Ok(replies::SCHEDULE_NOT_FOUND.to_string())
                }
            }
            Command::EditSchedule { id, fields } => self.edit(user, id, &fields),
            Command::List => {
                let entries = self.db.list_entries(user)?;
                Ok(replies::entry_list(&entries))
            }
            Command::Total => {
                let total = self.aggregation.total_for_user(user)?;
                Ok(replies::total(total))
            }
        }
    }

    fn edit(&self, user: UserId, id: i64, fields: &RuleFields) -> Result<String, StoreError> {
        if self.db.update_rule(id, user, fields)? {
            Ok(replies::schedule_updated(id))
        } else {
            Ok(replies::SCHEDULE_NOT_FOUND.to_string())
        }
    }
}

/// Latest date on or before `today` that falls on the Monday-based `weekday`
pub fn most_recent_weekday(today: NaiveDate, weekday: u8) -> NaiveDate {
    let current = today.weekday().num_days_from_monday() as u64;
    let back = (current + 7 - u64::from(weekday % 7)) % 7;
    today.checked_sub_days(Days::new(back)).unwrap_or(today)
}
