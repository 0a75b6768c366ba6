//! Text of every message the bot sends

use std::fmt::Write as _;

use chrono::NaiveDate;

use crate::models::{weekday_name, LedgerEntry, RecurrenceRule, Slot};

pub const HELP: &str = "🤖 Weekly Habit Ledger\n\n\
Commands:\n\
/add <task> <money> [day]\n\
/schedule <task> <money> <day> <HH:MM>\n\
/schedule_list – show your schedules\n\
/edit_schedule <id> <task> <money> <day> <HH:MM>\n\
/delete_schedule <id>\n\
/list – show your entries\n\
/summary – total money spent\n\n\
Example:\n\
/add Gym 5 Sunday\n\
/schedule Gym 5 Sunday 08:30";

pub const NO_ENTRIES: &str = "📭 No entries yet";
pub const NO_SCHEDULES: &str = "📭 No schedules yet";
pub const SCHEDULE_NOT_FOUND: &str = "❌ Schedule not found";
pub const STORAGE_FAILURE: &str = "⚠️ Something went wrong, please try again later";

/// Money with at most two decimals and no trailing zeros
pub fn money(amount: f64) -> String {
    let rounded = format!("{:.2}", amount);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn entry_added(task: &str, amount: f64, date: NaiveDate) -> String {
    format!(
        "✅ Added\n📝 {}\n💰 ${}\n📅 {} ({})",
        task,
        money(amount),
        date.format("%Y-%m-%d"),
        date.format("%A")
    )
}

pub fn entry_list(entries: &[LedgerEntry]) -> String {
    if entries.is_empty() {
        return NO_ENTRIES.to_string();
    }

    let mut msg = String::from("📋 Your Entries:\n\n");
    for entry in entries {
        let _ = writeln!(
            msg,
            "📝 {} | 💰 ${} | 📅 {}",
            entry.task,
            money(entry.amount),
            entry.date.format("%Y-%m-%d")
        );
    }
    msg
}

pub fn schedule_created(id: i64, task: &str, amount: f64, slot: Slot) -> String {
    format!(
        "⏰ Scheduled #{}\n📝 {}\n💰 ${}\n📅 {}",
        id,
        task,
        money(amount),
        slot
    )
}

pub fn schedule_updated(id: i64) -> String {
    format!("✏️ Schedule #{} updated", id)
}

pub fn schedule_deleted(id: i64) -> String {
    format!("🗑 Schedule #{} deleted", id)
}

pub fn schedule_list(rules: &[RecurrenceRule]) -> String {
    if rules.is_empty() {
        return NO_SCHEDULES.to_string();
    }

    let mut msg = String::from("⏰ Your Schedules:\n\n");
    for rule in rules {
        let _ = writeln!(
            msg,
            "#{} 📝 {} | 💰 ${} | 📅 {} {:02}:{:02}",
            rule.id,
            rule.task,
            money(rule.amount),
            weekday_name(rule.slot.weekday()),
            rule.slot.hour(),
            rule.slot.minute()
        );
    }
    msg
}

pub fn total(amount: f64) -> String {
    format!("📊 Total: 💰 ${}", money(amount))
}

pub fn rule_fired(rule: &RecurrenceRule, date: NaiveDate) -> String {
    format!(
        "⏰ Habit logged\n📝 {}\n💰 ${}\n📅 {}",
        rule.task,
        money(rule.amount),
        date.format("%Y-%m-%d")
    )
}

pub fn weekly_summary(total: f64) -> String {
    format!("📅 Weekly Summary\n💰 Total spent: ${}", money(total))
}
