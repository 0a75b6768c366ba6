//! Chat command flows end to end: text in, reply text out, ledger state checked

mod common;

use std::sync::Arc;

use chrono_tz::Tz;

use habit_ledger::commands::UsageError;
use habit_ledger::{replies, CommandHandler, LedgerDb, UserId};

use common::{clock_at, temp_db};

const ALICE: UserId = UserId(100);
const BOB: UserId = UserId(200);

/// Handler with the clock on Wednesday 2024-06-05 12:00 UTC
fn handler() -> (tempfile::TempDir, Arc<LedgerDb>, CommandHandler) {
    let (dir, db) = temp_db();
    let handler = CommandHandler::new(db.clone(), clock_at(Tz::UTC, "2024-06-05 12:00:00"));
    (dir, db, handler)
}

fn reply(handler: &CommandHandler, user: UserId, text: &str) -> String {
    handler
        .handle(user, text)
        .unwrap_or_else(|| panic!("no reply to {:?}", text))
}

#[test]
fn test_add_list_total_flow() {
    let (_dir, db, handler) = handler();

    assert_eq!(
        reply(&handler, ALICE, "/add Gym 5 Sunday"),
        "✅ Added\n📝 Gym\n💰 $5\n📅 2024-06-02 (Sunday)"
    );
    assert_eq!(
        reply(&handler, ALICE, "/add Morning coffee $3.50"),
        "✅ Added\n📝 Morning coffee\n💰 $3.5\n📅 2024-06-05 (Wednesday)"
    );

    assert_eq!(
        reply(&handler, ALICE, "/list"),
        "📋 Your Entries:\n\n\
         📝 Gym | 💰 $5 | 📅 2024-06-02\n\
         📝 Morning coffee | 💰 $3.5 | 📅 2024-06-05\n"
    );
    assert_eq!(reply(&handler, ALICE, "/summary"), "📊 Total: 💰 $8.5");
    assert_eq!(db.sum_by_user(ALICE).unwrap(), 8.5);

    // Other users see only their own ledger
    assert_eq!(reply(&handler, BOB, "/list"), replies::NO_ENTRIES);
    assert_eq!(reply(&handler, BOB, "/total"), "📊 Total: 💰 $0");
}

#[test]
fn test_bad_amount_is_rejected_without_writing() {
    let (_dir, db, handler) = handler();

    assert_eq!(
        reply(&handler, ALICE, "/add Gym notanumber Sunday"),
        UsageError::Amount.to_string()
    );
    assert_eq!(reply(&handler, ALICE, "/add Gym"), UsageError::Add.to_string());
    assert!(db.list_entries(ALICE).unwrap().is_empty());
}

#[test]
fn test_schedule_lifecycle() {
    let (_dir, db, handler) = handler();

    assert_eq!(reply(&handler, ALICE, "/schedule_list"), replies::NO_SCHEDULES);

    let created = reply(&handler, ALICE, "/schedule Gym 5 Sunday 08:30");
    assert!(created.starts_with("⏰ Scheduled #"), "{}", created);
    let rules = db.list_rules(ALICE).unwrap();
    assert_eq!(rules.len(), 1);
    let id = rules[0].id;

    assert_eq!(
        reply(&handler, ALICE, &format!("/edit_schedule {} Swim 7 Mon 07:05", id)),
        format!("✏️ Schedule #{} updated", id)
    );
    assert_eq!(
        reply(&handler, ALICE, "/schedule_list"),
        format!("⏰ Your Schedules:\n\n#{} 📝 Swim | 💰 $7 | 📅 Monday 07:05\n", id)
    );

    assert_eq!(
        reply(&handler, ALICE, &format!("/delete_schedule {}", id)),
        format!("🗑 Schedule #{} deleted", id)
    );
    assert_eq!(reply(&handler, ALICE, "/schedule_list"), replies::NO_SCHEDULES);
    assert_eq!(
        reply(&handler, ALICE, &format!("/delete_schedule {}", id)),
        replies::SCHEDULE_NOT_FOUND
    );
}

#[test]
fn test_cannot_touch_another_users_schedule() {
    let (_dir, db, handler) = handler();

    reply(&handler, ALICE, "/schedule Gym 5 Sunday 08:30");
    let id = db.list_rules(ALICE).unwrap()[0].id;

    assert_eq!(
        reply(&handler, BOB, &format!("/edit_schedule {} Gym 0 Sunday 08:30", id)),
        replies::SCHEDULE_NOT_FOUND
    );
    assert_eq!(
        reply(&handler, BOB, &format!("/delete_schedule {}", id)),
        replies::SCHEDULE_NOT_FOUND
    );

    let rules = db.list_rules(ALICE).unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].amount, 5.0);
}

#[test]
fn test_schedule_usage_errors() {
    let (_dir, db, handler) = handler();

    assert_eq!(reply(&handler, ALICE, "/schedule Gym 5 Sunday"), UsageError::Schedule.to_string());
    assert_eq!(reply(&handler, ALICE, "/schedule Gym 5 Funday 08:30"), UsageError::Day.to_string());
    assert_eq!(reply(&handler, ALICE, "/schedule Gym 5 Sunday 24:00"), UsageError::Time.to_string());
    assert_eq!(reply(&handler, ALICE, "/delete_schedule abc"), UsageError::Id.to_string());
    assert_eq!(reply(&handler, ALICE, "/frobnicate"), UsageError::UnknownCommand.to_string());
    assert!(db.list_rules(ALICE).unwrap().is_empty());
}

#[test]
fn test_start_and_bot_suffix() {
    let (_dir, _db, handler) = handler();

    assert_eq!(reply(&handler, ALICE, "/start"), replies::HELP);
    assert_eq!(reply(&handler, ALICE, "/help@habit_ledger_bot"), replies::HELP);
}

#[test]
fn test_plain_chat_gets_no_reply() {
    let (_dir, db, handler) = handler();

    assert_eq!(handler.handle(ALICE, "hello there"), None);
    assert_eq!(handler.handle(ALICE, "list"), None);
    assert_eq!(handler.handle(ALICE, "add Gym 5 Sunday"), None);
    assert!(db.list_entries(ALICE).unwrap().is_empty());
}

#[test]
fn test_add_without_task_shows_usage() {
    let (_dir, db, handler) = handler();

    assert_eq!(reply(&handler, ALICE, "/add 5 Sunday"), UsageError::Add.to_string());
    assert!(db.list_entries(ALICE).unwrap().is_empty());
}
