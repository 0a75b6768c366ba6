//! Totals and the weekly broadcast over a shared on-disk ledger

mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;

use habit_ledger::{AggregationService, EngineConfig, RecurrenceEngine, RuleFields, Slot, UserId};

use common::{clock_at, temp_db, Outbox};

#[tokio::test]
async fn test_weekly_broadcast_reaches_every_user_with_spending() {
    let (_dir, db) = temp_db();
    let day = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
    db.append_entry(UserId(1), "Gym", 5.0, day).unwrap();
    db.append_entry(UserId(1), "Coffee", 3.5, day).unwrap();
    db.append_entry(UserId(2), "Books", 12.0, day).unwrap();
    db.append_entry(UserId(3), "Lunch", 9.0, day).unwrap();

    let service = AggregationService::new(db);
    assert_eq!(
        service.weekly_broadcast_payload().unwrap(),
        vec![(UserId(1), 8.5), (UserId(2), 12.0), (UserId(3), 9.0)]
    );

    let outbox = Outbox::failing_for(&[UserId(2)]);
    let report = service.broadcast(&outbox).await.unwrap();

    assert_eq!(report.delivered(), 2);
    assert_eq!(report.failed_count(), 1);
    assert_eq!(
        outbox.sent(),
        vec![
            (UserId(1), "📅 Weekly Summary\n💰 Total spent: $8.5".to_string()),
            (UserId(3), "📅 Weekly Summary\n💰 Total spent: $9".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_broadcast_with_empty_ledger_sends_nothing() {
    let (_dir, db) = temp_db();
    let service = AggregationService::new(db);
    let outbox = Outbox::default();

    let report = service.broadcast(&outbox).await.unwrap();

    assert_eq!(report.delivered(), 0);
    assert!(outbox.sent().is_empty());
}

#[tokio::test]
async fn test_totals_include_fired_rules() {
    let (_dir, db) = temp_db();
    let alice = UserId(100);
    let day = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
    db.append_entry(alice, "Coffee", 3.5, day).unwrap();
    db.create_rule(alice, &RuleFields::new("Gym", 5.0, Slot::new(6, 8, 30).unwrap()))
        .unwrap();

    let outbox = Arc::new(Outbox::default());
    let engine = RecurrenceEngine::new(
        db.clone(),
        clock_at(Tz::UTC, "2024-06-09 08:30:00"),
        outbox,
        EngineConfig::default(),
    );
    engine.tick().await.unwrap();

    let service = AggregationService::new(db);
    assert_eq!(service.total_for_user(alice).unwrap(), 8.5);
    assert_eq!(service.total_for_user(UserId(999)).unwrap(), 0.0);
}
