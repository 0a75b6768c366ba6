//! Aggregation service and the weekly summary broadcast

use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, NaiveTime, TimeZone};
use chrono_tz::Tz;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::db::LedgerDb;
use crate::error::StoreError;
use crate::models::{Slot, UserId};
use crate::notify::{deliver_all, BatchReport, Dispatcher};
use crate::replies;
use crate::tasks::{BackgroundTask, Shutdown};

/// Per-user totals over the ledger
#[derive(Clone)]
pub struct AggregationService {
    db: Arc<LedgerDb>,
}

impl AggregationService {
    pub fn new(db: Arc<LedgerDb>) -> Self {
        Self { db }
    }

    pub fn total_for_user(&self, user: UserId) -> Result<f64, StoreError> {
        self.db.sum_by_user(user)
    }

    /// Totals for every user with at least one entry
    pub fn weekly_broadcast_payload(&self) -> Result<Vec<(UserId, f64)>, StoreError> {
        self.db.sum_all_grouped_by_user()
    }

    /// Send the summary to every user whose total is nonzero
    pub async fn broadcast(&self, dispatcher: &dyn Dispatcher) -> Result<BatchReport, StoreError> {
        let payload = self.weekly_broadcast_payload()?;
        let messages: Vec<(UserId, String)> = payload
            .into_iter()
            .filter(|(_, total)| *total != 0.0)
            .map(|(user, total)| (user, replies::weekly_summary(total)))
            .collect();

        info!(recipients = messages.len(), "Sending weekly summary");
        let report = deliver_all(dispatcher, messages).await;
        report.log("Weekly summary");
        Ok(report)
    }
}

/// Runs `AggregationService::broadcast` once a week at a fixed slot
pub struct WeeklyBroadcast {
    aggregation: AggregationService,
    dispatcher: Arc<dyn Dispatcher>,
    clock: Arc<dyn Clock>,
    slot: Slot,
}

impl WeeklyBroadcast {
    pub fn new(
        aggregation: AggregationService,
        dispatcher: Arc<dyn Dispatcher>,
        clock: Arc<dyn Clock>,
        slot: Slot,
    ) -> Self {
        Self {
            aggregation,
            dispatcher,
            clock,
            slot,
        }
    }

    pub async fn run(self, mut shutdown: Shutdown) {
        info!(slot = %self.slot, "Weekly broadcast scheduled");

        loop {
            let now = self.clock.now();
            let next = next_occurrence(&now, self.slot);
            let delay = (next - now).to_std().unwrap_or_default();
            info!(next = %next, "Next weekly summary");

            if !shutdown.sleep(delay).await {
                break;
            }

            // The sleep may end a little early; never fire before the slot
            let now = self.clock.now();
            if now < next {
                continue;
            }

            // next_occurrence is strictly after now, so this runs once per week
            if let Err(e) = self.aggregation.broadcast(self.dispatcher.as_ref()).await {
                error!(error = %e, "Weekly summary failed");
            }
        }

        info!("Weekly broadcast shutting down");
    }

    pub fn spawn(self) -> BackgroundTask {
        BackgroundTask::start("weekly-broadcast", move |shutdown| self.run(shutdown))
    }
}

/// First instant strictly after `now` whose local time matches `slot`.
///
/// Local times skipped by a DST jump move to the following week; ambiguous
/// times use the earlier instant.
pub fn next_occurrence(now: &DateTime<Tz>, slot: Slot) -> DateTime<Tz> {
    let tz = now.timezone();
    let target_day = slot.weekday() as u64;
    let today = now.date_naive();
    let current_day = today.weekday().num_days_from_monday() as u64;
    let ahead = (target_day + 7 - current_day) % 7;

    let time = NaiveTime::from_hms_opt(slot.hour() as u32, slot.minute() as u32, 0)
        .unwrap_or(NaiveTime::MIN);

    for week in 0..=2u64 {
        let Some(day) = today.checked_add_days(Days::new(ahead + week * 7)) else {
            break;
        };
        if let Some(candidate) = tz.from_local_datetime(&day.and_time(time)).earliest() {
            if candidate > *now {
                return candidate;
            }
        } else {
            warn!(date = %day, slot = %slot, "Broadcast slot does not exist locally, skipping a week");
        }
    }

    *now + chrono::Duration::weeks(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use chrono_tz::Europe::Berlin;

    fn local(s: &str) -> DateTime<Tz> {
        let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap();
        Berlin.from_local_datetime(&naive).earliest().unwrap()
    }

    fn sunday_eight_pm() -> Slot {
        Slot::new(6, 20, 0).unwrap()
    }

    #[test]
    fn test_next_occurrence_later_this_week() {
        // Wednesday
        let next = next_occurrence(&local("2024-06-05 10:00:00"), sunday_eight_pm());
        assert_eq!(next, local("2024-06-09 20:00:00"));
    }

    #[test]
    fn test_next_occurrence_same_day_before_and_after() {
        let slot = sunday_eight_pm();
        assert_eq!(next_occurrence(&local("2024-06-09 19:59:59"), slot), local("2024-06-09 20:00:00"));
        assert_eq!(next_occurrence(&local("2024-06-09 20:00:00"), slot), local("2024-06-16 20:00:00"));
    }

    #[test]
    fn test_next_occurrence_skips_dst_gap() {
        // 02:30 on 2024-03-31 does not exist in Berlin
        let slot = Slot::new(6, 2, 30).unwrap();
        let next = next_occurrence(&local("2024-03-30 12:00:00"), slot);
        assert_eq!(next, local("2024-04-07 02:30:00"));
    }

    #[tokio::test]
    async fn test_broadcast_skips_zero_totals() {
        use crate::notify::testing::RecordingDispatcher;
        use chrono::NaiveDate;

        let db = Arc::new(LedgerDb::open_in_memory().unwrap());
        let day = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        db.append_entry(UserId(1), "Gym", 5.0, day).unwrap();
        db.append_entry(UserId(1), "Coffee", 3.5, day).unwrap();
        db.append_entry(UserId(2), "Refund", 4.0, day).unwrap();
        db.append_entry(UserId(2), "Refund", -4.0, day).unwrap();

        let service = AggregationService::new(db);
        let dispatcher = RecordingDispatcher::default();
        let report = service.broadcast(&dispatcher).await.unwrap();

        assert_eq!(report.delivered(), 1);
        assert_eq!(
            dispatcher.sent(),
            vec![(UserId(1), "📅 Weekly Summary\n💰 Total spent: $8.5".to_string())]
        );
    }
}
