//! Recurrence engine - fires weekly rules into the ledger
//!
//! Each tick reads the clock in the configured timezone, looks up the rules
//! whose (weekday, hour, minute) equals the current minute, and for each one
//! claims a fire record and appends a ledger entry in a single transaction.
//! Only the tick that wins the claim notifies the owner, so running several
//! ticks inside the same minute yields one entry and one message per rule.
//!
//! Due-ness is exact equality on the minute. If the process is not running
//! during a rule's minute, that occurrence is skipped; there is no catch-up.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, Timelike};
use chrono_tz::Tz;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::db::fires::FireOutcome;
use crate::db::LedgerDb;
use crate::error::StoreError;
use crate::models::Slot;
use crate::notify::{deliver_all, BatchReport, Dispatcher};
use crate::replies;
use crate::tasks::{BackgroundTask, Shutdown};

/// Fire records for today and yesterday must survive pruning
const MIN_RETENTION_DAYS: u64 = 2;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time between ticks
    pub tick_interval: Duration,
    /// How long fire records are kept, in days
    pub fire_record_retention_days: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            fire_record_retention_days: 14,
        }
    }
}

/// What happened during one tick
#[derive(Debug)]
pub struct TickReport {
    pub slot: Slot,
    pub due: usize,
    /// (rule id, ledger entry id) for each rule fired by this tick
    pub fired: Vec<(i64, i64)>,
    /// Rules that an earlier tick already fired for this occurrence
    pub already_fired: Vec<i64>,
    /// Rules whose ledger write failed
    pub append_failures: Vec<(i64, String)>,
    pub notifications: BatchReport,
    pub pruned: usize,
}

/// Weekly rule scheduler
pub struct RecurrenceEngine {
    db: Arc<LedgerDb>,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<dyn Dispatcher>,
    config: EngineConfig,
}

impl RecurrenceEngine {
    pub fn new(
        db: Arc<LedgerDb>,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<dyn Dispatcher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            db,
            clock,
            dispatcher,
            config,
        }
    }

    /// Run one tick at the clock's current time
    pub async fn tick(&self) -> Result<TickReport, StoreError> {
        let now = self.clock.now();
        self.tick_at(now).await
    }

    /// Run one tick as if the time were `now`.
    ///
    /// Only a failure to read the due rules fails the whole tick. Ledger and
    /// delivery failures are recorded per rule in the report.
    pub async fn tick_at(&self, now: DateTime<Tz>) -> Result<TickReport, StoreError> {
        let slot = Slot::of(&now);
        let today = now.date_naive();
        let due = self.db.list_due_at(slot)?;

        let mut report = TickReport {
            slot,
            due: due.len(),
            fired: Vec::new(),
            already_fired: Vec::new(),
            append_failures: Vec::new(),
            notifications: BatchReport::default(),
            pruned: 0,
        };

        let mut messages = Vec::new();
        for rule in &due {
            match self.db.fire_rule(rule, today, now.naive_local()) {
                Ok(FireOutcome::Fired { entry_id }) => {
                    info!(rule_id = rule.id, entry_id, user = %rule.user_id, "Rule fired");
                    report.fired.push((rule.id, entry_id));
                    messages.push((rule.user_id, replies::rule_fired(rule, today)));
                }
                Ok(FireOutcome::AlreadyFired) => {
                    debug!(rule_id = rule.id, "Rule already fired for this occurrence");
                    report.already_fired.push(rule.id);
                }
                Err(e) => {
                    error!(rule_id = rule.id, error = %e, "Failed to record rule firing");
                    report.append_failures.push((rule.id, e.to_string()));
                }
            }
        }

        report.notifications = deliver_all(self.dispatcher.as_ref(), messages).await;
        for (user, error) in report.notifications.failed() {
            warn!(user = %user, error = %error, "Rule notification failed");
        }

        let retention = self.config.fire_record_retention_days.max(MIN_RETENTION_DAYS);
        if let Some(cutoff) = today.checked_sub_days(Days::new(retention)) {
            match self.db.prune_fire_records(cutoff) {
                Ok(pruned) => report.pruned = pruned,
                Err(e) => warn!(error = %e, "Failed to prune fire records"),
            }
        }

        if report.due > 0 {
            info!(
                slot = %slot,
                due = report.due,
                fired = report.fired.len(),
                already_fired = report.already_fired.len(),
                append_failures = report.append_failures.len(),
                notify_failures = report.notifications.failed_count(),
                "Tick complete"
            );
        }

        Ok(report)
    }

    /// Tick until `shutdown` fires. A failed tick is logged and the loop goes on.
    pub async fn run(self: Arc<Self>, mut shutdown: Shutdown) {
        info!(
            interval_secs = self.config.tick_interval.as_secs(),
            "Recurrence engine started"
        );

        loop {
            let delay = delay_until_next_tick(&self.clock.now(), self.config.tick_interval);
            if !shutdown.sleep(delay).await {
                break;
            }

            if let Err(e) = self.tick().await {
                error!(error = %e, "Recurrence tick failed");
            }
        }

        info!("Recurrence engine shutting down");
    }

    /// Start the tick loop as a background task
    pub fn spawn(self: Arc<Self>) -> BackgroundTask {
        BackgroundTask::start("recurrence-engine", move |shutdown| self.run(shutdown))
    }
}

/// Time from `now` to the next multiple of `interval` past the minute start.
///
/// With the default 60 s interval ticks land on minute boundaries. Intervals
/// that do not divide a minute fall back to a plain delay.
pub fn delay_until_next_tick<T: Timelike>(now: &T, interval: Duration) -> Duration {
    let interval_ms = interval.as_millis() as u64;
    if interval_ms == 0 {
        return Duration::from_secs(1);
    }
    if 60_000 % interval_ms != 0 {
        return interval;
    }

    let into_minute_ms =
        now.second() as u64 * 1000 + (now.nanosecond() as u64 / 1_000_000).min(999);
    let remainder = into_minute_ms % interval_ms;
    Duration::from_millis(interval_ms - remainder)
}
