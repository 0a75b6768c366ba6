//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use chrono_tz::Tz;
use tempfile::TempDir;

use habit_ledger::{DispatchError, Dispatcher, LedgerDb, ManualClock, UserId};

/// Dispatcher that records what it was asked to send
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<(UserId, String)>>,
    failing: HashSet<UserId>,
}

impl Outbox {
    pub fn failing_for(users: &[UserId]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: users.iter().copied().collect(),
        }
    }

    pub fn sent(&self) -> Vec<(UserId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn recipients(&self) -> Vec<UserId> {
        self.sent().into_iter().map(|(user, _)| user).collect()
    }
}

#[async_trait]
impl Dispatcher for Outbox {
    async fn send(&self, user: UserId, text: &str) -> Result<(), DispatchError> {
        if self.failing.contains(&user) {
            return Err(DispatchError::Rejected {
                user,
                reason: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        self.sent.lock().unwrap().push((user, text.to_string()));
        Ok(())
    }
}

pub fn temp_db() -> (TempDir, Arc<LedgerDb>) {
    let dir = TempDir::new().unwrap();
    let db = Arc::new(LedgerDb::open(dir.path()).unwrap());
    (dir, db)
}

/// Clock fixed at a local time, e.g. "2024-06-09 08:30:00"
pub fn clock_at(tz: Tz, local: &str) -> Arc<ManualClock> {
    let naive = NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S").unwrap();
    Arc::new(ManualClock::at_local(tz, naive).unwrap())
}
