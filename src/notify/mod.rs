//! Notification delivery
//!
//! The `Dispatcher` trait is the seam to the chat transport. Delivery is
//! attempted per recipient and every attempt produces a `Delivery` in a
//! `BatchReport`; one failed recipient never stops the others.

pub mod telegram;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::DispatchError;
use crate::models::UserId;

pub use telegram::{IncomingMessage, TelegramChannel};

/// Sends a text message to one user
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(&self, user: UserId, text: &str) -> Result<(), DispatchError>;
}

/// Yields batches of inbound text messages
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Wait for the next batch. An empty batch is not an error.
    async fn poll(&self) -> Result<Vec<IncomingMessage>, DispatchError>;
}

/// Outcome of one delivery attempt
#[derive(Debug)]
pub struct Delivery {
    pub user: UserId,
    pub result: Result<(), DispatchError>,
}

impl Delivery {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-recipient results of a batch of deliveries
#[derive(Debug, Default)]
pub struct BatchReport {
    pub deliveries: Vec<Delivery>,
}

impl BatchReport {
    pub fn delivered(&self) -> usize {
        self.deliveries.iter().filter(|d| d.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&UserId, &DispatchError)> {
        self.deliveries
            .iter()
            .filter_map(|d| d.result.as_ref().err().map(|e| (&d.user, e)))
    }

    pub fn failed_count(&self) -> usize {
        self.deliveries.len() - self.delivered()
    }

    /// Write the report to the operational log
    pub fn log(&self, what: &str) {
        for (user, error) in self.failed() {
            warn!(user = %user, error = %error, "{} delivery failed", what);
        }
        info!(
            delivered = self.delivered(),
            failed = self.failed_count(),
            "{} batch complete",
            what
        );
    }
}

/// Send one message to one user and record the outcome
pub async fn deliver(dispatcher: &dyn Dispatcher, user: UserId, text: &str) -> Delivery {
    let result = dispatcher.send(user, text).await;
    Delivery { user, result }
}

/// Send each message in order, collecting every outcome
pub async fn deliver_all(
    dispatcher: &dyn Dispatcher,
    messages: impl IntoIterator<Item = (UserId, String)>,
) -> BatchReport {
    let mut report = BatchReport::default();
    for (user, text) in messages {
        report.deliveries.push(deliver(dispatcher, user, &text).await);
    }
    report
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingDispatcher;
    use super::*;

    #[tokio::test]
    async fn test_failure_does_not_stop_batch() {
        let dispatcher = RecordingDispatcher::failing_for(&[UserId(2)]);
        let report = deliver_all(
            &dispatcher,
            vec![
                (UserId(1), "one".to_string()),
                (UserId(2), "two".to_string()),
                (UserId(3), "three".to_string()),
            ],
        )
        .await;

        assert_eq!(report.delivered(), 2);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.failed().next().map(|(u, _)| *u), Some(UserId(2)));
        assert_eq!(
            dispatcher.sent(),
            vec![(UserId(1), "one".to_string()), (UserId(3), "three".to_string())]
        );
    }
}
