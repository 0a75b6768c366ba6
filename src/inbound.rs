//! Inbound command loop
//!
//! Polls a `MessageSource` and answers each command on its own task. Reply
//! tasks are tracked, so a stop request lets every reply already started
//! finish sending before the loop returns.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::commands::CommandHandler;
use crate::notify::{Dispatcher, IncomingMessage, MessageSource};
use crate::tasks::{BackgroundTask, Shutdown};

/// Pause after a failed poll before polling again
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct InboundLoop {
    source: Arc<dyn MessageSource>,
    dispatcher: Arc<dyn Dispatcher>,
    handler: Arc<CommandHandler>,
}

impl InboundLoop {
    pub fn new(
        source: Arc<dyn MessageSource>,
        dispatcher: Arc<dyn Dispatcher>,
        handler: Arc<CommandHandler>,
    ) -> Self {
        Self {
            source,
            dispatcher,
            handler,
        }
    }

    pub async fn run(self, mut shutdown: Shutdown) {
        info!("Inbound command loop started");
        let mut in_flight = JoinSet::new();

        loop {
            while let Some(done) = in_flight.try_join_next() {
                log_reply_task(done);
            }

            let polled = tokio::select! {
                result = self.source.poll() => result,
                _ = shutdown.requested() => break,
            };

            let messages = match polled {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(error = %e, "Polling the chat channel failed");
                    if !shutdown.sleep(POLL_RETRY_DELAY).await {
                        break;
                    }
                    continue;
                }
            };

            for message in messages {
                in_flight.spawn(answer(self.handler.clone(), self.dispatcher.clone(), message));
            }
        }

        if !in_flight.is_empty() {
            info!(pending = in_flight.len(), "Waiting for replies in flight");
        }
        while let Some(done) = in_flight.join_next().await {
            log_reply_task(done);
        }

        info!("Inbound command loop shutting down");
    }

    pub fn spawn(self) -> BackgroundTask {
        BackgroundTask::start("inbound", move |shutdown| self.run(shutdown))
    }
}

async fn answer(
    handler: Arc<CommandHandler>,
    dispatcher: Arc<dyn Dispatcher>,
    message: IncomingMessage,
) {
    let Some(reply) = handler.handle(message.user_id, &message.text) else {
        debug!(user = %message.user_id, "Ignoring non-command text");
        return;
    };
    if let Err(e) = dispatcher.send(message.user_id, &reply).await {
        warn!(user = %message.user_id, error = %e, "Failed to send reply");
    }
}

fn log_reply_task(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        warn!(error = %e, "Reply task ended abnormally");
    }
}
