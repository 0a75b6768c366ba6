//! Telegram Bot API transport
//!
//! Long-polls `getUpdates` for inbound commands and sends replies and
//! notifications with `sendMessage`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Dispatcher, MessageSource};
use crate::error::DispatchError;
use crate::models::UserId;

const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Server-side long-poll timeout for getUpdates
const POLL_TIMEOUT_SECS: u64 = 30;

/// A text message received from a user
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub user_id: UserId,
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Telegram bot client
pub struct TelegramChannel {
    client: reqwest::Client,
    base_url: String,
    /// Next update id to request; Telegram drops everything below it
    offset: Mutex<i64>,
}

impl TelegramChannel {
    pub fn new(token: &str) -> Self {
        Self::with_api_url(DEFAULT_API_URL, token)
    }

    pub fn with_api_url(api_url: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            offset: Mutex::new(0),
        }
    }
}

#[async_trait]
impl MessageSource for TelegramChannel {
    async fn poll(&self) -> Result<Vec<IncomingMessage>, DispatchError> {
        let mut offset = self.offset.lock().await;

        let response = self
            .client
            .get(format!(
                "{}/getUpdates?offset={}&timeout={}",
                self.base_url, *offset, POLL_TIMEOUT_SECS
            ))
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .send()
            .await
            .map_err(|e| DispatchError::Network(e.to_string()))?;

        let body: ApiResponse<Vec<Update>> = response
            .json()
            .await
            .map_err(|e| DispatchError::Network(format!("Malformed getUpdates reply: {}", e)))?;

        if !body.ok {
            return Err(DispatchError::Network(
                body.description.unwrap_or_else(|| "getUpdates failed".to_string()),
            ));
        }

        let updates = body.result.unwrap_or_default();
        if let Some(last) = updates.last() {
            *offset = last.update_id + 1;
        }
        debug!(count = updates.len(), next_offset = *offset, "Polled updates");

        Ok(extract_messages(updates))
    }
}

fn extract_messages(updates: Vec<Update>) -> Vec<IncomingMessage> {
    updates
        .into_iter()
        .filter_map(|update| update.message)
        .filter_map(|message| {
            message.text.map(|text| IncomingMessage {
                user_id: UserId(message.chat.id),
                text,
            })
        })
        .collect()
}

#[async_trait]
impl Dispatcher for TelegramChannel {
    async fn send(&self, user: UserId, text: &str) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(format!("{}/sendMessage", self.base_url))
            .json(&SendMessageRequest { chat_id: user.0, text })
            .timeout(Duration::from_secs(15))
            .send()
            .await
            .map_err(|e| DispatchError::Network(e.to_string()))?;

        let status = response.status();
        let body: ApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| DispatchError::Network(format!("HTTP {}: {}", status, e)))?;

        if !body.ok {
            let reason = body
                .description
                .unwrap_or_else(|| format!("HTTP {}", status));
            warn!(user = %user, reason = %reason, "sendMessage rejected");
            return Err(DispatchError::Rejected { user, reason });
        }

        Ok(())
    }
}
