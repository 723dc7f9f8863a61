//! Minimal Telegram Bot API client over long polling.
//!
//! Covers the three methods the bot needs (`getUpdates`, `sendMessage`,
//! `setMyCommands`) plus the reply-keyboard payloads they carry. The
//! base URL is configurable so tests can point the client at a local
//! mock server.

use std::time::Duration;

use focusloop_core::ChatId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Wait before retrying after a failed `getUpdates` call.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telegram API error: {0}")]
    Api(String),
    #[error("payload error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One entry from `getUpdates`. Everything except private text messages
/// is left unparsed and skipped by the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

/// Telegram `ReplyKeyboardMarkup`, serialized as `reply_markup`.
#[derive(Debug, Clone, Serialize)]
pub struct ReplyKeyboard {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
    pub one_time_keyboard: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

impl ReplyKeyboard {
    /// Keyboard that folds away after one press.
    pub fn one_time(rows: &[&[&str]]) -> Self {
        Self::build(rows, true)
    }

    /// Keyboard that stays attached to the chat.
    pub fn persistent(rows: &[&[&str]]) -> Self {
        Self::build(rows, false)
    }

    fn build(rows: &[&[&str]], one_time: bool) -> Self {
        let keyboard = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|label| KeyboardButton {
                        text: (*label).to_string(),
                    })
                    .collect()
            })
            .collect();
        Self {
            keyboard,
            resize_keyboard: true,
            one_time_keyboard: one_time,
        }
    }
}

/// A reply queued for delivery, produced by the handlers.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub keyboard: Option<ReplyKeyboard>,
}

impl OutboundMessage {
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(chat_id: ChatId, text: impl Into<String>, keyboard: ReplyKeyboard) -> Self {
        Self {
            chat_id,
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

/// Envelope every Bot API response comes in.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
    poll_timeout: u64,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str, poll_timeout_secs: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
            poll_timeout: poll_timeout_secs,
        }
    }

    /// Long-poll for updates past `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        let payload = serde_json::json!({
            "offset": offset,
            "timeout": self.poll_timeout,
            "allowed_updates": ["message"],
        });
        self.call("getUpdates", &payload).await
    }

    /// Deliver one reply, with its keyboard when present.
    pub async fn send_message(&self, message: &OutboundMessage) -> Result<(), TelegramError> {
        let mut payload = serde_json::json!({
            "chat_id": message.chat_id,
            "text": message.text,
        });
        if let Some(keyboard) = &message.keyboard {
            payload["reply_markup"] = serde_json::to_value(keyboard)?;
        }
        let _: serde_json::Value = self.call("sendMessage", &payload).await?;
        Ok(())
    }

    /// Publish the command menu shown in the chat UI.
    pub async fn set_my_commands(&self, commands: &[(&str, &str)]) -> Result<(), TelegramError> {
        let commands: Vec<serde_json::Value> = commands
            .iter()
            .map(|(command, description)| {
                serde_json::json!({ "command": command, "description": description })
            })
            .collect();
        let _: bool = self
            .call("setMyCommands", &serde_json::json!({ "commands": commands }))
            .await?;
        Ok(())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &serde_json::Value,
    ) -> Result<T, TelegramError> {
        let url = format!("{}/{}", self.base, method);
        let resp = self.http.post(&url).json(payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TelegramError::Api(format!("HTTP {status}: {body}")));
        }
        let envelope: ApiEnvelope<T> = resp.json().await?;
        if !envelope.ok {
            return Err(TelegramError::Api(
                envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            ));
        }
        envelope
            .result
            .ok_or_else(|| TelegramError::Api("ok response without result".to_string()))
    }
}

/// Forward updates into `tx` until cancelled or the receiver goes away.
///
/// The confirmed offset only advances past updates that were handed to
/// the channel, so nothing is lost if the daemon stops mid-batch.
pub async fn poll_updates(client: TelegramClient, tx: mpsc::Sender<Update>, cancel: CancellationToken) {
    let mut offset = 0i64;
    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => return,
            result = client.get_updates(offset) => result,
        };
        match batch {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    if tx.send(update).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(err = %e, "getUpdates failed, retrying shortly");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                }
            }
        }
    }
}
