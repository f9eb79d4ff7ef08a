//! Telegram Bot API transport.
//!
//! Only what the report bot needs: text replies, document uploads and
//! long-polling `getUpdates` for direct messages and channel posts.

use async_trait::async_trait;
use report_common::TelegramConfig;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport error type.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(#[from] reqwest::Error),

    #[error("Telegram {method} failed: {description}")]
    Api {
        method: &'static str,
        description: String,
    },

    #[error("Invalid response from Telegram {method}: {reason}")]
    InvalidResponse {
        method: &'static str,
        reason: String,
    },
}

/// Where an inbound message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    /// Private or group chat message
    Message,
    /// Post in a channel the bot administers
    ChannelPost,
}

/// An inbound text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub text: Option<String>,
    pub source: MessageSource,
    pub username: Option<String>,
}

/// One update from `getUpdates`; `message` is `None` for update kinds the bot ignores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundUpdate {
    pub update_id: i64,
    pub message: Option<InboundMessage>,
}

/// A file to upload.
#[derive(Debug, Clone)]
pub struct Document {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Outbound and inbound chat operations used by the delivery triggers.
///
/// Implementations must allow independent concurrent calls.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> TransportResult<()>;

    async fn send_document(&self, chat_id: i64, document: Document) -> TransportResult<()>;

    /// Long-poll for updates starting at `offset`.
    async fn get_updates(&self, offset: i64, timeout_secs: u64)
        -> TransportResult<Vec<InboundUpdate>>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
    channel_post: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
    from: Option<User>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    username: Option<String>,
}

impl Message {
    fn into_inbound(self, source: MessageSource) -> InboundMessage {
        InboundMessage {
            chat_id: self.chat.id,
            text: self.text,
            source,
            username: self.from.and_then(|u| u.username),
        }
    }
}

impl From<Update> for InboundUpdate {
    fn from(update: Update) -> Self {
        let message = match (update.message, update.channel_post) {
            (Some(m), _) => Some(m.into_inbound(MessageSource::Message)),
            (None, Some(p)) => Some(p.into_inbound(MessageSource::ChannelPost)),
            (None, None) => None,
        };
        Self {
            update_id: update.update_id,
            message,
        }
    }
}

// ============================================================================
// Telegram Bot
// ============================================================================

/// Telegram bot client.
pub struct TelegramBot {
    bot_token: String,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramBot {
    pub fn new(bot_token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &TelegramConfig) -> Self {
        Self::new(config.bot_token.clone(), config.api_base.clone())
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        request: reqwest::RequestBuilder,
    ) -> TransportResult<T> {
        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        let parsed: ApiResponse<T> =
            serde_json::from_str(&body).map_err(|e| TransportError::InvalidResponse {
                method,
                reason: format!("HTTP {status}: {e}"),
            })?;

        if !parsed.ok {
            return Err(TransportError::Api {
                method,
                description: parsed
                    .description
                    .unwrap_or_else(|| format!("HTTP {status}")),
            });
        }

        parsed.result.ok_or(TransportError::InvalidResponse {
            method,
            reason: "missing result".to_string(),
        })
    }

    /// Verify the bot token via `getMe`, returning the bot's username.
    pub async fn verify(&self) -> TransportResult<String> {
        let me: User = self
            .call("getMe", self.client.get(self.api_url("getMe")))
            .await?;
        let username = me.username.unwrap_or_default();
        tracing::info!(bot = %username, "Telegram bot verified");
        Ok(username)
    }
}

#[async_trait]
impl ChatTransport for TelegramBot {
    async fn send_message(&self, chat_id: i64, text: &str) -> TransportResult<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let _: serde_json::Value = self
            .call(
                "sendMessage",
                self.client.post(self.api_url("sendMessage")).json(&body),
            )
            .await?;
        Ok(())
    }

    async fn send_document(&self, chat_id: i64, document: Document) -> TransportResult<()> {
        let size = document.bytes.len();
        let part = Part::bytes(document.bytes)
            .file_name(document.file_name.clone())
            .mime_str(XLSX_MIME)?;

        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);

        let _: serde_json::Value = self
            .call(
                "sendDocument",
                self.client
                    .post(self.api_url("sendDocument"))
                    .multipart(form),
            )
            .await?;

        tracing::debug!(chat_id, file = %document.file_name, size, "Telegram document sent");
        Ok(())
    }

    async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> TransportResult<Vec<InboundUpdate>> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message", "channel_post"],
        });

        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                self.client.post(self.api_url("getUpdates")).json(&body),
            )
            .await?;

        Ok(updates.into_iter().map(InboundUpdate::from).collect())
    }
}
