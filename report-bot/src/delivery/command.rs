//! On-demand report requests over Telegram.

use regex::Regex;
use report_common::TelegramConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::ReportDelivery;
use crate::telegram::{ChatTransport, InboundMessage};

/// Pause after a failed `getUpdates` before polling again.
const POLL_ERROR_PAUSE: Duration = Duration::from_secs(5);

/// Recognizes report requests: `/report`, `/report@botname`, or any text
/// matching the keyword pattern.
#[derive(Debug, Clone)]
pub struct ReportCommand {
    command: String,
    keyword: Regex,
}

impl ReportCommand {
    pub fn new(command: &str, keyword_pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            command: command.trim_start_matches('/').to_string(),
            keyword: Regex::new(keyword_pattern)?,
        })
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self, regex::Error> {
        Self::new(&config.command, &config.keyword_pattern)
    }

    pub fn matches(&self, text: &str) -> bool {
        self.is_command(text) || self.keyword.is_match(text)
    }

    fn is_command(&self, text: &str) -> bool {
        let Some(first) = text.split_whitespace().next() else {
            return false;
        };
        let Some(name) = first.strip_prefix('/') else {
            return false;
        };
        let name = name.split_once('@').map_or(name, |(cmd, _bot)| cmd);
        name.eq_ignore_ascii_case(&self.command)
    }
}

/// What happened to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Not a report request
    Ignored,
    /// Report sent; carries the file name
    Delivered(String),
    /// Chat not allowed; the rejection text was sent
    Rejected,
    /// Delivery failed
    Failed(String),
}

/// Long-polls Telegram and answers report requests.
pub struct CommandListener {
    command: ReportCommand,
    allowed_chats: Vec<i64>,
    rejection_text: String,
    poll_timeout_secs: u64,
    delivery: Arc<ReportDelivery>,
}

impl CommandListener {
    pub fn new(
        command: ReportCommand,
        allowed_chats: Vec<i64>,
        rejection_text: impl Into<String>,
        delivery: Arc<ReportDelivery>,
    ) -> Self {
        Self {
            command,
            allowed_chats,
            rejection_text: rejection_text.into(),
            poll_timeout_secs: 30,
            delivery,
        }
    }

    pub fn from_config(
        config: &TelegramConfig,
        delivery: Arc<ReportDelivery>,
    ) -> Result<Self, regex::Error> {
        let listener = Self::new(
            ReportCommand::from_config(config)?,
            config.allowed_chats().to_vec(),
            config.rejection_text.clone(),
            delivery,
        );
        Ok(listener.with_poll_timeout(config.poll_timeout_secs))
    }

    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    fn transport(&self) -> &Arc<dyn ChatTransport> {
        self.delivery.transport()
    }

    /// Answer one inbound message.
    pub async fn handle(&self, message: &InboundMessage) -> CommandOutcome {
        let Some(text) = message.text.as_deref() else {
            return CommandOutcome::Ignored;
        };
        if !self.command.matches(text) {
            return CommandOutcome::Ignored;
        }

        let chat_id = message.chat_id;
        if !self.allowed_chats.contains(&chat_id) {
            warn!(
                username = message.username.as_deref().unwrap_or("unknown"),
                "Unauthorized request attempt, id: {chat_id}"
            );
            if let Err(e) = self
                .transport()
                .send_message(chat_id, &self.rejection_text)
                .await
            {
                error!(chat_id, error = %e, "Failed to send rejection");
            }
            return CommandOutcome::Rejected;
        }

        match self.delivery.deliver(chat_id).await {
            Ok(file_name) => {
                info!(file = %file_name, "Manual request report has been sent, id: {chat_id}");
                CommandOutcome::Delivered(file_name)
            }
            Err(e) => {
                error!(chat_id, error = %e, "Manual report delivery failed");
                CommandOutcome::Failed(e.to_string())
            }
        }
    }

    /// Poll for updates until the task is cancelled.
    ///
    /// Each request is handled on its own task so polling continues while a
    /// report is being built.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let mut offset: i64 = 0;
        info!("Listening for report requests");

        loop {
            let updates = match self
                .transport()
                .get_updates(offset, self.poll_timeout_secs)
                .await
            {
                Ok(updates) => updates,
                Err(e) => {
                    warn!("Telegram poll error: {e}");
                    tokio::time::sleep(POLL_ERROR_PAUSE).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);

                let Some(message) = update.message else {
                    continue;
                };
                debug!(chat_id = message.chat_id, source = ?message.source, "Message received");

                let listener = Arc::clone(&self);
                tokio::spawn(async move {
                    listener.handle(&message).await;
                });
            }
        }
    }
}
