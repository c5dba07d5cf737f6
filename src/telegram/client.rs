//! Telegram client wrapper for the bot account.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use grammers_client::client::{UpdateStream, UpdatesConfiguration};
use grammers_client::types::Media;
use grammers_client::update::Message;
use grammers_client::{button, reply_markup, sender, Client, InputMessage, InvocationError, SenderPool};
use grammers_session::storages::SqliteSession;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::targets::ReplyTargets;
use crate::commands::{CommandResult, ReplyMarkup};
use crate::config::TelegramConfig;
use crate::conversation::TimeoutNotifier;
use crate::preferences::UserId;

/// Errors that can occur during Telegram operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Bot sign in failed: {0}")]
    SignInFailed(String),

    #[error("Flood wait required: {0} seconds")]
    FloodWait(u32),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API invocation error: {0}")]
    Invocation(String),
}

impl From<InvocationError> for TelegramError {
    fn from(err: InvocationError) -> Self {
        let err_str = err.to_string();

        // Check for flood wait errors
        if (err_str.contains("FLOOD_WAIT") || err_str.contains("flood"))
            && let Some(seconds) = extract_flood_wait_seconds(&err_str) {
                return Self::FloodWait(seconds);
            }

        Self::Invocation(err_str)
    }
}

/// Extracts flood wait seconds from an error message.
fn extract_flood_wait_seconds(err_msg: &str) -> Option<u32> {
    let patterns = ["FLOOD_WAIT_", "flood wait "];

    for pattern in patterns {
        if let Some(idx) = err_msg.to_lowercase().find(&pattern.to_lowercase()) {
            let start = idx + pattern.len();
            let num_str: String = err_msg[start..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if let Ok(seconds) = num_str.parse() {
                return Some(seconds);
            }
        }
    }
    None
}

/// High-level Telegram client wrapper for a bot account.
pub struct TelegramBot {
    /// The underlying grammers client.
    client: Client,

    /// Handle to the sender pool for disconnection.
    handle: sender::SenderPoolHandle,

    /// Last message of users with an open prompt, answered on timeout.
    reply_targets: Mutex<ReplyTargets<Message>>,

    /// Background task running the sender pool.
    _pool_task: JoinHandle<()>,
}

impl TelegramBot {
    /// Connects to Telegram and signs in as the bot if needed.
    ///
    /// Returns the bot together with the stream of incoming updates.
    pub async fn connect(config: &TelegramConfig) -> Result<(Self, UpdateStream), TelegramError> {
        info!("Connecting to Telegram...");

        let session = Arc::new(
            SqliteSession::open(&config.session_path)
                .await
                .map_err(|e| TelegramError::Session(e.to_string()))?,
        );

        let SenderPool {
            runner,
            updates,
            handle,
        } = SenderPool::new(Arc::clone(&session), config.api_id);

        let client = Client::new(handle.clone());

        // Spawn the sender pool runner
        let pool_task = tokio::spawn(async move {
            runner.run().await;
        });

        let is_authorized = client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))?;

        if is_authorized {
            info!("Connected to Telegram with an existing bot session");
        } else {
            info!("Signing in with bot token...");
            client
                .bot_sign_in(&config.bot_token, &config.api_hash)
                .await
                .map_err(|e| TelegramError::SignInFailed(e.to_string()))?;
            info!("Bot signed in");
        }

        let stream = client.stream_updates(
            updates,
            UpdatesConfiguration {
                catch_up: false,
                ..Default::default()
            },
        );

        let bot = Self {
            client,
            handle: handle.thin,
            reply_targets: Mutex::new(ReplyTargets::new()),
            _pool_task: pool_task,
        };

        Ok((bot, stream))
    }

    /// Keeps `message` as the timeout reply target while the user has an
    /// open prompt, and forgets the user otherwise.
    pub async fn track_prompt(&self, user_id: UserId, message: &Message, prompt_open: bool) {
        self.reply_targets
            .lock()
            .await
            .update(user_id, message, prompt_open);
    }

    /// Replies to `message` with a handler result.
    ///
    /// A flood wait is honoured once before giving up.
    pub async fn reply(&self, message: &Message, result: &CommandResult) -> Result<(), TelegramError> {
        match message.reply(build_input(result)).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let err: TelegramError = e.into();
                let TelegramError::FloodWait(seconds) = err else {
                    return Err(err);
                };

                warn!("Flood wait triggered: {} seconds", seconds);
                tokio::time::sleep(Duration::from_secs(u64::from(seconds))).await;
                message.reply(build_input(result)).await?;
                Ok(())
            }
        }
    }

    /// Sends a handler result to the tracked message of a user.
    ///
    /// The target is consumed.
    pub async fn reply_to_user(&self, user_id: UserId, result: &CommandResult) -> Result<(), TelegramError> {
        let target = self.reply_targets.lock().await.take(user_id);
        match target {
            Some(message) => self.reply(&message, result).await,
            None => {
                warn!("No message to reply to for {}", user_id);
                Ok(())
            }
        }
    }

    /// Downloads a document into a temporary file and reads it as UTF-8.
    ///
    /// The temporary file is removed before returning.
    pub async fn download_text(&self, media: &Media) -> Result<String, TelegramError> {
        let file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".edl")
            .tempfile()?;

        self.download_to(media, file.path()).await?;
        let content = tokio::fs::read_to_string(file.path()).await?;

        debug!("Downloaded {} bytes", content.len());
        Ok(content)
    }

    async fn download_to(&self, media: &Media, path: &Path) -> Result<(), TelegramError> {
        self.client
            .download_media(media, path)
            .await
            .map_err(|e| TelegramError::Download(e.to_string()))
    }

    /// Disconnects from Telegram.
    pub fn disconnect(&self) {
        info!("Disconnecting from Telegram...");
        self.handle.quit();
    }
}

impl TimeoutNotifier for TelegramBot {
    async fn notify(&self, user_id: UserId, result: CommandResult) {
        if let Err(e) = self.reply_to_user(user_id, &result).await {
            warn!("Failed to send timeout notice to {}: {}", user_id, e);
        }
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot").finish_non_exhaustive()
    }
}

/// Converts a handler result into an outgoing message.
fn build_input(result: &CommandResult) -> InputMessage {
    let input = InputMessage::new().text(&result.message);

    match &result.markup {
        ReplyMarkup::Keyboard(rows) => {
            let rows: Vec<Vec<_>> = rows
                .iter()
                .map(|row| row.iter().map(|label| button::text(label)).collect())
                .collect();
            input.reply_markup(&reply_markup::keyboard(rows).fit_size())
        }
        ReplyMarkup::InlineChoices(rows) => {
            let rows: Vec<Vec<_>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|choice| button::inline(choice, choice.as_bytes()))
                        .collect()
                })
                .collect();
            input.reply_markup(&reply_markup::inline(rows))
        }
        ReplyMarkup::InlineLink { label, url } => {
            input.reply_markup(&reply_markup::inline(vec![vec![button::url(label, url)]]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_flood_wait() {
        assert_eq!(extract_flood_wait_seconds("FLOOD_WAIT_120"), Some(120));
        assert_eq!(extract_flood_wait_seconds("flood wait 60 seconds"), Some(60));
        assert_eq!(extract_flood_wait_seconds("some other error"), None);
    }
}
