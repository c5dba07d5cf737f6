//! Routes incoming updates to the command handler.
//!
//! Each update is handled on its own task. Handler failures are logged with
//! the user id and answered with the generic error message.

use std::sync::Arc;

use grammers_client::client::UpdateStream;
use grammers_client::types::Media;
use grammers_client::update::{CallbackQuery, Message, Update};
use tracing::{debug, error, info, warn};

use super::{TelegramBot, TelegramError};
use crate::commands::{CommandHandler, HandlerError, UploadDecision};
use crate::preferences::UserId;

/// Failure while serving one update.
#[derive(Debug, thiserror::Error)]
enum DispatchError {
    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Telegram(#[from] TelegramError),
}

/// Dispatches updates from Telegram to the command handler.
pub struct UpdateDispatcher {
    bot: Arc<TelegramBot>,
    handler: Arc<CommandHandler>,
}

impl UpdateDispatcher {
    /// Creates a new dispatcher.
    #[must_use]
    pub fn new(bot: Arc<TelegramBot>, handler: Arc<CommandHandler>) -> Self {
        Self { bot, handler }
    }

    /// Consumes the update stream until it fails.
    pub async fn run(&self, mut updates: UpdateStream) {
        info!("Listening for updates");

        loop {
            let update = match updates.next().await {
                Ok(update) => update,
                Err(e) => {
                    error!("Update stream failed: {}", e);
                    break;
                }
            };

            let bot = Arc::clone(&self.bot);
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                dispatch(&bot, &handler, update).await;
            });
        }

        updates.sync_update_state();
    }
}

impl std::fmt::Debug for UpdateDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateDispatcher").finish_non_exhaustive()
    }
}

async fn dispatch(bot: &TelegramBot, handler: &CommandHandler, update: Update) {
    match update {
        Update::NewMessage(message) if !message.outgoing() => {
            let Some(user_id) = message.sender().map(|sender| sender.id()) else {
                debug!("Ignoring message without sender");
                return;
            };
            if let Err(e) = on_message(bot, handler, user_id, &message).await {
                report_failure(bot, handler, user_id, &message, &e).await;
            }
            track_prompt(bot, handler, user_id, &message).await;
        }
        Update::CallbackQuery(query) => on_callback(bot, handler, &query).await,
        _ => {}
    }
}

async fn on_message(
    bot: &TelegramBot,
    handler: &CommandHandler,
    user_id: UserId,
    message: &Message,
) -> Result<(), DispatchError> {
    match message.media() {
        Some(Media::WebPage(_)) | None => {}
        Some(media) => return on_attachment(bot, handler, user_id, message, &media).await,
    }

    if let Some(result) = handler.handle_text(user_id, message.text()).await? {
        bot.reply(message, &result).await?;
    }
    Ok(())
}

async fn on_attachment(
    bot: &TelegramBot,
    handler: &CommandHandler,
    user_id: UserId,
    message: &Message,
    media: &Media,
) -> Result<(), DispatchError> {
    let file_name = match media {
        Media::Document(document) => Some(document.name().to_owned()),
        _ => None,
    };
    let file_name = file_name.filter(|name| !name.is_empty());

    match handler.check_upload(user_id, file_name.as_deref()).await? {
        UploadDecision::Reply(result) => bot.reply(message, &result).await?,
        UploadDecision::Process => {
            info!("Processing {:?} for {}", file_name, user_id);
            let content = bot.download_text(media).await?;
            let result = handler.handle_edl(user_id, &content).await?;
            bot.reply(message, &result).await?;
        }
    }
    Ok(())
}

async fn on_callback(bot: &TelegramBot, handler: &CommandHandler, query: &CallbackQuery) {
    if let Err(e) = query.answer().send().await {
        warn!("Failed to answer callback query: {}", e);
    }

    let user_id = query.sender().id();
    let data = String::from_utf8_lossy(query.data()).into_owned();

    let message = match query.load_message().await {
        Ok(message) => message,
        Err(e) => {
            warn!("Could not load callback message for {}: {}", user_id, e);
            return;
        }
    };
    let outcome: Result<(), DispatchError> = async {
        if let Some(result) = handler.handle_callback(user_id, &data).await? {
            bot.reply(&message, &result).await?;
        }
        Ok(())
    }
    .await;

    if let Err(e) = outcome {
        report_failure(bot, handler, user_id, &message, &e).await;
    }
    track_prompt(bot, handler, user_id, &message).await;
}

/// Keeps the message for a timeout notice only while a prompt is open.
async fn track_prompt(bot: &TelegramBot, handler: &CommandHandler, user_id: UserId, message: &Message) {
    let prompt_open = handler.conversation(user_id).await.is_some();
    bot.track_prompt(user_id, message, prompt_open).await;
}

async fn report_failure(
    bot: &TelegramBot,
    handler: &CommandHandler,
    user_id: UserId,
    message: &Message,
    err: &DispatchError,
) {
    error!("Error handling update for {}: {}", user_id, err);
    let result = handler.fail(user_id).await;
    if let Err(e) = bot.reply(message, &result).await {
        error!("Failed to send error reply to {}: {}", user_id, e);
    }
}
