//! Command handler implementation.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::memory::MemoryGuard;
use super::types::{is_button_text, is_slash_command, BotCommand, CommandResult, ReplyMarkup};
use crate::chapters::{extract_chapters, split_lines};
use crate::config::{BotSettings, Messages};
use crate::conversation::{ConversationKind, ConversationTracker};
use crate::preferences::{PreferenceStore, Preferences, StoreError, UserId};

/// Extension an uploaded marker export must have.
pub const EDL_EXTENSION: &str = "edl";

const DONATE_BUTTON: &str = "❤️ Donate via PayPal ❤️";

/// Errors raised while handling an interaction.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Preference store error: {0}")]
    Store(#[from] StoreError),
}

/// What to do with an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadDecision {
    /// Download the file and pass its content to [`CommandHandler::handle_edl`].
    Process,

    /// Answer without downloading.
    Reply(CommandResult),
}

/// Handles bot interactions and manages conversation state.
pub struct CommandHandler {
    settings: Arc<BotSettings>,
    messages: Arc<Messages>,
    store: Arc<PreferenceStore>,
    conversations: Mutex<ConversationTracker>,
    memory: MemoryGuard,
}

impl CommandHandler {
    /// Creates a new command handler.
    #[must_use]
    pub fn new(
        settings: Arc<BotSettings>,
        messages: Arc<Messages>,
        store: Arc<PreferenceStore>,
        memory: MemoryGuard,
    ) -> Self {
        let conversations = Mutex::new(ConversationTracker::new(settings.conversation_ttl()));
        Self {
            settings,
            messages,
            store,
            conversations,
            memory,
        }
    }

    /// Overrides the conversation time-to-live taken from the settings.
    #[must_use]
    pub fn with_conversation_ttl(mut self, ttl: Duration) -> Self {
        self.conversations = Mutex::new(ConversationTracker::new(ttl));
        self
    }

    /// Handles a text message.
    ///
    /// Returns `None` if the message is neither a command nor an expected
    /// answer to an open prompt.
    pub async fn handle_text(
        &self,
        user_id: UserId,
        text: &str,
    ) -> Result<Option<CommandResult>, HandlerError> {
        let buttons = &self.settings.buttons;

        if let Some(command) = BotCommand::parse(text, buttons) {
            self.setup(command.name(), user_id).await?;
            return self.execute(user_id, command).await;
        }

        let awaiting = self.conversations.lock().await.current(user_id);
        if awaiting == Some(ConversationKind::Separator)
            && !is_slash_command(text)
            && !is_button_text(text, buttons)
        {
            self.setup("separator_answer", user_id).await?;
            return self.handle_separator_answer(user_id, text).await.map(Some);
        }

        debug!("Ignoring text from {}", user_id);
        Ok(None)
    }

    /// Handles a tap on an inline button.
    ///
    /// Only marker color choices made while the color picker is open are
    /// acted upon.
    pub async fn handle_callback(
        &self,
        user_id: UserId,
        data: &str,
    ) -> Result<Option<CommandResult>, HandlerError> {
        let awaiting = self.conversations.lock().await.current(user_id);
        if awaiting != Some(ConversationKind::MarkerColor) || !self.settings.is_known_color(data) {
            debug!("Ignoring callback {:?} from {}", data, user_id);
            return Ok(None);
        }

        self.setup("color_answer", user_id).await?;
        self.store.set_marker_color(user_id, data).await?;
        self.conversations.lock().await.end(user_id);

        info!("User {} picked marker color {}", user_id, data);
        let message = self.messages.marker_color_updated(data);
        self.reply(user_id, message).await.map(Some)
    }

    /// Decides whether an uploaded document should be processed.
    pub async fn check_upload(
        &self,
        user_id: UserId,
        file_name: Option<&str>,
    ) -> Result<UploadDecision, HandlerError> {
        self.setup("upload", user_id).await?;

        info!("Memory free check for {}", user_id);
        if !self.memory.has_room() {
            let reply = self.reply(user_id, self.messages.ram_full.clone()).await?;
            return Ok(UploadDecision::Reply(reply));
        }

        if file_name.is_some_and(has_edl_extension) {
            Ok(UploadDecision::Process)
        } else {
            let reply = self.reply(user_id, self.messages.upload_edl_file.clone()).await?;
            Ok(UploadDecision::Reply(reply))
        }
    }

    /// Converts the content of an EDL file with the user's preferences.
    pub async fn handle_edl(&self, user_id: UserId, content: &str) -> Result<CommandResult, HandlerError> {
        let prefs = self.store.get(user_id).await;
        let lines = split_lines(content);

        let message = match extract_chapters(&lines, &prefs.marker_color, &prefs.separator) {
            Some(list) => {
                info!("Extracted {} chapters for {}", list.len(), user_id);
                list.to_string()
            }
            None => {
                info!("No {} markers found for {}", prefs.marker_color, user_id);
                self.messages.edl_file_error.clone()
            }
        };

        Ok(CommandResult::new(message, main_keyboard(&self.settings, &prefs)))
    }

    /// Ends any open conversation and builds the generic error reply.
    pub async fn fail(&self, user_id: UserId) -> CommandResult {
        self.conversations.lock().await.end(user_id);
        let prefs = self.store.get(user_id).await;
        CommandResult::new(self.messages.error.clone(), main_keyboard(&self.settings, &prefs))
    }

    /// Removes expired conversations and builds their timeout replies.
    pub async fn expire_conversations(&self) -> Vec<(UserId, CommandResult)> {
        let expired = self.conversations.lock().await.take_expired();
        let mut replies = Vec::with_capacity(expired.len());

        for (user_id, kind) in expired {
            info!("{:?} conversation timed out for {}", kind, user_id);
            let message = match kind {
                ConversationKind::MarkerColor => self.messages.color_timeout.clone(),
                ConversationKind::Separator => self.messages.separator_timeout.clone(),
            };
            let prefs = self.store.get(user_id).await;
            replies.push((user_id, CommandResult::new(message, main_keyboard(&self.settings, &prefs))));
        }

        replies
    }

    /// Returns the open conversation of a user.
    pub async fn conversation(&self, user_id: UserId) -> Option<ConversationKind> {
        self.conversations.lock().await.current(user_id)
    }

    async fn execute(
        &self,
        user_id: UserId,
        command: BotCommand,
    ) -> Result<Option<CommandResult>, HandlerError> {
        let result = match command {
            BotCommand::Start => self.reply(user_id, self.messages.start.clone()).await?,
            BotCommand::Help => self.reply(user_id, self.messages.help.clone()).await?,
            BotCommand::MarkerColor => self.handle_color_prompt(user_id).await,
            BotCommand::Separator => self.handle_separator_prompt(user_id).await?,
            BotCommand::Donate => self.handle_donate(user_id).await?,
            BotCommand::End => {
                if self.conversations.lock().await.end(user_id).is_none() {
                    debug!("No conversation to end for {}", user_id);
                    return Ok(None);
                }
                self.reply(user_id, self.messages.end_conversation.clone()).await?
            }
        };

        Ok(Some(result))
    }

    async fn handle_color_prompt(&self, user_id: UserId) -> CommandResult {
        self.conversations
            .lock()
            .await
            .begin(user_id, ConversationKind::MarkerColor);

        CommandResult::new(
            self.messages.select_marker_color.clone(),
            color_picker(&self.settings.marker_colors),
        )
    }

    async fn handle_separator_prompt(&self, user_id: UserId) -> Result<CommandResult, HandlerError> {
        self.conversations
            .lock()
            .await
            .begin(user_id, ConversationKind::Separator);

        self.reply(user_id, self.messages.insert_separator.clone()).await
    }

    async fn handle_separator_answer(
        &self,
        user_id: UserId,
        separator: &str,
    ) -> Result<CommandResult, HandlerError> {
        self.store.set_separator(user_id, separator).await?;
        self.conversations.lock().await.end(user_id);

        info!("User {} set separator {:?}", user_id, separator);
        let message = self.messages.separator_updated(separator);
        self.reply(user_id, message).await
    }

    async fn handle_donate(&self, user_id: UserId) -> Result<CommandResult, HandlerError> {
        match &self.settings.donate_link {
            Some(url) => Ok(CommandResult::new(
                self.messages.donate.clone(),
                ReplyMarkup::InlineLink {
                    label: DONATE_BUTTON.to_owned(),
                    url: url.clone(),
                },
            )),
            None => self.reply(user_id, self.messages.donate.clone()).await,
        }
    }

    /// Logs the interaction and registers the user.
    async fn setup(&self, name: &str, user_id: UserId) -> Result<(), HandlerError> {
        info!("{} for {}", name, user_id);
        self.store.ensure_user(user_id).await?;
        Ok(())
    }

    /// Builds a reply carrying the main keyboard.
    async fn reply(&self, user_id: UserId, message: String) -> Result<CommandResult, HandlerError> {
        let prefs = self.store.get(user_id).await;
        Ok(CommandResult::new(message, main_keyboard(&self.settings, &prefs)))
    }
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("memory", &self.memory)
            .finish_non_exhaustive()
    }
}

/// Reply keyboard showing the current preferences.
fn main_keyboard(settings: &BotSettings, prefs: &Preferences) -> ReplyMarkup {
    let buttons = &settings.buttons;
    ReplyMarkup::Keyboard(vec![
        vec![format!("{}\n[ {} ]", buttons.marker_color, prefs.marker_color)],
        vec![format!("{}\n[ {} ]", buttons.separator, prefs.separator)],
        vec![buttons.help.clone()],
    ])
}

/// Inline color buttons, two per row.
fn color_picker(colors: &[String]) -> ReplyMarkup {
    ReplyMarkup::InlineChoices(colors.chunks(2).map(<[String]>::to_vec).collect())
}

fn has_edl_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext == EDL_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::memory::tests::FixedMemory;
    use crate::commands::testing::{handler_with, handler_with_ttl};

    const USER: UserId = 1001;

    fn handler() -> (tempfile::TempDir, CommandHandler) {
        handler_with_ttl(Duration::from_secs(60))
    }

    fn keyboard_rows(result: &CommandResult) -> Vec<Vec<String>> {
        match &result.markup {
            ReplyMarkup::Keyboard(rows) => rows.clone(),
            other => panic!("expected reply keyboard, got {other:?}"),
        }
    }

    #[test]
    fn test_color_picker_rows() {
        let colors: Vec<String> = ["A", "B", "C"].iter().map(|s| (*s).to_owned()).collect();
        assert_eq!(
            color_picker(&colors),
            ReplyMarkup::InlineChoices(vec![
                vec!["A".to_owned(), "B".to_owned()],
                vec!["C".to_owned()],
            ])
        );
    }

    #[test]
    fn test_has_edl_extension() {
        assert!(has_edl_extension("Timeline 1.edl"));
        assert!(!has_edl_extension("Timeline 1.EDL"));
        assert!(!has_edl_extension("notes.txt"));
        assert!(!has_edl_extension("edl"));
    }

    #[tokio::test]
    async fn test_start_registers_user_and_shows_keyboard() {
        let (_dir, handler) = handler();
        let result = handler.handle_text(USER, "/start").await.unwrap().unwrap();

        let rows = keyboard_rows(&result);
        assert_eq!(rows.len(), 3);
        assert!(rows[0][0].ends_with("\n[ Blue ]"));
        assert!(rows[1][0].ends_with("\n[ - ]"));
        assert_eq!(handler.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_color_flow() {
        let (_dir, handler) = handler();

        let prompt = handler.handle_text(USER, "/color").await.unwrap().unwrap();
        assert!(matches!(prompt.markup, ReplyMarkup::InlineChoices(ref rows) if rows.len() == 8));
        assert_eq!(handler.conversation(USER).await, Some(ConversationKind::MarkerColor));

        let done = handler.handle_callback(USER, "Mint").await.unwrap().unwrap();
        assert_eq!(done.message, "Marker color set to Mint.");
        assert!(keyboard_rows(&done)[0][0].ends_with("[ Mint ]"));
        assert_eq!(handler.conversation(USER).await, None);
        assert_eq!(handler.store.get(USER).await.marker_color, "Mint");
    }

    #[tokio::test]
    async fn test_callback_outside_conversation_is_ignored() {
        let (_dir, handler) = handler();
        assert_eq!(handler.handle_callback(USER, "Mint").await.unwrap(), None);
        assert_eq!(handler.store.get(USER).await.marker_color, "Blue");
    }

    #[tokio::test]
    async fn test_unknown_color_is_ignored() {
        let (_dir, handler) = handler();
        handler.handle_text(USER, "/color").await.unwrap();

        assert_eq!(handler.handle_callback(USER, "Orange").await.unwrap(), None);
        assert_eq!(handler.conversation(USER).await, Some(ConversationKind::MarkerColor));
    }

    #[tokio::test]
    async fn test_separator_flow_keeps_text_verbatim() {
        let (_dir, handler) = handler();
        let buttons = handler.settings.buttons.clone();

        let button = format!("{}\n[ - ]", buttons.separator);
        handler.handle_text(USER, &button).await.unwrap().unwrap();
        assert_eq!(handler.conversation(USER).await, Some(ConversationKind::Separator));

        let done = handler.handle_text(USER, " | ").await.unwrap().unwrap();
        assert_eq!(done.message, "Chapter separator set to  | .");
        assert_eq!(handler.store.get(USER).await.separator, " | ");
        assert_eq!(handler.conversation(USER).await, None);
    }

    #[tokio::test]
    async fn test_separator_prompt_ignores_commands_and_buttons() {
        let (_dir, handler) = handler();
        handler.handle_text(USER, "/separator").await.unwrap();

        assert_eq!(handler.handle_text(USER, "/nope").await.unwrap(), None);
        let help = handler.settings.buttons.help.clone();
        let result = handler.handle_text(USER, &help).await.unwrap().unwrap();
        assert_eq!(result.message, handler.messages.help);

        assert_eq!(handler.conversation(USER).await, Some(ConversationKind::Separator));
        assert_eq!(handler.store.get(USER).await.separator, "-");
    }

    #[tokio::test]
    async fn test_plain_text_without_conversation_is_ignored() {
        let (_dir, handler) = handler();
        assert_eq!(handler.handle_text(USER, "hello").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_end_conversation() {
        let (_dir, handler) = handler();
        assert_eq!(handler.handle_text(USER, "/end").await.unwrap(), None);

        handler.handle_text(USER, "/separator").await.unwrap();
        let result = handler.handle_text(USER, "/end").await.unwrap().unwrap();
        assert_eq!(result.message, handler.messages.end_conversation);
        assert_eq!(handler.conversation(USER).await, None);
    }

    #[tokio::test]
    async fn test_timeout_replies() {
        let (_dir, handler) = handler_with_ttl(Duration::from_millis(10));
        handler.handle_text(1, "/color").await.unwrap();
        handler.handle_text(2, "/separator").await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        let mut expired = handler.expire_conversations().await;
        expired.sort_by_key(|(user_id, _)| *user_id);
        assert_eq!(expired.len(), 2);
        assert_eq!(expired[0].1.message, handler.messages.color_timeout);
        assert_eq!(expired[1].1.message, handler.messages.separator_timeout);
        assert!(handler.expire_conversations().await.is_empty());

        // A late answer no longer counts.
        assert_eq!(handler.handle_text(2, "::").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_donate_with_and_without_link() {
        let (_dir, handler) = handler();
        let result = handler.handle_text(USER, "/donate").await.unwrap().unwrap();
        assert!(matches!(result.markup, ReplyMarkup::Keyboard(_)));

        let settings = BotSettings {
            donate_link: Some("https://paypal.me/someone".to_owned()),
            ..BotSettings::default()
        };
        let (_dir, handler) = handler_with(settings, Box::new(FixedMemory(u64::MAX)));
        let result = handler.handle_text(USER, "/donate").await.unwrap().unwrap();
        assert_eq!(
            result.markup,
            ReplyMarkup::InlineLink {
                label: DONATE_BUTTON.to_owned(),
                url: "https://paypal.me/someone".to_owned(),
            }
        );
    }

    #[tokio::test]
    async fn test_upload_checks() {
        let (_dir, handler) = handler();
        assert_eq!(
            handler.check_upload(USER, Some("markers.edl")).await.unwrap(),
            UploadDecision::Process
        );

        let UploadDecision::Reply(reply) = handler.check_upload(USER, Some("markers.txt")).await.unwrap() else {
            panic!("expected a reply");
        };
        assert_eq!(reply.message, handler.messages.upload_edl_file);

        let UploadDecision::Reply(reply) = handler.check_upload(USER, None).await.unwrap() else {
            panic!("expected a reply");
        };
        assert_eq!(reply.message, handler.messages.upload_edl_file);
    }

    #[tokio::test]
    async fn test_upload_refused_when_memory_is_low() {
        let (_dir, handler) = handler_with(BotSettings::default(), Box::new(FixedMemory(0)));
        let UploadDecision::Reply(reply) = handler.check_upload(USER, Some("markers.edl")).await.unwrap() else {
            panic!("expected a reply");
        };
        assert_eq!(reply.message, handler.messages.ram_full);
    }

    #[tokio::test]
    async fn test_handle_edl_uses_preferences() {
        let (_dir, handler) = handler();
        handler.store.set_marker_color(USER, "Red").await.unwrap();
        handler.store.set_separator(USER, "~").await.unwrap();

        let content = "TITLE: Timeline 1\r\nFCM: NON-DROP FRAME\r\n\r\n\
                       001  001      V     C        00:00:10:00 00:00:10:01 00:00:10:00 00:00:10:01\r\n \
                       |C:ResolveColorRed |M:Cold open |D:1\r\n\r\n\
                       002  001      V     C        00:04:00:00 00:04:00:01 00:04:00:00 00:04:00:01\r\n \
                       |C:ResolveColorBlue |M:Ignored |D:1\r\n";

        let result = handler.handle_edl(USER, content).await.unwrap();
        assert_eq!(result.message, "CAPITOLI\n--------------------\n00:00:10 ~ Cold open");
    }

    #[tokio::test]
    async fn test_handle_edl_with_carriage_return_endings() {
        let (_dir, handler) = handler();
        let content = "TITLE: Timeline 1\rFCM: NON-DROP FRAME\r\r\
                       001  001      V     C        00:02:30:00 00:02:30:01 00:02:30:00 00:02:30:01\r \
                       |C:ResolveColorBlue |M:Recap |D:1\r\r";

        let result = handler.handle_edl(USER, content).await.unwrap();
        assert_eq!(result.message, "CAPITOLI\n--------------------\n00:02:30 - Recap");
    }

    #[tokio::test]
    async fn test_handle_edl_without_chapters() {
        let (_dir, handler) = handler();
        let result = handler.handle_edl(USER, "TITLE: x\n").await.unwrap();
        assert_eq!(result.message, handler.messages.edl_file_error);
    }

    #[tokio::test]
    async fn test_fail_ends_conversation() {
        let (_dir, handler) = handler();
        handler.handle_text(USER, "/color").await.unwrap();

        let result = handler.fail(USER).await;
        assert_eq!(result.message, handler.messages.error);
        assert_eq!(handler.conversation(USER).await, None);
    }
}
