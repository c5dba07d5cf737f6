//! Command types and reply definitions.

use std::fmt;

use crate::config::ButtonLabels;

/// Available bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// Greet the user and show the keyboard.
    Start,

    /// Open the marker color picker.
    MarkerColor,

    /// Ask for a new chapter separator.
    Separator,

    /// Cancel the open prompt.
    End,

    /// Show help information.
    Help,

    /// Show the donation link.
    Donate,
}

impl BotCommand {
    /// Parses a command from a message text.
    ///
    /// Accepts slash commands (optionally addressed as `/cmd@bot_name` and
    /// followed by arguments) and the reply keyboard buttons. Returns `None`
    /// if the message is not a command.
    #[must_use]
    pub fn parse(text: &str, buttons: &ButtonLabels) -> Option<Self> {
        if let Some(name) = slash_command_name(text) {
            return match name.to_lowercase().as_str() {
                "start" => Some(Self::Start),
                "color" => Some(Self::MarkerColor),
                "separator" => Some(Self::Separator),
                "end" => Some(Self::End),
                "help" => Some(Self::Help),
                "donate" => Some(Self::Donate),
                _ => None,
            };
        }

        // Keyboard buttons carry the current value on a second line.
        if text.starts_with(&buttons.marker_color) {
            Some(Self::MarkerColor)
        } else if text.starts_with(&buttons.separator) {
            Some(Self::Separator)
        } else if text == buttons.help {
            Some(Self::Help)
        } else {
            None
        }
    }

    /// Returns the command name as it appears in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::MarkerColor => "color",
            Self::Separator => "separator",
            Self::End => "end",
            Self::Help => "help",
            Self::Donate => "donate",
        }
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name())
    }
}

/// Returns the command name of a `/command` message.
fn slash_command_name(text: &str) -> Option<&str> {
    let word = text.strip_prefix('/')?.split_whitespace().next()?;
    let name = word.split_once('@').map_or(word, |(name, _bot)| name);
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(name)
}

/// Returns true if the text is a slash command of any name.
#[must_use]
pub fn is_slash_command(text: &str) -> bool {
    slash_command_name(text).is_some()
}

/// Returns true if the text was sent by one of the keyboard buttons.
#[must_use]
pub fn is_button_text(text: &str, buttons: &ButtonLabels) -> bool {
    [&buttons.separator, &buttons.marker_color, &buttons.help]
        .iter()
        .any(|label| text.starts_with(label.as_str()))
}

/// Markup attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyMarkup {
    /// Persistent reply keyboard, one label per button.
    Keyboard(Vec<Vec<String>>),

    /// Inline buttons whose callback data equals their label.
    InlineChoices(Vec<Vec<String>>),

    /// A single inline button opening a URL.
    InlineLink { label: String, url: String },
}

/// Result of handling a user interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Response message to show the user.
    pub message: String,

    /// Buttons to show with the message.
    pub markup: ReplyMarkup,
}

impl CommandResult {
    /// Creates a result with the given markup.
    #[must_use]
    pub fn new(message: impl Into<String>, markup: ReplyMarkup) -> Self {
        Self {
            message: message.into(),
            markup,
        }
    }
}
