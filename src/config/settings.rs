//! Application settings and Telegram configuration.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::RESOLVE_MARKER_COLORS;

/// Telegram API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Telegram API ID (obtain from <https://my.telegram.org>).
    pub api_id: i32,

    /// Telegram API hash (obtain from <https://my.telegram.org>).
    pub api_hash: String,

    /// Bot token issued by `@BotFather`.
    pub bot_token: String,

    /// Path to the session file.
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
}

fn default_session_path() -> PathBuf {
    PathBuf::from("session.db")
}

impl TelegramConfig {
    /// Creates a new Telegram configuration.
    #[must_use]
    pub fn new(api_id: i32, api_hash: String, bot_token: String) -> Self {
        Self {
            api_id,
            api_hash,
            bot_token,
            session_path: default_session_path(),
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Expects `TG_API_ID`, `TG_API_HASH` and `TELEGRAM_BOT_TOKEN` to be set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_id: i32 = std::env::var("TG_API_ID")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_ID"))?
            .parse()
            .map_err(|_| ConfigError::InvalidApiId)?;

        let api_hash = std::env::var("TG_API_HASH")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_HASH"))?;

        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN"))?;

        let session_path = std::env::var("TG_SESSION_PATH").map_or_else(|_| default_session_path(), PathBuf::from);

        Ok(Self {
            api_id,
            api_hash,
            bot_token,
            session_path,
        })
    }
}

/// Labels of the persistent reply keyboard buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonLabels {
    pub marker_color: String,
    pub separator: String,
    pub help: String,
}

impl Default for ButtonLabels {
    fn default() -> Self {
        Self {
            marker_color: "🎨 Markers color".to_owned(),
            separator: "✂️ Chapters separator".to_owned(),
            help: "❓ Help".to_owned(),
        }
    }
}

/// Bot-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Marker colors users can pick from.
    #[serde(default = "default_marker_colors")]
    pub marker_colors: Vec<String>,

    /// Path to the per-user preferences JSON file.
    #[serde(default = "default_preferences_path")]
    pub preferences_path: PathBuf,

    /// Log file, in addition to stdout.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Seconds a color or separator prompt stays open.
    #[serde(default = "default_conversation_ttl")]
    pub conversation_ttl_secs: u64,

    /// Free memory (MiB) below which uploads are refused.
    #[serde(default = "default_ram_threshold")]
    pub ram_threshold_mib: u64,

    /// Donation link shown by `/donate`.
    #[serde(default)]
    pub donate_link: Option<String>,

    /// Reply keyboard labels.
    #[serde(default)]
    pub buttons: ButtonLabels,
}

fn default_marker_colors() -> Vec<String> {
    RESOLVE_MARKER_COLORS.iter().map(|&c| c.to_owned()).collect()
}

fn default_preferences_path() -> PathBuf {
    PathBuf::from("preferences.json")
}

fn default_conversation_ttl() -> u64 {
    60
}

fn default_ram_threshold() -> u64 {
    100
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            marker_colors: default_marker_colors(),
            preferences_path: default_preferences_path(),
            log_file: None,
            conversation_ttl_secs: default_conversation_ttl(),
            ram_threshold_mib: default_ram_threshold(),
            donate_link: None,
            buttons: ButtonLabels::default(),
        }
    }
}

impl BotSettings {
    /// Creates bot settings from environment variables with defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        let defaults = ButtonLabels::default();

        Self {
            marker_colors: std::env::var("M_COLORS")
                .map_or_else(|_| default_marker_colors(), |s| parse_color_list(&s)),
            preferences_path: std::env::var("DATABASE_NAME")
                .map_or_else(|_| default_preferences_path(), PathBuf::from),
            log_file: std::env::var("LOGFILE_NAME").ok().map(PathBuf::from),
            conversation_ttl_secs: std::env::var("GLOBAL_TTL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_conversation_ttl),
            ram_threshold_mib: std::env::var("RAM_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_ram_threshold),
            donate_link: std::env::var("PAYPAL_LINK").ok().filter(|s| !s.trim().is_empty()),
            buttons: ButtonLabels {
                marker_color: std::env::var("MARKERS_COLOR_BUTTON")
                    .unwrap_or(defaults.marker_color),
                separator: std::env::var("CHAPTERS_SEPARATOR_BUTTON")
                    .unwrap_or(defaults.separator),
                help: std::env::var("HELP_BUTTON").unwrap_or(defaults.help),
            },
        }
    }

    /// Returns the conversation time-to-live.
    #[must_use]
    pub const fn conversation_ttl(&self) -> Duration {
        Duration::from_secs(self.conversation_ttl_secs)
    }

    /// Checks whether `color` is one of the configured marker colors.
    #[must_use]
    pub fn is_known_color(&self, color: &str) -> bool {
        self.marker_colors.iter().any(|c| c == color)
    }

    /// Validates the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.marker_colors.is_empty() {
            return Err(ConfigError::NoMarkerColors);
        }

        let mut seen = HashSet::new();
        for color in &self.marker_colors {
            if color.trim().is_empty() {
                return Err(ConfigError::BlankMarkerColor);
            }
            if !seen.insert(color.as_str()) {
                return Err(ConfigError::DuplicateMarkerColor(color.clone()));
            }
        }

        if self.conversation_ttl_secs == 0 {
            return Err(ConfigError::ZeroTtl);
        }

        for (name, label) in [
            ("MARKERS_COLOR_BUTTON", &self.buttons.marker_color),
            ("CHAPTERS_SEPARATOR_BUTTON", &self.buttons.separator),
            ("HELP_BUTTON", &self.buttons.help),
        ] {
            if label.trim().is_empty() {
                return Err(ConfigError::EmptyButtonLabel(name));
            }
        }

        Ok(())
    }
}

fn parse_color_list(raw: &str) -> Vec<String> {
    raw.split(',').map(|c| c.trim().to_owned()).collect()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid API ID format (must be a positive integer)")]
    InvalidApiId,

    #[error("No marker colors configured")]
    NoMarkerColors,

    #[error("Marker color list contains a blank entry")]
    BlankMarkerColor,

    #[error("Duplicate marker color: {0}")]
    DuplicateMarkerColor(String),

    #[error("Conversation TTL must be greater than zero")]
    ZeroTtl,

    #[error("Button label {0} must not be empty")]
    EmptyButtonLabel(&'static str),
}
