//! Configuration module for the chapter bot.
//!
//! Handles loading and validation of Telegram credentials, bot settings,
//! button labels and reply templates.

mod messages;
mod settings;

pub use messages::Messages;
pub use settings::{BotSettings, ButtonLabels, ConfigError, TelegramConfig};

/// Marker color given to users who never picked one.
pub const DEFAULT_MARKER_COLOR: &str = "Blue";

/// Chapter separator given to users who never picked one.
pub const DEFAULT_SEPARATOR: &str = "-";

/// Marker colors offered by DaVinci Resolve.
pub const RESOLVE_MARKER_COLORS: [&str; 16] = [
    "Blue", "Cyan", "Green", "Yellow", "Red", "Pink", "Purple", "Fuchsia", "Rose", "Lavender",
    "Sky", "Mint", "Lemon", "Sand", "Cocoa", "Cream",
];
