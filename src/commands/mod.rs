//! Command handling module.
//!
//! Turns incoming messages, button taps and uploads into replies, running
//! the color and separator prompts and the EDL conversion.

mod handler;
mod memory;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use handler::{CommandHandler, HandlerError, UploadDecision, EDL_EXTENSION};
pub use memory::{MemoryGuard, MemoryProbe, SystemMemory};
pub use types::{is_button_text, is_slash_command, BotCommand, CommandResult, ReplyMarkup};
