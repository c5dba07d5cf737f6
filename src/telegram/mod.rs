//! Telegram client wrapper module.
//!
//! Signs the bot in over `MTProto`, dispatches incoming updates to the
//! command handler and renders its replies.

mod client;
mod dispatcher;
mod targets;

pub use client::{TelegramBot, TelegramError};
pub use dispatcher::UpdateDispatcher;
pub use grammers_client::client::UpdateStream;
