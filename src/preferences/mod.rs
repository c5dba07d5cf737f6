//! Per-user preferences.
//!
//! Stores the marker color and chapter separator of every user who ever
//! talked to the bot, in a JSON document keyed by Telegram user id.

mod store;

pub use store::{PreferenceStore, Preferences, StoreError, UserId};
