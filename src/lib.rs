//! DV Chapter Bot Library
//!
//! A Telegram bot that turns DaVinci Resolve marker exports (EDL files)
//! into chapter lists.
//!
//! This crate provides the core functionality for:
//! - Extracting chapters of one marker color from an EDL file
//! - Loading bot settings and reply templates
//! - Persisting per-user marker color and separator choices
//! - Handling commands, prompts and uploads via chat messages

pub mod chapters;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod preferences;
pub mod telegram;
