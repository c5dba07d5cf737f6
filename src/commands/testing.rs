//! Helpers for building handlers in tests.

use std::sync::Arc;
use std::time::Duration;

use super::memory::tests::FixedMemory;
use super::{CommandHandler, MemoryGuard, MemoryProbe};
use crate::config::{BotSettings, Messages};
use crate::preferences::PreferenceStore;

/// Builds a handler with default settings, plenty of memory and a short TTL.
pub(crate) fn handler_with_ttl(ttl: Duration) -> (tempfile::TempDir, CommandHandler) {
    let (dir, handler) = handler_with(BotSettings::default(), Box::new(FixedMemory(u64::MAX)));
    (dir, handler.with_conversation_ttl(ttl))
}

/// Builds a handler over a temporary preference file.
pub(crate) fn handler_with(
    settings: BotSettings,
    probe: Box<dyn MemoryProbe>,
) -> (tempfile::TempDir, CommandHandler) {
    let dir = tempfile::tempdir().unwrap();
    let store = PreferenceStore::open(dir.path().join("prefs.json")).unwrap();
    let messages = Messages::default().resolved(&settings);
    let memory = MemoryGuard::new(probe, settings.ram_threshold_mib);

    let handler = CommandHandler::new(Arc::new(settings), Arc::new(messages), Arc::new(store), memory);
    (dir, handler)
}
