//! Pending prompt tracking.
//!
//! A user who asked to change a setting has an open conversation until they
//! answer, cancel, or let it expire.

mod sweeper;
mod tracker;

pub use sweeper::{ConversationSweeper, SweeperMessage, TimeoutNotifier};
pub use tracker::{ConversationKind, ConversationTracker};
