//! Conversation state per user.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::preferences::UserId;

/// What an open conversation is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationKind {
    /// A tap on one of the marker color buttons.
    MarkerColor,
    /// A text message holding the new separator.
    Separator,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    kind: ConversationKind,
    started_at: Instant,
}

/// Open conversations, at most one per user.
#[derive(Debug)]
pub struct ConversationTracker {
    ttl: Duration,
    pending: HashMap<UserId, Pending>,
}

impl ConversationTracker {
    /// Creates a tracker whose conversations expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: HashMap::new(),
        }
    }

    /// Opens a conversation, replacing any other one of the same user.
    pub fn begin(&mut self, user_id: UserId, kind: ConversationKind) {
        self.begin_at(user_id, kind, Instant::now());
    }

    fn begin_at(&mut self, user_id: UserId, kind: ConversationKind, now: Instant) {
        self.pending.insert(
            user_id,
            Pending {
                kind,
                started_at: now,
            },
        );
    }

    /// Returns the open, not yet expired conversation of a user.
    #[must_use]
    pub fn current(&self, user_id: UserId) -> Option<ConversationKind> {
        self.current_at(user_id, Instant::now())
    }

    fn current_at(&self, user_id: UserId, now: Instant) -> Option<ConversationKind> {
        self.pending
            .get(&user_id)
            .filter(|p| now.duration_since(p.started_at) < self.ttl)
            .map(|p| p.kind)
    }

    /// Closes the conversation of a user, returning what it was waiting for.
    pub fn end(&mut self, user_id: UserId) -> Option<ConversationKind> {
        self.pending.remove(&user_id).map(|p| p.kind)
    }

    /// Removes and returns every expired conversation.
    pub fn take_expired(&mut self) -> Vec<(UserId, ConversationKind)> {
        self.take_expired_at(Instant::now())
    }

    fn take_expired_at(&mut self, now: Instant) -> Vec<(UserId, ConversationKind)> {
        let ttl = self.ttl;
        let mut expired = Vec::new();

        self.pending.retain(|&user_id, p| {
            let alive = now.duration_since(p.started_at) < ttl;
            if !alive {
                expired.push((user_id, p.kind));
            }
            alive
        });

        expired
    }

    /// Returns the number of open conversations, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if no conversation is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
