//! Messages to answer when an open prompt times out.

use std::collections::HashMap;

use crate::preferences::UserId;

/// Last message of every user with an open prompt.
///
/// Entries are dropped as soon as the user has no open prompt, so the map
/// never holds more users than the conversation tracker.
#[derive(Debug)]
pub(crate) struct ReplyTargets<T> {
    targets: HashMap<UserId, T>,
}

impl<T: Clone> ReplyTargets<T> {
    pub(crate) fn new() -> Self {
        Self {
            targets: HashMap::new(),
        }
    }

    /// Records `target` while a prompt is open and forgets the user otherwise.
    pub(crate) fn update(&mut self, user_id: UserId, target: &T, prompt_open: bool) {
        if prompt_open {
            self.targets.insert(user_id, target.clone());
        } else {
            self.targets.remove(&user_id);
        }
    }

    /// Removes and returns the target of a user.
    pub(crate) fn take(&mut self, user_id: UserId) -> Option<T> {
        self.targets.remove(&user_id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_open_prompts_are_kept() {
        let mut targets = ReplyTargets::new();
        for user_id in 0..100 {
            targets.update(user_id, &format!("hello {user_id}"), false);
        }
        assert_eq!(targets.len(), 0);

        targets.update(7, &"/color".to_owned(), true);
        assert_eq!(targets.len(), 1);
    }

    #[test]
    fn test_closing_prompt_forgets_user() {
        let mut targets = ReplyTargets::new();
        targets.update(7, &"/separator".to_owned(), true);
        targets.update(7, &"::".to_owned(), false);

        assert_eq!(targets.len(), 0);
        assert_eq!(targets.take(7), None);
    }

    #[test]
    fn test_take_returns_latest_and_removes() {
        let mut targets = ReplyTargets::new();
        targets.update(7, &"/separator".to_owned(), true);
        targets.update(7, &"/color".to_owned(), true);

        assert_eq!(targets.take(7), Some("/color".to_owned()));
        assert_eq!(targets.take(7), None);
        assert_eq!(targets.len(), 0);
    }
}
