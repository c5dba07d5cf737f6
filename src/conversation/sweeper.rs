//! Background task expiring idle conversations.
//!
//! Every tick the sweeper asks the command handler for conversations that
//! outlived their TTL and hands the resulting timeout replies to a
//! [`TimeoutNotifier`]. It also logs a heartbeat so a quiet bot still shows
//! up as alive in the logs.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info};

use crate::commands::{CommandHandler, CommandResult};
use crate::preferences::UserId;

/// Delivers timeout replies to users.
pub trait TimeoutNotifier: Send + Sync {
    /// Sends `result` to `user_id`.
    fn notify(&self, user_id: UserId, result: CommandResult) -> impl Future<Output = ()> + Send;
}

/// Messages that can be sent to the sweeper.
#[derive(Debug, Clone)]
pub enum SweeperMessage {
    /// Run a sweep right away.
    SweepNow,
    /// Stop the sweeper.
    Shutdown,
}

/// Periodic conversation expiry.
pub struct ConversationSweeper<N> {
    handler: Arc<CommandHandler>,
    notifier: Arc<N>,
    sweep_interval: Duration,
    heartbeat_interval: Duration,
}

impl<N: TimeoutNotifier> ConversationSweeper<N> {
    /// Creates a sweeper checking once per second.
    #[must_use]
    pub fn new(handler: Arc<CommandHandler>, notifier: Arc<N>) -> Self {
        Self {
            handler,
            notifier,
            sweep_interval: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(600),
        }
    }

    /// Sets the sweep interval.
    #[must_use]
    pub const fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Runs the sweeper loop until shut down.
    pub async fn run(&self, mut rx: mpsc::Receiver<SweeperMessage>) {
        info!("Conversation sweeper started");

        let mut sweep_timer = interval(self.sweep_interval);
        let mut heartbeat_timer = interval(self.heartbeat_interval);

        loop {
            tokio::select! {
                _ = sweep_timer.tick() => {
                    self.sweep().await;
                }
                _ = heartbeat_timer.tick() => {
                    info!("Polling...");
                }
                msg = rx.recv() => {
                    match msg {
                        Some(SweeperMessage::SweepNow) => {
                            debug!("Received sweep request");
                            self.sweep().await;
                        }
                        Some(SweeperMessage::Shutdown) | None => {
                            info!("Sweeper shutting down");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn sweep(&self) {
        for (user_id, result) in self.handler.expire_conversations().await {
            self.notifier.notify(user_id, result).await;
        }
    }
}

impl<N> std::fmt::Debug for ConversationSweeper<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSweeper")
            .field("sweep_interval", &self.sweep_interval)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Mutex;

    use super::*;
    use crate::commands::testing::handler_with_ttl;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(UserId, String)>>,
    }

    impl TimeoutNotifier for Recorder {
        async fn notify(&self, user_id: UserId, result: CommandResult) {
            self.sent.lock().await.push((user_id, result.message));
        }
    }

    #[tokio::test]
    async fn test_sweeper_delivers_timeouts_and_stops() {
        let (_dir, handler) = handler_with_ttl(Duration::from_millis(20));
        let handler = Arc::new(handler);
        handler.handle_text(5, "/separator").await.unwrap();

        let recorder = Arc::new(Recorder::default());
        let sweeper = ConversationSweeper::new(Arc::clone(&handler), Arc::clone(&recorder))
            .with_sweep_interval(Duration::from_millis(10));

        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(async move { sweeper.run(rx).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(SweeperMessage::Shutdown).await.unwrap();
        task.await.unwrap();

        let sent = recorder.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 5);
        assert!(sent[0].1.starts_with("No separator received"));
    }

    #[tokio::test]
    async fn test_sweep_now_message() {
        let (_dir, handler) = handler_with_ttl(Duration::from_millis(10));
        let handler = Arc::new(handler);

        let recorder = Arc::new(Recorder::default());
        let sweeper = ConversationSweeper::new(Arc::clone(&handler), Arc::clone(&recorder))
            .with_sweep_interval(Duration::from_secs(3600));

        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(async move { sweeper.run(rx).await });

        // Let the immediate first tick pass before opening the prompt.
        tokio::time::sleep(Duration::from_millis(20)).await;
        handler.handle_text(9, "/color").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        tx.send(SweeperMessage::SweepNow).await.unwrap();
        tx.send(SweeperMessage::Shutdown).await.unwrap();
        task.await.unwrap();

        let sent = recorder.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 9);
        assert!(sent[0].1.starts_with("No color chosen"));
    }
}
