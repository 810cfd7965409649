//! Notifier implementations shipped with the crate

use crate::common::traits::{NotifyError, NotifyTarget, Notifier};
use crate::games::types::RoundEvent;
use tokio::sync::broadcast;

/// Event plus the recipient it was addressed to
#[derive(Debug, Clone)]
pub struct Notification {
    pub target: NotifyTarget,
    pub event: RoundEvent,
}

/// Fans events out over a tokio broadcast channel.
///
/// Slow subscribers lag and lose the oldest events rather than blocking
/// the engine.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, target: NotifyTarget, event: RoundEvent) -> Result<(), NotifyError> {
        self.sender
            .send(Notification {
                target: target.clone(),
                event,
            })
            .map(|_| ())
            .map_err(|_| NotifyError::NoSubscribers(target))
    }
}

/// Drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _target: NotifyTarget, _event: RoundEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}
