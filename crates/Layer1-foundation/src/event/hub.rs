//! Event hub - fan-out of supervision events to subscribers
//!
//! A thin wrapper over a `tokio::sync::broadcast` channel. The supervisor
//! and the usage sampler emit into one hub; any number of subscribers
//! (presentation transport, tests) receive every event. Emission never
//! blocks; a subscriber that lags past the channel capacity loses the
//! oldest events, not the newest.

use super::types::TaskEvent;
use tokio::sync::broadcast;

/// Default broadcast channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Fan-out point for [`TaskEvent`]s.
///
/// Cloning is cheap and every clone feeds the same channel, so one hub can
/// be handed to several emitters without extra wrapping.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<TaskEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Deliver an event to all current subscribers.
    ///
    /// A hub with no subscribers swallows the event; headless operation is
    /// a supported mode.
    pub fn emit(&self, event: TaskEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
