//! Session inbox
//!
//! Channel callbacks and reconnect timers all feed one unbounded queue that a
//! single consumer drains, so the session sees inputs strictly in arrival
//! order.

use tokio::sync::mpsc;
use tracing::trace;

/// Lifecycle callback or inbound frame from one connect attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Open,
    /// Raw text frame, not decoded yet
    Message(String),
    Closed { was_clean: bool },
    /// The attempt failed before the channel opened
    Error(String),
}

/// Everything the session reacts to besides user actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    Channel { attempt: u64, event: ChannelEvent },
    ReconnectDue { token: u64 },
}

pub type InboxSender = mpsc::UnboundedSender<SessionInput>;
pub type InboxReceiver = mpsc::UnboundedReceiver<SessionInput>;

pub fn inbox() -> (InboxSender, InboxReceiver) {
    mpsc::unbounded_channel()
}

/// Handle a transport uses to report events for one connect attempt
#[derive(Debug, Clone)]
pub struct ChannelSink {
    attempt: u64,
    tx: InboxSender,
}

impl ChannelSink {
    pub fn new(attempt: u64, tx: InboxSender) -> Self {
        Self { attempt, tx }
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn emit(&self, event: ChannelEvent) {
        // Receiver gone means the session was dropped
        if self
            .tx
            .send(SessionInput::Channel {
                attempt: self.attempt,
                event,
            })
            .is_err()
        {
            trace!("Inbox closed, dropping event for attempt {}", self.attempt);
        }
    }
}
