//! Reconnection Supervisor
//!
//! Watches channel lifecycle and decides when the session should dial the
//! node again. The reference policy is infinite retry with a fixed delay.
//!
//! The supervisor never sleeps itself. It hands a delay and a token to a
//! [`ReconnectScheduler`], and the token comes back through
//! [`ReconnectSupervisor::on_timer_fired`] when the delay expires. Tests drive
//! the state machine with a manual scheduler instead of real time.

use std::time::Duration;

use tracing::{debug, info};

/// Default delay between a drop and the next connect attempt
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Reconnection configuration
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Fixed delay before each reconnect attempt
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Reconnection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectState {
    /// No timer pending; the channel is connecting or open
    Idle,
    /// A reconnect timer is pending
    Waiting { token: u64 },
    /// Session closed by the user; never reconnect again
    Stopped,
}

/// Timer abstraction used by the supervisor
pub trait ReconnectScheduler: Send {
    /// Arrange for `token` to be delivered back after `delay`
    fn schedule(&mut self, delay: Duration, token: u64);

    /// Drop a pending timer. Unknown tokens are ignored.
    fn cancel(&mut self, token: u64);
}

/// Reconnection state machine for a single session
#[derive(Debug)]
pub struct ReconnectSupervisor {
    config: ReconnectConfig,
    state: ReconnectState,
    /// Attempts since the channel was last open
    attempt_count: u32,
    next_token: u64,
}

impl ReconnectSupervisor {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            state: ReconnectState::Idle,
            attempt_count: 0,
            next_token: 0,
        }
    }

    pub fn state(&self) -> ReconnectState {
        self.state
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn delay(&self) -> Duration {
        self.config.delay
    }

    pub fn is_stopped(&self) -> bool {
        self.state == ReconnectState::Stopped
    }

    /// Channel reached the open state
    pub fn on_open(&mut self) {
        if self.is_stopped() {
            return;
        }
        if self.attempt_count > 0 {
            info!("Reconnected after {} attempt(s)", self.attempt_count);
        }
        self.state = ReconnectState::Idle;
        self.attempt_count = 0;
    }

    /// Channel closed or failed. Schedules a timer unless one is already
    /// pending or the supervisor is stopped; returns whether it did.
    pub fn on_disconnect(&mut self, scheduler: &mut dyn ReconnectScheduler) -> bool {
        if self.state != ReconnectState::Idle {
            debug!("Disconnect ignored in state {:?}", self.state);
            return false;
        }

        self.next_token += 1;
        let token = self.next_token;
        self.state = ReconnectState::Waiting { token };

        info!(
            "Channel lost, reconnecting in {}ms (attempt {})",
            self.config.delay.as_millis(),
            self.attempt_count + 1
        );
        scheduler.schedule(self.config.delay, token);
        true
    }

    /// A scheduled timer expired. Returns true when the caller should
    /// connect again; stale or cancelled tokens return false.
    pub fn on_timer_fired(&mut self, token: u64) -> bool {
        match self.state {
            ReconnectState::Waiting { token: pending } if pending == token => {
                self.state = ReconnectState::Idle;
                self.attempt_count += 1;
                true
            }
            _ => {
                debug!("Ignoring stale reconnect timer {}", token);
                false
            }
        }
    }

    /// Stop for good, cancelling any pending timer
    pub fn stop(&mut self, scheduler: &mut dyn ReconnectScheduler) {
        if let ReconnectState::Waiting { token } = self.state {
            scheduler.cancel(token);
        }
        self.state = ReconnectState::Stopped;
    }
}

impl Default for ReconnectSupervisor {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}
