//! Console state owned by a session
//!
//! The dispatcher and the session are the only writers. Every mutation is
//! reported as a [`SessionUpdate`] so shells can mirror the state without
//! polling.

use serde::Serialize;

use super::log_buffer::{ConsoleLine, LogBuffer};
use super::types::{ConnectivityState, LifecycleState, PowerAction, TelemetrySnapshot};

#[derive(Debug, Default)]
pub struct ConsoleState {
    pub log: LogBuffer,
    /// Last known resource usage, `None` until the first `stats` event
    pub telemetry: Option<TelemetrySnapshot>,
    pub lifecycle: LifecycleState,
    pub connectivity: ConnectivityState,
    /// Power action sent and not yet acknowledged
    pub pending_power: Option<PowerAction>,
    /// Most recent error reported by the daemon
    pub last_error: Option<String>,
}

impl ConsoleState {
    pub fn append_line(&mut self, text: impl Into<String>) -> SessionUpdate {
        SessionUpdate::LogAppended(self.log.append(text).clone())
    }

    pub fn set_lifecycle(&mut self, lifecycle: LifecycleState) -> Option<SessionUpdate> {
        if self.lifecycle == lifecycle {
            return None;
        }
        self.lifecycle = lifecycle;
        Some(SessionUpdate::Lifecycle(lifecycle))
    }

    pub fn set_connectivity(&mut self, connectivity: ConnectivityState) -> Option<SessionUpdate> {
        if self.connectivity == connectivity {
            return None;
        }
        self.connectivity = connectivity;
        Some(SessionUpdate::Connectivity(connectivity))
    }

    pub fn clear_pending_power(&mut self) -> Option<SessionUpdate> {
        self.pending_power
            .take()
            .map(|_| SessionUpdate::PendingPowerAction(None))
    }
}

/// Change notification published to subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SessionUpdate {
    LogAppended(ConsoleLine),
    LogReplaced(Vec<ConsoleLine>),
    Telemetry(Option<TelemetrySnapshot>),
    Lifecycle(LifecycleState),
    Connectivity(ConnectivityState),
    PendingPowerAction(Option<PowerAction>),
    Error(String),
}
