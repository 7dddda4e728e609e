//! Console session data model
//!
//! Connection parameters, connectivity/lifecycle states and the telemetry
//! snapshot reported by the node daemon.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Connection Parameters
// ============================================================================

/// Address of the node daemon the console connects to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    /// Fully qualified domain name or IP of the node
    pub host: String,
    /// Daemon port
    pub port: u16,
    /// Use `wss` instead of `ws`
    pub secure: bool,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16, secure: bool) -> Self {
        Self {
            host: host.into(),
            port,
            secure,
        }
    }

    /// WebSocket scheme for this node
    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "wss"
        } else {
            "ws"
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Everything needed to open a console channel. Immutable once a session starts.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub node: NodeAddress,
    /// Opaque bearer token presented to the daemon
    pub auth_token: String,
    /// Internal server identifier on the node
    pub server_id: String,
}

impl ConnectionParams {
    pub fn new(
        node: NodeAddress,
        auth_token: impl Into<String>,
        server_id: impl Into<String>,
    ) -> Self {
        Self {
            node,
            auth_token: auth_token.into(),
            server_id: server_id.into(),
        }
    }
}

// Keep tokens out of logs
impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("node", &self.node)
            .field("auth_token", &"<redacted>")
            .field("server_id", &self.server_id)
            .finish()
    }
}

// ============================================================================
// States
// ============================================================================

/// Socket-level connectivity of the console
///
/// Serialized as snake_case: "connecting" | "open" | "closed"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    Connecting,
    Open,
    #[default]
    Closed,
}

/// Run state of the managed server process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Installing,
    Running,
    Stopped,
    /// Not reported yet, or a state this client does not know
    #[default]
    Unknown,
}

impl LifecycleState {
    /// Map a daemon state string; anything unrecognised is `Unknown`
    pub fn from_wire(state: &str) -> Self {
        match state {
            "installing" => Self::Installing,
            "running" => Self::Running,
            "stopped" => Self::Stopped,
            _ => Self::Unknown,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Power actions the console can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerAction {
    Start,
    Stop,
    Restart,
}

impl PowerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Telemetry
// ============================================================================

/// Memory usage of the server process
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub used_bytes: u64,
    pub limit_bytes: u64,
    pub percent: f64,
}

/// Network counters of the server process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkUsage {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Last reported resource usage. Replaced wholesale on every `stats` event.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    /// CPU usage percentage, never negative
    pub cpu_percent: f64,
    pub memory: MemoryUsage,
    pub network: NetworkUsage,
}
