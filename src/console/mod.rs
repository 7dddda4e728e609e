//! Console Session Module
//!
//! Real-time server console over one WebSocket channel to the node daemon:
//! - Typed `{event, data}` wire protocol
//! - Dispatcher routing daemon events into session state
//! - Fixed-delay reconnection with an injectable timer
//! - Session orchestrator gating commands and power actions on server state
//! - ANSI SGR formatter for rendering log lines

pub mod dispatcher;
pub mod error;
pub mod formatter;
pub mod inbox;
pub mod log_buffer;
pub mod protocol;
pub mod reconnect;
pub mod runtime;
pub mod session;
pub mod state;
pub mod transport;
pub mod types;

pub use dispatcher::dispatch;
pub use error::{ConsoleError, ProtocolError, TransportError};
pub use formatter::{apply_sgr, format, AnsiColor, Segment, Style};
pub use inbox::{ChannelEvent, ChannelSink, SessionInput};
pub use log_buffer::{BufferStats, ConsoleLine, LogBuffer};
pub use protocol::{decode, ClientEvent, ServerEvent};
pub use reconnect::{
    ReconnectConfig, ReconnectScheduler, ReconnectState, ReconnectSupervisor,
    DEFAULT_RECONNECT_DELAY,
};
pub use runtime::{ConsoleHandle, ConsoleSnapshot, TokioScheduler};
pub use session::{ConsoleSession, UpdateReceiver};
pub use state::{ConsoleState, SessionUpdate};
pub use transport::{connection_url, Transport, WsTransport};
pub use types::{
    ConnectionParams, ConnectivityState, LifecycleState, MemoryUsage, NetworkUsage, NodeAddress,
    PowerAction, TelemetrySnapshot,
};
