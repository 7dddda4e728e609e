//! Panel Console - live server console for a game server hosting panel
//!
//! Streams a server's console from its node daemon over WebSocket, relays
//! commands and power actions back, and keeps the connection alive across
//! drops.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod api;
pub mod config;
pub mod console;

pub use api::{PanelClient, ResolvedServer, ServerResolver};
pub use config::{ConsoleConfig, PanelConfig};
pub use console::{
    ConnectionParams, ConsoleError, ConsoleHandle, ConsoleSession, ConsoleSnapshot, PowerAction,
    SessionUpdate,
};

/// Install the global tracing subscriber (`RUST_LOG`, default `info`).
/// Does nothing if the host already installed one.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
