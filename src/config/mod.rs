//! Configuration
//!
//! Console settings: reconnect timing and the panel API endpoint. The host
//! owns where these come from and hands them over deserialized.

pub mod types;

pub use types::{ConsoleConfig, PanelConfig};
