//! Panel REST API
//!
//! Resolves a panel server identifier into the node address, internal id and
//! token the console needs to open its channel.

pub mod resolver;
pub mod types;

pub use resolver::{server_url, ApiError, PanelClient, ServerResolver};
pub use types::ResolvedServer;
