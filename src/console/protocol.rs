//! Console wire protocol
//!
//! Every frame in both directions is a JSON envelope:
//!
//! ```text
//! { "event": "<event-name>", "data": <event-specific payload> }
//! ```
//!
//! Outbound events serialize through serde's adjacently tagged representation.
//! Inbound events are decoded leniently: a frame that is not an envelope is a
//! [`ProtocolError`], but a well-formed envelope with an unexpected payload
//! shape decodes to an event whose missing fields are `None`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ProtocolError;
use super::types::{MemoryUsage, NetworkUsage, PowerAction, TelemetrySnapshot};

/// Raw `{event, data}` envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

// ============================================================================
// Client -> Server
// ============================================================================

/// Events sent from the console to the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Raw command line for the server process
    SendCommand(String),
    PowerAction { action: PowerAction },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendCommand(_) => "send_command",
            Self::PowerAction { .. } => "power_action",
        }
    }

    /// Serialize to a text frame
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ============================================================================
// Server -> Client
// ============================================================================

/// Payload of a `stats` event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsPayload {
    pub cpu_percent: Option<f64>,
    pub memory_used: Option<u64>,
    pub memory_limit: Option<u64>,
    pub memory_percent: Option<f64>,
    pub rx_bytes: Option<u64>,
    pub tx_bytes: Option<u64>,
    pub state: Option<String>,
}

impl StatsPayload {
    fn from_data(data: &Value) -> Self {
        let memory = &data["memory"];
        let network = &data["network"];
        Self {
            cpu_percent: data["cpu_percent"].as_f64(),
            memory_used: byte_count(&memory["used"]),
            memory_limit: byte_count(&memory["limit"]),
            memory_percent: memory["percent"].as_f64(),
            rx_bytes: byte_count(&network["rx_bytes"]),
            tx_bytes: byte_count(&network["tx_bytes"]),
            state: data["state"].as_str().map(str::to_owned),
        }
    }

    /// Build a full snapshot, or `None` when the event carries no CPU reading.
    /// Missing sub-fields default to zero.
    pub fn snapshot(&self) -> Option<TelemetrySnapshot> {
        let cpu_percent = self.cpu_percent?;
        Some(TelemetrySnapshot {
            cpu_percent: if cpu_percent.is_finite() {
                cpu_percent.max(0.0)
            } else {
                0.0
            },
            memory: MemoryUsage {
                used_bytes: self.memory_used.unwrap_or(0),
                limit_bytes: self.memory_limit.unwrap_or(0),
                percent: self.memory_percent.unwrap_or(0.0),
            },
            network: NetworkUsage {
                rx_bytes: self.rx_bytes.unwrap_or(0),
                tx_bytes: self.tx_bytes.unwrap_or(0),
            },
        })
    }
}

/// Events sent from the daemon to the console
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    ConsoleOutput { message: Option<String> },
    /// History replay sent once the token is accepted
    AuthSuccess { logs: Option<Vec<String>> },
    Stats(StatsPayload),
    PowerStatus { status: Option<String> },
    Error { message: Option<String> },
    /// Event kind this client does not understand
    Unknown(String),
}

impl ServerEvent {
    pub fn from_envelope(envelope: Envelope) -> Self {
        let data = &envelope.data;
        match envelope.event.as_str() {
            "console_output" => Self::ConsoleOutput {
                message: string_field(data, "message"),
            },
            "auth_success" => Self::AuthSuccess {
                logs: data["logs"].as_array().map(|logs| {
                    logs.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_owned)
                        .collect()
                }),
            },
            "stats" => Self::Stats(StatsPayload::from_data(data)),
            "power_status" => Self::PowerStatus {
                status: string_field(data, "status"),
            },
            "error" => Self::Error {
                message: string_field(data, "message"),
            },
            _ => Self::Unknown(envelope.event),
        }
    }
}

/// Decode one inbound text frame
pub fn decode(raw: &str) -> Result<ServerEvent, ProtocolError> {
    // Derived struct decoding also takes a JSON array; only an object is an envelope
    let value: Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Err(ProtocolError::NotAnObject);
    }
    let envelope: Envelope = serde_json::from_value(value)?;
    Ok(ServerEvent::from_envelope(envelope))
}

fn string_field(data: &Value, key: &str) -> Option<String> {
    data[key].as_str().map(str::to_owned)
}

/// Byte counters may arrive as integers or floats
fn byte_count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as u64)
    })
}
