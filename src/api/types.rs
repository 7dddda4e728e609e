//! Panel API response types

use serde::Deserialize;
use serde_json::Value;

use crate::console::types::{ConnectionParams, LifecycleState, NodeAddress};

/// `GET /servers/{id}` body with node and status included
#[derive(Debug, Clone, Deserialize)]
pub struct ServerDetails {
    pub internal_id: String,
    pub node: NodeDetails,
    #[serde(default)]
    pub status: Option<StatusDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeDetails {
    pub fqdn: String,
    pub daemon_port: u16,
    /// "https" or "http"; anything else is treated as insecure
    #[serde(default)]
    pub scheme: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusDetails {
    #[serde(default)]
    pub state: Option<String>,
}

impl ServerDetails {
    /// Decode a response body, with or without a `data` wrapper
    pub fn from_body(body: Value) -> Result<Self, serde_json::Error> {
        match body {
            Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
                serde_json::from_value(map.remove("data").unwrap_or_default())
            }
            other => serde_json::from_value(other),
        }
    }

    pub fn into_resolved(self, auth_token: &str) -> ResolvedServer {
        let secure = self
            .node
            .scheme
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("https"));

        ResolvedServer {
            params: ConnectionParams::new(
                NodeAddress::new(self.node.fqdn, self.node.daemon_port, secure),
                auth_token,
                self.internal_id,
            ),
            initial_state: self
                .status
                .and_then(|s| s.state)
                .map(|s| LifecycleState::from_wire(&s)),
        }
    }
}

/// Connection parameters plus the lifecycle the panel last saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedServer {
    pub params: ConnectionParams,
    pub initial_state: Option<LifecycleState>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wrapped_response() {
        let body = json!({
            "data": {
                "internal_id": "8a4c1f2e",
                "node": {"fqdn": "node1.example.com", "daemon_port": 8080, "scheme": "https"},
                "status": {"state": "running"}
            }
        });

        let resolved = ServerDetails::from_body(body).unwrap().into_resolved("tok");
        assert_eq!(resolved.params.node, NodeAddress::new("node1.example.com", 8080, true));
        assert_eq!(resolved.params.server_id, "8a4c1f2e");
        assert_eq!(resolved.params.auth_token, "tok");
        assert_eq!(resolved.initial_state, Some(LifecycleState::Running));
    }

    #[test]
    fn test_bare_response_without_status() {
        let body = json!({
            "internal_id": "abc",
            "node": {"fqdn": "10.0.0.5", "daemon_port": 2022, "scheme": "http"}
        });

        let resolved = ServerDetails::from_body(body).unwrap().into_resolved("tok");
        assert!(!resolved.params.node.secure);
        assert_eq!(resolved.initial_state, None);
    }

    #[test]
    fn test_missing_node_is_error() {
        assert!(ServerDetails::from_body(json!({"internal_id": "abc"})).is_err());
        assert!(ServerDetails::from_body(json!({"data": "nope"})).is_err());
    }
}
