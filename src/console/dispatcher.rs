//! Message dispatcher
//!
//! Routes decoded [`ServerEvent`]s to the slice of [`ConsoleState`] they
//! affect. The match is exhaustive so adding an event kind is a compile error
//! until it is routed here.

use tracing::{debug, trace};

use super::protocol::ServerEvent;
use super::state::{ConsoleState, SessionUpdate};
use super::types::LifecycleState;

/// Used when the daemon reports an error without a message
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Line appended for a `power_status` event
pub fn power_status_line(status: &str) -> String {
    format!("[daemon] Server marked as {}", status)
}

/// Line appended for an `error` event
pub fn error_line(message: &str) -> String {
    format!("[error] {}", message)
}

/// Apply one inbound event and return what changed
pub fn dispatch(state: &mut ConsoleState, event: ServerEvent) -> Vec<SessionUpdate> {
    let mut updates = Vec::new();

    match event {
        ServerEvent::ConsoleOutput { message } => {
            if let Some(message) = message {
                updates.push(state.append_line(message));
            }
        }
        ServerEvent::AuthSuccess { logs } => {
            if let Some(logs) = logs {
                debug!("Replaying {} history lines", logs.len());
                state.log.replace_all(logs);
                updates.push(SessionUpdate::LogReplaced(state.log.lines().to_vec()));
            }
        }
        ServerEvent::Stats(stats) => {
            if let Some(snapshot) = stats.snapshot() {
                state.telemetry = Some(snapshot);
                updates.push(SessionUpdate::Telemetry(Some(snapshot)));
            }
            if let Some(raw) = stats.state.as_deref() {
                updates.extend(state.set_lifecycle(LifecycleState::from_wire(raw)));
            }
        }
        ServerEvent::PowerStatus { status } => {
            let status = status.as_deref().unwrap_or("unknown");
            updates.push(state.append_line(power_status_line(status)));
            updates.extend(state.clear_pending_power());
        }
        ServerEvent::Error { message } => {
            let message = message.unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string());
            updates.push(state.append_line(error_line(&message)));
            updates.extend(state.clear_pending_power());
            state.last_error = Some(message.clone());
            updates.push(SessionUpdate::Error(message));
        }
        ServerEvent::Unknown(name) => {
            trace!("Ignoring unknown console event '{}'", name);
        }
    }

    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::protocol::{decode, StatsPayload};
    use crate::console::types::{MemoryUsage, NetworkUsage, PowerAction, TelemetrySnapshot};
    use proptest::prelude::*;
    use serde_json::json;

    fn texts(state: &ConsoleState) -> Vec<String> {
        state.log.lines().iter().map(|l| l.text.clone()).collect()
    }

    fn apply(state: &mut ConsoleState, frame: serde_json::Value) -> Vec<SessionUpdate> {
        dispatch(state, decode(&frame.to_string()).unwrap())
    }

    #[test]
    fn test_console_output_appends() {
        let mut state = ConsoleState::default();
        apply(&mut state, json!({"event": "console_output", "data": {"message": "one"}}));
        apply(&mut state, json!({"event": "console_output", "data": {"message": "two"}}));
        apply(&mut state, json!({"event": "console_output", "data": {}}));

        assert_eq!(texts(&state), vec!["one", "two"]);
    }

    #[test]
    fn test_auth_success_replaces_history() {
        let mut state = ConsoleState::default();
        state.log.append("before");

        let updates = apply(
            &mut state,
            json!({"event": "auth_success", "data": {"logs": ["h1", "h2"]}}),
        );
        assert_eq!(texts(&state), vec!["h1", "h2"]);
        assert!(matches!(&updates[..], [SessionUpdate::LogReplaced(lines)] if lines.len() == 2));

        // Without logs nothing changes
        let updates = apply(&mut state, json!({"event": "auth_success", "data": {}}));
        assert!(updates.is_empty());
        assert_eq!(texts(&state), vec!["h1", "h2"]);
    }

    #[test]
    fn test_stats_update_scenario() {
        let mut state = ConsoleState::default();
        apply(
            &mut state,
            json!({
                "event": "stats",
                "data": {
                    "cpu_percent": 12.5,
                    "memory": {"used": 100, "limit": 200, "percent": 50},
                    "network": {"rx_bytes": 10, "tx_bytes": 20}
                }
            }),
        );

        assert_eq!(
            state.telemetry,
            Some(TelemetrySnapshot {
                cpu_percent: 12.5,
                memory: MemoryUsage {
                    used_bytes: 100,
                    limit_bytes: 200,
                    percent: 50.0,
                },
                network: NetworkUsage {
                    rx_bytes: 10,
                    tx_bytes: 20,
                },
            })
        );
        assert_eq!(state.lifecycle, LifecycleState::Unknown);
    }

    #[test]
    fn test_stats_replaces_wholesale() {
        let mut state = ConsoleState::default();
        apply(
            &mut state,
            json!({"event": "stats", "data": {"cpu_percent": 50, "network": {"rx_bytes": 99}}}),
        );
        apply(&mut state, json!({"event": "stats", "data": {"cpu_percent": 5}}));

        let telemetry = state.telemetry.unwrap();
        assert_eq!(telemetry.cpu_percent, 5.0);
        // Not merged with the previous snapshot
        assert_eq!(telemetry.network.rx_bytes, 0);
    }

    #[test]
    fn test_stats_state_only_keeps_last_telemetry() {
        let mut state = ConsoleState::default();
        apply(&mut state, json!({"event": "stats", "data": {"cpu_percent": 7}}));
        let updates = apply(&mut state, json!({"event": "stats", "data": {"state": "running"}}));

        assert_eq!(state.telemetry.unwrap().cpu_percent, 7.0);
        assert_eq!(state.lifecycle, LifecycleState::Running);
        assert_eq!(updates, vec![SessionUpdate::Lifecycle(LifecycleState::Running)]);

        // Same state again reports nothing
        let updates = dispatch(
            &mut state,
            ServerEvent::Stats(StatsPayload {
                state: Some("running".into()),
                ..Default::default()
            }),
        );
        assert!(updates.is_empty());
    }

    #[test]
    fn test_power_status_clears_pending() {
        let mut state = ConsoleState {
            pending_power: Some(PowerAction::Start),
            ..Default::default()
        };
        apply(
            &mut state,
            json!({"event": "power_status", "data": {"status": "starting"}}),
        );

        assert_eq!(state.pending_power, None);
        assert_eq!(texts(&state), vec![power_status_line("starting")]);
    }

    #[test]
    fn test_error_event() {
        let mut state = ConsoleState {
            pending_power: Some(PowerAction::Stop),
            ..Default::default()
        };
        apply(&mut state, json!({"event": "error", "data": {"message": "disk full"}}));

        assert_eq!(state.last_error.as_deref(), Some("disk full"));
        assert_eq!(state.pending_power, None);
        assert_eq!(texts(&state), vec![error_line("disk full")]);

        apply(&mut state, json!({"event": "error", "data": {}}));
        assert_eq!(state.last_error.as_deref(), Some(GENERIC_ERROR_MESSAGE));
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        let mut state = ConsoleState::default();
        state.log.append("kept");
        let updates = apply(&mut state, json!({"event": "backup_completed", "data": {}}));

        assert!(updates.is_empty());
        assert_eq!(texts(&state), vec!["kept"]);
    }

    #[test]
    fn test_log_only_shrinks_on_auth_success() {
        let frames = vec![
            json!({"event": "console_output", "data": {"message": "a"}}),
            json!({"event": "stats", "data": {"cpu_percent": 1, "state": "running"}}),
            json!({"event": "power_status", "data": {"status": "running"}}),
            json!({"event": "error", "data": {"message": "x"}}),
            json!({"event": "mystery", "data": null}),
            json!({"event": "auth_success", "data": {"logs": ["r"]}}),
            json!({"event": "console_output", "data": {"message": "b"}}),
            json!({"event": "auth_success", "data": {"logs": []}}),
            json!({"event": "console_output", "data": {"message": "c"}}),
        ];

        let mut state = ConsoleState::default();
        for frame in frames {
            let before = texts(&state);
            let is_replay = frame["event"] == "auth_success";
            apply(&mut state, frame);
            let after = texts(&state);

            if !is_replay {
                assert!(after.len() >= before.len());
                assert_eq!(&after[..before.len()], &before[..]);
            }
        }
        assert_eq!(texts(&state), vec!["c"]);
        assert_eq!(state.log.stats().replacements, 2);
    }

    fn arb_frame() -> impl Strategy<Value = serde_json::Value> {
        let text = "[a-z ]{0,6}";
        prop_oneof![
            prop::option::of(text).prop_map(|m| match m {
                Some(m) => json!({"event": "console_output", "data": {"message": m}}),
                None => json!({"event": "console_output", "data": {}}),
            }),
            (0u32..100, prop::sample::select(vec!["running", "stopped", "starting"]))
                .prop_map(|(cpu, s)| json!({"event": "stats", "data": {"cpu_percent": cpu, "state": s}})),
            text.prop_map(|s| json!({"event": "power_status", "data": {"status": s}})),
            prop::option::of(text).prop_map(|m| json!({"event": "error", "data": {"message": m}})),
            Just(json!({"event": "install_output", "data": null})),
            prop::collection::vec(text, 0..4)
                .prop_map(|logs| json!({"event": "auth_success", "data": {"logs": logs}})),
        ]
    }

    proptest! {
        #[test]
        fn prop_log_is_append_only_between_replays(
            frames in prop::collection::vec(arb_frame(), 0..32),
        ) {
            let mut state = ConsoleState::default();
            for frame in frames {
                let before = texts(&state);
                let is_replay = frame["event"] == "auth_success";
                apply(&mut state, frame);
                let after = texts(&state);

                if !is_replay {
                    prop_assert!(after.len() >= before.len());
                    prop_assert_eq!(&after[..before.len()], &before[..]);
                }
            }
        }
    }
}
