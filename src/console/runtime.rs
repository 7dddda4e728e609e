//! Console runtime
//!
//! Tokio glue around [`ConsoleSession`]: a pump task drains the session inbox
//! one input at a time, a [`TokioScheduler`] turns reconnect delays into real
//! timers, and [`ConsoleHandle`] gives user-facing tasks locked access to the
//! session.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::error::ConsoleError;
use super::inbox::{inbox, InboxReceiver, InboxSender, SessionInput};
use super::log_buffer::{BufferStats, ConsoleLine};
use super::reconnect::{ReconnectConfig, ReconnectScheduler};
use super::session::{ConsoleSession, UpdateReceiver};
use super::transport::{Transport, WsTransport};
use super::types::{
    ConnectionParams, ConnectivityState, LifecycleState, PowerAction, TelemetrySnapshot,
};
use crate::api::ServerResolver;
use crate::config::ConsoleConfig;

// ============================================================================
// Timers
// ============================================================================

/// Reconnect timers backed by `tokio::time::sleep`
pub struct TokioScheduler {
    runtime: Handle,
    inbox: InboxSender,
    timers: HashMap<u64, JoinHandle<()>>,
}

impl TokioScheduler {
    pub fn new(runtime: Handle, inbox: InboxSender) -> Self {
        Self {
            runtime,
            inbox,
            timers: HashMap::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.timers.values().filter(|t| !t.is_finished()).count()
    }
}

impl ReconnectScheduler for TokioScheduler {
    fn schedule(&mut self, delay: Duration, token: u64) {
        self.timers.retain(|_, timer| !timer.is_finished());

        let inbox = self.inbox.clone();
        let timer = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inbox.send(SessionInput::ReconnectDue { token });
        });
        self.timers.insert(token, timer);
    }

    fn cancel(&mut self, token: u64) {
        if let Some(timer) = self.timers.remove(&token) {
            timer.abort();
            debug!("Cancelled reconnect timer {}", token);
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Point-in-time view of a session for UI shells
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleSnapshot {
    pub id: String,
    pub connectivity: ConnectivityState,
    pub lifecycle: LifecycleState,
    pub telemetry: Option<TelemetrySnapshot>,
    pub pending_power_action: Option<PowerAction>,
    pub last_error: Option<String>,
    pub reconnect_attempts: u32,
    pub log: BufferStats,
}

/// Shared, cloneable access to a running console session
#[derive(Clone)]
pub struct ConsoleHandle {
    session: Arc<Mutex<ConsoleSession>>,
    pump: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ConsoleHandle {
    /// Session over a WebSocket transport, configured from `config`
    pub fn new(config: &ConsoleConfig, runtime: Handle) -> (Self, UpdateReceiver) {
        let transport = WsTransport::new(runtime.clone());
        Self::with_transport(Box::new(transport), config.reconnect(), runtime)
    }

    pub fn with_transport(
        transport: Box<dyn Transport>,
        reconnect: ReconnectConfig,
        runtime: Handle,
    ) -> (Self, UpdateReceiver) {
        let (inbox_tx, inbox_rx) = inbox();
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        let scheduler = TokioScheduler::new(runtime.clone(), inbox_tx.clone());
        let session = ConsoleSession::new(transport, Box::new(scheduler), inbox_tx, reconnect)
            .with_update_sender(update_tx);
        let session = Arc::new(Mutex::new(session));

        let pump = runtime.spawn(run_pump(Arc::downgrade(&session), inbox_rx));

        let handle = Self {
            session,
            pump: Arc::new(Mutex::new(Some(pump))),
        };
        (handle, update_rx)
    }

    pub fn open(&self, params: ConnectionParams) -> Result<(), ConsoleError> {
        self.session.lock().open(params)
    }

    /// Resolve `server_id` through the panel, then open the channel
    pub async fn open_server<R>(&self, resolver: &R, server_id: &str) -> Result<(), ConsoleError>
    where
        R: ServerResolver + ?Sized,
    {
        let resolved = resolver.resolve(server_id).await?;

        let mut session = self.session.lock();
        session.open(resolved.params)?;
        if let Some(state) = resolved.initial_state {
            session.seed_lifecycle(state);
        }
        Ok(())
    }

    pub fn send_command(&self, text: &str) -> Result<(), ConsoleError> {
        self.session.lock().send_command(text)
    }

    pub fn request_power_action(&self, action: PowerAction) -> Result<(), ConsoleError> {
        self.session.lock().request_power_action(action)
    }

    /// Close the session and stop the pump
    pub fn close(&self) {
        self.session.lock().close();
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }

    pub fn snapshot(&self) -> ConsoleSnapshot {
        let session = self.session.lock();
        ConsoleSnapshot {
            id: session.id().to_string(),
            connectivity: session.connectivity(),
            lifecycle: session.lifecycle(),
            telemetry: session.telemetry(),
            pending_power_action: session.pending_power_action(),
            last_error: session.last_error().map(str::to_string),
            reconnect_attempts: session.reconnect_attempts(),
            log: session.log_stats(),
        }
    }

    pub fn log_lines(&self) -> Vec<ConsoleLine> {
        self.session.lock().log_lines().to_vec()
    }

    /// Run `f` with the session locked
    pub fn with_session<T>(&self, f: impl FnOnce(&ConsoleSession) -> T) -> T {
        f(&self.session.lock())
    }
}

/// Apply inbox inputs in arrival order until the session or inbox goes away
async fn run_pump(session: Weak<Mutex<ConsoleSession>>, mut inbox: InboxReceiver) {
    while let Some(input) = inbox.recv().await {
        let Some(strong) = session.upgrade() else {
            break;
        };
        strong.lock().handle_input(input);
    }
    info!("Console inbox pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ResolvedServer};
    use crate::console::inbox::ChannelEvent;
    use crate::console::state::SessionUpdate;
    use crate::console::transport::testing::FakeTransport;
    use crate::console::types::NodeAddress;
    use async_trait::async_trait;
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::Message;

    const SHORT_DELAY: Duration = Duration::from_millis(20);

    fn params(port: u16) -> ConnectionParams {
        ConnectionParams::new(NodeAddress::new("127.0.0.1", port, false), "tok", "srv-1")
    }

    fn fake_handle() -> (ConsoleHandle, UpdateReceiver, FakeTransport) {
        let transport = FakeTransport::default();
        let (handle, updates) = ConsoleHandle::with_transport(
            Box::new(transport.clone()),
            ReconnectConfig { delay: SHORT_DELAY },
            Handle::current(),
        );
        (handle, updates, transport)
    }

    fn emit(transport: &FakeTransport, event: ChannelEvent) {
        let wire = transport.wire.lock();
        wire.connects.last().unwrap().emit(event);
    }

    async fn wait_for(updates: &mut UpdateReceiver, wanted: SessionUpdate) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(update) = updates.recv().await {
                if update == wanted {
                    return;
                }
            }
            panic!("update feed closed before {:?}", wanted);
        })
        .await
        .expect("timed out waiting for update");
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for condition");
    }

    #[tokio::test]
    async fn test_reconnects_after_drop() {
        let (handle, mut updates, transport) = fake_handle();
        handle.open(params(8080)).unwrap();

        for round in 1..=3 {
            emit(&transport, ChannelEvent::Open);
            wait_for(&mut updates, SessionUpdate::Connectivity(ConnectivityState::Open)).await;

            emit(&transport, ChannelEvent::Closed { was_clean: false });
            wait_until(|| transport.connect_count() == round + 1).await;
            assert_eq!(handle.snapshot().reconnect_attempts, 1);
        }
        handle.close();
    }

    #[tokio::test]
    async fn test_close_cancels_pending_timer() {
        let (handle, mut updates, transport) = fake_handle();
        handle.open(params(8080)).unwrap();
        emit(&transport, ChannelEvent::Error("refused".into()));
        wait_for(&mut updates, SessionUpdate::Connectivity(ConnectivityState::Closed)).await;

        handle.close();
        tokio::time::sleep(SHORT_DELAY * 5).await;

        assert_eq!(transport.connect_count(), 1);
        assert_eq!(handle.snapshot().connectivity, ConnectivityState::Closed);
        assert!(handle.with_session(|s| s.is_closed()));
    }

    #[tokio::test]
    async fn test_frames_applied_in_order() {
        let (handle, mut updates, transport) = fake_handle();
        handle.open(params(8080)).unwrap();

        emit(&transport, ChannelEvent::Open);
        for i in 0..50 {
            emit(
                &transport,
                ChannelEvent::Message(format!(
                    r#"{{"event":"console_output","data":{{"message":"line {}"}}}}"#,
                    i
                )),
            );
        }
        wait_until(|| handle.snapshot().log.current_lines == 50).await;

        let texts: Vec<String> = handle.log_lines().into_iter().map(|l| l.text).collect();
        let expected: Vec<String> = (0..50).map(|i| format!("line {}", i)).collect();
        assert_eq!(texts, expected);
        assert!(matches!(
            updates.recv().await,
            Some(SessionUpdate::Connectivity(ConnectivityState::Connecting))
        ));
        handle.close();
    }

    struct StaticResolver(ResolvedServer);

    #[async_trait]
    impl ServerResolver for StaticResolver {
        async fn resolve(&self, _server_id: &str) -> Result<ResolvedServer, ApiError> {
            Ok(self.0.clone())
        }
    }

    struct FailingResolver;

    #[async_trait]
    impl ServerResolver for FailingResolver {
        async fn resolve(&self, _server_id: &str) -> Result<ResolvedServer, ApiError> {
            Err(ApiError::Decode("no node".into()))
        }
    }

    #[tokio::test]
    async fn test_open_server_uses_resolver() {
        let (handle, _updates, transport) = fake_handle();
        let resolver = StaticResolver(ResolvedServer {
            params: params(2022),
            initial_state: Some(LifecycleState::Stopped),
        });

        handle.open_server(&resolver, "d3aac109").await.unwrap();
        assert_eq!(transport.connect_count(), 1);
        assert_eq!(handle.snapshot().lifecycle, LifecycleState::Stopped);
        assert_eq!(
            handle.with_session(|s| s.params().map(|p| p.server_id.clone())),
            Some("srv-1".to_string())
        );

        let (other, _updates, _) = fake_handle();
        assert!(matches!(
            other.open_server(&FailingResolver, "x").await,
            Err(ConsoleError::Resolve(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_serializes_camel_case() {
        let (handle, _updates, _transport) = fake_handle();
        let value = serde_json::to_value(handle.snapshot()).unwrap();

        assert_eq!(value["connectivity"], "closed");
        assert_eq!(value["lifecycle"], "unknown");
        assert_eq!(value["reconnectAttempts"], 0);
        assert!(value["pendingPowerAction"].is_null());
    }

    #[tokio::test]
    async fn test_session_against_websocket_daemon() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let daemon = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text(
                r#"{"event":"auth_success","data":{"logs":["[boot] ready"]}}"#.to_string(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text(
                r#"{"event":"stats","data":{"cpu_percent":3,"state":"running"}}"#.to_string(),
            ))
            .await
            .unwrap();

            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    let reply = format!(
                        r#"{{"event":"console_output","data":{{"message":"got {}"}}}}"#,
                        text.len()
                    );
                    ws.send(Message::Text(reply)).await.unwrap();
                    return text;
                }
            }
            String::new()
        });

        let (handle, mut updates) = ConsoleHandle::new(&ConsoleConfig::default(), Handle::current());
        handle.open(params(port)).unwrap();
        wait_for(&mut updates, SessionUpdate::Lifecycle(LifecycleState::Running)).await;

        handle.send_command("list").unwrap();
        let frame = daemon.await.unwrap();
        assert_eq!(frame, r#"{"event":"send_command","data":"list"}"#);

        wait_until(|| handle.snapshot().log.current_lines == 3).await;
        let texts: Vec<String> = handle.log_lines().into_iter().map(|l| l.text).collect();
        assert_eq!(texts[0], "[boot] ready");
        assert_eq!(texts[1], "$ list");
        assert!(texts[2].starts_with("got "));

        handle.close();
    }
}
