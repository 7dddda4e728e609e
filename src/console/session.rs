//! Console Session
//!
//! Owns all console state and composes the transport, the dispatcher and the
//! reconnection supervisor. A session is single-owner: the runtime wraps it in
//! a mutex and feeds it inputs one at a time.
//!
//! ```text
//!  Idle --open()--> Active(connecting) <--> Active(open) --close()--> Closed
//!                        ^                       |
//!                        +-- timer -- closed <---+
//! ```

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dispatcher::dispatch;
use super::error::ConsoleError;
use super::inbox::{ChannelEvent, ChannelSink, InboxSender, SessionInput};
use super::log_buffer::{BufferStats, ConsoleLine};
use super::protocol::{decode, ClientEvent};
use super::reconnect::{ReconnectConfig, ReconnectScheduler, ReconnectSupervisor};
use super::state::{ConsoleState, SessionUpdate};
use super::transport::{connection_url, Transport};
use super::types::{
    ConnectionParams, ConnectivityState, LifecycleState, PowerAction, TelemetrySnapshot,
};

/// Receiving side of the update feed
pub type UpdateReceiver = mpsc::UnboundedReceiver<SessionUpdate>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Constructed, `open` not called yet
    Idle,
    Active,
    /// Closed by the user. Terminal.
    Closed,
}

/// Line echoed locally for a command the user sent
pub fn command_echo(command: &str) -> String {
    format!("$ {}", command)
}

pub struct ConsoleSession {
    id: String,
    phase: Phase,
    params: Option<ConnectionParams>,
    state: ConsoleState,
    supervisor: ReconnectSupervisor,
    transport: Box<dyn Transport>,
    scheduler: Box<dyn ReconnectScheduler>,
    inbox: InboxSender,
    /// Current connect attempt; events tagged with another attempt are stale
    attempt: u64,
    update_tx: Option<mpsc::UnboundedSender<SessionUpdate>>,
}

impl ConsoleSession {
    pub fn new(
        transport: Box<dyn Transport>,
        scheduler: Box<dyn ReconnectScheduler>,
        inbox: InboxSender,
        reconnect: ReconnectConfig,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            phase: Phase::Idle,
            params: None,
            state: ConsoleState::default(),
            supervisor: ReconnectSupervisor::new(reconnect),
            transport,
            scheduler,
            inbox,
            attempt: 0,
            update_tx: None,
        }
    }

    /// Publish every state change to `tx`
    pub fn with_update_sender(mut self, tx: mpsc::UnboundedSender<SessionUpdate>) -> Self {
        self.update_tx = Some(tx);
        self
    }

    // ------------------------------------------------------------------
    // Public operations
    // ------------------------------------------------------------------

    /// Validate `params` and start connecting
    pub fn open(&mut self, params: ConnectionParams) -> Result<(), ConsoleError> {
        match self.phase {
            Phase::Active => return Err(ConsoleError::AlreadyOpen),
            Phase::Closed => return Err(ConsoleError::SessionClosed),
            Phase::Idle => {}
        }
        validate_params(&params)?;

        info!(
            "Opening console session {} for server {} on {}",
            self.id, params.server_id, params.node
        );

        self.params = Some(params);
        self.phase = Phase::Active;
        let updates = self.state.set_lifecycle(LifecycleState::Unknown);
        self.publish(updates);
        self.dial();
        Ok(())
    }

    /// Send a command line to the server process
    pub fn send_command(&mut self, text: &str) -> Result<(), ConsoleError> {
        if text.trim().is_empty() {
            return Err(ConsoleError::EmptyCommand);
        }
        self.ensure_open()?;
        if !self.state.lifecycle.is_running() {
            debug!("Rejecting command, server is {:?}", self.state.lifecycle);
            return Err(ConsoleError::ServerNotRunning);
        }

        self.transport.send(&ClientEvent::SendCommand(text.to_string()))?;

        let update = self.state.append_line(command_echo(text));
        self.publish([update]);
        Ok(())
    }

    /// Ask the daemon to start, stop or restart the server
    pub fn request_power_action(&mut self, action: PowerAction) -> Result<(), ConsoleError> {
        if self.state.pending_power.is_some() {
            return Err(ConsoleError::PowerActionPending);
        }
        self.ensure_open()?;

        let running = self.state.lifecycle.is_running();
        match action {
            PowerAction::Start if running => return Err(ConsoleError::ServerAlreadyRunning),
            PowerAction::Stop | PowerAction::Restart if !running => {
                return Err(ConsoleError::ServerNotRunning)
            }
            _ => {}
        }

        self.transport.send(&ClientEvent::PowerAction { action })?;

        info!("Session {}: requested power action '{}'", self.id, action);
        self.state.pending_power = Some(action);
        self.publish([SessionUpdate::PendingPowerAction(Some(action))]);
        Ok(())
    }

    /// Use a lifecycle reported out of band (the panel API) until the daemon
    /// reports its own. Ignored once the state is known.
    pub fn seed_lifecycle(&mut self, lifecycle: LifecycleState) {
        if self.phase == Phase::Closed || self.state.lifecycle != LifecycleState::Unknown {
            return;
        }
        let update = self.state.set_lifecycle(lifecycle);
        self.publish(update);
    }

    /// Close the session for good. Idempotent.
    pub fn close(&mut self) {
        if self.phase == Phase::Closed {
            return;
        }
        self.phase = Phase::Closed;

        // Cancel the timer before the channel goes away so no reconnect can race
        self.supervisor.stop(self.scheduler.as_mut());
        self.transport.close();

        let mut updates: Vec<SessionUpdate> = Vec::new();
        updates.extend(self.state.set_connectivity(ConnectivityState::Closed));
        updates.extend(self.state.clear_pending_power());
        if self.state.telemetry.take().is_some() {
            updates.push(SessionUpdate::Telemetry(None));
        }
        self.publish(updates);

        info!("Console session {} closed", self.id);
    }

    /// Apply one channel event or timer firing
    pub fn handle_input(&mut self, input: SessionInput) {
        if self.phase != Phase::Active {
            debug!("Session {}: ignoring {:?} while {:?}", self.id, input, self.phase);
            return;
        }

        match input {
            SessionInput::Channel { attempt, event } => {
                if attempt != self.attempt {
                    debug!(
                        "Session {}: dropping event from stale attempt {} (current {})",
                        self.id, attempt, self.attempt
                    );
                    return;
                }
                self.on_channel_event(event);
            }
            SessionInput::ReconnectDue { token } => {
                if self.supervisor.on_timer_fired(token) {
                    self.dial();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Observable state
    // ------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn params(&self) -> Option<&ConnectionParams> {
        self.params.as_ref()
    }

    pub fn log_lines(&self) -> &[ConsoleLine] {
        self.state.log.lines()
    }

    pub fn log_tail(&self, count: usize) -> &[ConsoleLine] {
        self.state.log.tail(count)
    }

    pub fn log_stats(&self) -> BufferStats {
        self.state.log.stats()
    }

    pub fn telemetry(&self) -> Option<TelemetrySnapshot> {
        self.state.telemetry
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.state.lifecycle
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.state.connectivity
    }

    pub fn pending_power_action(&self) -> Option<PowerAction> {
        self.state.pending_power
    }

    pub fn last_error(&self) -> Option<&str> {
        self.state.last_error.as_deref()
    }

    /// Reconnect attempts since the channel was last open
    pub fn reconnect_attempts(&self) -> u32 {
        self.supervisor.attempt_count()
    }

    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn ensure_open(&self) -> Result<(), ConsoleError> {
        match self.phase {
            Phase::Closed => Err(ConsoleError::SessionClosed),
            _ if self.state.connectivity != ConnectivityState::Open => {
                Err(ConsoleError::NotConnected)
            }
            _ => Ok(()),
        }
    }

    /// Start a new connect attempt with the stored params
    fn dial(&mut self) {
        self.attempt += 1;
        let sink = ChannelSink::new(self.attempt, self.inbox.clone());

        let result = match &self.params {
            Some(params) => self.transport.connect(params, sink),
            None => return,
        };

        let updates = self.state.set_connectivity(ConnectivityState::Connecting);
        self.publish(updates);

        if let Err(e) = result {
            warn!("Session {}: connect attempt failed to start: {}", self.id, e);
            self.on_disconnected();
        }
    }

    fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Open => {
                info!("Session {}: console channel open", self.id);
                self.supervisor.on_open();
                let mut updates: Vec<SessionUpdate> = Vec::new();
                updates.extend(self.state.set_connectivity(ConnectivityState::Open));
                // A power request does not survive a reconnect
                updates.extend(self.state.clear_pending_power());
                self.publish(updates);
            }
            ChannelEvent::Message(raw) => match decode(&raw) {
                Ok(event) => {
                    let updates = dispatch(&mut self.state, event);
                    self.publish(updates);
                }
                Err(e) => {
                    warn!("Session {}: dropping malformed frame: {}", self.id, e);
                }
            },
            ChannelEvent::Closed { was_clean } => {
                info!(
                    "Session {}: console channel closed (clean: {})",
                    self.id, was_clean
                );
                self.on_disconnected();
            }
            ChannelEvent::Error(reason) => {
                warn!("Session {}: console channel error: {}", self.id, reason);
                self.on_disconnected();
            }
        }
    }

    fn on_disconnected(&mut self) {
        let updates = self.state.set_connectivity(ConnectivityState::Closed);
        self.publish(updates);
        self.supervisor.on_disconnect(self.scheduler.as_mut());
    }

    fn publish<I>(&self, updates: I)
    where
        I: IntoIterator<Item = SessionUpdate>,
    {
        let Some(tx) = &self.update_tx else {
            return;
        };
        for update in updates {
            if tx.send(update).is_err() {
                // Subscriber went away; state is still kept locally
                return;
            }
        }
    }
}

impl Drop for ConsoleSession {
    fn drop(&mut self) {
        self.supervisor.stop(self.scheduler.as_mut());
        self.transport.close();
    }
}

/// Reject parameters that can never produce a connection
pub fn validate_params(params: &ConnectionParams) -> Result<(), ConsoleError> {
    if params.node.host.trim().is_empty() {
        return Err(ConsoleError::Configuration(
            "node address is missing".to_string(),
        ));
    }
    if params.node.port == 0 {
        return Err(ConsoleError::Configuration("node port is missing".to_string()));
    }
    if params.auth_token.trim().is_empty() {
        return Err(ConsoleError::Configuration("auth token is missing".to_string()));
    }
    if params.server_id.trim().is_empty() {
        return Err(ConsoleError::Configuration(
            "server identifier is missing".to_string(),
        ));
    }
    connection_url(params)?;
    Ok(())
}
