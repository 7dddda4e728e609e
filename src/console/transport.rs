//! Transport Channel
//!
//! One persistent WebSocket to a node daemon. Outbound frames go through an
//! unbounded channel into the connection task; inbound frames and lifecycle
//! callbacks come back through a [`ChannelSink`].
//!
//! Per connect attempt the sink receives exactly one of `Open` or `Error`,
//! and `Closed` at most once, always after `Open`.

use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::error::TransportError;
use super::inbox::{ChannelEvent, ChannelSink};
use super::protocol::ClientEvent;
use super::types::ConnectionParams;

/// Socket-level seam between the session and the network
pub trait Transport: Send {
    /// Start a connect attempt. Establishment failures are reported
    /// asynchronously through `sink`; only an unusable address fails here.
    fn connect(&mut self, params: &ConnectionParams, sink: ChannelSink)
        -> Result<(), TransportError>;

    /// Transmit one event. Fails with `NotConnected` unless the channel is open.
    fn send(&mut self, event: &ClientEvent) -> Result<(), TransportError>;

    /// Tear down the current connection. Idempotent.
    fn close(&mut self);
}

/// Build the daemon URL with the server id and token as query parameters
pub fn connection_url(params: &ConnectionParams) -> Result<Url, TransportError> {
    let base = format!(
        "{}://{}:{}/",
        params.node.scheme(),
        params.node.host,
        params.node.port
    );
    Url::parse_with_params(
        &base,
        &[
            ("server", params.server_id.as_str()),
            ("token", params.auth_token.as_str()),
        ],
    )
    .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", params.node, e)))
}

enum Outbound {
    Frame(String),
    Close,
}

struct WsConnection {
    outbound: mpsc::UnboundedSender<Outbound>,
    open: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl WsConnection {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// tokio-tungstenite backed transport
pub struct WsTransport {
    runtime: Handle,
    connection: Option<WsConnection>,
}

impl WsTransport {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            connection: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.connection.as_ref().is_some_and(WsConnection::is_open)
    }
}

impl Transport for WsTransport {
    fn connect(
        &mut self,
        params: &ConnectionParams,
        sink: ChannelSink,
    ) -> Result<(), TransportError> {
        let url = connection_url(params)?;
        self.close();

        info!(
            "Connecting console channel to {} (attempt {})",
            params.node,
            sink.attempt()
        );

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        let task = self.runtime.spawn(run_connection(
            url.to_string(),
            sink,
            outbound_rx,
            Arc::clone(&open),
        ));

        self.connection = Some(WsConnection {
            outbound: outbound_tx,
            open,
            task,
        });
        Ok(())
    }

    fn send(&mut self, event: &ClientEvent) -> Result<(), TransportError> {
        let connection = self
            .connection
            .as_ref()
            .filter(|c| c.is_open())
            .ok_or(TransportError::NotConnected)?;

        let frame = event.encode()?;
        connection
            .outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| TransportError::NotConnected)?;

        debug!("Sent {} frame", event.name());
        Ok(())
    }

    fn close(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        if connection.is_open() {
            // Let the task send a close frame and finish on its own
            let _ = connection.outbound.send(Outbound::Close);
        } else {
            connection.task.abort();
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Connection task: dial, then pump frames both ways until either side closes
async fn run_connection(
    url: String,
    sink: ChannelSink,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    open: Arc<AtomicBool>,
) {
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!("Console channel connect failed: {}", e);
            sink.emit(ChannelEvent::Error(e.to_string()));
            return;
        }
    };

    open.store(true, Ordering::SeqCst);
    sink.emit(ChannelEvent::Open);

    let (mut write, mut read) = ws_stream.split();

    let was_clean = loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Frame(text)) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        warn!("Console channel write failed: {}", e);
                        break false;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    break true;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => sink.emit(ChannelEvent::Message(text)),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => sink.emit(ChannelEvent::Message(text)),
                    Err(_) => warn!("Dropping non UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    debug!("Daemon closed console channel: {:?}", frame);
                    break true;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Console channel read failed: {}", e);
                    break false;
                }
                None => break false,
            },
        }
    };

    open.store(false, Ordering::SeqCst);
    sink.emit(ChannelEvent::Closed { was_clean });
}
