/// Persistent push connection: lifecycle, handshake, reconnection, frame pump
use crate::ack::AckSink;
use crate::config::Config;
use crate::model::NotificationEvent;
use crate::transport::protocol::{AckFrame, InboundFrame, Severity};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state of the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Never connected, or shut down
    Disconnected,
    /// Socket open and handshake in progress
    Connecting,
    /// Handshake sent, frames flowing
    Open,
    /// A reconnect is scheduled after the given delay
    Reconnecting(Duration),
}

/// Why a connection instance ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Error(String),
    Closed,
}

/// Connection-attempt state machine. Every attempt gets a fresh instance
/// number; failures are only honoured for the current instance and only while
/// no reconnect is outstanding, so an error-then-close pair schedules one
/// reconnect.
#[derive(Debug)]
pub struct ConnectionMachine {
    state: ConnectionState,
    instance: u64,
    reconnect_delay: Duration,
}

impl ConnectionMachine {
    pub fn new(reconnect_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            instance: 0,
            reconnect_delay,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// Start a fresh handshake. Returns the new instance number.
    pub fn begin_attempt(&mut self) -> u64 {
        self.instance += 1;
        self.state = ConnectionState::Connecting;
        self.instance
    }

    /// Handshake frame written for `instance`
    pub fn opened(&mut self, instance: u64) -> bool {
        if instance != self.instance || self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Open;
        true
    }

    /// Report an error or close on `instance`. Returns the delay of the
    /// reconnect this failure scheduled, or `None` if one is already pending.
    pub fn failed(&mut self, instance: u64, failure: &Failure) -> Option<Duration> {
        if instance != self.instance {
            debug!("Ignoring {:?} from stale connection #{}", failure, instance);
            return None;
        }
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {
                self.state = ConnectionState::Reconnecting(self.reconnect_delay);
                Some(self.reconnect_delay)
            }
            ConnectionState::Reconnecting(_) | ConnectionState::Disconnected => None,
        }
    }

    pub fn shutdown(&mut self) {
        self.state = ConnectionState::Disconnected;
    }
}

/// What the channel reports to the session loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Handshake completed on a fresh connection
    Opened,
    /// A decoded data frame, in delivery order
    Notification(NotificationEvent),
    /// The connection failed; one reconnect is scheduled. The session shows
    /// this as a transient toast, the one user-visible failure that does not
    /// raise a blocking dialog.
    Lost { retry_in: Duration },
    /// The runtime cannot stream; snapshot-only mode. Sent at most once.
    Unsupported,
}

/// Session-side handle: writes acknowledgment frames. In snapshot-only mode
/// it has no connection and acks are dropped.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    outbound: Option<mpsc::UnboundedSender<String>>,
}

impl ChannelHandle {
    pub fn snapshot_only() -> Self {
        Self { outbound: None }
    }

    pub fn is_streaming(&self) -> bool {
        self.outbound.is_some()
    }
}

impl AckSink for ChannelHandle {
    fn send_ack(&mut self, frame: AckFrame) {
        match &self.outbound {
            Some(tx) => {
                if tx.send(frame.encode()).is_err() {
                    debug!("Ack {} dropped: channel gone", frame);
                }
            }
            None => debug!("Ack {} dropped: snapshot-only mode", frame),
        }
    }
}

enum PumpEnd {
    Lost(Failure),
    Shutdown,
}

/// Owns the single persistent connection of a session
pub struct TransportChannel {
    url: String,
    token: String,
    machine: ConnectionMachine,
    events: mpsc::UnboundedSender<ChannelEvent>,
    outbound: mpsc::UnboundedReceiver<String>,
}

impl TransportChannel {
    /// Open the persistent connection in a background task. Without streaming
    /// capability emits a single `Unsupported` event and returns a
    /// snapshot-only handle.
    pub fn connect(config: &Config) -> (ChannelHandle, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let Some(url) = config.stream_url() else {
            warn!("Streaming sockets unavailable for {}; snapshot-only mode", config.base_url);
            let _ = events_tx.send(ChannelEvent::Unsupported);
            return (ChannelHandle::snapshot_only(), events_rx);
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let channel = TransportChannel {
            url,
            token: config.auth_token.clone(),
            machine: ConnectionMachine::new(config.reconnect_delay),
            events: events_tx,
            outbound: outbound_rx,
        };
        tokio::spawn(channel.run());

        (
            ChannelHandle {
                outbound: Some(outbound_tx),
            },
            events_rx,
        )
    }

    async fn run(mut self) {
        loop {
            let instance = self.machine.begin_attempt();
            debug!("Connecting to {} (attempt #{})", self.url, instance);

            let end = match tokio_tungstenite::connect_async(self.url.as_str()).await {
                Ok((stream, _)) => self.pump(instance, stream).await,
                Err(e) => PumpEnd::Lost(Failure::Error(e.to_string())),
            };

            let failure = match end {
                PumpEnd::Lost(failure) => failure,
                PumpEnd::Shutdown => break,
            };

            match self.machine.failed(instance, &failure) {
                Some(delay) => {
                    warn!("Connection #{} lost ({:?}); reconnecting in {:?}", instance, failure, delay);
                    if self.events.send(ChannelEvent::Lost { retry_in: delay }).is_err() {
                        break;
                    }
                    sleep(delay).await;
                }
                None => break,
            }
        }
        self.machine.shutdown();
        info!("Transport channel stopped");
    }

    async fn pump(&mut self, instance: u64, stream: WsStream) -> PumpEnd {
        let (mut write, mut read) = stream.split();

        // Acks queued while disconnected are not retried
        while let Ok(stale) = self.outbound.try_recv() {
            debug!("Discarding ack {} queued while disconnected", stale);
        }

        if let Err(e) = write.send(WsMessage::Text(self.token.clone().into())).await {
            return PumpEnd::Lost(Failure::Error(e.to_string()));
        }
        self.machine.opened(instance);
        if self.events.send(ChannelEvent::Opened).is_err() {
            return PumpEnd::Shutdown;
        }

        loop {
            tokio::select! {
                frame = read.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if !self.deliver(text.as_str()) {
                            return PumpEnd::Shutdown;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => return PumpEnd::Lost(Failure::Closed),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return PumpEnd::Lost(Failure::Error(e.to_string())),
                },
                ack = self.outbound.recv() => match ack {
                    Some(frame) => {
                        if let Err(e) = write.send(WsMessage::Text(frame.into())).await {
                            return PumpEnd::Lost(Failure::Error(e.to_string()));
                        }
                    }
                    None => {
                        let _ = write.close().await;
                        return PumpEnd::Shutdown;
                    }
                },
            }
        }
    }

    /// Returns false once the session loop has gone away
    fn deliver(&self, raw: &str) -> bool {
        match InboundFrame::parse(raw) {
            Ok(InboundFrame::Control { severity, text }) => {
                match severity {
                    Severity::Info => info!("Server: {}", text),
                    Severity::Error => error!("Server: {}", text),
                    Severity::Unexpected(marker) => {
                        warn!("Unexpected control frame {:?}: {}", marker, text)
                    }
                }
                true
            }
            Ok(InboundFrame::Notification(event)) => {
                self.events.send(ChannelEvent::Notification(event)).is_ok()
            }
            Err(e) => {
                warn!("Dropping frame: {}", e);
                true
            }
        }
    }
}
