//! WebSocket client for the multiworld server
//!
//! Keeps one session open to the server, reconnecting with exponential
//! backoff forever. The rest of the connector only sees two things: whether
//! the slot is connected ([`ServerSession::is_ready`]) and a way to ask for
//! the slot connection to be sent ([`ServerSession::send_ready`]).

use std::sync::Arc;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::protocol::{decode_packets, encode_packets, ClientPacket, ConnectPacket, ServerPacket};

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for the server session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket URL of the multiworld server
    pub url: String,

    /// Slot to connect as; unknown until the player supplies it
    pub slot_name: Option<String>,

    /// Room password
    pub password: Option<String>,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Initial reconnect delay
    pub initial_reconnect_delay: Duration,

    /// Maximum reconnect delay
    pub max_reconnect_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:38281".to_string(),
            slot_name: None,
            password: None,
            connect_timeout: Duration::from_secs(10),
            initial_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Session State
// ─────────────────────────────────────────────────────────────────

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Not started
    #[default]
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Socket open, waiting for player information before connecting a slot
    AwaitingSlot,
    /// Connect sent, waiting for the answer
    Authenticating,
    /// Slot connected
    Ready,
    /// Connection lost, will retry
    Reconnecting,
    /// Shutting down
    ShuttingDown,
}

/// Commands accepted by the session loop
#[derive(Debug)]
enum SessionCommand {
    /// Send the slot connect request now
    SendConnect,
}

// ─────────────────────────────────────────────────────────────────
// Server Session
// ─────────────────────────────────────────────────────────────────

/// Session with the multiworld server
pub struct ServerSession {
    config: SessionConfig,
    uuid: Uuid,
    state: Arc<RwLock<SessionState>>,
    command_tx: mpsc::Sender<SessionCommand>,
    command_rx: Option<mpsc::Receiver<SessionCommand>>,
}

impl ServerSession {
    /// Create a session; nothing is dialed until [`start`](Self::start)
    pub fn new(config: SessionConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(8);

        Self {
            config,
            uuid: Uuid::new_v4(),
            state: Arc::new(RwLock::new(SessionState::Disconnected)),
            command_tx,
            command_rx: Some(command_rx),
        }
    }

    /// Spawn the session loop. It runs until `shutdown` is cancelled.
    pub fn start(&mut self, shutdown: CancellationToken) -> Result<JoinHandle<()>> {
        let url = Url::parse(&self.config.url)
            .map_err(|e| Error::config_field_invalid("server.url", e.to_string()))?;

        let commands = self
            .command_rx
            .take()
            .ok_or_else(|| Error::Internal("Server session already started".to_string()))?;

        let session = SessionLoop {
            config: self.config.clone(),
            uuid: self.uuid,
            state: self.state.clone(),
            commands,
            shutdown,
        };

        Ok(tokio::spawn(session.run(url)))
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Whether the slot is connected
    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Ask the session to send the slot connect request.
    ///
    /// Never waits: if a request is already queued this one is dropped.
    pub fn send_ready(&self) -> Result<()> {
        match self.command_tx.try_send(SessionCommand::SendConnect) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Connect request already queued");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(Error::ConnectionLost {
                message: "Server session is not running".to_string(),
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Session Loop
// ─────────────────────────────────────────────────────────────────

struct SessionLoop {
    config: SessionConfig,
    uuid: Uuid,
    state: Arc<RwLock<SessionState>>,
    commands: mpsc::Receiver<SessionCommand>,
    shutdown: CancellationToken,
}

impl SessionLoop {
    fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
    }

    /// Connect, serve, and reconnect until cancelled
    async fn run(mut self, url: Url) {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.config.initial_reconnect_delay,
            max_interval: self.config.max_reconnect_delay,
            max_elapsed_time: None,
            ..Default::default()
        };

        while !self.shutdown.is_cancelled() {
            self.set_state(SessionState::Connecting);
            info!(url = %url, "Connecting to multiworld server");

            let attempt = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                attempt = tokio::time::timeout(self.config.connect_timeout, connect_async(url.as_str())) => attempt,
            };

            match attempt {
                Ok(Ok((ws_stream, _response))) => {
                    info!("Connected to multiworld server");
                    backoff.reset();

                    let (write, read) = ws_stream.split();
                    if let Err(e) = self.serve(write, read).await {
                        warn!(error = %e, "Multiworld server connection error");
                    }
                }
                Ok(Err(e)) => {
                    let err = Error::connection_failed(url.as_str(), e.to_string());
                    warn!(error = %err.format_for_log(), "Failed to connect to multiworld server");
                }
                Err(_) => {
                    let err = Error::ConnectionTimeout {
                        url: url.to_string(),
                        timeout_ms: self.config.connect_timeout.as_millis() as u64,
                    };
                    warn!(error = %err.format_for_log(), "Failed to connect to multiworld server");
                }
            }

            if self.shutdown.is_cancelled() {
                break;
            }

            self.set_state(SessionState::Reconnecting);
            let delay = backoff
                .next_backoff()
                .unwrap_or(self.config.max_reconnect_delay);
            info!(delay_ms = delay.as_millis() as u64, "Waiting before reconnecting to multiworld server");

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(SessionState::ShuttingDown);
        info!("Server session terminated");
    }

    /// Serve one open websocket until it closes or shutdown is requested
    async fn serve<S, R>(&mut self, mut write: S, mut read: R) -> Result<()>
    where
        S: Sink<WsMessage, Error = WsError> + Unpin,
        R: Stream<Item = std::result::Result<WsMessage, WsError>> + Unpin,
    {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    return Ok(());
                }

                msg = read.next() => match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        self.handle_text(&mut write, &text).await?;
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        write.send(WsMessage::Pong(data)).await?;
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(frame = ?frame, "Multiworld server closed the connection");
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        info!("Multiworld server stream ended");
                        return Ok(());
                    }
                },

                Some(cmd) = self.commands.recv() => match cmd {
                    SessionCommand::SendConnect => self.send_connect(&mut write).await?,
                },
            }
        }
    }

    async fn handle_text<S>(&mut self, write: &mut S, text: &str) -> Result<()>
    where
        S: Sink<WsMessage, Error = WsError> + Unpin,
    {
        let packets = match decode_packets(text) {
            Ok(packets) => packets,
            Err(e) => {
                let err = Error::ProtocolMalformed { message: e.to_string() };
                warn!(error = %err, "Ignoring server message");
                return Ok(());
            }
        };

        for packet in packets {
            debug!(packet = packet.type_name(), "Received server packet");

            match packet {
                ServerPacket::RoomInfo { password, seed_name } => {
                    debug!(seed = ?seed_name, "Room information received");
                    if password && self.config.password.is_none() {
                        warn!("Room requires a password but none is configured");
                    }
                    if self.config.slot_name.is_some() {
                        self.send_connect(write).await?;
                    } else {
                        self.set_state(SessionState::AwaitingSlot);
                        info!("Awaiting connection to AM2R to get player information");
                    }
                }
                ServerPacket::Connected { team, slot } => {
                    self.set_state(SessionState::Ready);
                    info!(team, slot, "Connected to multiworld slot");
                }
                ServerPacket::ConnectionRefused { errors } => {
                    self.set_state(SessionState::AwaitingSlot);
                    let err = Error::AuthenticationFailed { errors };
                    warn!(error = %err, "Slot connection refused, use /ready to retry");
                }
                ServerPacket::Unhandled => {}
            }
        }

        Ok(())
    }

    async fn send_connect<S>(&mut self, write: &mut S) -> Result<()>
    where
        S: Sink<WsMessage, Error = WsError> + Unpin,
    {
        let Some(slot) = self.config.slot_name.as_deref() else {
            warn!("No slot name configured, cannot connect a slot");
            self.set_state(SessionState::AwaitingSlot);
            return Ok(());
        };

        let packet = ConnectPacket::new(slot, self.config.password.as_deref(), self.uuid);
        let text = encode_packets(&[ClientPacket::Connect(packet)])
            .map_err(|e| Error::Internal(format!("Failed to encode Connect: {}", e)))?;

        write.send(WsMessage::Text(text)).await?;
        self.set_state(SessionState::Authenticating);
        info!(slot = %slot, "Sent slot connect request");
        Ok(())
    }
}
