//! Connection supervisor for the game link
//!
//! Owns the one live connection (if any) and is the only writer of the link
//! [`Status`]. Every fault closes and drops the connection before the status
//! is updated, so a caller can never reach a stale socket.

use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, trace};

use crate::protocol::{decode_frame, encode_frame, GameResponse};

use super::{transition, Fault, FrameConnection, LinkEvent, Status, StatusHandle, Transport};

/// Supervises the lifecycle of the connection to the game
pub struct ConnectionSupervisor<T: Transport> {
    transport: T,
    conn: Option<T::Conn>,
    status: Status,
    handle: StatusHandle,
}

impl<T: Transport> ConnectionSupervisor<T> {
    /// Create a supervisor with no connection
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            conn: None,
            status: Status::Uninitialized,
            handle: StatusHandle::default(),
        }
    }

    /// Current status
    pub fn current_status(&self) -> Status {
        self.status
    }

    /// Shareable read-only status view
    pub fn status_handle(&self) -> StatusHandle {
        self.handle.clone()
    }

    /// Whether a live connection is held
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Dial the game. Any previous connection is closed first.
    pub async fn dial(&mut self, host: &str, port: u16, dial_timeout: Duration) -> Result<(), Fault> {
        self.drop_connection().await;
        debug!(host = %host, port, "Attempting to connect to AM2R");

        let fault = match timeout(dial_timeout, self.transport.connect(host, port)).await {
            Ok(Ok(conn)) => {
                self.conn = Some(conn);
                self.apply(LinkEvent::Dialed);
                debug!(host = %host, port, "Socket opened, awaiting first exchange");
                return Ok(());
            }
            Ok(Err(e)) => {
                let fault = Fault::from_dial_error(&e);
                debug!(error = %e, fault = %fault, "Connection attempt failed, trying again");
                fault
            }
            Err(_) => {
                debug!(timeout_ms = dial_timeout.as_millis() as u64, "Connection attempt timed out, trying again");
                Fault::DialTimeout
            }
        };

        self.apply(LinkEvent::DialFailed(fault));
        Err(fault)
    }

    /// Encode `payload` and write it as one frame, waiting at most
    /// `write_timeout` for the flush.
    ///
    /// A payload that cannot be encoded is treated like a malformed frame:
    /// the link is reset rather than left in a half-written state.
    pub async fn send_request<P>(&mut self, payload: &P, write_timeout: Duration) -> Result<(), Fault>
    where
        P: Serialize + ?Sized,
    {
        let frame = match encode_frame(payload) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "Failed to encode payload");
                return Err(self.fail(Fault::MalformedFrame).await);
            }
        };

        // Nothing was observed on the wire, so the status is left alone
        let Some(conn) = self.conn.as_mut() else {
            return Err(Fault::ConnectionReset);
        };

        match timeout(write_timeout, conn.send(&frame)).await {
            Ok(Ok(())) => {
                trace!(bytes = frame.len(), "Request frame flushed");
                Ok(())
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Write failed due to connection loss, reconnecting");
                Err(self.fail(Fault::from_stream_error(&e)).await)
            }
            Err(_) => {
                debug!("Write timed out, reconnecting");
                Err(self.fail(Fault::WriteTimeout).await)
            }
        }
    }

    /// Wait at most `read_timeout` for one response frame and decode it
    pub async fn await_response(&mut self, read_timeout: Duration) -> Result<GameResponse, Fault> {
        // Nothing was observed on the wire, so the status is left alone
        let Some(conn) = self.conn.as_mut() else {
            return Err(Fault::ConnectionReset);
        };

        let frame = match timeout(read_timeout, conn.recv()).await {
            Ok(Ok(frame)) => frame,
            Ok(Err(e)) => {
                debug!(error = %e, "Read failed due to connection loss, reconnecting");
                return Err(self.fail(Fault::from_stream_error(&e)).await);
            }
            Err(_) => {
                debug!("Read timed out, reconnecting");
                return Err(self.fail(Fault::ReadTimeout).await);
            }
        };

        match decode_frame::<GameResponse>(&frame) {
            Ok(response) => Ok(response),
            Err(e) => {
                debug!(error = %e, bytes = frame.len(), "Discarding undecodable response");
                Err(self.fail(Fault::MalformedFrame).await)
            }
        }
    }

    /// Record a clean request/response cycle
    pub fn complete_cycle(&mut self) -> Status {
        let was_tentative = self.status.is_tentative();
        let next = self.apply(LinkEvent::ExchangeCompleted);
        if was_tentative && next == Status::Connected {
            info!("Successfully connected to AM2R");
        }
        next
    }

    /// Drop the connection and move to the status this fault implies.
    ///
    /// A fault during the first cycle after dialing is reported as a
    /// tentative failure; any later fault is reported by name.
    pub async fn classify_and_transition(&mut self, fault: Fault) -> Status {
        let was_tentative = self.status.is_tentative();
        self.drop_connection().await;

        let event = if fault.is_dial_fault() {
            LinkEvent::DialFailed(fault)
        } else {
            LinkEvent::ExchangeFailed(fault)
        };
        let next = self.apply(event);

        if was_tentative {
            info!(fault = %fault, "Connection to AM2R failed during its first exchange, reconnecting");
        } else if !fault.is_dial_fault() {
            info!(fault = %fault, "Lost connection to AM2R and attempting to reconnect");
        }

        next
    }

    /// Close any live connection. Safe to call repeatedly; the status is
    /// left as it was.
    pub async fn shutdown(&mut self) {
        if self.conn.is_some() {
            info!("Closing connection to AM2R");
        }
        self.drop_connection().await;
    }

    async fn fail(&mut self, fault: Fault) -> Fault {
        self.classify_and_transition(fault).await;
        fault
    }

    async fn drop_connection(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close().await;
        }
    }

    fn apply(&mut self, event: LinkEvent) -> Status {
        let next = transition(self.status, event);
        if next != self.status {
            debug!(from = ?self.status, to = ?next, "Link status changed");
        }
        self.status = next;
        self.handle.set(next);
        next
    }
}
