//! Sync loop driving the game link
//!
//! One iteration either dials (no live connection) or performs exactly one
//! request/response exchange. Cancellation is checked between iterations
//! only, so an in-flight wait always runs to its own timeout first.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::link::{ConnectionSupervisor, Fault, Status, StatusHandle, Transport};
use crate::protocol::{GameResponse, ItemsPayload};

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

/// Timing and address of the game link
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Game host
    pub host: String,

    /// Game port
    pub port: u16,

    /// Budget for one dial attempt
    pub dial_timeout: Duration,

    /// Budget for flushing one request frame
    pub write_timeout: Duration,

    /// Budget for receiving one response frame
    pub read_timeout: Duration,

    /// Pause after a failed dial before the next attempt (zero = none)
    pub retry_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 64197,
            dial_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_millis(1500),
            read_timeout: Duration::from_secs(5),
            retry_interval: Duration::from_secs(1),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Collaborators
// ─────────────────────────────────────────────────────────────────

/// Produces the request sent to the game each cycle.
///
/// Called once per exchange from inside the loop; it must return quickly.
pub trait PayloadProducer: Send {
    /// Payload type; anything serializable
    type Payload: Serialize;

    /// Build a fresh payload
    fn produce(&mut self) -> Self::Payload;
}

/// Fixed item list, used until the game integration supplies real data
#[derive(Debug, Clone)]
pub struct SampleItems {
    items: Vec<i64>,
}

impl SampleItems {
    pub fn new(items: Vec<i64>) -> Self {
        Self { items }
    }
}

impl Default for SampleItems {
    fn default() -> Self {
        Self::new(vec![800, 500, 300])
    }
}

impl PayloadProducer for SampleItems {
    type Payload = ItemsPayload;

    fn produce(&mut self) -> ItemsPayload {
        ItemsPayload {
            items: self.items.clone(),
        }
    }
}

/// Events published by the loop
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Link status moved
    StatusChanged { from: Status, to: Status },

    /// A response arrived and the exchange completed
    Response(GameResponse),
}

// ─────────────────────────────────────────────────────────────────
// Sync Loop
// ─────────────────────────────────────────────────────────────────

/// Drives the game link until cancelled
pub struct SyncLoop<T: Transport, P: PayloadProducer> {
    config: SyncConfig,
    supervisor: ConnectionSupervisor<T>,
    producer: P,
    events: broadcast::Sender<SyncEvent>,
}

impl<T: Transport, P: PayloadProducer> SyncLoop<T, P> {
    /// Create a loop over the given transport
    pub fn new(config: SyncConfig, transport: T, producer: P) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            config,
            supervisor: ConnectionSupervisor::new(transport),
            producer,
            events,
        }
    }

    /// Read-only status view for the console and other observers
    pub fn status_handle(&self) -> StatusHandle {
        self.supervisor.status_handle()
    }

    /// Current status
    pub fn current_status(&self) -> Status {
        self.supervisor.current_status()
    }

    /// Subscribe to loop events. Slow subscribers lose old events rather
    /// than stall the loop.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Run until `shutdown` is cancelled, then release the socket.
    ///
    /// Returns the last observed status.
    pub async fn run(mut self, shutdown: CancellationToken) -> Status {
        info!("Starting AM2R connector, use /am2r for status information");

        while !shutdown.is_cancelled() {
            let Err(fault) = self.run_iteration().await else {
                continue;
            };

            if fault.is_dial_fault() && !self.config.retry_interval.is_zero() {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.retry_interval) => {}
                }
            }
        }

        self.supervisor.shutdown().await;
        let status = self.supervisor.current_status();
        info!(status = %status, "AM2R sync loop stopped");
        status
    }

    /// Perform one iteration: dial if there is no connection, otherwise one
    /// exchange.
    pub async fn run_iteration(&mut self) -> Result<(), Fault> {
        let before = self.supervisor.current_status();

        let result = if self.supervisor.is_connected() {
            self.exchange().await
        } else {
            self.supervisor
                .dial(&self.config.host, self.config.port, self.config.dial_timeout)
                .await
        };

        let after = self.supervisor.current_status();
        if after != before {
            let _ = self.events.send(SyncEvent::StatusChanged { from: before, to: after });
        }

        result
    }

    async fn exchange(&mut self) -> Result<(), Fault> {
        let payload = self.producer.produce();
        self.supervisor.send_request(&payload, self.config.write_timeout).await?;

        let response = self.supervisor.await_response(self.config.read_timeout).await?;
        info!(name = %response.name, "Received AM2R response");
        debug!(fields = response.fields.len(), "Response fields");

        self.supervisor.complete_cycle();
        let _ = self.events.send(SyncEvent::Response(response));
        Ok(())
    }
}
