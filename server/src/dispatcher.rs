//! Broadcast dispatcher: fan one payload out to every registered connection.
//!
//! A broadcast is a single best-effort pass. Each recipient gets one
//! [`Delivery`], the pair of a send and, when the send reports the target as
//! gone, a deregistration. All deliveries run concurrently and the broadcast
//! returns only after every one of them has resolved. Nothing is retried
//! within a call; connections that failed transiently stay registered and
//! are attempted again by the next broadcast.

use crate::error::{BroadcastError, SendError, StoreError};
use crate::registry::ConnectionRegistry;
use crate::sender::TransportSender;
use futures::future::join_all;
use log::{debug, error, info, warn};
use shared::{Connection, ConnectionId};

/// What happened to one recipient of a broadcast.
#[derive(Debug)]
pub enum DeliveryResult {
    Delivered,
    /// The target was gone; `cleanup` reports whether its record was removed.
    Pruned { cleanup: Result<(), StoreError> },
    /// Transient failure, the connection stays registered.
    Failed(SendError),
}

/// A broadcast's unit of work: one send plus its conditional cleanup.
pub struct Delivery<'a> {
    registry: &'a ConnectionRegistry,
    connection: Connection,
}

impl<'a> Delivery<'a> {
    pub fn new(registry: &'a ConnectionRegistry, connection: Connection) -> Self {
        Self {
            registry,
            connection,
        }
    }

    pub async fn run<S>(self, payload: &[u8], sender: &S) -> (ConnectionId, DeliveryResult)
    where
        S: TransportSender + ?Sized,
    {
        let id = self.connection.id;
        let result = match sender.send(&id, payload).await {
            Ok(()) => {
                debug!("Delivered {} bytes to {}", payload.len(), id);
                DeliveryResult::Delivered
            }
            Err(e) if e.is_terminal() => {
                warn!("Stale connection found, deleting: {}", id);
                let cleanup = self.registry.deregister(&id).await;
                if let Err(err) = &cleanup {
                    error!("Failed to prune stale connection {}: {}", id, err);
                }
                DeliveryResult::Pruned { cleanup }
            }
            Err(e) => {
                error!("Error sending message to {}: {}", id, e);
                DeliveryResult::Failed(e)
            }
        };
        (id, result)
    }
}

/// Per-broadcast counters. `attempted == delivered + pruned + failed`.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub delivered: usize,
    pub pruned: usize,
    pub failed: usize,
    /// Pruned connections whose deregistration itself failed. They remain
    /// registered and will be pruned again by a later broadcast.
    pub cleanup_failed: usize,
    pub deliveries: Vec<(ConnectionId, DeliveryResult)>,
}

impl BroadcastReport {
    fn record(&mut self, id: ConnectionId, result: DeliveryResult) {
        self.attempted += 1;
        match &result {
            DeliveryResult::Delivered => self.delivered += 1,
            DeliveryResult::Pruned { cleanup } => {
                self.pruned += 1;
                if cleanup.is_err() {
                    self.cleanup_failed += 1;
                }
            }
            DeliveryResult::Failed(_) => self.failed += 1,
        }
        self.deliveries.push((id, result));
    }

    pub fn result_for(&self, id: &ConnectionId) -> Option<&DeliveryResult> {
        self.deliveries
            .iter()
            .find(|(delivered_to, _)| delivered_to == id)
            .map(|(_, result)| result)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub delivered: usize,
    pub pruned: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub enum BroadcastOutcome {
    /// The registry was empty; nothing was sent.
    NoRecipients,
    Delivered(BroadcastReport),
}

impl BroadcastOutcome {
    pub fn summary(&self) -> BroadcastSummary {
        match self {
            BroadcastOutcome::NoRecipients => BroadcastSummary::default(),
            BroadcastOutcome::Delivered(report) => BroadcastSummary {
                delivered: report.delivered,
                pruned: report.pruned,
                failed: report.failed,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, BroadcastOutcome::NoRecipients)
    }
}

#[derive(Clone)]
pub struct BroadcastDispatcher {
    registry: ConnectionRegistry,
}

impl BroadcastDispatcher {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Sends `payload` to every registered connection through `sender`.
    ///
    /// Fails only if the recipients cannot be enumerated, in which case no
    /// send is attempted. Individual delivery failures are reported in the
    /// outcome.
    pub async fn broadcast<S>(
        &self,
        payload: &[u8],
        sender: &S,
    ) -> Result<BroadcastOutcome, BroadcastError>
    where
        S: TransportSender + ?Sized,
    {
        let connections = self.registry.list_all().await?;

        if connections.is_empty() {
            warn!("No active connections found.");
            return Ok(BroadcastOutcome::NoRecipients);
        }

        info!("Broadcasting {} bytes to {} connections", payload.len(), connections.len());

        let deliveries = connections
            .into_iter()
            .map(|conn| Delivery::new(&self.registry, conn).run(payload, sender));

        let mut report = BroadcastReport::default();
        for (id, result) in join_all(deliveries).await {
            report.record(id, result);
        }

        info!(
            "Broadcast finished: {} delivered, {} pruned, {} failed",
            report.delivered, report.pruned, report.failed
        );
        if report.cleanup_failed > 0 {
            warn!(
                "{} stale connection(s) could not be pruned",
                report.cleanup_failed
            );
        }

        Ok(BroadcastOutcome::Delivered(report))
    }
}
