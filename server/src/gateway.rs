//! Gateway adapter: turns transport lifecycle events into registry and
//! dispatcher calls, and core outcomes into transport replies.
//!
//! Status codes live here and only here; the registry and dispatcher report
//! plain results.

use crate::dispatcher::{BroadcastDispatcher, BroadcastOutcome};
use crate::registry::ConnectionRegistry;
use crate::sender::TransportSender;
use log::{error, info};
use shared::{ConnectionId, BROADCAST_ROUTE, DEFAULT_OWNER};

pub const STATUS_OK: u16 = 200;
pub const STATUS_SERVER_ERROR: u16 = 500;

/// Response handed back to the transport for one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReply {
    pub status: u16,
    pub body: String,
}

impl GatewayReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: STATUS_OK,
            body: body.into(),
        }
    }

    pub fn server_error(body: impl Into<String>) -> Self {
        Self {
            status: STATUS_SERVER_ERROR,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Clone)]
pub struct Gateway {
    registry: ConnectionRegistry,
    dispatcher: BroadcastDispatcher,
    owner: String,
}

impl Gateway {
    pub fn new(registry: ConnectionRegistry) -> Self {
        let dispatcher = BroadcastDispatcher::new(registry.clone());
        Self {
            registry,
            dispatcher,
            owner: DEFAULT_OWNER.to_string(),
        }
    }

    /// Label recorded as the owner of every new connection.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub async fn on_connect(&self, id: &ConnectionId) -> GatewayReply {
        info!("Connection initiated: {}", id);
        match self.registry.register(id.clone(), self.owner.as_str()).await {
            Ok(_) => GatewayReply::ok("Connected."),
            Err(e) => {
                error!("Error connecting {}: {}", id, e);
                GatewayReply::server_error("Failed to connect.")
            }
        }
    }

    pub async fn on_disconnect(&self, id: &ConnectionId) -> GatewayReply {
        info!("Connection disconnected: {}", id);
        match self.registry.deregister(id).await {
            Ok(()) => GatewayReply::ok("Disconnected."),
            Err(e) => {
                error!("Error disconnecting {}: {}", id, e);
                GatewayReply::server_error("Failed to disconnect.")
            }
        }
    }

    /// Routes an inbound message. Only the broadcast route fans out; every
    /// other route is answered by the default handler.
    pub async fn on_message<S>(&self, route: &str, payload: &[u8], sender: &S) -> GatewayReply
    where
        S: TransportSender + ?Sized,
    {
        if route != BROADCAST_ROUTE {
            return self.on_default(route);
        }

        match self.dispatcher.broadcast(payload, sender).await {
            Ok(BroadcastOutcome::NoRecipients) => GatewayReply::ok("No connections to send to."),
            Ok(outcome) => {
                let summary = outcome.summary();
                GatewayReply::ok(format!(
                    "Message sent to all connections. delivered={} pruned={} failed={}",
                    summary.delivered, summary.pruned, summary.failed
                ))
            }
            Err(e) => {
                error!("Error sending messages: {}", e);
                GatewayReply::server_error("Failed to send messages.")
            }
        }
    }

    pub fn on_default(&self, route: &str) -> GatewayReply {
        info!("Default handler for route {:?}", route);
        GatewayReply::ok(r#"{"message":"Hello, world!"}"#)
    }
}
