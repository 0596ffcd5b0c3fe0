//! Transport sender: "deliver this payload to connection X".

use crate::error::SendError;
use crate::sessions::SessionTable;
use async_trait::async_trait;
use log::debug;
use shared::{ConnectionId, Packet};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tokio::time::timeout;

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(2);

#[async_trait]
pub trait TransportSender: Send + Sync {
    /// Delivers `payload` to `id`.
    ///
    /// Returns [`SendError::Gone`] when the target session no longer exists
    /// and [`SendError::Transient`] for anything that may succeed later,
    /// including hitting the per-send timeout.
    async fn send(&self, id: &ConnectionId, payload: &[u8]) -> Result<(), SendError>;
}

/// Everything needed to address deliveries through the UDP gateway.
///
/// Built per inbound request; the handles inside are shared and long-lived.
#[derive(Clone)]
pub struct DeliveryContext {
    pub socket: Arc<UdpSocket>,
    pub sessions: Arc<RwLock<SessionTable>>,
    pub send_timeout: Duration,
}

impl DeliveryContext {
    pub fn sender(&self) -> UdpSender {
        UdpSender {
            ctx: self.clone(),
        }
    }
}

/// Sends `Packet::Broadcast` datagrams to live gateway sessions.
///
/// Only ids this relay assigned can be reported gone. A connection held by
/// another relay sharing the store is left for that relay to deliver to.
pub struct UdpSender {
    ctx: DeliveryContext,
}

#[async_trait]
impl TransportSender for UdpSender {
    async fn send(&self, id: &ConnectionId, payload: &[u8]) -> Result<(), SendError> {
        let addr = {
            let sessions = self.ctx.sessions.read().await;
            match sessions.addr_of(id) {
                Some(addr) => addr,
                // Assigned here and since closed: nobody can reach it again
                None if sessions.assigned(id) => return Err(SendError::Gone(id.clone())),
                None => {
                    return Err(SendError::Transient {
                        id: id.clone(),
                        reason: format!(
                            "session is held by relay {}",
                            id.relay().unwrap_or("unknown")
                        ),
                    })
                }
            }
        };

        let data = Packet::Broadcast {
            payload: payload.to_vec(),
        }
        .encode()
        .map_err(|e| SendError::Transient {
            id: id.clone(),
            reason: format!("encode failed: {}", e),
        })?;

        match timeout(self.ctx.send_timeout, self.ctx.socket.send_to(&data, addr)).await {
            Ok(Ok(_)) => {
                debug!("Sent {} bytes to {} ({})", data.len(), id, addr);
                Ok(())
            }
            Ok(Err(e)) => Err(SendError::Transient {
                id: id.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(SendError::Transient {
                id: id.clone(),
                reason: format!("send timed out after {:?}", self.ctx.send_timeout),
            }),
        }
    }
}
