//! Error taxonomy for the relay core and its UDP gateway.

use shared::ConnectionId;
use thiserror::Error;

/// Failures reported by a [`ConnectionStore`](crate::store::ConnectionStore).
///
/// The store never retries; `Unavailable` is handed back to the caller, who
/// owns the retry policy.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection store unavailable: {0}")]
    Unavailable(String),
    #[error("connection {0} not found")]
    NotFound(ConnectionId),
    /// The id can never be stored by this backend; retrying will not help.
    #[error("connection id {id} rejected: {reason}")]
    Rejected { id: ConnectionId, reason: String },
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Outcome of a single failed delivery attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The session behind this id no longer exists and never will again.
    #[error("connection {0} is gone")]
    Gone(ConnectionId),
    #[error("transient failure sending to {id}: {reason}")]
    Transient { id: ConnectionId, reason: String },
}

impl SendError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SendError::Gone(_))
    }
}

/// A broadcast only fails outright when its recipients cannot be enumerated.
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("could not enumerate connections: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}
