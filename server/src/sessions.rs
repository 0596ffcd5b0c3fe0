//! Live transport sessions of the UDP gateway
//!
//! This module tracks which datagram peers currently hold an open session:
//! - Session lifecycle (connect, disconnect, idle timeout)
//! - Transport-assigned connection ids and their return addresses
//! - Capacity enforcement
//!
//! The session table is transport state, not registry state. A connection id
//! can outlive its session in the registry (for example across a restart of
//! the gateway), which is exactly what the dispatcher's stale pruning cleans up.

use log::info;
use shared::ConnectionId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// One open datagram session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: ConnectionId,
    /// Address broadcasts and replies are sent to
    pub addr: SocketAddr,
    /// Last time we received any packet from this peer
    pub last_seen: Instant,
}

impl Session {
    pub fn new(id: ConnectionId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Result of opening a session for a peer address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    pub id: ConnectionId,
    /// Session previously held by the same address, now closed.
    pub replaced: Option<ConnectionId>,
}

/// Sessions held by one relay.
///
/// Every id the table hands out is stamped with the relay's name, so any
/// relay sharing the connection store can tell its own connections apart
/// from those held elsewhere.
pub struct SessionTable {
    relay: String,
    sessions: HashMap<ConnectionId, Session>,
    max_sessions: usize,
}

impl SessionTable {
    pub fn new(relay: impl Into<String>, max_sessions: usize) -> Self {
        Self {
            relay: relay.into(),
            sessions: HashMap::new(),
            max_sessions,
        }
    }

    pub fn relay(&self) -> &str {
        &self.relay
    }

    /// Whether `id` was assigned by this relay, live or not.
    pub fn assigned(&self, id: &ConnectionId) -> bool {
        id.relay() == Some(self.relay.as_str())
    }

    /// Opens a session for `addr` under a freshly generated id.
    ///
    /// A peer reconnecting from the same address replaces its old session.
    /// Returns `None` when the table is full.
    pub fn open(&mut self, addr: SocketAddr) -> Option<Opened> {
        let replaced = self.find_by_addr(addr);
        if let Some(old) = &replaced {
            self.sessions.remove(old);
        }

        if self.sessions.len() >= self.max_sessions {
            return None;
        }

        let mut id = ConnectionId::assigned_by(&self.relay);
        while self.sessions.contains_key(&id) {
            id = ConnectionId::assigned_by(&self.relay);
        }

        info!("Session {} opened from {}", id, addr);
        self.sessions.insert(id.clone(), Session::new(id.clone(), addr));
        Some(Opened { id, replaced })
    }

    /// Returns true if the session existed.
    pub fn close(&mut self, id: &ConnectionId) -> bool {
        if let Some(session) = self.sessions.remove(id) {
            info!("Session {} closed ({})", session.id, session.addr);
            true
        } else {
            false
        }
    }

    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<ConnectionId> {
        self.sessions
            .values()
            .find(|session| session.addr == addr)
            .map(|session| session.id.clone())
    }

    pub fn addr_of(&self, id: &ConnectionId) -> Option<SocketAddr> {
        self.sessions.get(id).map(|session| session.addr)
    }

    /// Marks the peer at `addr` as alive, returning its session id.
    pub fn touch(&mut self, addr: SocketAddr) -> Option<ConnectionId> {
        self.sessions
            .values_mut()
            .find(|session| session.addr == addr)
            .map(|session| {
                session.touch();
                session.id.clone()
            })
    }

    /// Removes and returns every session idle for longer than `timeout`.
    pub fn expire_idle(&mut self, timeout: Duration) -> Vec<ConnectionId> {
        let idle: Vec<ConnectionId> = self
            .sessions
            .values()
            .filter(|session| session.is_timed_out(timeout))
            .map(|session| session.id.clone())
            .collect();

        for id in &idle {
            self.close(id);
        }

        idle
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
