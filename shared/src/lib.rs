//! Types shared between the relay server and its clients: the persisted
//! `Connection` record and the datagram protocol spoken over UDP.

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const PROTOCOL_VERSION: u32 = 1;
/// Largest payload a single UDP datagram can carry over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;
pub const CONNECTION_ID_LENGTH: usize = 12;
pub const DEFAULT_OWNER: &str = "anonymous";
/// Route whose messages are broadcast to every registered connection.
pub const BROADCAST_ROUTE: &str = "sendMessage";
/// Separates the assigning relay's name from the random part of an id.
pub const RELAY_SEPARATOR: char = '/';

pub type CodecError = bincode::Error;

/// Opaque, transport-assigned identifier of one client session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random alphanumeric identifier.
    pub fn generate() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CONNECTION_ID_LENGTH)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Generates an id stamped with the name of the relay holding its session.
    pub fn assigned_by(relay: &str) -> Self {
        Self(format!("{}{}{}", relay, RELAY_SEPARATOR, Self::generate()))
    }

    /// Name of the relay that assigned this id, if it carries one.
    pub fn relay(&self) -> Option<&str> {
        self.0
            .rsplit_once(RELAY_SEPARATOR)
            .map(|(relay, _)| relay)
            .filter(|relay| !relay.is_empty())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One registered client session, as persisted by the connection store.
///
/// `registered_at` is serialized as an ISO-8601 string and is never modified
/// once the record is created; re-registering an id replaces the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub owner: String,
    pub registered_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(id: ConnectionId, owner: impl Into<String>) -> Self {
        Self {
            id,
            owner: owner.into(),
            registered_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Heartbeat {
        timestamp: u64,
    },
    Action {
        route: String,
        body: Vec<u8>,
    },
    Disconnect,

    Connected {
        connection_id: String,
    },
    Reply {
        status: u16,
        body: String,
    },
    Broadcast {
        payload: Vec<u8>,
    },
    Disconnected {
        reason: String,
    },
}

impl Packet {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        bincode::deserialize(bytes)
    }
}

/// Milliseconds since the Unix epoch, saturating to zero on clock skew.
pub fn timestamp_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    millis.min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_alphanumeric() {
        let id = ConnectionId::generate();
        assert_eq!(id.as_str().len(), CONNECTION_ID_LENGTH);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generated_ids_differ() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_assigned_ids_carry_relay_name() {
        let id = ConnectionId::assigned_by("127.0.0.1:8080");
        assert_eq!(id.relay(), Some("127.0.0.1:8080"));
        assert!(id.as_str().starts_with("127.0.0.1:8080/"));

        assert_eq!(ConnectionId::from("plain").relay(), None);
        assert_eq!(ConnectionId::from("/orphan").relay(), None);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::from("abc=");
        assert_eq!(id.to_string(), "abc=");
        assert_eq!(id, ConnectionId::new(String::from("abc=")));
    }

    #[test]
    fn test_connection_creation() {
        let before = Utc::now();
        let conn = Connection::new("c1".into(), DEFAULT_OWNER);
        assert_eq!(conn.id.as_str(), "c1");
        assert_eq!(conn.owner, "anonymous");
        assert!(conn.registered_at >= before);
    }

    #[test]
    fn test_connection_record_keeps_timestamp() {
        let conn = Connection::new("c1".into(), "alice");
        let bytes = bincode::serialize(&conn).unwrap();
        let decoded: Connection = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, conn);
    }

    #[test]
    fn test_packet_serialization_action() {
        let packet = Packet::Action {
            route: BROADCAST_ROUTE.to_string(),
            body: b"hello".to_vec(),
        };

        let decoded = Packet::decode(&packet.encode().unwrap()).unwrap();

        match decoded {
            Packet::Action { route, body } => {
                assert_eq!(route, "sendMessage");
                assert_eq!(body, b"hello");
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_empty_broadcast_payload_survives_encoding() {
        let packet = Packet::Broadcast { payload: vec![] };
        let decoded = Packet::decode(&packet.encode().unwrap()).unwrap();
        assert_eq!(decoded, Packet::Broadcast { payload: vec![] });
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(Packet::decode(&[0xff, 0xff, 0xff, 0xff, 0x01]).is_err());
    }

    #[test]
    fn test_timestamp_is_monotonic_enough() {
        let t1 = timestamp_millis();
        std::thread::sleep(Duration::from_millis(2));
        let t2 = timestamp_millis();
        assert!(t2 > t1);
    }
}
