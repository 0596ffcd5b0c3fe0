//! # Fan-out Relay Server Library
//!
//! This library implements a real-time message fan-out service. Clients open
//! a long-lived session, the service records them in a persistent connection
//! registry, and every message sent on the broadcast route is delivered to all
//! registered connections. Connections whose sessions have vanished are
//! pruned as deliveries to them fail.
//!
//! ## Module Organization
//!
//! ### Connection Store (`store`)
//! Durable key-value table with one record per connection:
//! - `ConnectionStore` trait: put, get, idempotent delete, paginated scan
//! - `MemoryStore` for a single process, `FileStore` for a shared directory
//!
//! ### Connection Registry (`registry`)
//! The only writer of the store. Registers and deregisters connections and
//! presents the paginated scan as one list.
//!
//! ### Broadcast Dispatcher (`dispatcher`)
//! Fans a payload out to every registered connection concurrently, classifies
//! each delivery as delivered, pruned (target gone) or failed (transient), and
//! reports the counts.
//!
//! ### Transport Sender (`sender`)
//! `TransportSender` abstracts "deliver bytes to connection X". `UdpSender`
//! delivers through the UDP gateway and bounds every send with a timeout.
//!
//! ### Gateway Adapter (`gateway`)
//! Maps connect, disconnect and inbound-message events onto the registry and
//! dispatcher and turns their results into status-coded replies.
//!
//! ### UDP Gateway (`network`, `sessions`)
//! Datagram server tracking live sessions, idle timeouts and route selection.
//!
//! ## Failure Model
//!
//! A broadcast only fails outright when the registry cannot be enumerated.
//! Per-connection failures never fail a broadcast: a gone target is
//! deregistered, a transient failure leaves it registered for the next
//! broadcast, and a failed cleanup is logged and counted.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::gateway::Gateway;
//! use server::network::{Server, ServerSettings};
//! use server::registry::ConnectionRegistry;
//! use server::store::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ConnectionRegistry::new(Arc::new(MemoryStore::new()));
//!     let gateway = Gateway::new(registry);
//!
//!     let mut server = Server::new("127.0.0.1:8080", gateway, ServerSettings::default()).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod network;
pub mod registry;
pub mod sender;
pub mod sessions;
pub mod store;
