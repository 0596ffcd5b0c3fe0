//! # Relay Chat Client Library
//!
//! Terminal client for the fan-out relay. It opens a datagram session with
//! the relay server, keeps it alive with heartbeats, sends every typed line on
//! the broadcast route and prints whatever the relay fans out to it.
//!
//! ## Module Organization
//!
//! ### Input Module (`input`)
//! Turns typed lines into commands: plain text is sent on the current route,
//! `/route <name>` switches routes, `/to <route> <text>` sends once on another
//! route, and `/quit` leaves.
//!
//! ### Network Module (`network`)
//! Owns the UDP socket and session state:
//! - Connect handshake and heartbeat keep-alive
//! - Packet encoding and decoding
//! - Rendering of broadcasts, replies and disconnect notices
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::input::InputParser;
//! use client::network::Client;
//! use std::time::Duration;
//! use tokio::io::BufReader;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new("127.0.0.1:8080", Duration::from_secs(10)).await?;
//!     let stdin = BufReader::new(tokio::io::stdin());
//!     client.run(stdin, InputParser::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod input;
pub mod network;
