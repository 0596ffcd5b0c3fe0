use crate::input::{Command, InputParser};
use log::{error, info, warn};
use shared::{timestamp_millis, Packet, MAX_DATAGRAM_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::net::UdpSocket;
use tokio::time::interval;

/// Something the user should see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Connected(String),
    Message(Vec<u8>),
    Reply { status: u16, body: String },
    Disconnected(String),
}

impl ClientEvent {
    /// One line of terminal output.
    pub fn render(&self) -> String {
        match self {
            ClientEvent::Connected(id) => format!("* connected as {}", id),
            ClientEvent::Message(payload) => String::from_utf8_lossy(payload).into_owned(),
            ClientEvent::Reply { status, body } => format!("* [{}] {}", status, body),
            ClientEvent::Disconnected(reason) => format!("* disconnected: {}", reason),
        }
    }
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    connection_id: Option<String>,
    connected: bool,
    heartbeat_interval: Duration,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        heartbeat_interval: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            connection_id: None,
            connected: false,
            heartbeat_interval,
        })
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to {}...", self.server_addr);
        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
        };
        self.send_packet(&packet).await
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = packet.encode()?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Sends `body` on `route`; dropped with a log line while not connected.
    pub async fn send_action(
        &self,
        route: &str,
        body: Vec<u8>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if !self.connected {
            info!("Not connected, dropping message");
            return Ok(());
        }
        let packet = Packet::Action {
            route: route.to_string(),
            body,
        };
        self.send_packet(&packet).await
    }

    pub async fn disconnect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.connected {
            self.send_packet(&Packet::Disconnect).await?;
        }
        self.connected = false;
        self.connection_id = None;
        Ok(())
    }

    /// Waits for the next decodable packet from the server.
    pub async fn recv_packet(&self) -> Result<Packet, Box<dyn std::error::Error>> {
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            let (len, from) = self.socket.recv_from(&mut buffer).await?;
            if let Some(packet) = self.accept_datagram(from, &buffer[..len]) {
                return Ok(packet);
            }
        }
    }

    /// Decodes a datagram, dropping anything not sent by the server.
    fn accept_datagram(&self, from: SocketAddr, data: &[u8]) -> Option<Packet> {
        if from != self.server_addr {
            warn!("Ignoring datagram from {}", from);
            return None;
        }
        match Packet::decode(data) {
            Ok(packet) => Some(packet),
            Err(e) => {
                warn!("Failed to decode packet: {}", e);
                None
            }
        }
    }

    /// Applies a server packet to the client state.
    pub fn handle_packet(&mut self, packet: Packet) -> Option<ClientEvent> {
        match packet {
            Packet::Connected { connection_id } => {
                info!("Connected! Connection ID: {}", connection_id);
                self.connection_id = Some(connection_id.clone());
                self.connected = true;
                Some(ClientEvent::Connected(connection_id))
            }
            Packet::Broadcast { payload } => Some(ClientEvent::Message(payload)),
            Packet::Reply { status, body } => Some(ClientEvent::Reply { status, body }),
            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.connection_id = None;
                Some(ClientEvent::Disconnected(reason))
            }
            _ => {
                warn!("Unexpected packet type");
                None
            }
        }
    }

    /// Runs the chat loop until `/quit` or end of input.
    pub async fn run<R>(
        &mut self,
        input: R,
        mut parser: InputParser,
    ) -> Result<(), Box<dyn std::error::Error>>
    where
        R: AsyncBufRead + Unpin,
    {
        self.connect().await?;

        let mut lines = input.lines();
        let mut heartbeat = interval(self.heartbeat_interval);
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, from)) => {
                            let packet = self.accept_datagram(from, &buffer[..len]);
                            if let Some(event) = packet.and_then(|p| self.handle_packet(p)) {
                                println!("{}", event.render());
                            }
                        }
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    match parser.parse(&line) {
                        Command::Send { route, body } => {
                            if let Err(e) = self.send_action(&route, body).await {
                                error!("Error sending message: {}", e);
                            }
                        }
                        Command::SetRoute(route) => println!("* route is now {}", route),
                        Command::Quit => break,
                        Command::Ignore => {}
                    }
                },

                _ = heartbeat.tick() => {
                    if self.connected {
                        let packet = Packet::Heartbeat { timestamp: timestamp_millis() };
                        if let Err(e) = self.send_packet(&packet).await {
                            error!("Error sending heartbeat: {}", e);
                        }
                    }
                },
            }
        }

        self.disconnect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_client() -> Client {
        Client::new("127.0.0.1:9", Duration::from_secs(5)).await.unwrap()
    }

    #[tokio::test]
    async fn test_new_client_is_disconnected() {
        let client = test_client().await;
        assert!(!client.is_connected());
        assert!(client.connection_id().is_none());
    }

    #[tokio::test]
    async fn test_invalid_server_address() {
        assert!(Client::new("not an address", Duration::from_secs(5)).await.is_err());
    }

    #[tokio::test]
    async fn test_connected_packet_updates_state() {
        let mut client = test_client().await;
        let event = client.handle_packet(Packet::Connected {
            connection_id: "abc".to_string(),
        });

        assert_eq!(event, Some(ClientEvent::Connected("abc".to_string())));
        assert!(client.is_connected());
        assert_eq!(client.connection_id(), Some("abc"));
    }

    #[tokio::test]
    async fn test_disconnected_packet_clears_state() {
        let mut client = test_client().await;
        client.handle_packet(Packet::Connected {
            connection_id: "abc".to_string(),
        });
        let event = client.handle_packet(Packet::Disconnected {
            reason: "Server full".to_string(),
        });

        assert_eq!(event, Some(ClientEvent::Disconnected("Server full".to_string())));
        assert!(!client.is_connected());
        assert!(client.connection_id().is_none());
    }

    #[tokio::test]
    async fn test_datagrams_from_strangers_are_dropped() {
        let client = test_client().await;
        let data = Packet::Broadcast {
            payload: b"spoofed".to_vec(),
        }
        .encode()
        .unwrap();

        let stranger: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        assert_eq!(client.accept_datagram(stranger, &data), None);
        assert_eq!(
            client.accept_datagram(client.server_addr, &data),
            Some(Packet::Broadcast {
                payload: b"spoofed".to_vec()
            })
        );
        assert_eq!(client.accept_datagram(client.server_addr, b"\xff"), None);
    }

    #[tokio::test]
    async fn test_client_bound_packets_are_ignored() {
        let mut client = test_client().await;
        assert_eq!(client.handle_packet(Packet::Disconnect), None);
    }

    #[tokio::test]
    async fn test_send_action_while_disconnected_is_noop() {
        let client = test_client().await;
        tokio_test::assert_ok!(client.send_action("sendMessage", b"hi".to_vec()).await);
    }

    #[test]
    fn test_render_events() {
        assert_eq!(ClientEvent::Message(b"hey".to_vec()).render(), "hey");
        assert_eq!(
            ClientEvent::Reply {
                status: 500,
                body: "Failed to send messages.".to_string()
            }
            .render(),
            "* [500] Failed to send messages."
        );
        assert_eq!(ClientEvent::Message(vec![]).render(), "");
    }
}
