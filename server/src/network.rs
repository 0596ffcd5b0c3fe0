//! UDP gateway: datagram sessions in, gateway replies and broadcasts out

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::gateway::Gateway;
use crate::sender::{DeliveryContext, DEFAULT_SEND_TIMEOUT};
use crate::sessions::SessionTable;
use log::{debug, error, info, warn};
use shared::{ConnectionId, Packet, MAX_DATAGRAM_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    SessionTimeout { id: ConnectionId },
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub send_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_sessions: usize,
    /// How often idle sessions are looked for
    pub sweep_interval: Duration,
    /// Name stamped on assigned connection ids; the bound address if unset.
    /// Relays sharing one store need distinct names that survive restarts.
    pub relay_name: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            send_timeout: DEFAULT_SEND_TIMEOUT,
            idle_timeout: Duration::from_secs(30),
            max_sessions: 1024,
            sweep_interval: Duration::from_secs(1),
            relay_name: None,
        }
    }
}

impl From<&ServerConfig> for ServerSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            send_timeout: config.send_timeout(),
            idle_timeout: config.idle_timeout(),
            max_sessions: config.max_sessions,
            relay_name: config.name.clone(),
            ..Self::default()
        }
    }
}

/// Gateway server owning the socket and the live session table
pub struct Server {
    socket: Arc<UdpSocket>,
    sessions: Arc<RwLock<SessionTable>>,
    gateway: Gateway,
    settings: ServerSettings,
    tasks: Vec<JoinHandle<()>>,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        gateway: Gateway,
        settings: ServerSettings,
    ) -> Result<Self, ServerError> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        let local_addr = socket.local_addr()?;
        let relay = settings
            .relay_name
            .clone()
            .unwrap_or_else(|| local_addr.to_string());
        info!("Server listening on {} as relay {}", local_addr, relay);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            sessions: Arc::new(RwLock::new(SessionTable::new(relay, settings.max_sessions))),
            gateway,
            settings,
            tasks: Vec::new(),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    /// Handle that stops [`Server::run`] when sent `ServerMessage::Shutdown`.
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    fn delivery_context(&self) -> DeliveryContext {
        DeliveryContext {
            socket: Arc::clone(&self.socket),
            sessions: Arc::clone(&self.sessions),
            send_timeout: self.settings.send_timeout,
        }
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&mut self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        self.tasks.push(tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match Packet::decode(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(_) => warn!("Failed to deserialize packet from {}", addr),
                    },
                    Err(e) => {
                        // ICMP port-unreachable from a vanished peer surfaces
                        // here on some platforms
                        debug!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }));
    }

    /// Spawns task that closes sessions which stopped talking
    fn spawn_idle_checker(&mut self) {
        let sessions = Arc::clone(&self.sessions);
        let server_tx = self.server_tx.clone();
        let idle_timeout = self.settings.idle_timeout;
        let sweep_interval = self.settings.sweep_interval;

        self.tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);

            loop {
                interval.tick().await;

                let expired = {
                    let mut sessions = sessions.write().await;
                    sessions.expire_idle(idle_timeout)
                };

                for id in expired {
                    if let Err(e) = server_tx.send(ServerMessage::SessionTimeout { id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        }));
    }

    async fn send_packet(socket: &UdpSocket, packet: &Packet, addr: SocketAddr) {
        let result = match packet.encode() {
            Ok(data) => socket.send_to(&data, addr).await.map(|_| ()),
            Err(e) => {
                error!("Failed to encode packet for {}: {}", addr, e);
                return;
            }
        };
        if let Err(e) = result {
            error!("Failed to send packet to {}: {}", addr, e);
        }
    }

    async fn reject(&self, addr: SocketAddr, reason: &str) {
        let packet = Packet::Disconnected {
            reason: reason.to_string(),
        };
        Self::send_packet(&self.socket, &packet, addr).await;
    }

    /// Processes one inbound packet
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => self.handle_connect(client_version, addr).await,

            Packet::Heartbeat { .. } => {
                let known = {
                    let mut sessions = self.sessions.write().await;
                    sessions.touch(addr)
                };
                if known.is_none() {
                    self.reject(addr, "Not connected").await;
                }
            }

            Packet::Action { route, body } => {
                let id = {
                    let mut sessions = self.sessions.write().await;
                    sessions.touch(addr)
                };
                let Some(id) = id else {
                    self.reject(addr, "Not connected").await;
                    return;
                };

                debug!("Action {:?} from {} ({} bytes)", route, id, body.len());

                // Each inbound message runs independently so broadcasts overlap
                let gateway = self.gateway.clone();
                let ctx = self.delivery_context();
                tokio::spawn(async move {
                    let sender = ctx.sender();
                    let reply = gateway.on_message(&route, &body, &sender).await;
                    let packet = Packet::Reply {
                        status: reply.status,
                        body: reply.body,
                    };
                    Self::send_packet(&ctx.socket, &packet, addr).await;
                });
            }

            Packet::Disconnect => {
                let id = {
                    let mut sessions = self.sessions.write().await;
                    let id = sessions.find_by_addr(addr);
                    if let Some(id) = &id {
                        sessions.close(id);
                    }
                    id
                };
                if let Some(id) = id {
                    self.gateway.on_disconnect(&id).await;
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn handle_connect(&mut self, client_version: u32, addr: SocketAddr) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            self.reject(addr, "Protocol version mismatch").await;
            return;
        }

        let opened = {
            let mut sessions = self.sessions.write().await;
            sessions.open(addr)
        };

        let Some(opened) = opened else {
            self.reject(addr, "Server full").await;
            return;
        };

        if let Some(old) = &opened.replaced {
            info!("Replacing session {} from {}", old, addr);
            self.gateway.on_disconnect(old).await;
        }

        let reply = self.gateway.on_connect(&opened.id).await;
        if reply.is_success() {
            let packet = Packet::Connected {
                connection_id: opened.id.to_string(),
            };
            Self::send_packet(&self.socket, &packet, addr).await;
        } else {
            {
                let mut sessions = self.sessions.write().await;
                sessions.close(&opened.id);
            }
            self.reject(addr, &reply.body).await;
        }
    }

    /// Main server loop
    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.spawn_network_receiver();
        self.spawn_idle_checker();

        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
                ServerMessage::SessionTimeout { id } => {
                    info!("Session {} timed out", id);
                    self.gateway.on_disconnect(&id).await;
                }
                ServerMessage::Shutdown => break,
            }
        }

        info!("Server shutting down");
        for task in self.tasks.drain(..) {
            task.abort();
        }
        Ok(())
    }
}
