//! Server network layer handling TCP connections and the game event loop

use crate::client_manager::ClientManager;
use crate::error::SessionError;
use crate::player::{Ack, ConnectionId};
use crate::registry::{Registry, DEV_GAME_CODE};
use crate::session::SessionStatus;
use log::{debug, error, info, warn};
use shared::framing::{read_packet, write_packet};
use shared::{Packet, PlayerId};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Runtime settings for [`Server`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How long a player may sit on a request before being kicked.
    /// `None` waits forever.
    pub request_timeout: Option<Duration>,
    pub sweep_interval: Duration,
    /// Pre-creates a game with a well-known code
    pub dev_mode: bool,
    pub max_clients: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout: Some(Duration::from_secs(300)),
            sweep_interval: Duration::from_millis(1000),
            dev_mode: false,
            max_clients: None,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    NewConnection {
        stream: TcpStream,
        addr: SocketAddr,
    },
    PacketReceived {
        connection: ConnectionId,
        packet: Packet,
    },
    ConnectionClosed {
        connection: ConnectionId,
    },
    Shutdown,
}

/// Cloneable handle for stopping a running [`Server`]
#[derive(Debug, Clone)]
pub struct ServerHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ServerHandle {
    /// Asks the event loop to stop. Returns false if it already has.
    pub fn shutdown(&self) -> bool {
        self.server_tx.send(ServerMessage::Shutdown).is_ok()
    }
}

/// Game server: accepts connections and runs every game on one event loop
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    config: ServerConfig,
    registry: Registry,
    clients: ClientManager,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(config.addr()).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let mut registry = Registry::new();
        if config.dev_mode {
            registry.create_session(Some(DEV_GAME_CODE));
            info!("Dev mode: game {} is open", DEV_GAME_CODE);
        }

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: ClientManager::new(config.max_clients),
            config,
            registry,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Spawns task that accepts incoming connections
    fn spawn_acceptor(&self, listener: TcpListener) -> JoinHandle<()> {
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if let Err(e) = server_tx.send(ServerMessage::NewConnection { stream, addr })
                        {
                            error!("Failed to send connection to main loop: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        })
    }

    /// Spawns task that decodes frames from one connection
    fn spawn_reader(&self, connection: ConnectionId, mut reader: OwnedReadHalf) -> JoinHandle<()> {
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match read_packet(&mut reader).await {
                    Ok(Some(packet)) => {
                        if server_tx
                            .send(ServerMessage::PacketReceived { connection, packet })
                            .is_err()
                        {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Connection {}: {}", connection, e);
                        break;
                    }
                }
            }
            let _ = server_tx.send(ServerMessage::ConnectionClosed { connection });
        })
    }

    /// Spawns task that writes queued packets to one connection
    ///
    /// Ends when every sender is dropped, a write fails, or after a
    /// `Kicked` packet has gone out.
    fn spawn_writer(
        connection: ConnectionId,
        mut writer: OwnedWriteHalf,
        mut outgoing: mpsc::UnboundedReceiver<Packet>,
    ) {
        tokio::spawn(async move {
            while let Some(packet) = outgoing.recv().await {
                let last = matches!(packet, Packet::Kicked { .. });
                if let Err(e) = write_packet(&mut writer, &packet).await {
                    debug!("Connection {}: write failed: {}", connection, e);
                    break;
                }
                if last {
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });
    }

    fn accept_connection(&mut self, stream: TcpStream, addr: SocketAddr) {
        let Some((connection, outgoing)) = self.clients.add_client(addr) else {
            warn!("Refusing connection from {}: server full", addr);
            tokio::spawn(async move {
                let mut stream = stream;
                let packet = Packet::Rejected {
                    reason: "Server full".to_string(),
                };
                let _ = write_packet(&mut stream, &packet).await;
            });
            return;
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Connection {}: set_nodelay failed: {}", connection.id(), e);
        }
        let (reader, writer) = stream.into_split();
        Self::spawn_writer(connection.id(), writer, outgoing);
        let reader = self.spawn_reader(connection.id(), reader);
        self.clients.set_reader(connection.id(), reader);
    }

    fn send_to(&self, connection: ConnectionId, packet: Packet) {
        if let Some(sender) = self.clients.sender(connection) {
            sender.send(packet);
        }
    }

    fn reject(&self, connection: ConnectionId, err: &SessionError) {
        warn!("Connection {}: {}", connection, err);
        self.send_to(
            connection,
            Packet::Rejected {
                reason: err.to_string(),
            },
        );
    }

    /// Dispatches one packet from a client
    fn handle_packet(&mut self, connection: ConnectionId, packet: Packet) {
        let now = Instant::now();

        match packet {
            Packet::CreateGame { name } => {
                if self.already_joined(connection) {
                    return;
                }
                let Some(sender) = self.clients.sender(connection) else {
                    return;
                };
                let session = self.registry.create_session(None);
                let code = session.code().to_string();
                match session.add_player(name, sender) {
                    Ok(you) => {
                        self.clients.bind(connection, &code, you.id);
                    }
                    Err(e) => self.reject(connection, &e),
                }
            }

            Packet::JoinGame { code, name } => {
                if self.already_joined(connection) {
                    return;
                }
                let Some(sender) = self.clients.sender(connection) else {
                    return;
                };
                let Some(session) = self.registry.find_session_mut(&code) else {
                    self.reject(connection, &SessionError::UnknownGame(code));
                    return;
                };
                match session.add_player(name, sender) {
                    Ok(you) => {
                        let code = session.code().to_string();
                        self.clients.bind(connection, &code, you.id);
                    }
                    Err(SessionError::RoundInProgress) => {
                        let packet = Packet::ReplacementNeeded {
                            code: session.code().to_string(),
                            disconnected: session.replaceable_players(),
                        };
                        self.send_to(connection, packet);
                    }
                    Err(e) => self.reject(connection, &e),
                }
            }

            Packet::ReplacePlayer {
                code,
                name,
                player_id,
            } => {
                if self.already_joined(connection) {
                    return;
                }
                let Some(sender) = self.clients.sender(connection) else {
                    return;
                };
                let Some(session) = self.registry.find_session_mut(&code) else {
                    self.reject(connection, &SessionError::UnknownGame(code));
                    return;
                };
                match session.replace_player(player_id, &name, sender, now) {
                    Ok(you) => {
                        let code = session.code().to_string();
                        self.clients.bind(connection, &code, you.id);
                    }
                    Err(e) => self.reject(connection, &e),
                }
            }

            Packet::StartRound => {
                let Some((code, player_id)) = self.member(connection) else {
                    return;
                };
                let result = match self.registry.find_session_mut(&code) {
                    Some(session) => session.start_round(player_id, now),
                    None => Err(SessionError::UnknownGame(code)),
                };
                if let Err(e) = result {
                    self.reject(connection, &e);
                }
            }

            Packet::FinishedLink { link } => {
                self.acknowledge(connection, Ack::FinishedLink(link), now);
            }

            Packet::DoneViewingResults => {
                self.acknowledge(connection, Ack::DoneViewingResults, now);
            }

            Packet::Leave => {
                info!("Connection {} left", connection);
                self.disconnect(connection);
            }

            other => {
                warn!(
                    "Unexpected packet {} from connection {}",
                    other.name(),
                    connection
                );
            }
        }
    }

    fn already_joined(&self, connection: ConnectionId) -> bool {
        match self.clients.membership(connection) {
            Some(membership) => {
                warn!(
                    "Connection {} is already player {} in game {}",
                    connection, membership.player_id, membership.code
                );
                self.send_to(
                    connection,
                    Packet::Rejected {
                        reason: "already in a game".to_string(),
                    },
                );
                true
            }
            None => false,
        }
    }

    fn member(&self, connection: ConnectionId) -> Option<(String, PlayerId)> {
        let membership = self.clients.membership(connection);
        if membership.is_none() {
            warn!("Connection {} has not joined a game", connection);
        }
        membership.map(|m| (m.code.clone(), m.player_id))
    }

    fn acknowledge(&mut self, connection: ConnectionId, ack: Ack, now: Instant) {
        let Some((code, player_id)) = self.member(connection) else {
            return;
        };
        let Some(session) = self.registry.find_session_mut(&code) else {
            return;
        };
        // Malformed contributions are answered by the session itself.
        if let Err(e) = session.acknowledge(player_id, ack, now) {
            debug!("Game {}: player {}: {}", code, player_id, e);
        }
    }

    /// Drops a connection and tells its game the player has gone
    fn disconnect(&mut self, connection: ConnectionId) {
        if let Some(membership) = self.clients.remove_client(connection) {
            self.leave_session(&membership.code, membership.player_id);
        }
    }

    fn leave_session(&mut self, code: &str, player_id: PlayerId) {
        let Some(session) = self.registry.find_session_mut(code) else {
            return;
        };
        match session.handle_disconnect(player_id) {
            Ok(SessionStatus::Empty) => {
                self.registry.remove_session(code);
            }
            Ok(SessionStatus::Active) => {}
            Err(e) => warn!("Game {}: {}", code, e),
        }
    }

    /// Kicks every player who has left a request unanswered too long
    fn expire_overdue(&mut self, timeout: Duration, now: Instant) {
        let overdue: Vec<(String, PlayerId)> = self
            .registry
            .sessions()
            .flat_map(|session| {
                session
                    .overdue_players(timeout, now)
                    .into_iter()
                    .map(move |id| (session.code().to_string(), id))
            })
            .collect();

        for (code, player_id) in overdue {
            warn!(
                "Game {}: player {} did not answer within {:?}",
                code, player_id, timeout
            );
            match self.clients.find_by_member(&code, player_id) {
                Some(connection) => {
                    self.send_to(
                        connection,
                        Packet::Kicked {
                            reason: "took too long to answer".to_string(),
                        },
                    );
                    self.disconnect(connection);
                }
                None => self.leave_session(&code, player_id),
            }
        }
    }

    /// Main server loop
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = self
            .listener
            .take()
            .ok_or("server is already running")?;
        let acceptor = self.spawn_acceptor(listener);

        let timeout = self.config.request_timeout;
        let mut sweep_interval = interval(self.config.sweep_interval);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::NewConnection { stream, addr }) => {
                            self.accept_connection(stream, addr);
                        },
                        Some(ServerMessage::PacketReceived { connection, packet }) => {
                            debug!("Connection {} sent {}", connection, packet.name());
                            self.handle_packet(connection, packet);
                        },
                        Some(ServerMessage::ConnectionClosed { connection }) => {
                            self.disconnect(connection);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = sweep_interval.tick(), if timeout.is_some() => {
                    if let Some(timeout) = timeout {
                        self.expire_overdue(timeout, Instant::now());
                    }
                },
            }
        }

        acceptor.abort();
        for connection in self.clients.ids() {
            self.clients.remove_client(connection);
        }
        Ok(())
    }
}
