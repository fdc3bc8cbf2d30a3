//! Connection tracking for the game server
//!
//! This module keeps the server-side table of live TCP connections:
//! - Connection lifecycle (accept, join a game, disconnect)
//! - Which game and player slot each connection speaks for
//! - Ownership of the per-connection reader task so it can be stopped
//! - Optional capacity limit
//!
//! Game state never refers to connections by address. Once a connection
//! joins a game it is bound to a `(code, player id)` membership and every
//! packet it sends is routed through that.

use crate::player::{Connection, ConnectionId};
use log::info;
use shared::{Packet, PlayerId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// The game and player slot a connection is playing as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub code: String,
    pub player_id: PlayerId,
}

/// One accepted TCP connection
#[derive(Debug)]
pub struct Client {
    /// Unique connection identifier assigned by the server
    pub id: ConnectionId,
    /// Peer address, for logging
    pub addr: SocketAddr,
    /// When the connection was accepted
    pub connected_at: Instant,
    /// Set once the connection has created, joined or replaced into a game
    pub membership: Option<Membership>,
    connection: Connection,
    reader: Option<JoinHandle<()>>,
}

impl Client {
    pub fn new(id: ConnectionId, addr: SocketAddr, connection: Connection) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            membership: None,
            connection,
            reader: None,
        }
    }
}

/// Manages all live connections
///
/// The table is owned by the server's event loop. Reader and writer tasks
/// never touch it; they only forward messages back to the loop.
pub struct ClientManager {
    /// Connected clients indexed by their connection ID
    clients: HashMap<ConnectionId, Client>,
    /// Next available connection ID
    next_client_id: ConnectionId,
    /// Maximum number of concurrent connections, if limited
    max_clients: Option<usize>,
}

impl ClientManager {
    /// Creates an empty table. Connection IDs start from 1.
    pub fn new(max_clients: Option<usize>) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a freshly accepted connection
    ///
    /// Returns the new connection's outbound handle together with the
    /// receiver its writer task should drain, or None if the server is full.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
    ) -> Option<(Connection, mpsc::UnboundedReceiver<Packet>)> {
        if self
            .max_clients
            .is_some_and(|max| self.clients.len() >= max)
        {
            return None;
        }

        let id = self.next_client_id;
        self.next_client_id += 1;

        let (connection, receiver) = Connection::channel(id);
        info!("Connection {} accepted from {}", id, addr);
        self.clients
            .insert(id, Client::new(id, addr, connection.clone()));

        Some((connection, receiver))
    }

    /// Hands the connection's reader task to the table so removal can stop it.
    pub fn set_reader(&mut self, id: ConnectionId, reader: JoinHandle<()>) {
        match self.clients.get_mut(&id) {
            Some(client) => client.reader = Some(reader),
            None => reader.abort(),
        }
    }

    /// Forgets a connection and stops its reader task
    ///
    /// Returns the game membership the connection held, if any, so the
    /// caller can tell the session its player has gone.
    pub fn remove_client(&mut self, id: ConnectionId) -> Option<Membership> {
        let client = self.clients.remove(&id)?;
        if let Some(reader) = client.reader {
            reader.abort();
        }
        info!("Connection {} from {} closed", id, client.addr);
        client.membership
    }

    /// Records that `id` now speaks for `player_id` in game `code`.
    pub fn bind(&mut self, id: ConnectionId, code: &str, player_id: PlayerId) -> bool {
        match self.clients.get_mut(&id) {
            Some(client) => {
                client.membership = Some(Membership {
                    code: code.to_string(),
                    player_id,
                });
                true
            }
            None => false,
        }
    }

    pub fn membership(&self, id: ConnectionId) -> Option<&Membership> {
        self.clients.get(&id)?.membership.as_ref()
    }

    /// Finds the connection currently playing as `player_id` in `code`.
    pub fn find_by_member(&self, code: &str, player_id: PlayerId) -> Option<ConnectionId> {
        self.clients
            .values()
            .find(|client| {
                client
                    .membership
                    .as_ref()
                    .is_some_and(|m| m.player_id == player_id && m.code == code)
            })
            .map(|client| client.id)
    }

    /// Outbound handle for a connection
    pub fn sender(&self, id: ConnectionId) -> Option<Connection> {
        self.clients.get(&id).map(|client| client.connection.clone())
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.clients.keys().copied().collect()
    }

    /// Returns the number of live connections
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if nobody is connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(Some(5));
        assert_eq!(manager.max_clients, Some(5));
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(None);

        let (first, _rx1) = manager.add_client(test_addr()).unwrap();
        let (second, _rx2) = manager.add_client(test_addr2()).unwrap();

        assert_eq!(first.id(), 1);
        assert_eq!(second.id(), 2);
        assert_eq!(manager.len(), 2);
        assert!(manager.membership(1).is_none());
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(Some(1));

        assert!(manager.add_client(test_addr()).is_some());
        assert!(manager.add_client(test_addr2()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_sender_reaches_writer_channel() {
        let mut manager = ClientManager::new(None);
        let (connection, mut rx) = manager.add_client(test_addr()).unwrap();

        let sender = manager.sender(connection.id()).unwrap();
        assert!(sender.send(Packet::RoundOver));
        assert_eq!(rx.try_recv().unwrap(), Packet::RoundOver);
        assert!(manager.sender(99).is_none());
    }

    #[test]
    fn test_bind_and_find_member() {
        let mut manager = ClientManager::new(None);
        let (a, _rx1) = manager.add_client(test_addr()).unwrap();
        let (b, _rx2) = manager.add_client(test_addr2()).unwrap();

        assert!(manager.bind(a.id(), "abcd", 1));
        assert!(manager.bind(b.id(), "abcd", 2));
        assert!(!manager.bind(42, "abcd", 3));

        assert_eq!(manager.find_by_member("abcd", 2), Some(b.id()));
        assert_eq!(manager.find_by_member("wxyz", 2), None);
        assert_eq!(manager.membership(a.id()).unwrap().player_id, 1);
    }

    #[test]
    fn test_remove_client_returns_membership() {
        let mut manager = ClientManager::new(None);
        let (a, _rx1) = manager.add_client(test_addr()).unwrap();
        let (b, _rx2) = manager.add_client(test_addr2()).unwrap();
        manager.bind(a.id(), "abcd", 7);

        assert_eq!(
            manager.remove_client(a.id()),
            Some(Membership {
                code: "abcd".to_string(),
                player_id: 7
            })
        );
        assert_eq!(manager.remove_client(b.id()), None);
        assert_eq!(manager.remove_client(a.id()), None);
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_remove_client_stops_reader() {
        let mut manager = ClientManager::new(None);
        let (connection, _rx) = manager.add_client(test_addr()).unwrap();

        let (alive_tx, alive_rx) = oneshot::channel::<()>();
        let reader = tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<()>().await;
        });
        manager.set_reader(connection.id(), reader);

        manager.remove_client(connection.id());
        assert!(alive_rx.await.is_err());
    }
}
