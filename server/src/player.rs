//! Players, their connections, and request/acknowledge correlation.
//!
//! A [`Player`] wraps one client connection. Besides fire-and-forget
//! notifications it can issue a *request*: a packet that expects one named
//! acknowledgment back from the same connection. The continuation for that
//! request is stored in [`PendingRequests`] and handed back exactly once when
//! the acknowledgment arrives; a second acknowledgment of the same name finds
//! nothing and is ignored.

use crate::round::Continuation;
use log::debug;
use shared::{ConnectionState, Packet, PlayerId, PlayerInfo, SubmittedLink};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub type ConnectionId = u64;

/// Outbound half of a client connection.
///
/// Packets are queued on an unbounded channel drained by the connection's
/// writer task, so sending never blocks the event loop.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    sender: mpsc::UnboundedSender<Packet>,
}

impl Connection {
    pub fn new(id: ConnectionId, sender: mpsc::UnboundedSender<Packet>) -> Self {
        Self { id, sender }
    }

    /// Creates a connection together with the receiver its packets land on.
    pub fn channel(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<Packet>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(id, sender), receiver)
    }

    /// A connection whose receiving end is already gone. Sends on it are
    /// dropped.
    pub fn closed(id: ConnectionId) -> Self {
        let (sender, _) = mpsc::unbounded_channel();
        Self::new(id, sender)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues a packet. Returns false if the connection is already gone;
    /// the disconnect notification for it is on its way.
    pub fn send(&self, packet: Packet) -> bool {
        match self.sender.send(packet) {
            Ok(()) => true,
            Err(e) => {
                debug!("Connection {} closed, dropped {}", self.id, e.0.name());
                false
            }
        }
    }
}

/// Names of the acknowledgments a player can owe the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckKind {
    FinishedLink,
    DoneViewingResults,
}

/// An acknowledgment as received, with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Ack {
    FinishedLink(SubmittedLink),
    DoneViewingResults,
}

impl Ack {
    pub fn kind(&self) -> AckKind {
        match self {
            Ack::FinishedLink(_) => AckKind::FinishedLink,
            Ack::DoneViewingResults => AckKind::DoneViewingResults,
        }
    }
}

#[derive(Debug)]
struct Pending<C> {
    continuation: C,
    issued_at: Instant,
}

/// One-shot continuations keyed by the acknowledgment they wait for.
#[derive(Debug)]
pub struct PendingRequests<C> {
    entries: HashMap<AckKind, Pending<C>>,
}

impl<C> Default for PendingRequests<C> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<C> PendingRequests<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `continuation` for `kind`, returning whatever was waiting
    /// on the same acknowledgment before.
    pub fn register(&mut self, kind: AckKind, continuation: C, now: Instant) -> Option<C> {
        self.entries
            .insert(
                kind,
                Pending {
                    continuation,
                    issued_at: now,
                },
            )
            .map(|pending| pending.continuation)
    }

    /// Takes the continuation waiting on `kind`, if any.
    pub fn fire(&mut self, kind: AckKind) -> Option<C> {
        self.take(kind).map(|(continuation, _)| continuation)
    }

    /// Like [`fire`](Self::fire), also returning when the request was issued.
    pub fn take(&mut self, kind: AckKind) -> Option<(C, Instant)> {
        self.entries
            .remove(&kind)
            .map(|pending| (pending.continuation, pending.issued_at))
    }

    pub fn is_waiting_on(&self, kind: AckKind) -> bool {
        self.entries.contains_key(&kind)
    }

    /// Issue time of the oldest outstanding request.
    pub fn oldest(&self) -> Option<Instant> {
        self.entries.values().map(|pending| pending.issued_at).min()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A member of a game's roster.
#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub state: ConnectionState,
    pub is_admin: bool,
    pub done_viewing_results: bool,
    connection: Connection,
    pending: PendingRequests<Continuation>,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, connection: Connection) -> Self {
        Self {
            id,
            name: name.into(),
            state: ConnectionState::Connected,
            is_admin: false,
            done_viewing_results: false,
            connection,
            pending: PendingRequests::new(),
        }
    }

    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.id,
            name: self.name.clone(),
            is_admin: self.is_admin,
            connection: self.state,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// Queues `packet` for this player. Disconnected players get nothing.
    pub fn send(&self, packet: Packet) {
        if self.is_connected() {
            self.connection.send(packet);
        }
    }

    /// Sends `packet` and waits for `ack` to come back from this player.
    pub fn request(&mut self, packet: Packet, ack: AckKind, continuation: Continuation, now: Instant) {
        self.expect(ack, continuation, now);
        self.send(packet);
    }

    /// Waits for `ack` without sending anything. `issued_at` is when the
    /// request was first made; a retry passes the original time so the
    /// timeout keeps running.
    pub fn expect(&mut self, ack: AckKind, continuation: Continuation, issued_at: Instant) {
        if let Some(previous) = self.pending.register(ack, continuation, issued_at) {
            debug!(
                "Player {} had {:?} waiting on {:?}, replaced",
                self.id, previous, ack
            );
        }
    }

    /// Hands back the continuation waiting on `ack`. Later calls for the
    /// same acknowledgment return `None` until a new request is made.
    pub fn acknowledge(&mut self, ack: AckKind) -> Option<Continuation> {
        self.pending.fire(ack)
    }

    /// Like [`acknowledge`](Self::acknowledge), also returning when the
    /// request was issued.
    pub fn take_request(&mut self, ack: AckKind) -> Option<(Continuation, Instant)> {
        self.pending.take(ack)
    }

    pub fn is_waiting_on(&self, ack: AckKind) -> bool {
        self.pending.is_waiting_on(ack)
    }

    /// Outstanding requests stay registered: a replacement resumes them.
    /// The outbound channel is released so the old socket's writer can
    /// finish and close it.
    pub fn mark_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.connection = Connection::closed(self.connection.id());
    }

    /// Points this roster entry at a new connection, keeping its id.
    pub fn rebind(&mut self, name: impl Into<String>, connection: Connection) {
        self.name = name.into();
        self.connection = connection;
        self.state = ConnectionState::Connected;
        self.done_viewing_results = false;
        self.pending.clear();
    }

    /// True if this player is connected but has sat on a request longer
    /// than `timeout`.
    pub fn is_overdue(&self, timeout: Duration, now: Instant) -> bool {
        self.is_connected()
            && self
                .pending
                .oldest()
                .is_some_and(|issued| now.saturating_duration_since(issued) > timeout)
    }
}

/// Ordered list of the players in a game.
#[derive(Debug, Default)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, player: Player) {
        self.players.push(player);
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == id)?;
        Some(self.players.remove(index))
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id).collect()
    }

    pub fn infos(&self) -> Vec<PlayerInfo> {
        self.players.iter().map(Player::info).collect()
    }

    pub fn any_connected(&self) -> bool {
        self.players.iter().any(Player::is_connected)
    }

    /// Sends a copy of `packet` to every connected player.
    pub fn broadcast(&self, packet: &Packet) {
        for player in &self.players {
            player.send(packet.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
