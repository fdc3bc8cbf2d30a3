//! Wire protocol shared by the relay game server and its clients.
//!
//! Every message in either direction is a [`Packet`]. Packets are encoded
//! with bincode and carried in length-delimited frames (see [`framing`]).

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod framing;

/// Player identifier, unique within one game for that game's lifetime.
pub type PlayerId = u32;

/// Chain identifier, `0..N` within one round.
pub type ChainId = u32;

/// Length of generated game codes.
pub const GAME_CODE_LENGTH: usize = 4;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// Snapshot of a player as other players see it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub is_admin: bool,
    pub connection: ConnectionState,
}

impl PlayerInfo {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    Word,
    Drawing,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::Word => "word",
            LinkKind::Drawing => "drawing",
        }
    }

    /// Parses the type a client declared for its contribution.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "word" => Some(LinkKind::Word),
            "drawing" => Some(LinkKind::Drawing),
            _ => None,
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single contribution to a chain. Immutable once created.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Link {
    pub kind: LinkKind,
    /// The contributor as they were when the link was added.
    pub player: PlayerInfo,
    /// Opaque payload: the word itself, or an encoded drawing.
    pub data: String,
}

impl Link {
    pub fn word(player: PlayerInfo, data: impl Into<String>) -> Self {
        Self {
            kind: LinkKind::Word,
            player,
            data: data.into(),
        }
    }

    pub fn drawing(player: PlayerInfo, data: impl Into<String>) -> Self {
        Self {
            kind: LinkKind::Drawing,
            player,
            data: data.into(),
        }
    }
}

/// A contribution as submitted by a client.
///
/// `kind` stays a string on the wire so the server can reject types it
/// does not understand instead of failing the whole frame.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SubmittedLink {
    pub kind: String,
    pub data: String,
}

impl SubmittedLink {
    pub fn new(kind: LinkKind, data: impl Into<String>) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            data: data.into(),
        }
    }
}

/// Full history of one chain, sent when a round's results are shown.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChainSummary {
    pub id: ChainId,
    pub owner: PlayerInfo,
    pub links: Vec<Link>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Client to server
    CreateGame {
        name: String,
    },
    JoinGame {
        code: String,
        name: String,
    },
    ReplacePlayer {
        code: String,
        name: String,
        player_id: PlayerId,
    },
    StartRound,
    FinishedLink {
        link: SubmittedLink,
    },
    DoneViewingResults,
    Leave,

    // Server to client
    Joined {
        code: String,
        you: PlayerInfo,
    },
    ReplacementNeeded {
        code: String,
        disconnected: Vec<PlayerInfo>,
    },
    Rejected {
        reason: String,
    },
    UpdatePlayerList {
        players: Vec<PlayerInfo>,
    },
    /// `count` is the chain's current length; `final_count` is how many
    /// contributions the chain collects over the whole round.
    NextLink {
        chain_id: ChainId,
        link: Link,
        count: u32,
        final_count: u32,
    },
    ShowWaitingList,
    UpdateWaitingList {
        not_finished: Vec<PlayerInfo>,
        disconnected: Vec<PlayerInfo>,
    },
    ViewResults {
        chains: Vec<ChainSummary>,
    },
    RoundOver,
    Kicked {
        reason: String,
    },
}

impl Packet {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Packet::CreateGame { .. } => "create_game",
            Packet::JoinGame { .. } => "join_game",
            Packet::ReplacePlayer { .. } => "replace_player",
            Packet::StartRound => "start_round",
            Packet::FinishedLink { .. } => "finished_link",
            Packet::DoneViewingResults => "done_viewing_results",
            Packet::Leave => "leave",
            Packet::Joined { .. } => "joined",
            Packet::ReplacementNeeded { .. } => "replacement_needed",
            Packet::Rejected { .. } => "rejected",
            Packet::UpdatePlayerList { .. } => "update_player_list",
            Packet::NextLink { .. } => "next_link",
            Packet::ShowWaitingList => "show_waiting_list",
            Packet::UpdateWaitingList { .. } => "update_waiting_list",
            Packet::ViewResults { .. } => "view_results",
            Packet::RoundOver => "round_over",
            Packet::Kicked { .. } => "kicked",
        }
    }
}
