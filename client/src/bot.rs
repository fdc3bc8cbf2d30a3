//! Decision logic of the auto-playing client.
//!
//! [`Bot`] never touches the network. It is fed one server packet at a time
//! and answers with a [`BotAction`], which keeps every decision testable
//! without a socket.

use log::{debug, info, warn};
use shared::{LinkKind, Packet, PlayerInfo, SubmittedLink};
use std::time::Duration;

const SKETCH_PREFIX: &str = "sketch of ";

/// Runtime settings for one bot
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub server: String,
    pub name: String,
    /// Game to join; `None` creates a new one.
    pub code: Option<String>,
    /// Player count at which an admin bot starts the round
    pub min_players: usize,
    /// Rounds to play before leaving
    pub rounds: u32,
    /// Delay before each contribution
    pub think: Duration,
    /// Take over a disconnected player's slot when the game is mid-round
    pub replace: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:8080".to_string(),
            name: "bot".to_string(),
            code: None,
            min_players: 3,
            rounds: 1,
            think: Duration::ZERO,
            replace: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BotAction {
    /// Send this packet to the server.
    Reply(Packet),
    /// Nothing to do until the next packet.
    Idle,
    /// Leave the game.
    Finished,
}

/// What a bot did before it left
#[derive(Debug, Clone, PartialEq)]
pub struct BotReport {
    pub player: Option<PlayerInfo>,
    pub rounds_played: u32,
    pub chains_seen: usize,
}

pub struct Bot {
    config: BotConfig,
    code: Option<String>,
    me: Option<PlayerInfo>,
    players: Vec<PlayerInfo>,
    in_round: bool,
    start_requested: bool,
    rounds_played: u32,
    chains_seen: usize,
}

impl Bot {
    pub fn new(config: BotConfig) -> Self {
        Self {
            code: config.code.clone(),
            config,
            me: None,
            players: Vec::new(),
            in_round: false,
            start_requested: false,
            rounds_played: 0,
            chains_seen: 0,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// The first packet to send after connecting.
    pub fn opening_packet(&self) -> Packet {
        match &self.code {
            Some(code) => Packet::JoinGame {
                code: code.clone(),
                name: self.config.name.clone(),
            },
            None => Packet::CreateGame {
                name: self.config.name.clone(),
            },
        }
    }

    pub fn me(&self) -> Option<&PlayerInfo> {
        self.me.as_ref()
    }

    pub fn report(&self) -> BotReport {
        BotReport {
            player: self.me.clone(),
            rounds_played: self.rounds_played,
            chains_seen: self.chains_seen,
        }
    }

    pub fn handle(&mut self, packet: Packet) -> BotAction {
        match packet {
            Packet::Joined { code, you } => {
                info!("{} joined game {} as player {}", you.name, code, you.id);
                self.code = Some(code);
                self.me = Some(you);
                BotAction::Idle
            }

            Packet::UpdatePlayerList { players } => {
                self.players = players;
                if let Some(me) = &mut self.me {
                    if let Some(updated) = self.players.iter().find(|p| p.id == me.id) {
                        *me = updated.clone();
                    }
                }
                self.maybe_start_round()
            }

            Packet::NextLink {
                chain_id,
                link,
                count,
                final_count,
            } => {
                self.in_round = true;
                self.start_requested = false;
                debug!(
                    "Chain {}: contribution {} of {} after a {}",
                    chain_id, count, final_count, link.kind
                );
                let reply = match link.kind {
                    LinkKind::Word => {
                        SubmittedLink::new(LinkKind::Drawing, format!("{}{}", SKETCH_PREFIX, link.data))
                    }
                    LinkKind::Drawing => SubmittedLink::new(LinkKind::Word, guess(&link.data)),
                };
                BotAction::Reply(Packet::FinishedLink { link: reply })
            }

            Packet::ShowWaitingList | Packet::UpdateWaitingList { .. } => BotAction::Idle,

            Packet::ViewResults { chains } => {
                self.chains_seen += chains.len();
                for chain in &chains {
                    let first = chain.links.first().map(|l| l.data.as_str());
                    let last = chain.links.last().map(|l| l.data.as_str());
                    debug!("{}: {:?} became {:?}", chain.owner.name, first, last);
                }
                BotAction::Reply(Packet::DoneViewingResults)
            }

            Packet::RoundOver => {
                self.in_round = false;
                self.start_requested = false;
                self.rounds_played += 1;
                info!("Round over ({} of {})", self.rounds_played, self.config.rounds);
                if self.rounds_played >= self.config.rounds {
                    BotAction::Finished
                } else {
                    BotAction::Idle
                }
            }

            Packet::ReplacementNeeded { code, disconnected } => {
                match disconnected.first() {
                    Some(slot) if self.config.replace => {
                        info!("Taking over {}'s slot in game {}", slot.name, code);
                        BotAction::Reply(Packet::ReplacePlayer {
                            code,
                            name: self.config.name.clone(),
                            player_id: slot.id,
                        })
                    }
                    _ => {
                        info!("Game {} is mid-round, giving up", code);
                        BotAction::Finished
                    }
                }
            }

            Packet::Rejected { reason } => {
                warn!("Server rejected a request: {}", reason);
                if self.me.is_none() {
                    BotAction::Finished
                } else {
                    BotAction::Idle
                }
            }

            Packet::Kicked { reason } => {
                warn!("Kicked: {}", reason);
                BotAction::Finished
            }

            other => {
                warn!("Unexpected packet {} from server", other.name());
                BotAction::Idle
            }
        }
    }

    fn maybe_start_round(&mut self) -> BotAction {
        let is_admin = self.me.as_ref().is_some_and(|me| me.is_admin);
        let connected = self.players.iter().filter(|p| p.is_connected()).count();
        if is_admin && !self.in_round && !self.start_requested && connected >= self.config.min_players
        {
            info!("{} players present, starting the round", connected);
            self.start_requested = true;
            return BotAction::Reply(Packet::StartRound);
        }
        BotAction::Idle
    }
}

fn guess(drawing: &str) -> String {
    drawing
        .strip_prefix(SKETCH_PREFIX)
        .unwrap_or(drawing)
        .to_string()
}
