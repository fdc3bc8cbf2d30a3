//! One game: its roster, admin, and the round currently being played.
//!
//! A session is only ever touched from the server's event loop, one event at
//! a time, so nothing here locks. Operations that can leave the game without
//! any connected players report [`SessionStatus::Empty`]; the registry then
//! drops the session.

use crate::error::SessionError;
use crate::player::{Ack, AckKind, Connection, Player, Roster};
use crate::round::{Continuation, Round, RoundProgress};
use crate::words::{RandomWords, WordSource};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{ConnectionState, Packet, PlayerId, PlayerInfo};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    RoundInProgress,
    ViewingResults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    /// No connected players remain; the session should be torn down.
    Empty,
}

pub struct Session {
    code: String,
    roster: Roster,
    phase: Phase,
    round: Option<Round>,
    next_player_id: PlayerId,
    next_round_number: u32,
    words: Box<dyn WordSource>,
    rng: StdRng,
}

impl Session {
    pub fn new(code: impl Into<String>) -> Self {
        Self::with_sources(code, Box::new(RandomWords::new()), StdRng::from_entropy())
    }

    /// Creates a session with explicit word and shuffle sources.
    pub fn with_sources(code: impl Into<String>, words: Box<dyn WordSource>, rng: StdRng) -> Self {
        Self {
            code: code.into(),
            roster: Roster::new(),
            phase: Phase::Lobby,
            round: None,
            next_player_id: 1,
            next_round_number: 1,
            words,
            rng,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.roster.get(id)
    }

    pub fn players(&self) -> Vec<PlayerInfo> {
        self.roster.infos()
    }

    pub fn admin(&self) -> Option<&Player> {
        self.roster.iter().find(|p| p.is_admin)
    }

    pub fn status(&self) -> SessionStatus {
        if self.roster.any_connected() {
            SessionStatus::Active
        } else {
            SessionStatus::Empty
        }
    }

    /// Adds a new player to the lobby. The first player becomes admin.
    pub fn add_player(
        &mut self,
        name: impl Into<String>,
        connection: Connection,
    ) -> Result<PlayerInfo, SessionError> {
        if self.phase == Phase::RoundInProgress {
            return Err(SessionError::RoundInProgress);
        }

        let id = self.next_player_id;
        self.next_player_id += 1;

        let mut player = Player::new(id, name, connection);
        if self.roster.is_empty() {
            player.is_admin = true;
        }
        let info = player.info();
        player.send(Packet::Joined {
            code: self.code.clone(),
            you: info.clone(),
        });

        info!("{}: {} joined as player {}", self.code, info.name, id);
        self.roster.push(player);
        self.send_updated_player_list();
        Ok(info)
    }

    /// Reacts to a player's connection closing.
    ///
    /// Outside a round the player is removed. During a round they stay in
    /// the roster, marked disconnected, and their slot waits for a
    /// replacement so the chain they hold is not lost.
    pub fn handle_disconnect(&mut self, player_id: PlayerId) -> Result<SessionStatus, SessionError> {
        let player = self
            .roster
            .get_mut(player_id)
            .ok_or(SessionError::UnknownPlayer(player_id))?;
        if !player.is_connected() {
            return Ok(self.status());
        }

        player.mark_disconnected();
        let was_admin = player.is_admin;
        player.is_admin = false;
        info!("{}: player {} ({}) disconnected", self.code, player_id, player.name);

        match self.phase {
            Phase::RoundInProgress => {
                if let Some(round) = self.round.as_mut() {
                    round.find_replacement_for(&self.roster, player_id);
                }
            }
            Phase::Lobby | Phase::ViewingResults => {
                self.roster.remove(player_id);
            }
        }

        if was_admin {
            self.promote_admin();
        }

        // Someone leaving may be the last acknowledgment the results screen
        // was waiting for.
        if self.phase == Phase::ViewingResults {
            if let Some(round) = self.round.as_mut() {
                let progress = round.check_end(&mut self.roster);
                self.apply_progress(progress);
            }
        }

        if self.status() == SessionStatus::Empty {
            info!("{}: no connected players left", self.code);
            return Ok(SessionStatus::Empty);
        }

        self.send_updated_player_list();
        Ok(SessionStatus::Active)
    }

    fn promote_admin(&mut self) {
        if self.roster.iter().any(|p| p.is_admin && p.is_connected()) {
            return;
        }
        if let Some(player) = self.roster.iter_mut().find(|p| p.is_connected()) {
            player.is_admin = true;
            info!("{}: {} is now admin", self.code, player.name);
        }
    }

    /// Starts a round with everyone currently in the lobby.
    pub fn start_round(&mut self, requester: PlayerId, now: Instant) -> Result<(), SessionError> {
        if self.roster.is_empty() {
            return Err(SessionError::EmptySession);
        }
        let player = self
            .roster
            .get(requester)
            .ok_or(SessionError::UnknownPlayer(requester))?;
        if !player.is_admin {
            return Err(SessionError::NotAdmin(requester));
        }
        if self.phase != Phase::Lobby {
            return Err(SessionError::RoundInProgress);
        }

        let number = self.next_round_number;
        self.next_round_number += 1;

        let round = Round::start(
            number,
            &mut self.roster,
            self.words.as_mut(),
            &mut self.rng,
            now,
        );
        self.phase = Phase::RoundInProgress;
        self.round = Some(round);
        Ok(())
    }

    /// Delivers an acknowledgment from a player to whatever request of
    /// theirs is waiting on it. Acknowledgments nobody is waiting for are
    /// ignored.
    pub fn acknowledge(
        &mut self,
        player_id: PlayerId,
        ack: Ack,
        now: Instant,
    ) -> Result<(), SessionError> {
        let player = self
            .roster
            .get_mut(player_id)
            .ok_or(SessionError::UnknownPlayer(player_id))?;
        let Some((continuation, issued_at)) = player.take_request(ack.kind()) else {
            debug!(
                "{}: stray {:?} from player {}",
                self.code,
                ack.kind(),
                player_id
            );
            return Ok(());
        };
        let Some(round) = self.round.as_mut() else {
            debug!("{}: {:?} arrived with no round", self.code, continuation);
            return Ok(());
        };

        let progress = match (continuation, ack) {
            (Continuation::FinishLink { chain_id }, Ack::FinishedLink(link)) => {
                match round.receive_link(&mut self.roster, player_id, chain_id, link, now) {
                    Ok(progress) => progress,
                    Err(err) => {
                        warn!("{}: player {}: {}", self.code, player_id, err);
                        // Leave the request open so the client can resubmit,
                        // still timed from when it was first issued.
                        if let Some(player) = self.roster.get_mut(player_id) {
                            player.expect(AckKind::FinishedLink, continuation, issued_at);
                            player.send(Packet::Rejected {
                                reason: err.to_string(),
                            });
                        }
                        return Err(err);
                    }
                }
            }
            (Continuation::DoneViewing, Ack::DoneViewingResults) => {
                round.done_viewing(&mut self.roster, player_id)
            }
            (continuation, ack) => {
                warn!(
                    "{}: {:?} cannot resume {:?}",
                    self.code,
                    ack.kind(),
                    continuation
                );
                return Ok(());
            }
        };

        self.apply_progress(progress);
        Ok(())
    }

    fn apply_progress(&mut self, progress: RoundProgress) {
        match progress {
            RoundProgress::Collecting => {}
            RoundProgress::ViewingResults => self.phase = Phase::ViewingResults,
            RoundProgress::Over => {
                self.phase = Phase::Lobby;
                self.round = None;
                self.send_updated_player_list();
            }
        }
    }

    /// Slots a newcomer could take over in the running round.
    pub fn replaceable_players(&self) -> Vec<PlayerInfo> {
        match (&self.round, self.phase) {
            (Some(round), Phase::RoundInProgress) => round.disconnected().to_vec(),
            _ => Vec::new(),
        }
    }

    /// Binds a new connection to a disconnected player's slot mid-round.
    pub fn replace_player(
        &mut self,
        player_id: PlayerId,
        name: &str,
        connection: Connection,
        now: Instant,
    ) -> Result<PlayerInfo, SessionError> {
        if self.phase != Phase::RoundInProgress {
            return Err(SessionError::NotReplaceable(player_id));
        }
        let round = self.round.as_mut().ok_or(SessionError::NoActiveRound)?;
        if !round.can_be_replaced(player_id) {
            return Err(SessionError::NotReplaceable(player_id));
        }

        let is_admin = self.roster.get(player_id).is_some_and(|p| p.is_admin);
        let you = PlayerInfo {
            id: player_id,
            name: name.to_string(),
            is_admin,
            connection: ConnectionState::Connected,
        };
        connection.send(Packet::Joined {
            code: self.code.clone(),
            you: you.clone(),
        });

        let progress = round.replace_player(&mut self.roster, player_id, name, connection, now)?;
        self.apply_progress(progress);
        self.promote_admin();
        self.send_updated_player_list();
        Ok(you)
    }

    /// Connected players who have left a request unanswered for longer
    /// than `timeout`.
    pub fn overdue_players(&self, timeout: Duration, now: Instant) -> Vec<PlayerId> {
        self.roster
            .iter()
            .filter(|p| p.is_overdue(timeout, now))
            .map(|p| p.id)
            .collect()
    }

    fn send_updated_player_list(&self) {
        self.roster.broadcast(&Packet::UpdatePlayerList {
            players: self.roster.infos(),
        });
    }
}
