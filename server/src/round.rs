//! Turn rotation for one round.
//!
//! A round starts with one chain per player, each seeded with a fresh word.
//! Every cycle hands chain `i` to player `i` in a fixed shuffled order, waits
//! until every chain has grown by one link, then rotates the chains by one
//! position so each player meets every chain exactly once. When the chains
//! reach `players + 1` links the round switches to showing results and waits
//! for every connected participant to acknowledge them.
//!
//! A player who disconnects mid-round keeps their slot: their snapshot is
//! parked in the replacement list and nothing advances until a new
//! connection takes the slot over under the same id.

use crate::chain::Chain;
use crate::error::SessionError;
use crate::player::{AckKind, Connection, Player, Roster};
use crate::words::WordSource;
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{ChainId, ChainSummary, Link, LinkKind, Packet, PlayerId, PlayerInfo, SubmittedLink};
use std::time::Instant;

/// What a player's pending acknowledgment resumes when it arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    FinishLink { chain_id: ChainId },
    DoneViewing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundProgress {
    /// Links are still being collected.
    Collecting,
    /// Every chain is complete and results are on screen.
    ViewingResults,
    /// Every connected participant has acknowledged the results.
    Over,
}

#[derive(Debug)]
pub struct Round {
    number: u32,
    order: Vec<PlayerId>,
    chains: Vec<Chain>,
    disconnected: Vec<PlayerInfo>,
    target_link_count: usize,
    final_link_count: usize,
    progress: RoundProgress,
}

impl Round {
    /// Shuffles the connected players, seeds one chain each, and sends every
    /// player their own chain's first word.
    pub fn start<R>(
        number: u32,
        roster: &mut Roster,
        words: &mut dyn WordSource,
        rng: &mut R,
        now: Instant,
    ) -> Self
    where
        R: Rng + ?Sized,
    {
        let mut order: Vec<PlayerId> = roster
            .iter()
            .filter(|p| p.is_connected())
            .map(|p| p.id)
            .collect();
        order.shuffle(rng);

        let mut chains = Vec::with_capacity(order.len());
        for (index, &player_id) in order.iter().enumerate() {
            if let Some(player) = roster.get_mut(player_id) {
                player.done_viewing_results = false;
                chains.push(Chain::new(index as ChainId, player.info(), words.next_word()));
            }
        }

        let mut round = Self {
            number,
            final_link_count: order.len() + 1,
            order,
            chains,
            disconnected: Vec::new(),
            // Chains already hold their starting word.
            target_link_count: 2,
            progress: RoundProgress::Collecting,
        };

        info!(
            "Round {} started with {} players, {} links per chain",
            round.number,
            round.order.len(),
            round.final_link_count
        );
        round.distribute(roster, now);
        round
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Player ids in the fixed order chains are handed out in.
    pub fn order(&self) -> &[PlayerId] {
        &self.order
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn chain(&self, id: ChainId) -> Option<&Chain> {
        self.chains.iter().find(|c| c.id == id)
    }

    /// The chain `player` is currently responsible for.
    pub fn assignment_of(&self, player: PlayerId) -> Option<&Chain> {
        self.chains.iter().find(|c| c.last_recipient == player)
    }

    pub fn target_link_count(&self) -> usize {
        self.target_link_count
    }

    pub fn final_link_count(&self) -> usize {
        self.final_link_count
    }

    pub fn disconnected(&self) -> &[PlayerInfo] {
        &self.disconnected
    }

    pub fn progress(&self) -> RoundProgress {
        self.progress
    }

    pub fn is_participant(&self, player: PlayerId) -> bool {
        self.order.contains(&player)
    }

    /// Hands chain `i` to player `i` and asks each for their next link.
    fn distribute(&mut self, roster: &mut Roster, now: Instant) {
        let final_link_count = self.final_link_count;
        let target = self.target_link_count;

        for (chain, &player_id) in self.chains.iter_mut().zip(&self.order) {
            chain.last_recipient = player_id;

            if target > 2 && chain.has_link_from(player_id) {
                warn!(
                    "Round {}: player {} already contributed to chain {}",
                    self.number, player_id, chain.id
                );
            }

            if let Some(player) = roster.get_mut(player_id) {
                Self::request_link(chain, player, final_link_count, now);
            }
        }
    }

    fn request_link(chain: &Chain, player: &mut Player, final_link_count: usize, now: Instant) {
        let packet = Packet::NextLink {
            chain_id: chain.id,
            link: chain.last_link().clone(),
            count: chain.len() as u32,
            final_count: (final_link_count - 1) as u32,
        };
        player.request(
            packet,
            AckKind::FinishedLink,
            Continuation::FinishLink { chain_id: chain.id },
            now,
        );
    }

    /// Appends a player's contribution to `chain_id`, then advances the
    /// round if that was the last link it was waiting for.
    pub fn receive_link(
        &mut self,
        roster: &mut Roster,
        player_id: PlayerId,
        chain_id: ChainId,
        submitted: SubmittedLink,
        now: Instant,
    ) -> Result<RoundProgress, SessionError> {
        if self.progress != RoundProgress::Collecting {
            debug!(
                "Round {}: link from player {} arrived after collection ended",
                self.number, player_id
            );
            return Ok(self.progress);
        }

        let kind = LinkKind::parse(&submitted.kind)
            .ok_or_else(|| SessionError::MalformedContribution(submitted.kind.clone()))?;
        let contributor = roster
            .get(player_id)
            .ok_or(SessionError::UnknownPlayer(player_id))?
            .info();

        let target = self.target_link_count;
        let Some(chain) = self.chains.iter_mut().find(|c| c.id == chain_id) else {
            warn!("Round {}: no chain {}", self.number, chain_id);
            return Ok(self.progress);
        };
        if chain.len() >= target {
            warn!(
                "Round {}: chain {} already has {} links, dropping link from player {}",
                self.number,
                chain_id,
                chain.len(),
                player_id
            );
            return Ok(self.progress);
        }

        chain.add_link(Link {
            kind,
            player: contributor,
            data: submitted.data,
        });
        debug!(
            "Round {}: player {} added a {} to chain {} ({}/{})",
            self.number,
            player_id,
            kind,
            chain_id,
            chain.len(),
            target
        );

        self.update_waiting_list(roster);
        Ok(self.advance_if_everyone_is_done(roster, now))
    }

    /// Advances only when every chain has reached the target length and no
    /// slot is waiting for a replacement.
    fn advance_if_everyone_is_done(&mut self, roster: &mut Roster, now: Instant) -> RoundProgress {
        if self.progress != RoundProgress::Collecting {
            return self.progress;
        }

        let all_finished = self
            .chains
            .iter()
            .all(|c| c.len() == self.target_link_count);
        if all_finished && self.disconnected.is_empty() {
            if self.target_link_count == self.final_link_count {
                self.view_results(roster, now);
            } else {
                self.start_next_link(roster, now);
            }
        }
        self.progress
    }

    fn start_next_link(&mut self, roster: &mut Roster, now: Instant) {
        self.target_link_count += 1;
        // Shift every chain one seat along so nobody sees a chain twice.
        self.chains.rotate_left(1);
        debug!(
            "Round {}: collecting link {} of {}",
            self.number, self.target_link_count, self.final_link_count
        );
        self.distribute(roster, now);
    }

    fn view_results(&mut self, roster: &mut Roster, now: Instant) {
        self.progress = RoundProgress::ViewingResults;

        let mut chains: Vec<ChainSummary> = self.chains.iter().map(Chain::summary).collect();
        chains.sort_by_key(|c| c.id);

        for &player_id in &self.order {
            if let Some(player) = roster.get_mut(player_id) {
                player.done_viewing_results = false;
                player.request(
                    Packet::ViewResults {
                        chains: chains.clone(),
                    },
                    AckKind::DoneViewingResults,
                    Continuation::DoneViewing,
                    now,
                );
            }
        }
        info!("Round {}: showing results", self.number);
    }

    /// Records that `player_id` has finished looking at the results.
    pub fn done_viewing(&mut self, roster: &mut Roster, player_id: PlayerId) -> RoundProgress {
        if self.progress != RoundProgress::ViewingResults {
            return self.progress;
        }
        if let Some(player) = roster.get_mut(player_id) {
            player.done_viewing_results = true;
        }
        self.check_end(roster)
    }

    /// Ends the round once every connected participant is done viewing.
    /// Called again whenever someone leaves, so a departed player can never
    /// hold the others on the results screen.
    pub fn check_end(&mut self, roster: &mut Roster) -> RoundProgress {
        if self.progress != RoundProgress::ViewingResults {
            return self.progress;
        }

        let all_done = roster
            .iter()
            .filter(|p| self.order.contains(&p.id))
            .all(|p| p.done_viewing_results || !p.is_connected());
        if !all_done {
            return self.progress;
        }

        self.progress = RoundProgress::Over;
        for player in roster.iter_mut().filter(|p| self.order.contains(&p.id)) {
            player.done_viewing_results = false;
            player.send(Packet::RoundOver);
        }
        info!("Round {} over", self.number);
        self.progress
    }

    /// Parks a disconnected participant's slot until someone replaces them.
    pub fn find_replacement_for(&mut self, roster: &Roster, player_id: PlayerId) {
        if !self.is_participant(player_id) || self.can_be_replaced(player_id) {
            return;
        }
        if let Some(player) = roster.get(player_id) {
            info!(
                "Round {}: player {} ({}) needs a replacement",
                self.number, player_id, player.name
            );
            self.disconnected.push(player.info());
        }
        self.update_waiting_list(roster);
    }

    pub fn can_be_replaced(&self, player_id: PlayerId) -> bool {
        self.disconnected.iter().any(|p| p.id == player_id)
    }

    /// Binds a new connection to a parked slot. The slot keeps its id, so
    /// chain ownership and contributions stay attached to it. The newcomer
    /// gets the outstanding request for the slot's chain, or the waiting
    /// screen if that link was already in.
    pub fn replace_player(
        &mut self,
        roster: &mut Roster,
        player_id: PlayerId,
        name: &str,
        connection: Connection,
        now: Instant,
    ) -> Result<RoundProgress, SessionError> {
        let index = self
            .disconnected
            .iter()
            .position(|p| p.id == player_id)
            .ok_or(SessionError::NotReplaceable(player_id))?;
        let player = roster
            .get_mut(player_id)
            .ok_or(SessionError::UnknownPlayer(player_id))?;

        player.rebind(name, connection);
        self.disconnected.remove(index);
        info!(
            "Round {}: slot {} taken over by {}",
            self.number, player_id, player.name
        );

        if self.progress == RoundProgress::Collecting {
            let target = self.target_link_count;
            match self.chains.iter().find(|c| c.last_recipient == player_id) {
                Some(chain) if chain.len() < target => {
                    Self::request_link(chain, player, self.final_link_count, now);
                }
                _ => player.send(Packet::ShowWaitingList),
            }
        }

        self.update_waiting_list(roster);
        Ok(self.advance_if_everyone_is_done(roster, now))
    }

    /// Connected players whose current chain is still short a link.
    pub fn not_finished_players(&self, roster: &Roster) -> Vec<PlayerInfo> {
        self.chains
            .iter()
            .filter(|c| c.len() != self.target_link_count)
            .filter_map(|c| roster.get(c.last_recipient))
            .filter(|p| p.is_connected())
            .map(Player::info)
            .collect()
    }

    fn update_waiting_list(&self, roster: &Roster) {
        roster.broadcast(&Packet::UpdateWaitingList {
            not_finished: self.not_finished_players(roster),
            disconnected: self.disconnected.clone(),
        });
    }
}
