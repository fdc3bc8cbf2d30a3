//! A chain is the sequence of alternating words and drawings that grows
//! from one player's starting word. Links are only ever appended.

use shared::{ChainId, ChainSummary, Link, PlayerId, PlayerInfo};

#[derive(Debug, Clone)]
pub struct Chain {
    pub id: ChainId,
    owner: PlayerInfo,
    links: Vec<Link>,
    /// The player currently responsible for the next link.
    pub last_recipient: PlayerId,
}

impl Chain {
    /// Starts a chain whose first link is `first_word`, contributed by its owner.
    pub fn new(id: ChainId, owner: PlayerInfo, first_word: impl Into<String>) -> Self {
        let first = Link::word(owner.clone(), first_word);
        Self {
            id,
            last_recipient: owner.id,
            owner,
            links: vec![first],
        }
    }

    pub fn owner(&self) -> &PlayerInfo {
        &self.owner
    }

    pub fn add_link(&mut self, link: Link) {
        self.links.push(link);
    }

    pub fn last_link(&self) -> &Link {
        // A chain is created with its first link and never shrinks.
        &self.links[self.links.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// True if `player` has already contributed a link to this chain.
    pub fn has_link_from(&self, player: PlayerId) -> bool {
        self.links.iter().any(|link| link.player.id == player)
    }

    pub fn summary(&self) -> ChainSummary {
        ChainSummary {
            id: self.id,
            owner: self.owner.clone(),
            links: self.links.clone(),
        }
    }
}
