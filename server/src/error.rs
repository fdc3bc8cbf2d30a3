use shared::PlayerId;
use thiserror::Error;

/// Failures of session-level operations.
///
/// None of these end a game: the caller logs them and, where a client is
/// waiting on the answer, reports the reason back to it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("player {0} is not in this game")]
    UnknownPlayer(PlayerId),

    #[error("game has no players")]
    EmptySession,

    #[error("contribution has unknown type '{0}'")]
    MalformedContribution(String),

    #[error("player {0} is not the admin")]
    NotAdmin(PlayerId),

    #[error("a round is already in progress")]
    RoundInProgress,

    #[error("no round is in progress")]
    NoActiveRound,

    #[error("player {0} cannot be replaced")]
    NotReplaceable(PlayerId),

    #[error("game '{0}' not found")]
    UnknownGame(String),
}
