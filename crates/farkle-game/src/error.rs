//! Error types for the game layer.

use farkle_protocol::{GameId, ProtocolError};
use farkle_session::SessionError;

/// Errors that can occur during game operations.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The game name or player limit is out of range.
    #[error("invalid game arguments: {0}")]
    InvalidArgs(String),

    /// The game has no free seat.
    #[error("game {0} is full")]
    GameFull(String),

    /// The game has already started, so membership is frozen.
    #[error("game {0} has already started")]
    AlreadyStarted(String),

    /// The player is already seated in this game.
    #[error("player {0} is already in the game")]
    AlreadyMember(String),

    /// Fewer than two players are seated.
    #[error("not enough players")]
    NotEnoughPlayers,

    /// Nobody is seated.
    #[error("game has no players")]
    NoPlayers,

    /// The operation needs a running game.
    #[error("game is not running")]
    NotRunning,

    /// The player acted out of turn.
    #[error("it is not {0}'s turn")]
    NotYourTurn(String),

    /// The selected dice break the selection rules.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// Another game already uses this name.
    #[error("duplicate game name {0}")]
    DuplicateName(String),

    /// No game matches the given name or id.
    #[error("game {0} not found")]
    NotFound(String),

    /// The game's coordinator has stopped.
    #[error("game {0} is unavailable")]
    Unavailable(GameId),

    /// A list parameter could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A player lookup or state transition failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl GameError {
    /// Whether this error can happen to a well-behaved client because
    /// another player got there first. Such errors are reported to the
    /// client without dropping its connection.
    pub fn is_race(&self) -> bool {
        matches!(
            self,
            Self::GameFull(_)
                | Self::AlreadyStarted(_)
                | Self::AlreadyMember(_)
                | Self::NotEnoughPlayers
                | Self::DuplicateName(_)
                | Self::NotFound(_)
        )
    }
}
