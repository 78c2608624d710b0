//! Error types for the session layer.

use farkle_protocol::CommandId;

use crate::PlayerState;

/// Errors that can occur during session management.
///
/// These cover a player's lifetime on the server: login, the protocol
/// state machine, and reconnection.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A player with this nickname is already registered.
    #[error("duplicate nickname {0}")]
    DuplicateNickname(String),

    /// No player is registered under this nickname.
    #[error("player {0} not found")]
    NotFound(String),

    /// The nickname is not 3 to 20 ASCII letters or digits.
    #[error("invalid nickname {0:?}")]
    InvalidNickname(String),

    /// The trigger is not permitted in the player's current state.
    #[error("{trigger:?} is not allowed in state {state}")]
    IllegalTransition {
        state: PlayerState,
        trigger: CommandId,
    },

    /// The player still has a live connection, so it can't reconnect.
    #[error("player {0} is already connected")]
    AlreadyConnected(String),
}
