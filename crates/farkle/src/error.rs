//! Unified error type for the Farkle server.

use farkle_game::GameError;
use farkle_protocol::ProtocolError;
use farkle_session::SessionError;
use farkle_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum FarkleError {
    /// A transport-level error (bind, send, recv, oversized frame).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (malformed frame, unknown command).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (nickname, state machine, reconnect).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A game-level error (full, not your turn, bad selection).
    #[error(transparent)]
    Game(#[from] GameError),

    /// A command other than login or reconnect on a connection with no
    /// player.
    #[error("{0} requires a logged in player")]
    NotLoggedIn(&'static str),

    /// The message names a different player than the connection's.
    #[error("nickname {actual:?} does not match session player {expected:?}")]
    NicknameMismatch { expected: String, actual: String },

    /// The configuration file could not be read.
    #[error("failed to read config: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// The configuration file is not valid JSON for [`ServerConfig`](crate::ServerConfig).
    #[error("invalid config: {0}")]
    ConfigFormat(#[from] serde_json::Error),
}

/// How the session layer reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The client broke the wire protocol or the game rules.
    Violation,
    /// The command is not permitted in the player's state.
    IllegalTransition,
    /// Another player got there first; the client did nothing wrong.
    Race,
    /// The connection is gone or unusable.
    Liveness,
}

impl FarkleError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Transport(_) | Self::ConfigIo(_) => ErrorClass::Liveness,
            Self::Session(e) | Self::Game(GameError::Session(e)) => session_class(e),
            Self::Game(e) if e.is_race() => ErrorClass::Race,
            Self::Protocol(_)
            | Self::Game(_)
            | Self::NotLoggedIn(_)
            | Self::NicknameMismatch { .. }
            | Self::ConfigFormat(_) => ErrorClass::Violation,
        }
    }

    /// Whether the client is disconnected after being told about this
    /// error.
    pub fn disconnects(&self) -> bool {
        self.class() != ErrorClass::Race
    }

    /// The text sent to the client in `ResponseServerError`.
    pub fn client_message(&self) -> String {
        let text = match self {
            Self::Session(SessionError::DuplicateNickname(_)) => {
                return "error duplicate nickname".to_string();
            }
            Self::Game(GameError::DuplicateName(_)) => {
                return "error duplicate game name".to_string();
            }
            other => format!("error {other}"),
        };
        // Parameter values may not contain the grammar's delimiters.
        text.chars()
            .map(|c| match c {
                '"' | '{' | '}' | '[' | ']' | ';' | ',' | ':' | '\n' | '\r' => ' ',
                c => c,
            })
            .collect()
    }
}

fn session_class(e: &SessionError) -> ErrorClass {
    match e {
        SessionError::IllegalTransition { .. } => ErrorClass::IllegalTransition,
        SessionError::DuplicateNickname(_)
        | SessionError::NotFound(_)
        | SessionError::InvalidNickname(_)
        | SessionError::AlreadyConnected(_) => ErrorClass::Violation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farkle_protocol::CommandId;
    use farkle_session::PlayerState;

    #[test]
    fn test_from_transport_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "gone");
        let err = TransportError::ReceiveFailed(io);
        let farkle_err: FarkleError = err.into();
        assert!(matches!(farkle_err, FarkleError::Transport(_)));
        assert!(farkle_err.to_string().contains("gone"));
        assert_eq!(farkle_err.class(), ErrorClass::Liveness);
    }

    #[test]
    fn test_from_protocol_error_is_violation() {
        let err: FarkleError = ProtocolError::Malformed("bad".into()).into();
        assert!(matches!(err, FarkleError::Protocol(_)));
        assert_eq!(err.class(), ErrorClass::Violation);
        assert!(err.disconnects());
    }

    #[test]
    fn test_illegal_transition_disconnects() {
        let err: FarkleError = SessionError::IllegalTransition {
            state: PlayerState::Lobby,
            trigger: CommandId::ClientRollDice,
        }
        .into();
        assert_eq!(err.class(), ErrorClass::IllegalTransition);
        assert!(err.disconnects());
    }

    #[test]
    fn test_wrapped_session_error_keeps_its_class() {
        let err: FarkleError = GameError::Session(SessionError::IllegalTransition {
            state: PlayerState::Lobby,
            trigger: CommandId::ClientEndTurn,
        })
        .into();
        assert_eq!(err.class(), ErrorClass::IllegalTransition);
    }

    #[test]
    fn test_races_keep_the_connection() {
        for e in [
            GameError::GameFull("g1".into()),
            GameError::AlreadyStarted("g1".into()),
            GameError::DuplicateName("g1".into()),
            GameError::NotEnoughPlayers,
        ] {
            let err: FarkleError = e.into();
            assert_eq!(err.class(), ErrorClass::Race);
            assert!(!err.disconnects());
        }
    }

    #[test]
    fn test_rule_breaking_game_errors_disconnect() {
        let err: FarkleError = GameError::NotYourTurn("bob".into()).into();
        assert!(err.disconnects());
        let err: FarkleError = GameError::InvalidSelection("[2]".into()).into();
        assert!(err.disconnects());
    }

    #[test]
    fn test_client_message_fixed_texts() {
        let err: FarkleError = SessionError::DuplicateNickname("alice".into()).into();
        assert_eq!(err.client_message(), "error duplicate nickname");
        let err: FarkleError = GameError::DuplicateName("g1".into()).into();
        assert_eq!(err.client_message(), "error duplicate game name");
    }

    #[test]
    fn test_client_message_strips_delimiters() {
        let err: FarkleError = SessionError::InvalidNickname("a{b}".into()).into();
        let text = err.client_message();
        assert!(text.starts_with("error "));
        assert!(!text.contains(['"', '{', '}']));
    }
}
