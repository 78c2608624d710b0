//! Typed client requests.
//!
//! The dispatcher turns a validated [`Message`] into a [`Request`] and then
//! matches on it exhaustively, so adding a client command forces every
//! dispatcher to handle it.

use crate::command::params;
use crate::lists::decode_cubes;
use crate::{CommandId, Message, ProtocolError};

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Login,
    Reconnect,
    CreateGame { name: String, max_players: usize },
    JoinGame { name: String },
    StartGame,
    RollDice,
    SelectCubes { values: Vec<u8> },
    EndTurn,
    Logout,
    /// Acknowledges the server message whose timestamp this message echoes.
    Acknowledge,
}

impl Request {
    /// Parses the parameters of `msg`, already known to carry `command`
    /// with the declared parameter names.
    ///
    /// # Errors
    /// - [`ProtocolError::UnexpectedOrigin`] for server-only commands.
    /// - [`ProtocolError::InvalidParam`] when a value can't be parsed.
    pub fn parse(command: CommandId, msg: &Message) -> Result<Self, ProtocolError> {
        let request = match command {
            CommandId::ClientLogin => Request::Login,
            CommandId::ClientReconnect => Request::Reconnect,
            CommandId::ClientCreateGame => {
                let raw = required(msg, params::MAX_PLAYERS)?;
                let max_players =
                    raw.parse().map_err(|_| ProtocolError::InvalidParam {
                        name: params::MAX_PLAYERS,
                        reason: format!("{raw:?} is not a number"),
                    })?;
                Request::CreateGame {
                    name: required(msg, params::GAME_NAME)?.to_string(),
                    max_players,
                }
            }
            CommandId::ClientJoinGame => Request::JoinGame {
                name: required(msg, params::GAME_NAME)?.to_string(),
            },
            CommandId::ClientStartGame => Request::StartGame,
            CommandId::ClientRollDice => Request::RollDice,
            CommandId::ClientSelectedCubes => Request::SelectCubes {
                values: decode_cubes(required(msg, params::CUBE_VALUES)?)?,
            },
            CommandId::ClientEndTurn => Request::EndTurn,
            CommandId::ClientLogout => Request::Logout,
            CommandId::ResponseClientSuccess => Request::Acknowledge,
            CommandId::ResponseServerSuccess
            | CommandId::ResponseServerError
            | CommandId::ResponseServerGameList
            | CommandId::ResponseServerSelectCubes
            | CommandId::ResponseServerEndTurn
            | CommandId::ResponseServerEndScore
            | CommandId::ResponseServerDiceSuccess
            | CommandId::ServerUpdateStartGame
            | CommandId::ServerUpdateEndScore
            | CommandId::ServerUpdateGameData
            | CommandId::ServerUpdateGameList
            | CommandId::ServerUpdatePlayerList
            | CommandId::ServerReconnectGameList
            | CommandId::ServerReconnectGameData
            | CommandId::ServerReconnectPlayerList
            | CommandId::ServerStartTurn
            | CommandId::ServerPingPlayer
            | CommandId::ServerUpdateNotEnoughPlayers => {
                return Err(ProtocolError::UnexpectedOrigin(command.spec().name));
            }
        };
        Ok(request)
    }
}

fn required<'a>(msg: &'a Message, name: &'static str) -> Result<&'a str, ProtocolError> {
    msg.param(name).ok_or(ProtocolError::InvalidParam {
        name,
        reason: "missing".into(),
    })
}
