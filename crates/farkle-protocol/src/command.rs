//! The command table: every command id the protocol knows about.
//!
//! A command is identified on the wire by a small number. The table maps
//! that number to:
//!
//! - the parameter names the command must carry, in order,
//! - whether it drives the player's protocol state machine (its trigger),
//! - where it comes from ([`Origin`]), which also decides whether the
//!   client must acknowledge it.
//!
//! Ids are partitioned into ranges:
//!
//! ```text
//!  1..=29   client requests        (plus 61, 62)
//! 30..=39   server responses       (answer one request, echo its timestamp)
//! 40..=59   server updates         (unsolicited, must be acknowledged)
//! 60        client acknowledgment
//! ```
//!
//! The table is a `static` array, so it is built at compile time and needs
//! no locking.

use crate::{Param, ProtocolError};

/// Where a command originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A request sent by the client.
    Client,
    /// The client's generic "received it" reply to a server update.
    Acknowledgment,
    /// A direct answer to one client request.
    ServerResponse,
    /// An unsolicited server message. The client must acknowledge it.
    ServerUpdate,
}

/// Every command in the protocol.
///
/// The discriminant is the command's index in the static table, not its
/// wire id; use [`CommandId::id`] for the wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    ClientLogin,
    ClientCreateGame,
    ClientJoinGame,
    ClientStartGame,
    ClientRollDice,
    ClientLogout,
    ClientReconnect,
    ClientSelectedCubes,
    ClientEndTurn,
    ResponseServerSuccess,
    ResponseServerError,
    ResponseServerGameList,
    ResponseServerSelectCubes,
    ResponseServerEndTurn,
    ResponseServerEndScore,
    ResponseServerDiceSuccess,
    ServerUpdateStartGame,
    ServerUpdateEndScore,
    ServerUpdateGameData,
    ServerUpdateGameList,
    ServerUpdatePlayerList,
    ServerReconnectGameList,
    ServerReconnectGameData,
    ServerReconnectPlayerList,
    ServerStartTurn,
    ServerPingPlayer,
    ServerUpdateNotEnoughPlayers,
    ResponseClientSuccess,
}

/// Parameter names used by more than one command.
pub mod params {
    pub const GAME_NAME: &str = "gameName";
    pub const MAX_PLAYERS: &str = "maxPlayers";
    pub const CUBE_VALUES: &str = "cubeValues";
    pub const MESSAGE: &str = "message";
    pub const GAME_LIST: &str = "gameList";
    pub const PLAYER_LIST: &str = "playerList";
    pub const GAME_DATA: &str = "gameData";
    pub const PLAYER_NAME: &str = "playerName";
}

/// Static description of one command.
#[derive(Debug)]
pub struct CommandSpec {
    pub command: CommandId,
    pub id: u8,
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub origin: Origin,
    triggers: bool,
}

impl CommandSpec {
    /// Checks that the parameter names equal the declared names, in order.
    pub fn validate(&self, params: &[Param]) -> bool {
        params.len() == self.params.len()
            && params
                .iter()
                .zip(self.params)
                .all(|(p, expected)| p.name == *expected)
    }

    /// Returns the state machine trigger this command fires, if any.
    pub fn trigger(&self) -> Option<CommandId> {
        self.triggers.then_some(self.command)
    }

    /// Whether the client must answer this command with an acknowledgment.
    pub fn requires_ack(&self) -> bool {
        self.origin == Origin::ServerUpdate
    }

    /// Whether a client may send this command.
    pub fn is_client_origin(&self) -> bool {
        matches!(self.origin, Origin::Client | Origin::Acknowledgment)
    }
}

macro_rules! command {
    ($cmd:ident, $id:expr, [$($p:expr),*], $origin:ident, $triggers:expr) => {
        CommandSpec {
            command: CommandId::$cmd,
            id: $id,
            name: stringify!($cmd),
            params: &[$($p),*],
            origin: Origin::$origin,
            triggers: $triggers,
        }
    };
}

use params::*;

/// Entries are ordered by `CommandId` discriminant.
static COMMANDS: [CommandSpec; 28] = [
    command!(ClientLogin, 1, [], Client, true),
    command!(ClientCreateGame, 2, [GAME_NAME, MAX_PLAYERS], Client, true),
    command!(ClientJoinGame, 3, [GAME_NAME], Client, true),
    command!(ClientStartGame, 4, [], Client, true),
    command!(ClientRollDice, 5, [], Client, true),
    command!(ClientLogout, 7, [], Client, true),
    command!(ClientReconnect, 8, [], Client, true),
    command!(ClientSelectedCubes, 61, [CUBE_VALUES], Client, true),
    command!(ClientEndTurn, 62, [], Client, true),
    command!(ResponseServerSuccess, 30, [], ServerResponse, false),
    command!(ResponseServerError, 32, [MESSAGE], ServerResponse, false),
    command!(ResponseServerGameList, 33, [GAME_LIST], ServerResponse, false),
    command!(ResponseServerSelectCubes, 34, [CUBE_VALUES], ServerResponse, true),
    command!(ResponseServerEndTurn, 35, [], ServerResponse, true),
    command!(ResponseServerEndScore, 36, [], ServerResponse, true),
    command!(ResponseServerDiceSuccess, 37, [], ServerResponse, true),
    command!(ServerUpdateStartGame, 41, [], ServerUpdate, true),
    command!(ServerUpdateEndScore, 42, [PLAYER_NAME], ServerUpdate, true),
    command!(ServerUpdateGameData, 43, [GAME_DATA], ServerUpdate, true),
    command!(ServerUpdateGameList, 44, [GAME_LIST], ServerUpdate, true),
    command!(ServerUpdatePlayerList, 45, [PLAYER_LIST], ServerUpdate, true),
    command!(ServerReconnectGameList, 46, [GAME_LIST], ServerUpdate, true),
    command!(ServerReconnectGameData, 47, [GAME_DATA], ServerUpdate, true),
    command!(ServerReconnectPlayerList, 48, [PLAYER_LIST], ServerUpdate, true),
    command!(ServerStartTurn, 49, [], ServerUpdate, true),
    command!(ServerPingPlayer, 50, [], ServerUpdate, true),
    command!(ServerUpdateNotEnoughPlayers, 51, [], ServerUpdate, true),
    command!(ResponseClientSuccess, 60, [], Acknowledgment, false),
];

impl CommandId {
    /// Returns this command's table entry.
    pub fn spec(self) -> &'static CommandSpec {
        &COMMANDS[self as usize]
    }

    /// Returns the wire id.
    pub fn id(self) -> u8 {
        self.spec().id
    }

    /// Returns the command with the given wire id.
    pub fn from_id(id: u8) -> Option<CommandId> {
        COMMANDS.iter().find(|c| c.id == id).map(|c| c.command)
    }
}

/// Looks up a command by wire id.
pub fn lookup(id: u8) -> Result<&'static CommandSpec, ProtocolError> {
    COMMANDS
        .iter()
        .find(|c| c.id == id)
        .ok_or(ProtocolError::UnknownCommand(id))
}

/// Returns the full table, in discriminant order.
pub fn all() -> &'static [CommandSpec] {
    &COMMANDS
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    // =====================================================================
    // Table consistency
    // =====================================================================

    #[test]
    fn test_table_order_matches_discriminants() {
        for (i, spec) in all().iter().enumerate() {
            assert_eq!(spec.command as usize, i, "{} out of order", spec.name);
        }
    }

    #[test]
    fn test_table_ids_are_unique_and_fit_width() {
        let mut seen = HashSet::new();
        for spec in all() {
            assert!(seen.insert(spec.id), "duplicate id {}", spec.id);
            assert!(spec.id < 100, "{} does not fit two digits", spec.name);
        }
    }

    #[test]
    fn test_table_ranges_match_origin() {
        for spec in all() {
            match spec.origin {
                Origin::Client => {
                    assert!(spec.id < 30 || spec.id > 60, "{}", spec.name)
                }
                Origin::ServerResponse => {
                    assert!((30..40).contains(&spec.id), "{}", spec.name)
                }
                Origin::ServerUpdate => {
                    assert!((40..60).contains(&spec.id), "{}", spec.name)
                }
                Origin::Acknowledgment => assert_eq!(spec.id, 60),
            }
        }
    }

    // =====================================================================
    // lookup()
    // =====================================================================

    #[test]
    fn test_lookup_known_id_returns_spec() {
        let spec = lookup(2).unwrap();
        assert_eq!(spec.command, CommandId::ClientCreateGame);
        assert_eq!(spec.params, &["gameName", "maxPlayers"]);
    }

    #[test]
    fn test_lookup_unknown_id_returns_error() {
        assert_eq!(lookup(6).unwrap_err(), ProtocolError::UnknownCommand(6));
        assert_eq!(lookup(70).unwrap_err(), ProtocolError::UnknownCommand(70));
    }

    #[test]
    fn test_from_id_round_trips_every_command() {
        for spec in all() {
            assert_eq!(CommandId::from_id(spec.id), Some(spec.command));
            assert_eq!(spec.command.id(), spec.id);
        }
    }

    // =====================================================================
    // validate()
    // =====================================================================

    #[test]
    fn test_validate_exact_names_in_order_passes() {
        let spec = CommandId::ClientCreateGame.spec();
        let params = vec![Param::new("gameName", "g1"), Param::new("maxPlayers", "2")];
        assert!(spec.validate(&params));
    }

    #[test]
    fn test_validate_wrong_order_fails() {
        let spec = CommandId::ClientCreateGame.spec();
        let params = vec![Param::new("maxPlayers", "2"), Param::new("gameName", "g1")];
        assert!(!spec.validate(&params));
    }

    #[test]
    fn test_validate_wrong_count_fails() {
        let spec = CommandId::ClientJoinGame.spec();
        assert!(!spec.validate(&[]));
        assert!(CommandId::ClientLogin.spec().validate(&[]));
        assert!(!CommandId::ClientLogin.spec().validate(&[Param::new("x", "y")]));
    }

    // =====================================================================
    // Flags
    // =====================================================================

    #[test]
    fn test_requires_ack_only_for_server_updates() {
        assert!(CommandId::ServerPingPlayer.spec().requires_ack());
        assert!(CommandId::ServerUpdateGameList.spec().requires_ack());
        assert!(!CommandId::ResponseServerGameList.spec().requires_ack());
        assert!(!CommandId::ResponseClientSuccess.spec().requires_ack());
    }

    #[test]
    fn test_trigger_absent_for_plain_responses() {
        assert_eq!(CommandId::ResponseServerSuccess.spec().trigger(), None);
        assert_eq!(CommandId::ResponseServerError.spec().trigger(), None);
        assert_eq!(
            CommandId::ResponseServerEndTurn.spec().trigger(),
            Some(CommandId::ResponseServerEndTurn)
        );
    }

    #[test]
    fn test_is_client_origin() {
        assert!(CommandId::ClientRollDice.spec().is_client_origin());
        assert!(CommandId::ResponseClientSuccess.spec().is_client_origin());
        assert!(!CommandId::ServerStartTurn.spec().is_client_origin());
    }
}
