//! The per-player protocol state machine.
//!
//! Every player owns one machine. It decides which commands may be
//! processed from the player, and which may be sent to it, at any given
//! moment. Commands that drive it are called *triggers* (see
//! [`CommandSpec::trigger`](farkle_protocol::CommandSpec::trigger)).
//!
//! ```text
//! Start        ClientLogin → Lobby, ClientReconnect → Reconnect
//! Reconnect    ServerReconnect{GameList → Lobby, PlayerList → Room,
//!                              GameData → RunningGame}
//! Lobby        ClientCreateGame | ClientJoinGame → Room, ClientLogout → End
//! Room         ClientStartGame | ServerUpdateStartGame → RunningGame
//! RunningGame  ServerStartTurn → MyTurn,
//!              ServerUpdateEndScore | ServerUpdateNotEnoughPlayers → Lobby
//! MyTurn       ClientRollDice → ForkMyTurn, ClientEndTurn → RunningGame
//! ForkMyTurn   ResponseServerEndTurn → RunningGame,
//!              ResponseServerSelectCubes → NextDice
//! NextDice     ClientSelectedCubes → ForkNextDice
//! ForkNextDice ResponseServerEndScore → Lobby,
//!              ResponseServerDiceSuccess → MyTurn
//! ```
//!
//! Server updates that merely refresh the view (game list, player list,
//! game data, ping) are self-loops in the states where they make sense.
//! Anything else is illegal and rejected without touching the state.

use std::fmt;

use farkle_protocol::CommandId;

use crate::SessionError;

/// Where a player is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerState {
    Start,
    Lobby,
    Room,
    RunningGame,
    MyTurn,
    ForkMyTurn,
    NextDice,
    ForkNextDice,
    End,
    Reconnect,
}

impl PlayerState {
    /// Returns the state `trigger` leads to, or `None` if it is not
    /// permitted here.
    pub fn on(self, trigger: CommandId) -> Option<PlayerState> {
        use CommandId as C;
        use PlayerState as S;

        let next = match (self, trigger) {
            (S::Start, C::ClientLogin) => S::Lobby,
            (S::Start, C::ClientReconnect) => S::Reconnect,

            (S::Reconnect, C::ServerReconnectGameList) => S::Lobby,
            (S::Reconnect, C::ServerReconnectPlayerList) => S::Room,
            (S::Reconnect, C::ServerReconnectGameData) => S::RunningGame,
            (S::Reconnect, C::ServerPingPlayer) => S::Reconnect,

            (S::Lobby, C::ClientCreateGame | C::ClientJoinGame) => S::Room,
            (S::Lobby, C::ClientLogout) => S::End,
            (S::Lobby, C::ServerUpdateGameList | C::ServerPingPlayer) => S::Lobby,

            (S::Room, C::ClientStartGame | C::ServerUpdateStartGame) => S::RunningGame,
            (S::Room, C::ServerUpdatePlayerList | C::ServerPingPlayer) => S::Room,

            (S::RunningGame, C::ServerStartTurn) => S::MyTurn,
            (S::RunningGame, C::ServerUpdateEndScore) => S::Lobby,
            (S::RunningGame, C::ServerUpdateNotEnoughPlayers) => S::Lobby,
            (S::RunningGame, C::ServerUpdateGameData | C::ServerPingPlayer) => {
                S::RunningGame
            }

            (S::MyTurn, C::ClientRollDice) => S::ForkMyTurn,
            (S::MyTurn, C::ClientEndTurn) => S::RunningGame,
            (S::MyTurn, C::ServerUpdateNotEnoughPlayers) => S::Lobby,
            (S::MyTurn, C::ServerUpdateGameData | C::ServerPingPlayer) => S::MyTurn,

            (S::ForkMyTurn, C::ResponseServerEndTurn) => S::RunningGame,
            (S::ForkMyTurn, C::ResponseServerSelectCubes) => S::NextDice,

            (S::NextDice, C::ClientSelectedCubes) => S::ForkNextDice,
            (S::NextDice, C::ServerUpdateNotEnoughPlayers) => S::Lobby,
            (S::NextDice, C::ServerUpdateGameData | C::ServerPingPlayer) => S::NextDice,

            (S::ForkNextDice, C::ResponseServerEndScore) => S::Lobby,
            (S::ForkNextDice, C::ResponseServerDiceSuccess) => S::MyTurn,

            _ => return None,
        };
        Some(next)
    }

    /// Whether the player is seated in a game that has started.
    pub fn is_in_running_game(self) -> bool {
        matches!(
            self,
            Self::RunningGame
                | Self::MyTurn
                | Self::ForkMyTurn
                | Self::NextDice
                | Self::ForkNextDice
        )
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A player's protocol state machine.
///
/// `fire` checks legality before it mutates, so a rejected trigger leaves
/// the machine exactly where it was.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: PlayerState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: PlayerState::Start,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn can_fire(&self, trigger: CommandId) -> bool {
        self.state.on(trigger).is_some()
    }

    /// Moves to the state `trigger` leads to.
    ///
    /// # Errors
    /// Returns [`SessionError::IllegalTransition`] if the trigger is not
    /// permitted in the current state. The state is unchanged.
    pub fn fire(&mut self, trigger: CommandId) -> Result<PlayerState, SessionError> {
        let next = self
            .state
            .on(trigger)
            .ok_or(SessionError::IllegalTransition {
                state: self.state,
                trigger,
            })?;
        self.state = next;
        Ok(next)
    }

    /// Puts the machine back in `Start`, used when a player reconnects.
    pub fn reset(&mut self) {
        self.state = PlayerState::Start;
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
