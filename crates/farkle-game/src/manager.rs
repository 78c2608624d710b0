//! Game manager: creates games, seats players, and routes turn requests.
//!
//! This is the entry point for game operations from the server's request
//! handlers. It owns nothing itself; it ties together the two registries
//! and the per-game coordinators.

use std::sync::Arc;

use farkle_protocol::{CommandId, GameId, Param};
use farkle_session::{Player, PlayerRegistry};

use crate::coordinator::{ready, spawn_coordinator};
use crate::registry::Departure;
use crate::notify::{
    broadcast_game_list, broadcast_player_list, game_list_param, player_list_param, respond,
    update,
};
use crate::{
    lock_game, DiceSource, Game, GameConfig, GameError, GameRegistry, GameState, RandomDice,
    TurnHandle,
};

/// Builds the dice for each new game.
pub type DiceFactory = Arc<dyn Fn() -> Box<dyn DiceSource> + Send + Sync>;

/// Manages games on behalf of the players in a [`PlayerRegistry`].
///
/// Every method that succeeds also answers the request (echoing
/// `timestamp`) and sends the updates other players need, in protocol
/// order. On error nothing has been sent; the caller reports it.
#[derive(Clone)]
pub struct GameManager {
    players: Arc<PlayerRegistry>,
    games: Arc<GameRegistry>,
    config: GameConfig,
    dice: DiceFactory,
}

impl GameManager {
    pub fn new(players: Arc<PlayerRegistry>, games: Arc<GameRegistry>, config: GameConfig) -> Self {
        Self {
            players,
            games,
            config,
            dice: Arc::new(|| Box::new(RandomDice) as Box<dyn DiceSource>),
        }
    }

    /// Uses `factory` to make the dice for every game created from now on.
    pub fn with_dice(
        mut self,
        factory: impl Fn() -> Box<dyn DiceSource> + Send + Sync + 'static,
    ) -> Self {
        self.dice = Arc::new(factory);
        self
    }

    pub fn players(&self) -> &Arc<PlayerRegistry> {
        &self.players
    }

    pub fn games(&self) -> &Arc<GameRegistry> {
        &self.games
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The lobby's `gameList` parameter.
    pub fn game_list(&self) -> Result<Param, GameError> {
        game_list_param(&self.games)
    }

    /// Creates a game with `player` as its first member.
    ///
    /// # Errors
    /// - [`GameError::InvalidArgs`] for a bad name or player limit.
    /// - [`GameError::DuplicateName`] if the name is taken.
    pub fn create_game(
        &self,
        player: &Player,
        timestamp: &str,
        name: &str,
        max_players: usize,
    ) -> Result<GameId, GameError> {
        let mut game = Game::new(name, max_players, &self.config)?.with_dice((self.dice)());
        game.add_player(player.nickname())?;
        let id = self.games.add(game)?;

        player.set_game(Some(id));
        player.fire(CommandId::ClientCreateGame)?;
        respond(player, CommandId::ResponseServerSuccess, timestamp, vec![]);
        tracing::info!(nickname = %player.nickname(), game = %id, %name, max_players, "game created");

        broadcast_game_list(&self.players, &self.games);
        if let Ok(game) = self.games.get(id) {
            broadcast_player_list(&self.players, &game);
        }
        Ok(id)
    }

    /// Seats `player` in the named game.
    ///
    /// # Errors
    /// [`GameError::NotFound`], [`GameError::GameFull`] or
    /// [`GameError::AlreadyStarted`].
    pub fn join_game(&self, player: &Player, timestamp: &str, name: &str) -> Result<GameId, GameError> {
        let game = self.games.get_by_name(name)?;
        let id = {
            let mut game = lock_game(&game);
            game.add_player(player.nickname())?;
            game.id()
        };

        player.set_game(Some(id));
        player.fire(CommandId::ClientJoinGame)?;
        respond(player, CommandId::ResponseServerSuccess, timestamp, vec![]);
        tracing::info!(nickname = %player.nickname(), game = %id, "player joined game");

        broadcast_game_list(&self.players, &self.games);
        broadcast_player_list(&self.players, &game);
        Ok(id)
    }

    /// Starts `player`'s game and hands it to a new turn coordinator.
    ///
    /// # Errors
    /// [`GameError::NotEnoughPlayers`] with fewer than two members,
    /// [`GameError::AlreadyStarted`] if someone else started it first.
    pub fn start_game(&self, player: &Player, timestamp: &str) -> Result<GameId, GameError> {
        let id = player
            .game()
            .ok_or_else(|| GameError::NotFound(player.nickname().to_string()))?;
        ready(player, CommandId::ClientStartGame)?;
        let (handle, inbox) = TurnHandle::channel(id);
        let (game, members) = self.games.start(id, handle)?;

        player.fire(CommandId::ClientStartGame)?;
        respond(player, CommandId::ResponseServerSuccess, timestamp, vec![]);
        tracing::info!(nickname = %player.nickname(), game = %id, ?members, "game started");

        for nickname in members.iter().filter(|n| *n != player.nickname()) {
            if let Ok(member) = self.players.get(nickname) {
                update(&member, CommandId::ServerUpdateStartGame, vec![]);
            }
        }
        broadcast_game_list(&self.players, &self.games);

        spawn_coordinator(
            id,
            game,
            inbox,
            Arc::clone(&self.players),
            Arc::clone(&self.games),
            self.config.clone(),
        );
        Ok(id)
    }

    fn coordinator_for(&self, player: &Player) -> Result<TurnHandle, GameError> {
        let id = player.game().ok_or(GameError::NotRunning)?;
        self.games.coordinator(id)
    }

    /// Rolls the dice for `player`.
    pub async fn roll_dice(&self, player: &Player, timestamp: &str) -> Result<(), GameError> {
        self.coordinator_for(player)?
            .roll_dice(player.nickname(), timestamp)
            .await
    }

    /// Banks `values` from `player`'s last throw.
    pub async fn select_cubes(
        &self,
        player: &Player,
        timestamp: &str,
        values: Vec<u8>,
    ) -> Result<(), GameError> {
        self.coordinator_for(player)?
            .select_cubes(player.nickname(), timestamp, values)
            .await
    }

    /// Ends `player`'s turn.
    pub async fn end_turn(&self, player: &Player, timestamp: &str) -> Result<(), GameError> {
        self.coordinator_for(player)?
            .end_turn(player.nickname(), timestamp)
            .await
    }

    /// Takes an unreachable player out of its game.
    ///
    /// In a game that hasn't started the seat is simply freed; a game left
    /// empty is removed. In a running game the coordinator sets the seat
    /// aside. The player keeps its game reference so a reconnect can find
    /// the way back.
    pub fn player_unreachable(&self, player: &Player) {
        let Some(id) = player.game() else {
            return;
        };
        let nickname = player.nickname();

        match self.games.depart(id, nickname) {
            Departure::Unseated { game, emptied } => {
                tracing::info!(%nickname, game = %id, emptied, "unreachable player left game");
                if !emptied {
                    broadcast_player_list(&self.players, &game);
                }
                broadcast_game_list(&self.players, &self.games);
            }
            Departure::Running(coordinator) => coordinator.player_left(nickname),
            Departure::Detached => player.set_game(None),
        }
    }

    /// Sends a freshly reattached player back to where it was.
    ///
    /// - A running game that kept its seat: `ServerReconnectGameData`.
    /// - A game still waiting for players, with room: the player is seated
    ///   again and gets `ServerReconnectPlayerList`.
    /// - Anything else: `ServerReconnectGameList`, back in the lobby.
    pub async fn player_reconnected(&self, player: &Player) -> Result<(), GameError> {
        let nickname = player.nickname();
        if let Some(id) = player.game() {
            if let Ok(game) = self.games.get(id) {
                let state = lock_game(&game).state();
                match state {
                    GameState::Running => {
                        let returned = match self.games.coordinator(id) {
                            Ok(coordinator) => coordinator.player_returned(nickname).await,
                            Err(e) => Err(e),
                        };
                        match returned {
                            Ok(()) => return Ok(()),
                            Err(e) => {
                                tracing::info!(%nickname, game = %id, error = %e, "seat not restored");
                            }
                        }
                    }
                    GameState::Created => {
                        let param = {
                            let mut g = lock_game(&game);
                            let seated = g.is_member(nickname) || g.add_player(nickname).is_ok();
                            if seated {
                                Some(player_list_param(&g, &self.players)?)
                            } else {
                                None
                            }
                        };
                        if let Some(param) = param {
                            tracing::info!(%nickname, game = %id, "player returned to game");
                            update(player, CommandId::ServerReconnectPlayerList, vec![param]);
                            broadcast_player_list(&self.players, &game);
                            broadcast_game_list(&self.players, &self.games);
                            return Ok(());
                        }
                    }
                    GameState::Ended => {}
                }
            }
        }

        player.set_game(None);
        update(player, CommandId::ServerReconnectGameList, vec![self.game_list()?]);
        tracing::info!(%nickname, "player returned to lobby");
        Ok(())
    }
}

impl std::fmt::Debug for GameManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameManager")
            .field("players", &self.players.len())
            .field("games", &self.games.len())
            .field("config", &self.config)
            .finish()
    }
}
