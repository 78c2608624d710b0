//! Turn coordinator: an isolated Tokio task that drives one running game.
//!
//! Each running game gets its own coordinator, reached through a
//! [`TurnHandle`]. Turn requests from every seated player funnel through
//! the coordinator's channel, so they are applied one at a time in arrival
//! order. The coordinator never touches a socket: everything it says goes
//! out through [`Player::send`].
//!
//! # Departures
//!
//! When a player becomes unreachable its seat is set aside. If that leaves
//! fewer than two seated players, no new turn starts and a grace timer
//! runs. A player returning before it fires resumes play; otherwise the
//! game is abandoned and everyone still seated goes back to the lobby.
//!
//! The command channel is unbounded. Each seat has at most one turn
//! request in flight, so the queue is bounded by the seat count, and
//! departures and shutdowns sent from synchronous cleanup code are never
//! lost to a full channel.

use std::sync::Arc;

use farkle_protocol::{encode_cubes, params, CommandId, GameId, Param};
use farkle_session::{Delivery, Player, PlayerRegistry, SessionError};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

use crate::game::MIN_PLAYERS;
use crate::notify::{broadcast_game_data, broadcast_game_list, game_data_param, respond, update};
use crate::{has_scoring_dice, lock_game, GameConfig, GameError, GameRegistry, SharedGame};

type Reply = oneshot::Sender<Result<(), GameError>>;

/// Commands sent to a coordinator through its channel.
pub(crate) enum TurnCommand {
    RollDice {
        nickname: String,
        timestamp: String,
        reply: Reply,
    },
    SelectCubes {
        nickname: String,
        timestamp: String,
        values: Vec<u8>,
        reply: Reply,
    },
    EndTurn {
        nickname: String,
        timestamp: String,
        reply: Reply,
    },
    PlayerLeft {
        nickname: String,
    },
    PlayerReturned {
        nickname: String,
        reply: Reply,
    },
    Shutdown,
}

/// Handle to a running game's coordinator.
///
/// Cheap to clone. The [`GameRegistry`] keeps one per running game.
#[derive(Debug, Clone)]
pub struct TurnHandle {
    game_id: GameId,
    sender: mpsc::UnboundedSender<TurnCommand>,
}

impl TurnHandle {
    /// A handle and the inbox its coordinator will read from. Commands
    /// sent before the coordinator is spawned wait in the inbox.
    pub(crate) fn channel(game_id: GameId) -> (Self, mpsc::UnboundedReceiver<TurnCommand>) {
        let (sender, inbox) = mpsc::unbounded_channel();
        (Self { game_id, sender }, inbox)
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    async fn request(&self, make: impl FnOnce(Reply) -> TurnCommand) -> Result<(), GameError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .map_err(|_| GameError::Unavailable(self.game_id))?;
        reply_rx
            .await
            .map_err(|_| GameError::Unavailable(self.game_id))?
    }

    /// Rolls the dice for `nickname`, answering the request stamped
    /// `timestamp`.
    pub async fn roll_dice(&self, nickname: &str, timestamp: &str) -> Result<(), GameError> {
        self.request(|reply| TurnCommand::RollDice {
            nickname: nickname.to_string(),
            timestamp: timestamp.to_string(),
            reply,
        })
        .await
    }

    /// Banks the selected dice from `nickname`'s last throw.
    pub async fn select_cubes(
        &self,
        nickname: &str,
        timestamp: &str,
        values: Vec<u8>,
    ) -> Result<(), GameError> {
        self.request(|reply| TurnCommand::SelectCubes {
            nickname: nickname.to_string(),
            timestamp: timestamp.to_string(),
            values,
            reply,
        })
        .await
    }

    /// Ends `nickname`'s turn.
    pub async fn end_turn(&self, nickname: &str, timestamp: &str) -> Result<(), GameError> {
        self.request(|reply| TurnCommand::EndTurn {
            nickname: nickname.to_string(),
            timestamp: timestamp.to_string(),
            reply,
        })
        .await
    }

    /// Gives a returning player its seat back and sends it the
    /// scoreboard.
    pub async fn player_returned(&self, nickname: &str) -> Result<(), GameError> {
        self.request(|reply| TurnCommand::PlayerReturned {
            nickname: nickname.to_string(),
            reply,
        })
        .await
    }

    /// Reports that `nickname` became unreachable. Doesn't wait, so it can
    /// be called from cleanup code.
    pub fn player_left(&self, nickname: &str) {
        let cmd = TurnCommand::PlayerLeft {
            nickname: nickname.to_string(),
        };
        if self.sender.send(cmd).is_err() {
            tracing::debug!(game = %self.game_id, %nickname, "coordinator gone, departure ignored");
        }
    }

    /// Tells the coordinator to stop.
    pub fn shutdown(&self) {
        if self.sender.send(TurnCommand::Shutdown).is_err() {
            tracing::debug!(game = %self.game_id, "coordinator already stopped");
        }
    }
}

/// Fails unless `player` may fire `trigger` right now. Checked before a
/// game is touched, so a refused request changes nothing.
pub(crate) fn ready(player: &Player, trigger: CommandId) -> Result<(), GameError> {
    if player.can_fire(trigger) {
        return Ok(());
    }
    Err(SessionError::IllegalTransition {
        state: player.state(),
        trigger,
    }
    .into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// The internal coordinator state. Runs inside a Tokio task.
struct Coordinator {
    game_id: GameId,
    game: SharedGame,
    players: Arc<PlayerRegistry>,
    games: Arc<GameRegistry>,
    config: GameConfig,
    receiver: mpsc::UnboundedReceiver<TurnCommand>,
    /// When the game is abandoned unless enough players come back.
    grace_deadline: Option<Instant>,
    /// A turn is due but was held back for lack of players.
    turn_pending: bool,
}

impl Coordinator {
    /// Announces the board, starts the first turn, then processes
    /// commands until the game ends.
    async fn run(mut self) {
        tracing::info!(game = %self.game_id, "turn coordinator started");
        broadcast_game_data(&self.players, &self.game);
        self.start_turn();

        loop {
            let deadline = self.grace_deadline;
            let grace = async move {
                match deadline {
                    Some(deadline) => time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle(cmd) == Flow::Stop {
                        break;
                    }
                }
                () = grace => {
                    self.abandon();
                    break;
                }
            }
        }

        tracing::info!(game = %self.game_id, "turn coordinator stopped");
    }

    fn handle(&mut self, cmd: TurnCommand) -> Flow {
        match cmd {
            TurnCommand::RollDice {
                nickname,
                timestamp,
                reply,
            } => {
                let _ = reply.send(self.roll_dice(&nickname, &timestamp));
                Flow::Continue
            }
            TurnCommand::SelectCubes {
                nickname,
                timestamp,
                values,
                reply,
            } => {
                let result = self.select_cubes(&nickname, &timestamp, &values);
                let flow = *result.as_ref().unwrap_or(&Flow::Continue);
                let _ = reply.send(result.map(|_| ()));
                flow
            }
            TurnCommand::EndTurn {
                nickname,
                timestamp,
                reply,
            } => {
                let _ = reply.send(self.end_turn(&nickname, &timestamp));
                Flow::Continue
            }
            TurnCommand::PlayerLeft { nickname } => {
                self.player_left(&nickname);
                Flow::Continue
            }
            TurnCommand::PlayerReturned { nickname, reply } => {
                let _ = reply.send(self.player_returned(&nickname));
                Flow::Continue
            }
            TurnCommand::Shutdown => Flow::Stop,
        }
    }

    fn player(&self, nickname: &str) -> Result<Arc<Player>, GameError> {
        Ok(self.players.get(nickname)?)
    }

    fn seated(&self) -> usize {
        lock_game(&self.game).players().len()
    }

    fn roll_dice(&mut self, nickname: &str, timestamp: &str) -> Result<(), GameError> {
        let player = self.player(nickname)?;
        ready(&player, CommandId::ClientRollDice)?;
        let rolled = lock_game(&self.game).new_throw(nickname)?;
        player.fire(CommandId::ClientRollDice)?;

        if has_scoring_dice(&rolled) {
            tracing::debug!(game = %self.game_id, %nickname, ?rolled, "dice rolled");
            let cubes = Param::new(params::CUBE_VALUES, encode_cubes(&rolled)?);
            respond(&player, CommandId::ResponseServerSelectCubes, timestamp, vec![cubes]);
        } else {
            tracing::info!(game = %self.game_id, %nickname, ?rolled, "no scoring dice, turn over");
            respond(&player, CommandId::ResponseServerEndTurn, timestamp, vec![]);
            self.next_turn();
        }
        Ok(())
    }

    fn select_cubes(
        &mut self,
        nickname: &str,
        timestamp: &str,
        values: &[u8],
    ) -> Result<Flow, GameError> {
        let player = self.player(nickname)?;
        ready(&player, CommandId::ClientSelectedCubes)?;
        let (score, won) = {
            let mut game = lock_game(&self.game);
            let points = game.score_increase(nickname, values)?;
            let score = game.player_score(nickname).unwrap_or(0) + points;
            game.set_player_score(nickname, score);
            let won = score >= self.config.score_threshold;
            if won {
                game.finish();
            }
            (score, won)
        };
        player.fire(CommandId::ClientSelectedCubes)?;
        tracing::debug!(game = %self.game_id, %nickname, ?values, score, "dice banked");

        if won {
            self.finish_with_winner(&player, timestamp);
            return Ok(Flow::Stop);
        }
        respond(&player, CommandId::ResponseServerDiceSuccess, timestamp, vec![]);
        broadcast_game_data(&self.players, &self.game);
        Ok(Flow::Continue)
    }

    fn end_turn(&mut self, nickname: &str, timestamp: &str) -> Result<(), GameError> {
        let player = self.player(nickname)?;
        if lock_game(&self.game).current_turn_player()? != nickname {
            return Err(GameError::NotYourTurn(nickname.to_string()));
        }
        player.fire(CommandId::ClientEndTurn)?;
        respond(&player, CommandId::ResponseServerSuccess, timestamp, vec![]);
        self.next_turn();
        Ok(())
    }

    fn next_turn(&mut self) {
        let advanced = lock_game(&self.game).advance_turn().map(str::to_string);
        broadcast_game_data(&self.players, &self.game);
        match advanced {
            Ok(_) => self.start_turn(),
            Err(e) => tracing::warn!(game = %self.game_id, error = %e, "cannot advance turn"),
        }
    }

    /// Tells the current player it's their turn, unless the game is
    /// waiting for players to return.
    fn start_turn(&mut self) {
        if self.seated() < MIN_PLAYERS {
            self.turn_pending = true;
            return;
        }
        let current = lock_game(&self.game).current_turn_player().map(str::to_string);
        let nickname = match current {
            Ok(nickname) => nickname,
            Err(e) => {
                tracing::warn!(game = %self.game_id, error = %e, "no player to start turn");
                return;
            }
        };
        self.turn_pending = false;

        let delivery = self
            .players
            .get(&nickname)
            .map(|p| update(&p, CommandId::ServerStartTurn, vec![]));
        match delivery {
            Ok(Delivery::Sent) => {
                tracing::debug!(game = %self.game_id, %nickname, "turn started");
            }
            other => {
                tracing::warn!(game = %self.game_id, %nickname, ?other, "turn start not delivered");
            }
        }
    }

    fn player_left(&mut self, nickname: &str) {
        let (held_turn, removed, seated) = {
            let mut game = lock_game(&self.game);
            let held_turn = game.current_turn_player().is_ok_and(|c| c == nickname);
            let removed = game.remove_player(nickname);
            (held_turn, removed, game.players().len())
        };
        if !removed {
            return;
        }
        tracing::info!(game = %self.game_id, %nickname, seated, "player left running game");
        broadcast_game_data(&self.players, &self.game);

        if seated < MIN_PLAYERS {
            if self.grace_deadline.is_none() {
                self.grace_deadline = Some(Instant::now() + self.config.reconnect_grace);
                tracing::info!(
                    game = %self.game_id,
                    grace = ?self.config.reconnect_grace,
                    "waiting for players to return"
                );
            }
            if held_turn {
                self.turn_pending = true;
            }
        } else if held_turn {
            self.start_turn();
        }
    }

    fn player_returned(&mut self, nickname: &str) -> Result<(), GameError> {
        let player = self.player(nickname)?;
        let data = {
            let mut game = lock_game(&self.game);
            if !game.reinstate(nickname) {
                return Err(GameError::NotFound(nickname.to_string()));
            }
            game_data_param(&game, &self.players)?
        };
        tracing::info!(game = %self.game_id, %nickname, "player returned to running game");
        update(&player, CommandId::ServerReconnectGameData, vec![data]);
        broadcast_game_data(&self.players, &self.game);

        if self.seated() >= MIN_PLAYERS {
            if self.grace_deadline.take().is_some() {
                tracing::info!(game = %self.game_id, "enough players again, resuming");
            }
            if self.turn_pending {
                lock_game(&self.game).open_turn();
                self.start_turn();
            }
        }
        Ok(())
    }

    fn finish_with_winner(&mut self, winner: &Player, timestamp: &str) {
        tracing::info!(game = %self.game_id, winner = %winner.nickname(), "game won");
        let (seated, departed) = {
            let game = lock_game(&self.game);
            let departed: Vec<String> = game.departed().map(|p| p.nickname.clone()).collect();
            (game.player_names(), departed)
        };

        respond(winner, CommandId::ResponseServerEndScore, timestamp, vec![]);
        let name = Param::new(params::PLAYER_NAME, winner.nickname());
        for nickname in seated.iter().filter(|n| *n != winner.nickname()) {
            if let Ok(player) = self.players.get(nickname) {
                update(&player, CommandId::ServerUpdateEndScore, vec![name.clone()]);
            }
        }
        self.release(seated.iter().chain(&departed));
    }

    /// Ends the game after the grace period ran out.
    fn abandon(&mut self) {
        let (seated, departed) = {
            let mut game = lock_game(&self.game);
            game.finish();
            let departed: Vec<String> = game.departed().map(|p| p.nickname.clone()).collect();
            (game.player_names(), departed)
        };
        tracing::warn!(game = %self.game_id, ?seated, "not enough players, abandoning game");

        for nickname in &seated {
            if let Ok(player) = self.players.get(nickname) {
                update(&player, CommandId::ServerUpdateNotEnoughPlayers, vec![]);
            }
        }
        self.release(seated.iter().chain(&departed));
    }

    /// Detaches everyone from the finished game and drops it from the
    /// lobby.
    fn release<'a>(&self, nicknames: impl Iterator<Item = &'a String>) {
        for nickname in nicknames {
            if let Ok(player) = self.players.get(nickname) {
                if player.game() == Some(self.game_id) {
                    player.set_game(None);
                }
            }
        }
        self.games.remove(self.game_id);
        broadcast_game_list(&self.players, &self.games);
    }
}

/// Spawns the coordinator for a game that has just started.
///
/// `inbox` comes from [`TurnHandle::channel`], whose handle was attached
/// by [`GameRegistry::start`]. Anything sent in between, such as a
/// departure, is handled right after the first turn is started.
pub(crate) fn spawn_coordinator(
    game_id: GameId,
    game: SharedGame,
    inbox: mpsc::UnboundedReceiver<TurnCommand>,
    players: Arc<PlayerRegistry>,
    games: Arc<GameRegistry>,
    config: GameConfig,
) {
    let coordinator = Coordinator {
        game_id,
        game,
        players,
        games,
        config,
        receiver: inbox,
        grace_deadline: None,
        turn_pending: false,
    };
    tokio::spawn(coordinator.run());
}
