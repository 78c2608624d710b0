//! The Farkle game engine.
//!
//! A [`Game`] holds the seated players, whose turn it is, and every throw
//! made so far. It knows the rules (dice supply, selection, scoring) but
//! nothing about connections: the [coordinator](crate::TurnHandle) turns
//! engine results into protocol messages.
//!
//! # Rules
//!
//! - A turn starts with six dice.
//! - After each throw the player selects some of the rolled dice. Only
//!   ones (100 points each) and fives (50 points each) score, and the
//!   selection must come from the throw just made.
//! - Selected points are added to the player's score straight away.
//! - The next throw of the same turn uses the dice that were not
//!   selected. A throw with no scoring dice ends the turn.

use std::fmt;

use farkle_protocol::{GameId, GameListEntry};
use farkle_session::is_valid_name;

use crate::{DiceSource, GameConfig, GameError, RandomDice};

/// Dice rolled at the start of every turn.
pub const DICE_PER_TURN: usize = 6;

/// Fewest players a game can start with.
pub const MIN_PLAYERS: usize = 2;

/// Points for a single die face, or `None` if the face doesn't score.
pub fn score_of(face: u8) -> Option<u32> {
    match face {
        1 => Some(100),
        5 => Some(50),
        _ => None,
    }
}

/// Whether any of `values` scores.
pub fn has_scoring_dice(values: &[u8]) -> bool {
    values.iter().any(|v| score_of(*v).is_some())
}

/// Whether every face in `part` can be taken from `whole`, counting
/// repeated faces.
fn is_sub_multiset(part: &[u8], whole: &[u8]) -> bool {
    let mut available = [0usize; 7];
    for &face in whole {
        if let Some(slot) = available.get_mut(usize::from(face)) {
            *slot += 1;
        }
    }
    part.iter().all(|&face| match available.get_mut(usize::from(face)) {
        Some(slot) if *slot > 0 => {
            *slot -= 1;
            true
        }
        _ => false,
    })
}

// ---------------------------------------------------------------------------
// Turn history
// ---------------------------------------------------------------------------

/// One roll of the dice and the faces the player kept from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Throw {
    pub rolled: Vec<u8>,
    pub selected: Vec<u8>,
}

/// The throws a player made in one turn, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Turn {
    pub throws: Vec<Throw>,
}

/// A player's seat in a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerGameData {
    pub nickname: String,
    pub score: u32,
    pub turns: Vec<Turn>,
}

impl PlayerGameData {
    fn new(nickname: &str) -> Self {
        Self {
            nickname: nickname.to_string(),
            score: 0,
            turns: Vec::new(),
        }
    }
}

/// A seat vacated by a player who became unreachable mid-game.
#[derive(Debug, Clone)]
struct DepartedSeat {
    seat: usize,
    data: PlayerGameData,
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// The lifecycle of a game.
///
/// ```text
/// Created → Running → Ended
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    /// Accepting players; listed in the lobby.
    Created,
    /// Turns are being played; membership only changes through
    /// departures and returns.
    Running,
    /// Someone won, or too few players were left.
    Ended,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// One game of Farkle.
#[derive(Debug)]
pub struct Game {
    id: GameId,
    name: String,
    max_players: usize,
    /// Seated players in join order. The order is the turn order.
    players: Vec<PlayerGameData>,
    departed: Vec<DepartedSeat>,
    /// Index into `players` of whoever holds the turn.
    turn: usize,
    state: GameState,
    dice: Box<dyn DiceSource>,
}

impl Game {
    /// Creates an empty game with fair dice.
    ///
    /// # Errors
    /// Returns [`GameError::InvalidArgs`] if the name is not 3 to 20 ASCII
    /// letters or digits, or `max_players` is outside
    /// `2..=config.max_players_limit`.
    pub fn new(name: &str, max_players: usize, config: &GameConfig) -> Result<Self, GameError> {
        if !is_valid_name(name) {
            return Err(GameError::InvalidArgs(format!("game name {name:?}")));
        }
        if !(MIN_PLAYERS..=config.max_players_limit).contains(&max_players) {
            return Err(GameError::InvalidArgs(format!(
                "max players {max_players} not in {MIN_PLAYERS}..={}",
                config.max_players_limit
            )));
        }
        Ok(Self {
            id: GameId(0),
            name: name.to_string(),
            max_players,
            players: Vec::new(),
            departed: Vec::new(),
            turn: 0,
            state: GameState::Created,
            dice: Box::new(RandomDice),
        })
    }

    /// Replaces the dice.
    pub fn with_dice(mut self, dice: Box<dyn DiceSource>) -> Self {
        self.dice = dice;
        self
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: GameId) {
        self.id = id;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    /// Seated players in turn order.
    pub fn players(&self) -> &[PlayerGameData] {
        &self.players
    }

    /// Players who left the running game and may still come back.
    pub fn departed(&self) -> impl Iterator<Item = &PlayerGameData> {
        self.departed.iter().map(|d| &d.data)
    }

    pub fn player_names(&self) -> Vec<String> {
        self.players.iter().map(|p| p.nickname.clone()).collect()
    }

    /// Whether `nickname` is seated.
    pub fn is_member(&self, nickname: &str) -> bool {
        self.seat_of(nickname).is_some()
    }

    /// Whether `nickname` is seated or holds a departed seat.
    pub fn has_seat(&self, nickname: &str) -> bool {
        self.is_member(nickname) || self.departed.iter().any(|d| d.data.nickname == nickname)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    /// How this game appears in the lobby's game list.
    pub fn list_entry(&self) -> GameListEntry {
        GameListEntry {
            game_name: self.name.clone(),
            max_players: self.max_players,
            connected_players: self.players.len(),
        }
    }

    fn seat_of(&self, nickname: &str) -> Option<usize> {
        self.players.iter().position(|p| p.nickname == nickname)
    }

    /// Seats a player at the end of the turn order.
    ///
    /// # Errors
    /// [`GameError::AlreadyStarted`], [`GameError::AlreadyMember`] or
    /// [`GameError::GameFull`]. Membership is unchanged on failure.
    pub fn add_player(&mut self, nickname: &str) -> Result<(), GameError> {
        if self.state != GameState::Created {
            return Err(GameError::AlreadyStarted(self.name.clone()));
        }
        if self.is_member(nickname) {
            return Err(GameError::AlreadyMember(nickname.to_string()));
        }
        if self.is_full() {
            return Err(GameError::GameFull(self.name.clone()));
        }
        self.players.push(PlayerGameData::new(nickname));
        Ok(())
    }

    /// Unseats a player. Returns `false` if it wasn't seated.
    ///
    /// In a running game the seat and score are kept aside for
    /// [`reinstate`](Self::reinstate). The current player stays current;
    /// if the departing player held the turn, it passes to the next seat.
    pub fn remove_player(&mut self, nickname: &str) -> bool {
        let Some(seat) = self.seat_of(nickname) else {
            return false;
        };
        let data = self.players.remove(seat);

        if self.state == GameState::Running {
            self.departed.push(DepartedSeat { seat, data });
            if seat < self.turn {
                self.turn -= 1;
            } else if seat == self.turn {
                if self.turn >= self.players.len() {
                    self.turn = 0;
                }
                self.open_turn();
            }
        } else if self.turn >= self.players.len() {
            self.turn = 0;
        }
        true
    }

    /// Gives a departed player its seat and score back. Returns `false` if
    /// the game isn't running or has no departed seat for `nickname`.
    pub fn reinstate(&mut self, nickname: &str) -> bool {
        if self.state != GameState::Running {
            return false;
        }
        let Some(i) = self.departed.iter().position(|d| d.data.nickname == nickname) else {
            return false;
        };
        let DepartedSeat { seat, data } = self.departed.remove(i);
        let seat = seat.min(self.players.len());
        if !self.players.is_empty() && seat <= self.turn {
            self.turn += 1;
        }
        self.players.insert(seat, data);
        true
    }

    /// Starts the game with the first seated player to move.
    ///
    /// # Errors
    /// [`GameError::AlreadyStarted`] unless the game is `Created`;
    /// [`GameError::NotEnoughPlayers`] with fewer than two players.
    pub fn start(&mut self) -> Result<(), GameError> {
        if self.state != GameState::Created {
            return Err(GameError::AlreadyStarted(self.name.clone()));
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers);
        }
        self.state = GameState::Running;
        self.turn = 0;
        self.open_turn();
        Ok(())
    }

    /// Marks the game over.
    pub fn finish(&mut self) {
        self.state = GameState::Ended;
    }

    /// The nickname of whoever holds the turn.
    ///
    /// # Errors
    /// [`GameError::NotRunning`] or [`GameError::NoPlayers`].
    pub fn current_turn_player(&self) -> Result<&str, GameError> {
        if self.state != GameState::Running {
            return Err(GameError::NotRunning);
        }
        self.players
            .get(self.turn)
            .map(|p| p.nickname.as_str())
            .ok_or(GameError::NoPlayers)
    }

    /// Passes the turn to the next seat and opens a fresh turn for it.
    ///
    /// # Errors
    /// [`GameError::NotRunning`] or [`GameError::NoPlayers`].
    pub fn advance_turn(&mut self) -> Result<&str, GameError> {
        if self.state != GameState::Running {
            return Err(GameError::NotRunning);
        }
        if self.players.is_empty() {
            return Err(GameError::NoPlayers);
        }
        self.turn = (self.turn + 1) % self.players.len();
        self.open_turn();
        self.current_turn_player()
    }

    /// Makes sure the current player has a turn with no throws yet.
    pub fn open_turn(&mut self) {
        if let Some(player) = self.players.get_mut(self.turn) {
            let fresh = player.turns.last().is_some_and(|t| t.throws.is_empty());
            if !fresh {
                player.turns.push(Turn::default());
            }
        }
    }

    fn check_turn(&self, nickname: &str) -> Result<usize, GameError> {
        if self.current_turn_player()? != nickname {
            return Err(GameError::NotYourTurn(nickname.to_string()));
        }
        Ok(self.turn)
    }

    /// Rolls the dice for the current player's next throw.
    ///
    /// The first throw of a turn uses six dice; later throws use the dice
    /// left unselected by the previous throw.
    ///
    /// # Errors
    /// - [`GameError::NotRunning`] or [`GameError::NotYourTurn`].
    /// - [`GameError::InvalidSelection`] if the previous throw has not
    ///   been selected from yet.
    pub fn new_throw(&mut self, nickname: &str) -> Result<Vec<u8>, GameError> {
        let seat = self.check_turn(nickname)?;
        self.open_turn_if_missing(seat);
        let player = &mut self.players[seat];
        let turn = player.turns.last_mut().ok_or(GameError::NoPlayers)?;

        let count = match turn.throws.last() {
            None => DICE_PER_TURN,
            Some(prev) if prev.selected.is_empty() => {
                return Err(GameError::InvalidSelection(
                    "previous throw has no selection".into(),
                ));
            }
            Some(prev) => prev.rolled.len() - prev.selected.len(),
        };

        let rolled = self.dice.roll(count);
        turn.throws.push(Throw {
            rolled: rolled.clone(),
            selected: Vec::new(),
        });
        Ok(rolled)
    }

    fn open_turn_if_missing(&mut self, seat: usize) {
        if let Some(player) = self.players.get_mut(seat) {
            if player.turns.is_empty() {
                player.turns.push(Turn::default());
            }
        }
    }

    /// Validates and records a selection from the current player's last
    /// throw, returning the points it is worth.
    ///
    /// # Errors
    /// - [`GameError::NotRunning`] or [`GameError::NotYourTurn`].
    /// - [`GameError::InvalidSelection`] if the selection is empty,
    ///   contains a non-scoring face, or isn't part of the last throw.
    pub fn score_increase(&mut self, nickname: &str, selection: &[u8]) -> Result<u32, GameError> {
        let seat = self.check_turn(nickname)?;
        let throw = self.players[seat]
            .turns
            .last_mut()
            .and_then(|t| t.throws.last_mut())
            .ok_or_else(|| GameError::InvalidSelection("no throw to select from".into()))?;

        if !throw.selected.is_empty() {
            return Err(GameError::InvalidSelection("throw already selected".into()));
        }
        if selection.is_empty() {
            return Err(GameError::InvalidSelection("empty selection".into()));
        }

        let mut points = 0;
        for &face in selection {
            points += score_of(face)
                .ok_or_else(|| GameError::InvalidSelection(format!("{face} does not score")))?;
        }
        if !is_sub_multiset(selection, &throw.rolled) {
            return Err(GameError::InvalidSelection(format!(
                "{selection:?} is not part of {:?}",
                throw.rolled
            )));
        }

        throw.selected = selection.to_vec();
        Ok(points)
    }

    pub fn player_score(&self, nickname: &str) -> Option<u32> {
        self.seat_of(nickname).map(|s| self.players[s].score)
    }

    /// Sets a seated player's cumulative score. Returns `false` if the
    /// player isn't seated.
    pub fn set_player_score(&mut self, nickname: &str, score: u32) -> bool {
        match self.seat_of(nickname) {
            Some(seat) => {
                self.players[seat].score = score;
                true
            }
            None => false,
        }
    }
}
