//! The game registry: every game that has been created and not yet
//! ended.
//!
//! Lock order is registry first, then game. Code holding a game's lock
//! must release it before calling back into the registry.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use farkle_protocol::{GameId, GameListEntry};

use crate::{Game, GameError, GameState, TurnHandle};

/// A game shared between session tasks and its coordinator.
pub type SharedGame = Arc<Mutex<Game>>;

/// Locks a game, recovering the data if a previous holder panicked.
pub fn lock_game(game: &SharedGame) -> MutexGuard<'_, Game> {
    game.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct Entry {
    game: SharedGame,
    coordinator: Option<TurnHandle>,
}

/// What became of an unreachable player's seat.
#[derive(Debug)]
pub(crate) enum Departure {
    /// The seat in a waiting game was freed. `emptied` if nobody is left,
    /// in which case the game has been unregistered too.
    Unseated { game: SharedGame, emptied: bool },
    /// The game is running and its coordinator has to set the seat aside.
    Running(TurnHandle),
    /// The game is over or no longer registered.
    Detached,
}

/// All live games, keyed by id.
#[derive(Debug, Default)]
pub struct GameRegistry {
    games: Mutex<BTreeMap<GameId, Entry>>,
    last_id: AtomicU64,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<GameId, Entry>> {
        self.games.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a game under a fresh id and returns the id.
    ///
    /// # Errors
    /// Returns [`GameError::DuplicateName`] if a live game has the same
    /// name.
    pub fn add(&self, mut game: Game) -> Result<GameId, GameError> {
        let mut games = self.lock();
        if games.values().any(|e| lock_game(&e.game).name() == game.name()) {
            return Err(GameError::DuplicateName(game.name().to_string()));
        }
        let id = GameId(self.last_id.fetch_add(1, Ordering::Relaxed) + 1);
        game.set_id(id);
        games.insert(
            id,
            Entry {
                game: Arc::new(Mutex::new(game)),
                coordinator: None,
            },
        );
        Ok(id)
    }

    /// # Errors
    /// Returns [`GameError::NotFound`] if no live game has this id.
    pub fn get(&self, id: GameId) -> Result<SharedGame, GameError> {
        self.lock()
            .get(&id)
            .map(|e| Arc::clone(&e.game))
            .ok_or_else(|| GameError::NotFound(id.to_string()))
    }

    /// # Errors
    /// Returns [`GameError::NotFound`] if no live game has this name.
    pub fn get_by_name(&self, name: &str) -> Result<SharedGame, GameError> {
        self.lock()
            .values()
            .find(|e| lock_game(&e.game).name() == name)
            .map(|e| Arc::clone(&e.game))
            .ok_or_else(|| GameError::NotFound(name.to_string()))
    }

    /// Finds the game where `nickname` is seated or holds a departed seat.
    pub fn find_by_player(&self, nickname: &str) -> Option<SharedGame> {
        self.lock()
            .values()
            .find(|e| lock_game(&e.game).has_seat(nickname))
            .map(|e| Arc::clone(&e.game))
    }

    /// Unregisters a game, stopping its coordinator if it has one.
    pub fn remove(&self, id: GameId) -> Option<SharedGame> {
        let entry = self.lock().remove(&id)?;
        if let Some(coordinator) = entry.coordinator {
            coordinator.shutdown();
        }
        tracing::info!(game = %id, "game removed");
        Some(entry.game)
    }

    /// Starts a game and attaches its coordinator under one lock, so a
    /// running game is never seen without one. Returns the game and its
    /// members.
    ///
    /// # Errors
    /// [`GameError::NotFound`], or whatever [`Game::start`] rejects.
    pub(crate) fn start(
        &self,
        id: GameId,
        coordinator: TurnHandle,
    ) -> Result<(SharedGame, Vec<String>), GameError> {
        let mut games = self.lock();
        let entry = games.get_mut(&id).ok_or_else(|| GameError::NotFound(id.to_string()))?;
        let members = {
            let mut game = lock_game(&entry.game);
            game.start()?;
            game.player_names()
        };
        entry.coordinator = Some(coordinator);
        Ok((Arc::clone(&entry.game), members))
    }

    /// Takes `nickname` out of game `id` after it became unreachable.
    ///
    /// The game's state is read and acted on under the same lock, so a
    /// concurrent [`start`](Self::start) either happens first (and the
    /// coordinator is returned) or after the seat is already freed.
    pub(crate) fn depart(&self, id: GameId, nickname: &str) -> Departure {
        let mut games = self.lock();
        let Some(entry) = games.get(&id) else {
            return Departure::Detached;
        };
        let game = Arc::clone(&entry.game);
        let emptied = {
            let mut g = lock_game(&game);
            match g.state() {
                GameState::Created => {
                    g.remove_player(nickname);
                    g.players().is_empty()
                }
                GameState::Running => {
                    return entry
                        .coordinator
                        .clone()
                        .map_or(Departure::Detached, Departure::Running);
                }
                GameState::Ended => return Departure::Detached,
            }
        };
        if emptied {
            games.remove(&id);
            tracing::info!(game = %id, "game removed");
        }
        Departure::Unseated { game, emptied }
    }

    /// The turn coordinator of a running game.
    ///
    /// # Errors
    /// [`GameError::NotFound`] if the game is gone, [`GameError::NotRunning`]
    /// if it has no coordinator yet.
    pub fn coordinator(&self, id: GameId) -> Result<TurnHandle, GameError> {
        let games = self.lock();
        let entry = games.get(&id).ok_or_else(|| GameError::NotFound(id.to_string()))?;
        entry.coordinator.clone().ok_or(GameError::NotRunning)
    }

    /// All live games in id order.
    pub fn snapshot(&self) -> Vec<SharedGame> {
        self.lock().values().map(|e| Arc::clone(&e.game)).collect()
    }

    /// The lobby's view: every game still waiting for players.
    pub fn created_games_list(&self) -> Vec<GameListEntry> {
        self.lock()
            .values()
            .filter_map(|e| {
                let game = lock_game(&e.game);
                (game.state() == GameState::Created).then(|| game.list_entry())
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameConfig;

    fn game(name: &str, players: &[&str]) -> Game {
        let mut game = Game::new(name, 3, &GameConfig::default()).unwrap();
        for p in players {
            game.add_player(p).unwrap();
        }
        game
    }

    #[test]
    fn test_add_assigns_unique_ids() {
        let registry = GameRegistry::new();
        let a = registry.add(game("alpha", &[])).unwrap();
        let b = registry.add(game("bravo", &[])).unwrap();

        assert_ne!(a, b);
        assert_eq!(lock_game(&registry.get(a).unwrap()).id(), a);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_add_duplicate_name_fails() {
        let registry = GameRegistry::new();
        registry.add(game("alpha", &[])).unwrap();

        let err = registry.add(game("alpha", &[])).unwrap_err();

        assert!(matches!(err, GameError::DuplicateName(n) if n == "alpha"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_by_name_and_find_by_player() {
        let registry = GameRegistry::new();
        registry.add(game("alpha", &["alice"])).unwrap();
        registry.add(game("bravo", &["bob"])).unwrap();

        let bravo = registry.get_by_name("bravo").unwrap();
        let found = registry.find_by_player("bob").unwrap();

        assert!(Arc::ptr_eq(&bravo, &found));
        assert!(registry.find_by_player("carol").is_none());
        assert!(matches!(registry.get_by_name("zulu"), Err(GameError::NotFound(_))));
    }

    #[test]
    fn test_remove_then_get_is_not_found() {
        let registry = GameRegistry::new();
        let id = registry.add(game("alpha", &[])).unwrap();

        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert!(matches!(registry.get(id), Err(GameError::NotFound(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_created_games_list_skips_running_games() {
        let registry = GameRegistry::new();
        registry.add(game("alpha", &["alice"])).unwrap();
        let running = registry.add(game("bravo", &["bob", "carol"])).unwrap();
        lock_game(&registry.get(running).unwrap()).start().unwrap();

        let list = registry.created_games_list();

        assert_eq!(list, vec![GameListEntry {
            game_name: "alpha".into(),
            max_players: 3,
            connected_players: 1,
        }]);
    }

    #[test]
    fn test_ids_are_counted_per_registry() {
        let first = GameRegistry::new();
        let second = GameRegistry::new();

        let a = first.add(game("alpha", &[])).unwrap();
        let b = second.add(game("alpha", &[])).unwrap();

        assert_eq!(a, GameId(1));
        assert_eq!(b, GameId(1));
        assert_eq!(first.add(game("bravo", &[])).unwrap(), GameId(2));
    }

    #[test]
    fn test_start_attaches_coordinator_with_running_state() {
        let registry = GameRegistry::new();
        let id = registry.add(game("alpha", &["alice", "bob"])).unwrap();
        let (handle, _inbox) = TurnHandle::channel(id);

        let (shared, members) = registry.start(id, handle).unwrap();

        assert_eq!(members, ["alice", "bob"]);
        assert_eq!(lock_game(&shared).state(), GameState::Running);
        assert_eq!(registry.coordinator(id).unwrap().game_id(), id);
    }

    #[test]
    fn test_failed_start_leaves_no_coordinator() {
        let registry = GameRegistry::new();
        let id = registry.add(game("alpha", &["alice"])).unwrap();
        let (handle, _inbox) = TurnHandle::channel(id);

        let err = registry.start(id, handle).unwrap_err();

        assert!(matches!(err, GameError::NotEnoughPlayers));
        assert!(matches!(registry.coordinator(id), Err(GameError::NotRunning)));
    }

    #[test]
    fn test_depart_created_game_frees_seat_or_removes_game() {
        let registry = GameRegistry::new();
        let id = registry.add(game("alpha", &["alice", "bob"])).unwrap();

        let first = registry.depart(id, "bob");
        assert!(matches!(first, Departure::Unseated { emptied: false, .. }));
        assert_eq!(lock_game(&registry.get(id).unwrap()).player_names(), ["alice"]);

        let last = registry.depart(id, "alice");
        assert!(matches!(last, Departure::Unseated { emptied: true, .. }));
        assert!(registry.is_empty());
        assert!(matches!(registry.depart(id, "alice"), Departure::Detached));
    }

    #[test]
    fn test_depart_running_game_hands_back_coordinator_and_keeps_seat() {
        let registry = GameRegistry::new();
        let id = registry.add(game("alpha", &["alice", "bob"])).unwrap();
        let (handle, _inbox) = TurnHandle::channel(id);
        registry.start(id, handle).unwrap();

        let departure = registry.depart(id, "bob");

        assert!(matches!(departure, Departure::Running(h) if h.game_id() == id));
        assert_eq!(lock_game(&registry.get(id).unwrap()).player_names(), ["alice", "bob"]);
    }

    #[test]
    fn test_coordinator_before_start_is_not_running() {
        let registry = GameRegistry::new();
        let id = registry.add(game("alpha", &[])).unwrap();
        assert!(matches!(registry.coordinator(id), Err(GameError::NotRunning)));
    }
}
