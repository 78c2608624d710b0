//! Games and turns for Farkle.
//!
//! A game is created and filled in the lobby, then handed to its own
//! turn coordinator (a Tokio task) once it starts.
//!
//! # Key types
//!
//! - [`Game`]: the rules engine: seats, turns, throws, scores
//! - [`GameRegistry`]: every live game, by id and by name
//! - [`GameManager`]: create/join/start, routes turn requests
//! - [`TurnHandle`]: send commands to a running game's coordinator
//! - [`DiceSource`]: where dice values come from
//! - [`GameConfig`]: score threshold, player limits, reconnect grace
//!
//! # Locking
//!
//! Games are shared as `Arc<Mutex<Game>>`. Locks are taken in the order
//! game registry, game, player registry, player, and never held across an
//! `.await`.

mod config;
mod coordinator;
mod dice;
mod error;
mod game;
mod manager;
mod notify;
mod registry;

pub use config::GameConfig;
pub use coordinator::TurnHandle;
pub use dice::{DiceSource, RandomDice, ScriptedDice};
pub use error::GameError;
pub use game::{
    has_scoring_dice, score_of, Game, GameState, PlayerGameData, Throw, Turn, DICE_PER_TURN,
    MIN_PLAYERS,
};
pub use manager::{DiceFactory, GameManager};
pub use notify::{
    broadcast_game_data, broadcast_game_list, broadcast_player_list, game_data_param,
    game_list_param, player_list_param, respond, update,
};
pub use registry::{lock_game, GameRegistry, SharedGame};
