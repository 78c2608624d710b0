//! Game configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings shared by every game on the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Cumulative score that wins the game.
    pub score_threshold: u32,

    /// Largest `maxPlayers` a client may ask for when creating a game.
    pub max_players_limit: usize,

    /// How long a running game waits for a departed player to come back
    /// once fewer than two players remain.
    pub reconnect_grace: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            score_threshold: 10_000,
            max_players_limit: 4,
            reconnect_grace: Duration::from_secs(30),
        }
    }
}
