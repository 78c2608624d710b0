//! Server configuration.
//!
//! One JSON file configures every layer. Durations are whole
//! milliseconds. Missing fields take their defaults, so `{}` is a valid
//! configuration.

use std::path::Path;
use std::time::Duration;

use farkle_game::GameConfig;
use farkle_session::SessionConfig;
use serde::{Deserialize, Serialize};

use crate::FarkleError;

/// Environment variable that overrides [`ServerConfig::bind`].
pub const BIND_ENV: &str = "FARKLE_BIND";

/// Configuration for a [`FarkleServer`](crate::FarkleServer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    ///
    /// Default: `127.0.0.1:10000`.
    pub bind: String,

    /// Idle time before a ping, and how long an acknowledgment may stay
    /// outstanding.
    ///
    /// Default: 5 seconds.
    #[serde(with = "millis")]
    pub liveness_timeout: Duration,

    /// Largest accepted frame in bytes, line break excluded.
    ///
    /// Default: 1024.
    pub max_message_size: usize,

    /// Score that wins a game.
    ///
    /// Default: 10000.
    pub score_threshold: u32,

    /// Largest `maxPlayers` a game may be created with.
    ///
    /// Default: 4.
    pub max_players_limit: usize,

    /// How long a running game short of players waits for someone to
    /// return.
    ///
    /// Default: 30 seconds.
    #[serde(with = "millis")]
    pub reconnect_grace: Duration,

    /// Treat any command sent while an acknowledgment is outstanding as
    /// unreachability.
    ///
    /// Default: `false`.
    pub strict_acks: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:10000".to_string(),
            liveness_timeout: Duration::from_secs(5),
            max_message_size: farkle_transport::DEFAULT_MAX_FRAME_SIZE,
            score_threshold: 10_000,
            max_players_limit: 4,
            reconnect_grace: Duration::from_secs(30),
            strict_acks: false,
        }
    }
}

impl ServerConfig {
    /// Reads a JSON configuration file.
    ///
    /// # Errors
    /// [`FarkleError::ConfigIo`] if the file can't be read,
    /// [`FarkleError::ConfigFormat`] if it isn't a valid configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FarkleError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Applies overrides from the environment.
    pub fn with_env(mut self) -> Self {
        if let Ok(bind) = std::env::var(BIND_ENV) {
            self.bind = bind;
        }
        self
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            liveness_timeout: self.liveness_timeout,
            strict_acks: self.strict_acks,
        }
    }

    pub fn game_config(&self) -> GameConfig {
        GameConfig {
            score_threshold: self.score_threshold,
            max_players_limit: self.max_players_limit,
            reconnect_grace: self.reconnect_grace,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, "127.0.0.1:10000");
        assert_eq!(config.liveness_timeout, Duration::from_secs(5));
        assert_eq!(config.max_message_size, 1024);
        assert!(!config.strict_acks);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"liveness_timeout": 250, "score_threshold": 500}"#).unwrap();
        assert_eq!(config.liveness_timeout, Duration::from_millis(250));
        assert_eq!(config.score_threshold, 500);
        assert_eq!(config.reconnect_grace, Duration::from_secs(30));
        assert_eq!(config.bind, "127.0.0.1:10000");
    }

    #[test]
    fn test_serialize_uses_milliseconds() {
        let json = serde_json::to_value(ServerConfig::default()).unwrap();
        assert_eq!(json["liveness_timeout"], 5000);
        assert_eq!(json["reconnect_grace"], 30000);
    }

    #[test]
    fn test_derived_configs() {
        let config = ServerConfig {
            liveness_timeout: Duration::from_millis(100),
            strict_acks: true,
            score_threshold: 300,
            max_players_limit: 3,
            reconnect_grace: Duration::from_secs(1),
            ..ServerConfig::default()
        };

        let session = config.session_config();
        assert_eq!(session.liveness_timeout, Duration::from_millis(100));
        assert!(session.strict_acks);

        let game = config.game_config();
        assert_eq!(game.score_threshold, 300);
        assert_eq!(game.max_players_limit, 3);
        assert_eq!(game.reconnect_grace, Duration::from_secs(1));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = ServerConfig::load("/nonexistent/farkle.json").unwrap_err();
        assert!(matches!(err, FarkleError::ConfigIo(_)));
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let path = std::env::temp_dir().join(format!("farkle-config-{}.json", std::process::id()));
        std::fs::write(&path, "{\"bind\": 5}").unwrap();
        let err = ServerConfig::load(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, FarkleError::ConfigFormat(_)));
    }
}
