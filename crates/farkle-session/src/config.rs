//! Session configuration.

use std::time::Duration;

/// Configuration for liveness and acknowledgment handling.
///
/// Sensible defaults are provided; the server derives one of these from
/// its own configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a read may wait before the session pings the player, and
    /// how long an acknowledgment may stay outstanding before the player
    /// is considered unreachable.
    ///
    /// Default: 5 seconds.
    pub liveness_timeout: Duration,

    /// When set, any command other than an acknowledgment that arrives
    /// while an acknowledgment is outstanding marks the player
    /// unreachable. When clear, only an overdue acknowledgment does.
    ///
    /// Default: `false`.
    pub strict_acks: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            liveness_timeout: Duration::from_secs(5),
            strict_acks: false,
        }
    }
}
