//! Core protocol types: the message that travels on the wire and the
//! identifiers that appear in it.

use std::fmt;

use crate::command::CommandId;

// ---------------------------------------------------------------------------
// Header constants
// ---------------------------------------------------------------------------

/// Protocol magic that opens every frame.
pub const SIGNATURE: &str = "KIVUPS";

/// Width of the zero-padded decimal command id.
pub const COMMAND_ID_WIDTH: usize = 2;

/// `chrono` format of the timestamp field, e.g. `2024-01-05 13:07:42.000123`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Width of the timestamp field.
pub const TIMESTAMP_WIDTH: usize = 26;

/// Width of the fixed header (signature, command id, timestamp).
pub const HEADER_WIDTH: usize = SIGNATURE.len() + COMMAND_ID_WIDTH + TIMESTAMP_WIDTH;

/// Returns the current local time formatted for the timestamp field.
pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a game, assigned by the game registry.
///
/// Newtype over `u64` so a game id can't be mixed up with a count or an
/// index. Players are keyed by nickname instead, which is already unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Param
// ---------------------------------------------------------------------------

/// One `"name":"value"` pair inside a message's parameter group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: String,
}

impl Param {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Looks up a parameter by name in a parameter list.
pub fn find_param<'a>(params: &'a [Param], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.value.as_str())
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single protocol message.
///
/// The header fields are kept as raw text so a decoded message can be
/// re-encoded byte for byte. Validation against the command table happens
/// in the dispatcher, not here.
///
/// The timestamp doubles as a correlation id: a response carries the
/// timestamp of the request it answers, and a client acknowledgment carries
/// the timestamp of the message it acknowledges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub signature: String,
    pub command_id: u8,
    pub timestamp: String,
    pub nickname: String,
    pub params: Vec<Param>,
}

impl Message {
    /// Builds a message with the protocol signature and a fresh timestamp.
    pub fn new(
        command: CommandId,
        nickname: impl Into<String>,
        params: Vec<Param>,
    ) -> Self {
        Self {
            signature: SIGNATURE.to_string(),
            command_id: command.id(),
            timestamp: timestamp_now(),
            nickname: nickname.into(),
            params,
        }
    }

    /// Replaces the timestamp, used when answering a request.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Returns the command this message carries, if the id is known.
    pub fn command(&self) -> Option<CommandId> {
        CommandId::from_id(self.command_id)
    }

    /// Returns the value of the named parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        find_param(&self.params, name)
    }
}
