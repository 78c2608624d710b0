//! The server's record of one player.
//!
//! A `Player` is created on login and lives in the
//! [`PlayerRegistry`](crate::PlayerRegistry) until the player logs out. If
//! the player becomes unreachable it stays registered, marked
//! disconnected, so a later reconnect can pick up where it left off.
//!
//! # Outbound messages
//!
//! Nothing outside a connection's own session task ever writes to its
//! socket. Everyone else, whether a request handler or a game's turn
//! coordinator, calls [`Player::send`], which pushes the message onto the
//! player's outbound channel. The session task drains that channel and
//! writes frames in order.
//!
//! `send` also applies the protocol rules for outgoing messages while
//! holding the player's lock:
//!
//! 1. If the command is a state machine trigger that the player's current
//!    state does not permit, the message is skipped (for example, a game
//!    list update is not sent to a player who is already seated in a game).
//! 2. Otherwise the trigger fires.
//! 3. If the command must be acknowledged, its timestamp is recorded as
//!    an outstanding acknowledgment.

use std::sync::{Mutex, MutexGuard, PoisonError};

use farkle_protocol::{CommandId, GameId, Message};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::{PlayerState, SessionError, StateMachine};

/// An instruction for a connection's session task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Encode and write this message.
    Message(Message),
    /// Flush what was queued before, then close the connection.
    Close,
}

/// Channel sender for delivering outbound instructions to a connection.
pub type PlayerSender = mpsc::UnboundedSender<Outbound>;

/// What happened to a message passed to [`Player::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued for the connection.
    Sent,
    /// Not permitted in the player's current state; nothing changed.
    Skipped(PlayerState),
    /// The player has no live connection; nothing changed.
    Offline,
}

/// Whether `name` is a valid nickname or game name: 3 to 20 ASCII
/// letters or digits.
pub fn is_valid_name(name: &str) -> bool {
    (3..=20).contains(&name.len()) && name.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[derive(Debug)]
struct PendingAck {
    timestamp: String,
    sent_at: Instant,
}

#[derive(Debug)]
struct PlayerInner {
    machine: StateMachine,
    sender: Option<PlayerSender>,
    connected: bool,
    game: Option<GameId>,
    pending_acks: Vec<PendingAck>,
}

/// A registered player.
///
/// The nickname is immutable and doubles as the registry key. Everything
/// else sits behind a lock scoped to this player, held only for the
/// duration of a single method call.
#[derive(Debug)]
pub struct Player {
    nickname: String,
    inner: Mutex<PlayerInner>,
}

impl Player {
    /// Creates a connected player in the `Start` state.
    pub fn new(nickname: impl Into<String>, sender: PlayerSender) -> Self {
        Self {
            nickname: nickname.into(),
            inner: Mutex::new(PlayerInner {
                machine: StateMachine::new(),
                sender: Some(sender),
                connected: true,
                game: None,
                pending_acks: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlayerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn state(&self) -> PlayerState {
        self.lock().machine.state()
    }

    pub fn can_fire(&self, trigger: CommandId) -> bool {
        self.lock().machine.can_fire(trigger)
    }

    /// Fires a trigger on the player's state machine.
    ///
    /// # Errors
    /// Returns [`SessionError::IllegalTransition`] if the current state
    /// doesn't permit it.
    pub fn fire(&self, trigger: CommandId) -> Result<PlayerState, SessionError> {
        self.lock().machine.fire(trigger)
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// The game this player is in, or was last in before disconnecting.
    pub fn game(&self) -> Option<GameId> {
        self.lock().game
    }

    pub fn set_game(&self, game: Option<GameId>) {
        self.lock().game = game;
    }

    /// Number of acknowledgments the player still owes.
    pub fn pending_acks(&self) -> usize {
        self.lock().pending_acks.len()
    }

    /// When the oldest outstanding acknowledgment was requested.
    pub fn oldest_pending_ack(&self) -> Option<Instant> {
        self.lock().pending_acks.first().map(|p| p.sent_at)
    }

    /// Settles the outstanding acknowledgment with this timestamp.
    ///
    /// Returns `false` if no such acknowledgment was outstanding.
    pub fn acknowledge(&self, timestamp: &str) -> bool {
        let mut inner = self.lock();
        match inner.pending_acks.iter().position(|p| p.timestamp == timestamp) {
            Some(i) => {
                inner.pending_acks.remove(i);
                true
            }
            None => false,
        }
    }

    /// Queues a message for this player's connection, applying the
    /// state machine and acknowledgment rules described in the module docs.
    pub fn send(&self, msg: Message) -> Delivery {
        let spec = msg.command().map(CommandId::spec);
        let mut inner = self.lock();

        let Some(sender) = inner.sender.clone().filter(|_| inner.connected) else {
            return Delivery::Offline;
        };

        let trigger = spec.and_then(|s| s.trigger());
        if let Some(trigger) = trigger {
            if !inner.machine.can_fire(trigger) {
                let state = inner.machine.state();
                tracing::debug!(
                    nickname = %self.nickname,
                    ?trigger,
                    %state,
                    "skipping message not permitted in current state"
                );
                return Delivery::Skipped(state);
            }
        }

        let timestamp = msg.timestamp.clone();
        if sender.send(Outbound::Message(msg)).is_err() {
            return Delivery::Offline;
        }

        if let Some(trigger) = trigger {
            // Checked above under the same lock.
            let _ = inner.machine.fire(trigger);
        }
        if spec.is_some_and(|s| s.requires_ack()) {
            inner.pending_acks.push(PendingAck {
                timestamp,
                sent_at: Instant::now(),
            });
        }
        Delivery::Sent
    }

    /// Asks the session task to close the connection after flushing what
    /// is already queued.
    pub fn close(&self) {
        if let Some(sender) = &self.lock().sender {
            let _ = sender.send(Outbound::Close);
        }
    }

    /// Marks the player disconnected and drops its connection handle.
    ///
    /// Returns `false` if it was already disconnected.
    pub fn disconnect(&self) -> bool {
        let mut inner = self.lock();
        let was_connected = inner.connected;
        inner.connected = false;
        inner.sender = None;
        inner.pending_acks.clear();
        was_connected
    }

    /// Attaches a new connection to a disconnected player.
    ///
    /// The state machine is reset to `Start` and fires `ClientReconnect`.
    /// Returns the state the player was in when it dropped.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyConnected`] if the player still has a
    /// live connection.
    pub fn reattach(&self, sender: PlayerSender) -> Result<PlayerState, SessionError> {
        let mut inner = self.lock();
        if inner.connected {
            return Err(SessionError::AlreadyConnected(self.nickname.clone()));
        }
        let previous = inner.machine.state();
        inner.machine.reset();
        inner.machine.fire(CommandId::ClientReconnect)?;
        inner.sender = Some(sender);
        inner.connected = true;
        inner.pending_acks.clear();
        Ok(previous)
    }
}
