//! Player sessions for Farkle.
//!
//! This crate tracks who is on the server and what each of them may do
//! next:
//!
//! 1. **State machine** ([`StateMachine`], [`PlayerState`]) decides which
//!    commands a player may send or receive in its current state.
//! 2. **Players** ([`Player`]) hold the state machine, the outbound
//!    channel to the player's connection, and outstanding acknowledgments.
//! 3. **Registry** ([`PlayerRegistry`]) maps nicknames to players.
//!
//! # How it fits in the stack
//!
//! ```text
//! Game Layer (above)  ← sends game updates through Player::send
//!     ↕
//! Session Layer (this crate)  ← player identity, state, delivery
//!     ↕
//! Protocol Layer (below)  ← provides CommandId, Message
//! ```

mod config;
mod error;
mod machine;
mod player;
mod registry;

pub use config::SessionConfig;
pub use error::SessionError;
pub use machine::{PlayerState, StateMachine};
pub use player::{is_valid_name, Delivery, Outbound, Player, PlayerSender};
pub use registry::PlayerRegistry;
