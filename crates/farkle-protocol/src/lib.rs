//! Wire protocol for Farkle.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Types** ([`Message`], [`Param`], [`GameId`]): what travels on
//!   the wire.
//! - **Command table** ([`CommandId`], [`CommandSpec`], [`lookup`]):
//!   which commands exist, what parameters they carry, and which of them
//!   drive the player state machine or need an acknowledgment.
//! - **Codec** ([`encode`], [`decode`]): the newline-delimited text
//!   format.
//! - **Requests** ([`Request`]): typed client commands for dispatch.
//! - **Lists** ([`GameListEntry`], [`PlayerListEntry`], [`GameDataEntry`]):
//!   structured values nested inside a single parameter.
//!
//! # Architecture
//!
//! ```text
//! Transport (frames) → Protocol (Message, Request) → Session (player state)
//! ```

mod codec;
mod command;
mod error;
mod lists;
mod request;
mod types;

pub use codec::{decode, decode_list, encode, encode_list};
pub use command::{all as all_commands, lookup, params, CommandId, CommandSpec, Origin};
pub use error::ProtocolError;
pub use lists::{
    decode_cubes, decode_entries, encode_cubes, encode_entries, CubeValue,
    GameDataEntry, GameListEntry, ListEntry, PlayerListEntry,
};
pub use request::Request;
pub use types::{
    find_param, timestamp_now, GameId, Message, Param, COMMAND_ID_WIDTH,
    HEADER_WIDTH, SIGNATURE, TIMESTAMP_FORMAT, TIMESTAMP_WIDTH,
};
