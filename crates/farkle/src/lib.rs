//! # Farkle
//!
//! Session server for a multiplayer Farkle dice game.
//!
//! Clients connect over TCP, log in with a nickname, create or join a
//! game in the lobby, and play synchronized turns. The server alone rolls
//! the dice, scores selections, and decides whose turn it is.
//!
//! ## Layers
//!
//! ```text
//! farkle-transport  newline-framed TCP
//! farkle-protocol   messages, command table, codec
//! farkle-session    players, protocol state machine, outbound delivery
//! farkle-game       games, turn coordinators, registries
//! farkle            accept loop, per-connection session task, config
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use farkle::{FarkleServer, ServerConfig};
//!
//! # async fn start() -> Result<(), farkle::FarkleError> {
//! let server = FarkleServer::builder()
//!     .config(ServerConfig::default())
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{ServerConfig, BIND_ENV};
pub use error::{ErrorClass, FarkleError};
pub use server::{FarkleServer, FarkleServerBuilder};
