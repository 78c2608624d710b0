//! Transport abstraction layer for Farkle.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the byte stream a game session runs on, plus the newline-framed TCP
//! implementation the server uses.
//!
//! A [`Connection`] hands out whole frames: everything up to (but not
//! including) the next `\n`. Splitting the stream into frames is the
//! transport's job; turning a frame into a typed message is the protocol
//! crate's job.

#![allow(async_fn_in_trait)]

mod error;
mod line;
mod tcp;

pub use error::TransportError;
pub use line::LineReader;
pub use tcp::{TcpConnection, TcpTransport};

use std::fmt;

/// Default upper bound on a single frame, delimiter excluded.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A single connection that exchanges newline-delimited frames.
///
/// Exactly one task should call [`recv`](Connection::recv) on a given
/// connection. `recv` must be cancel safe: a partially read frame stays
/// buffered and is completed by the next call.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one already-delimited frame to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer, without its
    /// trailing `\n` (or `\r\n`).
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
