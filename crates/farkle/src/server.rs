//! `FarkleServer` builder and server loop.
//!
//! This is the entry point for running a Farkle server. It ties together
//! all the layers: transport → protocol → session → game.

use std::sync::Arc;

use farkle_game::{DiceFactory, DiceSource, GameManager, GameRegistry};
use farkle_session::{PlayerRegistry, SessionConfig};
use farkle_transport::{TcpTransport, Transport};

use crate::handler::handle_connection;
use crate::{FarkleError, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) players: Arc<PlayerRegistry>,
    pub(crate) games: GameManager,
    pub(crate) session: SessionConfig,
}

/// Builder for configuring and starting a Farkle server.
///
/// # Example
///
/// ```rust,no_run
/// # async fn start() -> Result<(), farkle::FarkleError> {
/// use farkle::{FarkleServer, ServerConfig};
///
/// let server = FarkleServer::builder()
///     .config(ServerConfig::default())
///     .bind("0.0.0.0:10000")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct FarkleServerBuilder {
    config: ServerConfig,
    dice: Option<DiceFactory>,
}

impl FarkleServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            dice: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Makes the dice for every new game with `factory` instead of the
    /// thread RNG.
    pub fn dice(
        mut self,
        factory: impl Fn() -> Box<dyn DiceSource> + Send + Sync + 'static,
    ) -> Self {
        self.dice = Some(Arc::new(factory));
        self
    }

    /// Binds the listener and builds the server.
    pub async fn build(self) -> Result<FarkleServer, FarkleError> {
        let transport = TcpTransport::bind(&self.config.bind)
            .await?
            .max_frame_size(self.config.max_message_size);

        let players = Arc::new(PlayerRegistry::new());
        let mut games = GameManager::new(
            Arc::clone(&players),
            Arc::new(GameRegistry::new()),
            self.config.game_config(),
        );
        if let Some(dice) = self.dice {
            games = games.with_dice(move || dice());
        }

        let state = Arc::new(ServerState {
            players,
            games,
            session: self.config.session_config(),
        });

        Ok(FarkleServer { transport, state })
    }
}

impl Default for FarkleServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Farkle server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct FarkleServer {
    transport: TcpTransport,
    state: Arc<ServerState>,
}

impl FarkleServer {
    /// Creates a new builder.
    pub fn builder() -> FarkleServerBuilder {
        FarkleServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The registry of logged-in players.
    pub fn players(&self) -> Arc<PlayerRegistry> {
        Arc::clone(&self.state.players)
    }

    /// The game manager, and through it the game registry.
    pub fn games(&self) -> GameManager {
        self.state.games.clone()
    }

    /// Runs the server accept loop.
    ///
    /// Spawns a session task for each accepted connection. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), FarkleError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Farkle server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
