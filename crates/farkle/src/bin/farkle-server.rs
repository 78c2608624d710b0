//! Farkle server binary.
//!
//! Usage: `farkle-server [config.json]`. `RUST_LOG` sets the log filter
//! and `FARKLE_BIND` overrides the listen address.

use farkle::{FarkleError, FarkleServer, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), FarkleError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!(%path, "loading config");
            ServerConfig::load(&path)?
        }
        None => ServerConfig::default(),
    }
    .with_env();

    let server = FarkleServer::builder().config(config).build().await?;
    server.run().await
}
