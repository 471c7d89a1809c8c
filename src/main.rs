//! Crashpoint Game Server
//!
//! Authoritative server for a provably-fair crash betting game. Runs one
//! table loop and a WebSocket front end.

use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crashpoint::game::engine::{EngineConfig, GameTable};
use crashpoint::network::server::{GameServer, ServerConfig};
use crashpoint::{BETTING_WINDOW_SECS, TICK_INTERVAL_MS, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Crashpoint Server v{}", VERSION);
    info!("Tick interval: {} ms", TICK_INTERVAL_MS);
    info!("Betting window: {} s", BETTING_WINDOW_SECS);

    let server_config = ServerConfig::from_env();
    if !server_config.auth.is_configured() {
        warn!("no JWT secret or public key configured; clients cannot authenticate");
    }

    let table = Arc::new(GameTable::new(EngineConfig::default()));
    let server = GameServer::new(server_config, table);
    server.run().await?;

    Ok(())
}
