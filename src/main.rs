//! Tank Arena Server
//!
//! Loads configuration, then serves rooms over WebSocket until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tank_arena::{config::AppConfig, GameServer, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("TANK_CONFIG").ok())
        .map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref()).context("loading configuration")?;

    info!("Tank Arena Server v{}", VERSION);
    info!(
        "Map {}x{}, {} players per room, {} Hz",
        config.game.map_width, config.game.map_height, config.game.max_players, config.game.tick_rate
    );
    match config.game.seed {
        Some(seed) => info!("Base seed: {}", hex::encode(seed.to_be_bytes())),
        None => info!("Base seed: random per room"),
    }

    let server = Arc::new(GameServer::new(config));
    let running = server.clone();
    let mut server_task = tokio::spawn(async move { running.run().await });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("listening for Ctrl-C")?;
            info!("Ctrl-C received, shutting down");
            server.shutdown();
        }
        result = &mut server_task => {
            // Server stopped on its own (bind failure or listener error)
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!("Server failed: {}", e);
                    Err(e.into())
                }
                Err(e) => Err(e.into()),
            };
        }
    }

    server.lobby().shutdown().await;
    server_task.await??;
    info!("Server stopped");
    Ok(())
}
