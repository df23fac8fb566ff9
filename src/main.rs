use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tileworld::config::ServerConfig;
use tileworld::constants::SPAWN_WARMUP_RADIUS;
use tileworld::net::GameServer;
use tileworld::service::ChunkService;
use tileworld::storage::ChunkStorage;

/// Procedural tile world server.
#[derive(Parser)]
#[command(name = "server")]
struct Args {
    /// Path to the server configuration file
    #[arg(default_value = "server.properties")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = ServerConfig::load(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;
    config.log_summary();

    let world_dir = Path::new("worlds").join(&config.world_name);
    let storage = ChunkStorage::new(&world_dir).context("failed to initialize chunk storage")?;
    info!("chunk storage initialized using region file format");

    let service = Arc::new(ChunkService::new(
        config.world_seed,
        config.server_max_chunks,
        storage,
    ));

    info!("generating spawn area...");
    {
        let service = Arc::clone(&service);
        tokio::task::spawn_blocking(move || service.warm_spawn_area(SPAWN_WARMUP_RADIUS))
            .await
            .context("spawn warmup failed")?;
    }

    let server = GameServer::new(config.clone(), Arc::clone(&service));
    let listener = server
        .bind()
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    info!("server started on port {}", config.port);

    tokio::select! {
        result = Arc::clone(&server).serve(listener) => {
            result.context("accept loop failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down server...");
        }
    }

    server.shutdown().await;
    Ok(())
}
