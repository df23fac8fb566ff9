//! Server configuration loaded from a properties file.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{info, warn};

/// Typed view of `server.properties`. Immutable after startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Network
    pub port: u16,
    pub max_requests_per_second: u32,

    // World
    pub world_name: String,
    pub world_seed: i64,
    pub max_coordinate: i32,

    // Memory
    pub server_max_chunks: usize,
    pub emergency_threshold: f64,

    // Persistence
    pub autosave_interval_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 25565,
            max_requests_per_second: 10_000,
            world_name: "world".to_string(),
            world_seed: 123_456,
            max_coordinate: 100_000,
            server_max_chunks: 10_000,
            emergency_threshold: 0.9,
            autosave_interval_seconds: 30,
        }
    }
}

impl ServerConfig {
    /// Loads the configuration, falling back to defaults for missing or
    /// malformed keys. An absent file is created with the defaults so
    /// operators have something to edit.
    pub fn load(path: &Path) -> io::Result<ServerConfig> {
        if !path.exists() {
            info!("config file not found, writing defaults to {}", path.display());
            let config = ServerConfig::default();
            config.write_defaults(path)?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)?;
        info!("loaded configuration from {}", path.display());
        Ok(Self::parse(&content))
    }

    fn parse(content: &str) -> ServerConfig {
        let mut config = ServerConfig::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "server.port" => parse_into(&mut config.port, key, value),
                "server.max_requests_per_second" => {
                    parse_into(&mut config.max_requests_per_second, key, value)
                }
                "world.name" => config.world_name = value.to_string(),
                "world.seed" => parse_into(&mut config.world_seed, key, value),
                "world.max_coordinate" => parse_into(&mut config.max_coordinate, key, value),
                "memory.server_max_chunks" => {
                    parse_into(&mut config.server_max_chunks, key, value)
                }
                "memory.emergency_threshold" => {
                    parse_into(&mut config.emergency_threshold, key, value)
                }
                "persistence.autosave_interval_seconds" => {
                    parse_into(&mut config.autosave_interval_seconds, key, value)
                }
                _ => {}
            }
        }

        config
    }

    fn write_defaults(&self, path: &Path) -> io::Result<()> {
        let content = format!(
            "# Server configuration - generated defaults\n\
             server.port={}\n\
             server.max_requests_per_second={}\n\
             world.name={}\n\
             world.seed={}\n\
             world.max_coordinate={}\n\
             memory.server_max_chunks={}\n\
             memory.emergency_threshold={}\n\
             persistence.autosave_interval_seconds={}\n",
            self.port,
            self.max_requests_per_second,
            self.world_name,
            self.world_seed,
            self.max_coordinate,
            self.server_max_chunks,
            self.emergency_threshold,
            self.autosave_interval_seconds,
        );
        fs::write(path, content)
    }

    pub fn log_summary(&self) {
        info!("=== server configuration ===");
        info!("network: port {}, {} req/s per client", self.port, self.max_requests_per_second);
        info!(
            "world: '{}', seed {}, coordinate bound ±{}",
            self.world_name, self.world_seed, self.max_coordinate
        );
        info!(
            "memory: {} cached chunks, emergency threshold {:.0}%",
            self.server_max_chunks,
            self.emergency_threshold * 100.0
        );
        info!("persistence: autosave every {}s", self.autosave_interval_seconds);
    }
}

fn parse_into<T: std::str::FromStr>(field: &mut T, key: &str, value: &str) {
    match value.parse() {
        Ok(parsed) => *field = parsed,
        Err(_) => warn!("ignoring malformed value for {key}: {value:?}"),
    }
}
