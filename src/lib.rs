// Core module with fundamental world types
pub mod core;

// World module with deterministic terrain generation
pub mod world;

// Storage module with the region-file engine
pub mod storage;

// Net module with the wire protocol, server and client
pub mod net;

// Chunk resolution service (cache -> disk -> generator)
pub mod service;

// Other modules
pub mod config;
pub mod constants;

// Re-exports
pub use config::ServerConfig;
pub use constants::*;
pub use self::core::{Chunk, ChunkCache, ChunkRef, TerrainType, Tile};
pub use net::{GameServer, Request, Response, WorldClient};
pub use service::ChunkService;
pub use storage::{ChunkStorage, RegionFile, StorageError};
pub use world::{Biome, DesertBiome, MapGenerator, PerlinNoise, StandardBiome};
