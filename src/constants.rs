// World constants
pub const CHUNK_SIZE: usize = 16;
pub const REGION_CHUNKS: i32 = 32;
pub const SEA_LEVEL: f64 = 0.42;
pub const SPAWN_WARMUP_RADIUS: i32 = 10;

// Generation scales
pub const SCALE_CONTINENT: f64 = 0.0004;
pub const SCALE_MACRO: f64 = 0.00008;
pub const SCALE_LOCAL: f64 = 0.005;
pub const SCALE_RIVER: f64 = 0.001;

// Storage constants
pub const SECTOR_SIZE: u64 = 4096;
pub const CHUNKS_PER_REGION: usize = 1024;
pub const MAX_OPEN_REGIONS: usize = 50;

// Server constants
pub const CHUNK_WORKERS: usize = 4;
pub const EMERGENCY_EVICT_RADIUS: i32 = 100;
pub const MAX_CHUNK_PAYLOAD: usize = 4 * 1024 * 1024;
