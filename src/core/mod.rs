//! Fundamental world types shared by generation, storage and the wire
//! layer.

pub mod cache;
pub mod chunk;
pub mod terrain;
pub mod tile;

pub use cache::{ChunkCache, ChunkRef};
pub use chunk::Chunk;
pub use terrain::TerrainType;
pub use tile::Tile;
