//! In-memory chunk cache.
//!
//! Entries are shared as `Arc<RwLock<Chunk>>` so an in-flight response
//! encoder can hold a chunk while the cache keeps serving lookups.
//! Lookups never block behind generation: generating threads take the
//! entry's own write lock, not a map-wide one.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::constants::CHUNK_SIZE;
use crate::core::chunk::Chunk;
use crate::core::tile::Tile;

pub type ChunkRef = Arc<RwLock<Chunk>>;

/// Thread-safe map of loaded chunks keyed by packed coordinates.
/// Knows nothing about persistence.
pub struct ChunkCache {
    chunks: DashMap<u64, ChunkRef>,
    max_chunks: usize,
}

fn key(chunk_x: i32, chunk_y: i32) -> u64 {
    (((chunk_x as i64) << 32) | (chunk_y as u32 as i64)) as u64
}

fn key_coords(key: u64) -> (i32, i32) {
    ((key >> 32) as i32, key as u32 as i32)
}

impl ChunkCache {
    pub fn new(max_chunks: usize) -> Self {
        Self {
            chunks: DashMap::new(),
            max_chunks,
        }
    }

    pub fn get(&self, chunk_x: i32, chunk_y: i32) -> Option<ChunkRef> {
        self.chunks
            .get(&key(chunk_x, chunk_y))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the existing entry or atomically inserts a fresh,
    /// non-generated chunk.
    pub fn get_or_create(&self, chunk_x: i32, chunk_y: i32) -> ChunkRef {
        Arc::clone(
            self.chunks
                .entry(key(chunk_x, chunk_y))
                .or_insert_with(|| Arc::new(RwLock::new(Chunk::new(chunk_x, chunk_y))))
                .value(),
        )
    }

    /// Replaces any existing entry for the chunk's coordinates.
    pub fn put(&self, chunk: Chunk) -> ChunkRef {
        let k = key(chunk.chunk_x(), chunk.chunk_y());
        let entry = Arc::new(RwLock::new(chunk));
        self.chunks.insert(k, Arc::clone(&entry));
        entry
    }

    pub fn remove(&self, chunk_x: i32, chunk_y: i32) {
        self.chunks.remove(&key(chunk_x, chunk_y));
    }

    pub fn contains(&self, chunk_x: i32, chunk_y: i32) -> bool {
        self.chunks.contains_key(&key(chunk_x, chunk_y))
    }

    /// Drops every chunk whose Chebyshev distance to the center exceeds
    /// `radius`.
    pub fn evict_outside(&self, center_x: i32, center_y: i32, radius: i32) {
        self.chunks.retain(|k, _| {
            let (cx, cy) = key_coords(*k);
            let dx = (cx - center_x).abs();
            let dy = (cy - center_y).abs();
            dx <= radius && dy <= radius
        });
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Advisory ceiling from the configuration; the cache itself never
    /// refuses inserts.
    pub fn over_capacity(&self) -> bool {
        self.chunks.len() > self.max_chunks
    }

    /// Snapshot of the current entries, safe to iterate while the cache
    /// keeps changing.
    pub fn snapshot(&self) -> Vec<ChunkRef> {
        self.chunks
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Tile at world coordinates, if its chunk is loaded and populated.
    pub fn tile(&self, world_x: i32, world_y: i32) -> Option<Tile> {
        let size = CHUNK_SIZE as i32;
        let chunk = self.get(world_x.div_euclid(size), world_y.div_euclid(size))?;
        let chunk = chunk.read();
        chunk.tile(
            world_x.rem_euclid(size) as usize,
            world_y.rem_euclid(size) as usize,
        )
    }

    /// Writes a tile at world coordinates and marks the owning chunk as
    /// edited.
    pub fn set_tile(&self, world_x: i32, world_y: i32, tile: Tile) {
        let size = CHUNK_SIZE as i32;
        let chunk = self.get_or_create(world_x.div_euclid(size), world_y.div_euclid(size));
        let mut chunk = chunk.write();
        chunk.set_tile(
            world_x.rem_euclid(size) as usize,
            world_y.rem_euclid(size) as usize,
            tile,
        );
        chunk.modified = true;
    }
}
