//! Chunk resolution: cache, then disk, then the generator.
//!
//! Storage faults degrade gracefully: a failed read falls through to
//! generation, a failed write leaves the in-memory chunk authoritative
//! until the next autosave pass picks it up.

use std::sync::Arc;

use tracing::{info, warn};

use crate::core::cache::{ChunkCache, ChunkRef};
use crate::storage::ChunkStorage;
use crate::world::generator::MapGenerator;

/// Owns the cache, the storage engine and the generator.
pub struct ChunkService {
    cache: ChunkCache,
    storage: ChunkStorage,
    generator: MapGenerator,
}

impl ChunkService {
    pub fn new(seed: i64, max_cached_chunks: usize, storage: ChunkStorage) -> Self {
        Self {
            cache: ChunkCache::new(max_cached_chunks),
            storage,
            generator: MapGenerator::new(seed),
        }
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    pub fn storage(&self) -> &ChunkStorage {
        &self.storage
    }

    pub fn generator(&self) -> &MapGenerator {
        &self.generator
    }

    /// Resolves a chunk, blocking on disk or generation as needed.
    pub fn get_chunk_blocking(&self, chunk_x: i32, chunk_y: i32) -> ChunkRef {
        if let Some(chunk) = self.cache.get(chunk_x, chunk_y) {
            if chunk.read().generated {
                return chunk;
            }
        }

        match self.storage.load(chunk_x, chunk_y) {
            Ok(Some(chunk)) => return self.cache.put(chunk),
            Ok(None) => {}
            Err(e) => warn!("error loading chunk ({chunk_x}, {chunk_y}): {e}"),
        }

        let entry = self.cache.get_or_create(chunk_x, chunk_y);
        {
            let mut chunk = entry.write();
            if !chunk.generated {
                self.generator.generate_into(&mut chunk);
            }
        }

        // Persist the fresh chunk right away so a crash cannot lose it.
        let result = self.storage.save(&entry.read());
        if let Err(e) = result {
            warn!("error saving chunk ({chunk_x}, {chunk_y}): {e}");
        }

        entry
    }

    /// Async wrapper; the work runs on the blocking pool.
    pub async fn get_chunk(self: Arc<Self>, chunk_x: i32, chunk_y: i32) -> ChunkRef {
        tokio::task::spawn_blocking(move || self.get_chunk_blocking(chunk_x, chunk_y))
            .await
            .expect("chunk resolution task panicked")
    }

    /// Writes every generated chunk in the cache to disk. Returns the
    /// number of chunks written.
    pub fn save_all(&self) -> usize {
        let mut saved = 0;
        for entry in self.cache.snapshot() {
            let chunk = entry.read();
            if !chunk.generated {
                continue;
            }
            match self.storage.save(&chunk) {
                Ok(()) => saved += 1,
                Err(e) => warn!(
                    "error saving chunk ({}, {}): {e}",
                    chunk.chunk_x(),
                    chunk.chunk_y()
                ),
            }
        }
        saved
    }

    /// Materializes the world root so every client starts from the same
    /// deterministic spawn area.
    pub fn warm_spawn_area(&self, radius: i32) {
        for cx in -radius..=radius {
            for cy in -radius..=radius {
                let _ = self.get_chunk_blocking(cx, cy);
            }
        }
        let side = (radius * 2 + 1) as usize;
        info!("spawn area generated ({} chunks)", side * side);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ChunkStorage;
    use tempfile::tempdir;

    fn service(dir: &std::path::Path, seed: i64) -> ChunkService {
        ChunkService::new(seed, 10_000, ChunkStorage::new(dir).unwrap())
    }

    #[test]
    fn generates_caches_and_persists() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path(), 123);

        assert!(!svc.storage().contains(0, 0));
        let chunk = svc.get_chunk_blocking(0, 0);
        assert!(chunk.read().generated);

        // Cached and on disk after the first request.
        assert_eq!(svc.cache().len(), 1);
        assert!(svc.storage().contains(0, 0));
    }

    #[test]
    fn repeated_requests_share_the_entry() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path(), 123);

        let a = svc.get_chunk_blocking(4, -4);
        let b = svc.get_chunk_blocking(4, -4);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(svc.cache().len(), 1);
    }

    #[test]
    fn evicted_chunks_reload_from_disk_identically() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path(), 9001);

        let first = svc.get_chunk_blocking(5, 5).read().serialize().unwrap();

        svc.cache().remove(5, 5);
        assert_eq!(svc.cache().len(), 0);

        let second = svc.get_chunk_blocking(5, 5).read().serialize().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn disk_state_survives_a_service_restart() {
        let dir = tempdir().unwrap();
        let first = {
            let svc = service(dir.path(), 424242);
            let bytes = svc.get_chunk_blocking(5, 5).read().serialize().unwrap();
            svc.storage().close_all();
            bytes
        };

        let svc = service(dir.path(), 424242);
        let loaded = svc.storage().load(5, 5).unwrap().expect("chunk on disk");
        assert_eq!(loaded.serialize().unwrap(), first);
    }

    #[test]
    fn save_all_counts_generated_chunks() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path(), 7);

        for cx in 0..3 {
            let _ = svc.get_chunk_blocking(cx, 0);
        }
        // A bare placeholder entry must not be written.
        svc.cache().get_or_create(99, 99);

        assert_eq!(svc.save_all(), 3);
        assert!(!svc.storage().contains(99, 99));
    }

    #[test]
    fn warmup_populates_the_spawn_square() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path(), 55);

        svc.warm_spawn_area(2);
        assert_eq!(svc.cache().len(), 25);
        assert!(svc.storage().contains(-2, -2));
        assert!(svc.storage().contains(2, 2));
    }

    #[tokio::test]
    async fn async_wrapper_matches_blocking_path() {
        let dir = tempdir().unwrap();
        let svc = Arc::new(service(dir.path(), 88));

        let chunk = Arc::clone(&svc).get_chunk(1, 2).await;
        assert!(chunk.read().generated);
        assert_eq!(chunk.read().chunk_x(), 1);
        assert_eq!(chunk.read().chunk_y(), 2);
    }
}
