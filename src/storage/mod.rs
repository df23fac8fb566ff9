//! Persistent chunk storage on top of region files.
//!
//! Chunks are grouped 32x32 into one file per region
//! (`regions/r.<rx>.<ry>.bin`), which keeps the file count on disk three
//! orders of magnitude below one-file-per-chunk.

pub mod region;

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::constants::{MAX_OPEN_REGIONS, REGION_CHUNKS};
use crate::core::chunk::Chunk;

pub use region::RegionFile;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to initialize world directory {0}: {1}")]
    Init(PathBuf, io::Error),
    #[error("region i/o: {0}")]
    Io(#[from] io::Error),
}

/// An open region handle plus its recency stamp for the LRU.
struct OpenRegion {
    file: Arc<Mutex<RegionFile>>,
    last_used: u64,
}

/// The region-file engine. Owns every open region handle; individual
/// file operations take the handle's own lock, the table of handles is
/// guarded by the engine-wide lock.
pub struct ChunkStorage {
    region_dir: PathBuf,
    regions: Mutex<RegionTable>,
}

struct RegionTable {
    open: HashMap<u64, OpenRegion>,
    clock: u64,
}

fn region_key(region_x: i32, region_y: i32) -> u64 {
    (((region_x as i64) << 32) | (region_y as u32 as i64)) as u64
}

impl ChunkStorage {
    /// Prepares the on-disk layout for a world. Failure here is fatal to
    /// server startup.
    pub fn new(world_dir: &Path) -> Result<Self, StorageError> {
        let region_dir = world_dir.join("regions");
        fs::create_dir_all(&region_dir)
            .map_err(|e| StorageError::Init(region_dir.clone(), e))?;

        Ok(Self {
            region_dir,
            regions: Mutex::new(RegionTable {
                open: HashMap::new(),
                clock: 0,
            }),
        })
    }

    /// Fetches the open handle for a region, opening it on demand. The
    /// open set is a small LRU; the least recently touched handle is
    /// dropped when the table is full.
    fn region(&self, region_x: i32, region_y: i32) -> io::Result<Arc<Mutex<RegionFile>>> {
        let mut table = self.regions.lock();
        table.clock += 1;
        let stamp = table.clock;

        let key = region_key(region_x, region_y);
        if let Some(open) = table.open.get_mut(&key) {
            open.last_used = stamp;
            return Ok(Arc::clone(&open.file));
        }

        if table.open.len() >= MAX_OPEN_REGIONS {
            let oldest = table
                .open
                .iter()
                .min_by_key(|(_, open)| open.last_used)
                .map(|(key, _)| *key);
            if let Some(oldest) = oldest {
                // The file itself closes once in-flight operations drop
                // their reference.
                table.open.remove(&oldest);
                debug!("evicted region handle {oldest:#x} from the open set");
            }
        }

        let path = self
            .region_dir
            .join(format!("r.{region_x}.{region_y}.bin"));
        let file = Arc::new(Mutex::new(RegionFile::open(&path)?));
        table.open.insert(
            key,
            OpenRegion {
                file: Arc::clone(&file),
                last_used: stamp,
            },
        );
        Ok(file)
    }

    /// Persists a generated chunk into its region slot.
    pub fn save(&self, chunk: &Chunk) -> Result<(), StorageError> {
        if !chunk.generated {
            return Ok(());
        }

        let (cx, cy) = (chunk.chunk_x(), chunk.chunk_y());
        let data = chunk.serialize()?;

        let region = self.region(cx.div_euclid(REGION_CHUNKS), cy.div_euclid(REGION_CHUNKS))?;
        let mut region = region.lock();
        region.write_chunk(
            cx.rem_euclid(REGION_CHUNKS) as usize,
            cy.rem_euclid(REGION_CHUNKS) as usize,
            &data,
        )?;
        Ok(())
    }

    /// Loads a chunk from disk. `None` when the slot is empty or its
    /// frame cannot be decoded.
    pub fn load(&self, chunk_x: i32, chunk_y: i32) -> Result<Option<Chunk>, StorageError> {
        let region = self.region(
            chunk_x.div_euclid(REGION_CHUNKS),
            chunk_y.div_euclid(REGION_CHUNKS),
        )?;
        let data = {
            let mut region = region.lock();
            region.read_chunk(
                chunk_x.rem_euclid(REGION_CHUNKS) as usize,
                chunk_y.rem_euclid(REGION_CHUNKS) as usize,
            )?
        };

        let Some(data) = data else {
            return Ok(None);
        };

        match Chunk::deserialize(&data) {
            Ok(chunk) => Ok(Some(chunk)),
            Err(e) => {
                warn!("discarding undecodable chunk ({chunk_x}, {chunk_y}): {e}");
                Ok(None)
            }
        }
    }

    /// Whether a chunk has ever been written to disk.
    pub fn contains(&self, chunk_x: i32, chunk_y: i32) -> bool {
        match self.region(
            chunk_x.div_euclid(REGION_CHUNKS),
            chunk_y.div_euclid(REGION_CHUNKS),
        ) {
            Ok(region) => region.lock().has_chunk(
                chunk_x.rem_euclid(REGION_CHUNKS) as usize,
                chunk_y.rem_euclid(REGION_CHUNKS) as usize,
            ),
            Err(_) => false,
        }
    }

    /// Number of currently open region handles.
    pub fn open_regions(&self) -> usize {
        self.regions.lock().open.len()
    }

    /// Flushes and releases every open region handle.
    pub fn close_all(&self) {
        let mut table = self.regions.lock();
        for open in table.open.values() {
            if let Err(e) = open.file.lock().sync() {
                warn!("failed to sync region file: {e}");
            }
        }
        let count = table.open.len();
        table.open.clear();
        if count > 0 {
            info!("closed {count} region files");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::terrain::TerrainType;
    use crate::core::tile::Tile;
    use crate::world::generator::MapGenerator;
    use tempfile::tempdir;

    fn generated_chunk(cx: i32, cy: i32) -> Chunk {
        MapGenerator::new(777).generate_chunk(cx, cy)
    }

    #[test]
    fn save_and_load_round_trips() {
        let dir = tempdir().unwrap();
        let storage = ChunkStorage::new(dir.path()).unwrap();

        let chunk = generated_chunk(5, 5);
        storage.save(&chunk).unwrap();

        let loaded = storage.load(5, 5).unwrap().expect("chunk should exist");
        assert_eq!(
            loaded.serialize().unwrap(),
            chunk.serialize().unwrap()
        );
    }

    #[test]
    fn missing_chunk_is_none() {
        let dir = tempdir().unwrap();
        let storage = ChunkStorage::new(dir.path()).unwrap();
        assert!(storage.load(12, -9).unwrap().is_none());
        assert!(!storage.contains(12, -9));
    }

    #[test]
    fn ungenerated_chunks_are_not_persisted() {
        let dir = tempdir().unwrap();
        let storage = ChunkStorage::new(dir.path()).unwrap();

        storage.save(&Chunk::new(1, 1)).unwrap();
        assert!(!storage.contains(1, 1));
    }

    #[test]
    fn negative_coordinates_map_into_region_files() {
        let dir = tempdir().unwrap();
        let storage = ChunkStorage::new(dir.path()).unwrap();

        // Chunks straddling region borders in all four quadrants.
        for (cx, cy) in [(-1, -1), (-32, 0), (0, -33), (31, 32), (-40, 70)] {
            let chunk = generated_chunk(cx, cy);
            storage.save(&chunk).unwrap();
            assert!(storage.contains(cx, cy), "({cx}, {cy}) missing");
            let loaded = storage.load(cx, cy).unwrap().unwrap();
            assert_eq!(loaded.chunk_x(), cx);
            assert_eq!(loaded.chunk_y(), cy);
        }

        assert!(dir.path().join("regions/r.-1.-1.bin").exists());
        assert!(dir.path().join("regions/r.-2.2.bin").exists());
    }

    #[test]
    fn edits_survive_a_reload() {
        let dir = tempdir().unwrap();
        let storage = ChunkStorage::new(dir.path()).unwrap();

        let mut chunk = generated_chunk(2, 3);
        let mut tile = Tile::new(TerrainType::Grassland, 0.5, 0.5, 0.5);
        tile.owner_id = 42;
        tile.structure_id = 7;
        chunk.set_tile(8, 8, tile);
        chunk.modified = true;
        storage.save(&chunk).unwrap();

        let loaded = storage.load(2, 3).unwrap().unwrap();
        assert!(loaded.modified);
        assert_eq!(loaded.tile(8, 8).unwrap().owner_id, 42);
        assert_eq!(loaded.tile(8, 8).unwrap().structure_id, 7);
    }

    #[test]
    fn open_handle_set_stays_bounded() {
        let dir = tempdir().unwrap();
        let storage = ChunkStorage::new(dir.path()).unwrap();

        // Touch more distinct regions than the LRU holds.
        for i in 0..(MAX_OPEN_REGIONS as i32 + 13) {
            let c = generated_chunk(i * REGION_CHUNKS, 0);
            storage.save(&c).unwrap();
        }

        assert!(storage.open_regions() <= MAX_OPEN_REGIONS);

        // Every chunk is still readable after handle churn.
        for i in 0..(MAX_OPEN_REGIONS as i32 + 13) {
            assert!(storage.contains(i * REGION_CHUNKS, 0), "region {i} lost");
        }
    }

    #[test]
    fn recently_used_handles_survive_eviction() {
        let dir = tempdir().unwrap();
        let storage = ChunkStorage::new(dir.path()).unwrap();

        for i in 0..MAX_OPEN_REGIONS as i32 {
            storage.save(&generated_chunk(i * REGION_CHUNKS, 0)).unwrap();
        }
        // Refresh region 0, then open one more to force an eviction.
        assert!(storage.contains(0, 0));
        storage
            .save(&generated_chunk(MAX_OPEN_REGIONS as i32 * REGION_CHUNKS, 0))
            .unwrap();

        let table = storage.regions.lock();
        assert!(
            table.open.contains_key(&region_key(0, 0)),
            "the just-touched handle must not be the eviction victim"
        );
        assert!(!table.open.contains_key(&region_key(1, 0)));
    }

    #[test]
    fn close_all_releases_handles() {
        let dir = tempdir().unwrap();
        let storage = ChunkStorage::new(dir.path()).unwrap();

        storage.save(&generated_chunk(0, 0)).unwrap();
        storage.save(&generated_chunk(100, 100)).unwrap();
        assert!(storage.open_regions() > 0);

        storage.close_all();
        assert_eq!(storage.open_regions(), 0);

        // Reads reopen files transparently.
        assert!(storage.load(0, 0).unwrap().is_some());
    }
}
