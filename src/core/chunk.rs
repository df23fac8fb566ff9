//! Chunks and their framed, compressed byte representation.
//!
//! The codec here is the single source of truth for chunk bytes, both on
//! disk (region files) and on the wire (`CHUNK_DATA` payloads).

use std::io::{self, Cursor, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::constants::CHUNK_SIZE;
use crate::core::terrain::TerrainType;
use crate::core::tile::Tile;

/// A 16x16 block of tiles; the unit of generation, transmission and
/// persistence.
pub struct Chunk {
    chunk_x: i32,
    chunk_y: i32,
    tiles: Box<[[Option<Tile>; CHUNK_SIZE]; CHUNK_SIZE]>,
    /// Every cell is populated once this is set.
    pub generated: bool,
    /// Set by edits only, never by generation. Decides whether the chunk
    /// ships as bytes or as a regenerate hint.
    pub modified: bool,
}

impl Chunk {
    pub fn new(chunk_x: i32, chunk_y: i32) -> Self {
        Self {
            chunk_x,
            chunk_y,
            tiles: Box::new([[None; CHUNK_SIZE]; CHUNK_SIZE]),
            generated: false,
            modified: false,
        }
    }

    pub fn chunk_x(&self) -> i32 {
        self.chunk_x
    }

    pub fn chunk_y(&self) -> i32 {
        self.chunk_y
    }

    pub fn tile(&self, local_x: usize, local_y: usize) -> Option<Tile> {
        if local_x >= CHUNK_SIZE || local_y >= CHUNK_SIZE {
            return None;
        }
        self.tiles[local_x][local_y]
    }

    pub fn set_tile(&mut self, local_x: usize, local_y: usize, tile: Tile) {
        if local_x < CHUNK_SIZE && local_y < CHUNK_SIZE {
            self.tiles[local_x][local_y] = Some(tile);
        }
    }

    /// World X coordinate of a local column.
    pub fn world_x(&self, local_x: usize) -> i32 {
        self.chunk_x * CHUNK_SIZE as i32 + local_x as i32
    }

    /// World Y coordinate of a local row.
    pub fn world_y(&self, local_y: usize) -> i32 {
        self.chunk_y * CHUNK_SIZE as i32 + local_y as i32
    }

    /// Encode the chunk into its gzip frame.
    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        let mut frame = Vec::with_capacity(CHUNK_SIZE * CHUNK_SIZE * 35 + 10);

        frame.extend_from_slice(&self.chunk_x.to_be_bytes());
        frame.extend_from_slice(&self.chunk_y.to_be_bytes());
        frame.push(self.generated as u8);
        frame.push(self.modified as u8);

        for column in self.tiles.iter() {
            for cell in column.iter() {
                match cell {
                    Some(tile) => {
                        frame.push(1);
                        frame.push(tile.terrain as u8);
                        frame.extend_from_slice(&(tile.height as f32).to_be_bytes());
                        frame.extend_from_slice(&(tile.temperature as f32).to_be_bytes());
                        frame.extend_from_slice(&(tile.moisture as f32).to_be_bytes());
                        frame.extend_from_slice(&tile.owner_id.to_be_bytes());
                        frame.extend_from_slice(&tile.structure_id.to_be_bytes());
                        frame.extend_from_slice(&tile.content_amount.to_be_bytes());
                        frame.push(tile.rotation as u8);
                    }
                    None => frame.push(0),
                }
            }
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&frame)?;
        encoder.finish()
    }

    /// Decode a chunk from its gzip frame.
    ///
    /// Unknown terrain ordinals map to `Ocean`; a truncated or garbled
    /// frame is an error and the caller treats the chunk as absent.
    pub fn deserialize(data: &[u8]) -> io::Result<Chunk> {
        let mut frame = Vec::new();
        GzDecoder::new(data).read_to_end(&mut frame)?;
        let mut cursor = Cursor::new(frame.as_slice());

        let chunk_x = read_i32(&mut cursor)?;
        let chunk_y = read_i32(&mut cursor)?;
        let mut chunk = Chunk::new(chunk_x, chunk_y);
        chunk.generated = read_bool(&mut cursor)?;
        chunk.modified = read_bool(&mut cursor)?;

        for local_x in 0..CHUNK_SIZE {
            for local_y in 0..CHUNK_SIZE {
                if !read_bool(&mut cursor)? {
                    continue;
                }
                let terrain = TerrainType::from_u8(read_u8(&mut cursor)?);
                let height = read_f32(&mut cursor)? as f64;
                let temperature = read_f32(&mut cursor)? as f64;
                let moisture = read_f32(&mut cursor)? as f64;
                let owner_id = read_i64(&mut cursor)?;
                let structure_id = read_i32(&mut cursor)?;
                let content_amount = read_i32(&mut cursor)?;
                let rotation = read_u8(&mut cursor)? as i8;

                let mut tile = Tile::new(terrain, height, temperature, moisture);
                tile.owner_id = owner_id;
                tile.structure_id = structure_id;
                tile.content_amount = content_amount;
                tile.rotation = rotation;
                chunk.tiles[local_x][local_y] = Some(tile);
            }
        }

        Ok(chunk)
    }
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    cursor.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_bool(cursor: &mut Cursor<&[u8]>) -> io::Result<bool> {
    Ok(read_u8(cursor)? != 0)
}

fn read_i32(cursor: &mut Cursor<&[u8]>) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    cursor.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_i64(cursor: &mut Cursor<&[u8]>) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    cursor.read_exact(&mut buf)?;
    Ok(i64::from_be_bytes(buf))
}

fn read_f32(cursor: &mut Cursor<&[u8]>) -> io::Result<f32> {
    let mut buf = [0u8; 4];
    cursor.read_exact(&mut buf)?;
    Ok(f32::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk() -> Chunk {
        let mut chunk = Chunk::new(-3, 7);
        for lx in 0..CHUNK_SIZE {
            for ly in 0..CHUNK_SIZE {
                let mut tile = Tile::new(
                    TerrainType::from_u8(((lx + ly) % 21) as u8),
                    (lx as f64) / 16.0,
                    (ly as f64) / 16.0,
                    0.25,
                );
                tile.owner_id = (lx as i64) * 100 - 1;
                tile.structure_id = ly as i32;
                tile.content_amount = (lx * ly) as i32;
                tile.rotation = (lx % 4) as i8;
                chunk.set_tile(lx, ly, tile);
            }
        }
        chunk.generated = true;
        chunk
    }

    #[test]
    fn round_trip_preserves_every_cell() {
        let chunk = sample_chunk();
        let bytes = chunk.serialize().unwrap();
        let decoded = Chunk::deserialize(&bytes).unwrap();

        assert_eq!(decoded.chunk_x(), -3);
        assert_eq!(decoded.chunk_y(), 7);
        assert!(decoded.generated);
        assert!(!decoded.modified);

        for lx in 0..CHUNK_SIZE {
            for ly in 0..CHUNK_SIZE {
                let a = chunk.tile(lx, ly).unwrap();
                let b = decoded.tile(lx, ly).unwrap();
                assert_eq!(a.terrain, b.terrain);
                // Scalars travel as f32.
                assert_eq!(a.height as f32, b.height as f32);
                assert_eq!(a.temperature as f32, b.temperature as f32);
                assert_eq!(a.moisture as f32, b.moisture as f32);
                assert_eq!(a.owner_id, b.owner_id);
                assert_eq!(a.structure_id, b.structure_id);
                assert_eq!(a.content_amount, b.content_amount);
                assert_eq!(a.rotation, b.rotation);
            }
        }
    }

    #[test]
    fn re_encoding_is_stable() {
        let chunk = sample_chunk();
        let first = chunk.serialize().unwrap();
        let second = Chunk::deserialize(&first).unwrap().serialize().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_cells_survive() {
        let mut chunk = Chunk::new(0, 0);
        chunk.set_tile(4, 9, Tile::new(TerrainType::Beach, 0.41, 0.6, 0.4));

        let decoded = Chunk::deserialize(&chunk.serialize().unwrap()).unwrap();
        assert!(decoded.tile(0, 0).is_none());
        assert_eq!(decoded.tile(4, 9).unwrap().terrain, TerrainType::Beach);
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let bytes = sample_chunk().serialize().unwrap();
        assert!(Chunk::deserialize(&bytes[..bytes.len() / 2]).is_err());
        assert!(Chunk::deserialize(&[1, 2, 3]).is_err());
    }

    #[test]
    fn world_coordinates() {
        let chunk = Chunk::new(2, -1);
        assert_eq!(chunk.world_x(0), 32);
        assert_eq!(chunk.world_x(15), 47);
        assert_eq!(chunk.world_y(0), -16);
        assert_eq!(chunk.world_y(15), -1);
    }

    #[test]
    fn out_of_range_access_is_ignored() {
        let mut chunk = Chunk::new(0, 0);
        chunk.set_tile(16, 0, Tile::new(TerrainType::Ocean, 0.2, 0.5, 0.5));
        assert!(chunk.tile(16, 0).is_none());
    }
}
