//! Sector-allocated region files.
//!
//! One file holds a 32x32 block of chunks. Sector 0 is the directory:
//! 1024 big-endian i32 entries, one per chunk slot, each packing
//! `(offset_in_sectors << 8) | sector_count`. A zero entry means the
//! slot is empty. Chunk payloads start on sector boundaries as an i32
//! length followed by the frame bytes, zero-padded to the sector edge.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::constants::{CHUNKS_PER_REGION, SECTOR_SIZE};

/// An open region file with its directory cached in memory.
///
/// Exclusively owns the file handle; the storage engine serializes
/// access with a per-handle lock.
pub struct RegionFile {
    path: PathBuf,
    file: File,
    directory: Vec<i32>,
}

impl RegionFile {
    /// Opens (or creates) a region file. A fresh file gets an all-zero
    /// directory sector; a file with a short, damaged header is
    /// reinitialized as empty.
    pub fn open(path: &Path) -> io::Result<Self> {
        let existed = path.exists();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let mut directory = vec![0i32; CHUNKS_PER_REGION];

        if !existed || file.metadata()?.len() < SECTOR_SIZE {
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&[0u8; SECTOR_SIZE as usize])?;
        } else {
            file.seek(SeekFrom::Start(0))?;
            let mut header = [0u8; SECTOR_SIZE as usize];
            file.read_exact(&mut header)?;
            for (i, entry) in directory.iter_mut().enumerate() {
                let bytes: [u8; 4] = header[i * 4..i * 4 + 4].try_into().unwrap();
                *entry = i32::from_be_bytes(bytes);
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            directory,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn slot(local_x: usize, local_y: usize) -> usize {
        local_x + local_y * 32
    }

    pub fn has_chunk(&self, local_x: usize, local_y: usize) -> bool {
        self.directory[Self::slot(local_x, local_y)] != 0
    }

    /// Reads a chunk payload. Returns `None` for empty slots and for
    /// slots whose recorded length is inconsistent with their sector
    /// footprint; a bad slot never poisons its neighbors.
    pub fn read_chunk(&mut self, local_x: usize, local_y: usize) -> io::Result<Option<Vec<u8>>> {
        let location = self.directory[Self::slot(local_x, local_y)];
        if location == 0 {
            return Ok(None);
        }

        let offset_sectors = (location >> 8) as u64;
        let sector_count = (location & 0xFF) as u64;
        if offset_sectors == 0 {
            return Ok(None);
        }

        self.file.seek(SeekFrom::Start(offset_sectors * SECTOR_SIZE))?;
        let mut len_bytes = [0u8; 4];
        self.file.read_exact(&mut len_bytes)?;
        let length = i32::from_be_bytes(len_bytes);

        if length <= 0 || length as u64 > sector_count * SECTOR_SIZE {
            return Ok(None);
        }

        let mut data = vec![0u8; length as usize];
        self.file.read_exact(&mut data)?;
        Ok(Some(data))
    }

    /// Writes a chunk payload, reusing the slot's old sectors when the
    /// payload still fits and appending at the end of the file when it
    /// does not. Grown-out-of sectors are abandoned; the directory holds
    /// enough information for an offline compactor to reclaim them.
    pub fn write_chunk(&mut self, local_x: usize, local_y: usize, data: &[u8]) -> io::Result<()> {
        let index = Self::slot(local_x, local_y);
        let old_location = self.directory[index];

        // Length prefix plus payload, rounded up to whole sectors.
        let required_sectors = (data.len() as u64 + 4).div_ceil(SECTOR_SIZE);

        let offset_sectors = if (old_location >> 8) != 0
            && required_sectors <= (old_location & 0xFF) as u64
        {
            (old_location >> 8) as u64
        } else {
            // Never land on the directory sector.
            (self.file.metadata()?.len() / SECTOR_SIZE).max(1)
        };

        self.file.seek(SeekFrom::Start(offset_sectors * SECTOR_SIZE))?;
        self.file.write_all(&(data.len() as i32).to_be_bytes())?;
        self.file.write_all(data)?;

        // Pad to the sector boundary so appends stay aligned.
        let written = data.len() as u64 + 4;
        let padding = required_sectors * SECTOR_SIZE - written;
        if padding > 0 {
            self.file.write_all(&vec![0u8; padding as usize])?;
        }

        let location = ((offset_sectors as i32) << 8) | (required_sectors as i32 & 0xFF);
        self.directory[index] = location;
        self.file.seek(SeekFrom::Start(index as u64 * 4))?;
        self.file.write_all(&location.to_be_bytes())?;

        Ok(())
    }

    /// Flushes buffered writes to the OS and disk.
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }

    #[cfg(test)]
    fn directory_entry(&self, local_x: usize, local_y: usize) -> i32 {
        self.directory[Self::slot(local_x, local_y)]
    }
}
