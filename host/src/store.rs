//! File-backed `NvStore`: a fixed-capacity byte file standing in for the
//! reference firmware's EEPROM (§4.3, §6).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// A byte-addressable file of exactly `capacity` bytes, read fully into
/// memory at open time and written through byte-by-byte on `update` (the
/// trait only ever calls it with small, sequential runs during `SAVE`).
pub struct FileStore {
    file: File,
    cache: Vec<u8>,
}

impl FileStore {
    /// Open (creating if absent) `path` as a store of `capacity` bytes,
    /// zero-filling any newly created or short region.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> std::io::Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut cache = Vec::new();
        file.read_to_end(&mut cache)?;
        cache.resize(capacity, 0);
        file.set_len(capacity as u64)?;
        file.seek(SeekFrom::Start(0))?;

        Ok(Self { file, cache })
    }
}

impl forth_core::NvStore for FileStore {
    fn length(&self) -> usize {
        self.cache.len()
    }

    fn read(&self, addr: usize) -> u8 {
        self.cache[addr]
    }

    fn update(&mut self, addr: usize, value: u8) {
        self.cache[addr] = value;
        if self.file.seek(SeekFrom::Start(addr as u64)).is_ok() {
            let _ = self.file.write_all(&[value]);
        }
    }
}
