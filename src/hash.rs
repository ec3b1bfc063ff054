//! Streaming content hashing

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use blake3::Hasher;
use memmap2::MmapOptions;

use crate::error::ScanError;

const MEMMAP_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB
const BUFFER_SIZE: usize = 1024 * 1024; // 1MB

/// Compute the BLAKE3 digest of a file's content as lowercase hex.
///
/// Large files are memory-mapped, smaller ones read through a buffered
/// reader; the file is never held in memory as a whole.
pub fn hash_file(path: &Path) -> Result<String, ScanError> {
    let io_err = |source: std::io::Error| ScanError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let file_size = file.metadata().map_err(io_err)?.len();

    if file_size >= MEMMAP_THRESHOLD {
        // Safety: the mapping is read-only and dropped before returning
        let mmap = unsafe { MmapOptions::new().map(&file).map_err(io_err)? };
        let mut hasher = Hasher::new();
        hasher.update(&mmap[..]);
        return Ok(hasher.finalize().to_hex().to_string());
    }

    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut hasher = Hasher::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer).map_err(io_err)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}
