//! In-memory checksum cache keyed by file identity

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Last known checksum for a file, together with the size and mtime it was
/// computed at.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub checksum: String,
    pub size: u64,
    pub mtime: i64,
}

impl CacheEntry {
    /// A cached checksum is only reusable when size and mtime both still
    /// match exactly.
    fn is_valid(&self, size: u64, mtime: i64) -> bool {
        self.size == size && self.mtime == mtime
    }
}

/// Memoized mapping from absolute path to the last computed checksum.
///
/// Size or mtime changing is taken as proof of content change without
/// re-reading the file. Content rewritten within the same mtime second and
/// with the same size therefore goes undetected; this is a deliberate
/// trade-off inherited from the upstream design. There is no eviction: the
/// cache lives exactly as long as the owning scanner, and entries for
/// deleted files simply become unreachable.
#[derive(Debug, Default)]
pub struct ChecksumCache {
    entries: HashMap<PathBuf, CacheEntry>,
}

impl ChecksumCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached checksum when the stored size and mtime both equal
    /// the current values.
    pub fn lookup(&self, path: &Path, size: u64, mtime: i64) -> Option<&str> {
        match self.entries.get(path) {
            Some(entry) if entry.is_valid(size, mtime) => {
                debug!("cache hit: {}", path.display());
                Some(entry.checksum.as_str())
            }
            Some(_) => {
                debug!("cache entry outdated: {}", path.display());
                None
            }
            None => {
                debug!("cache miss: {}", path.display());
                None
            }
        }
    }

    /// Insert or overwrite the entry unconditionally.
    pub fn store(&mut self, path: PathBuf, checksum: String, size: u64, mtime: i64) {
        self.entries.insert(
            path,
            CacheEntry {
                checksum,
                size,
                mtime,
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
